pub mod definition;
pub mod instance;
pub mod node;

// Re-exports
pub use definition::ProcessDefinition;
pub use instance::{ProcessInstance, ProcessState, VariableValue};
pub use node::{
    CompositeNodeInstance, EventNodeInstance, NodeInstance, TaskNodeInstance, TimerNodeInstance,
};
