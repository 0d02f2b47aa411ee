//! Live process instance state.
//!
//! A [`ProcessInstance`] is one running execution of a process definition:
//! an identity, a graph of active node instances, and a variable bag. The
//! instance is owned by the execution engine; the marshalling layer only
//! borrows it for the duration of one call.
//!
//! Change tracking is deliberately coarse: a single dirty flag that the
//! persistence layer consults to decide whether an update needs to be
//! written back. Instances reconstructed in read-only mode have tracking
//! disabled, so in-memory mutation never triggers a persistence write.

use crate::definition::ProcessDefinition;
use crate::node::NodeInstance;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Value bound to a process variable.
///
/// The set of value types is open; object-marshalling strategies recover
/// concrete types by downcasting.
pub type VariableValue = Box<dyn Any + Send + Sync>;

/// Lifecycle state of a process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Active,
    Completed,
    Aborted,
}

/// One running execution of a workflow definition.
pub struct ProcessInstance {
    id: String,
    definition: Arc<ProcessDefinition>,
    state: ProcessState,
    started_at: DateTime<Utc>,
    nodes: Vec<Box<dyn NodeInstance>>,
    variables: HashMap<String, VariableValue>,
    track_changes: bool,
    dirty: bool,
}

impl ProcessInstance {
    /// Create a new, active instance bound to a definition.
    ///
    /// Change tracking starts enabled and the instance starts clean.
    pub fn new(definition: Arc<ProcessDefinition>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            definition,
            state: ProcessState::Active,
            started_at: Utc::now(),
            nodes: Vec::new(),
            variables: HashMap::new(),
            track_changes: true,
            dirty: false,
        }
    }

    /// Unique identifier of this instance.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Definition this instance was started from.
    pub fn definition(&self) -> &Arc<ProcessDefinition> {
        &self.definition
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Transition the instance to a new lifecycle state.
    pub fn set_state(&mut self, state: ProcessState) {
        self.state = state;
        self.mark_dirty();
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn set_started_at(&mut self, started_at: DateTime<Utc>) {
        self.started_at = started_at;
    }

    /// Currently active top-level node instances.
    pub fn node_instances(&self) -> &[Box<dyn NodeInstance>] {
        &self.nodes
    }

    /// Activate a node instance in this process instance.
    pub fn add_node_instance(&mut self, node: Box<dyn NodeInstance>) {
        self.nodes.push(node);
        self.mark_dirty();
    }

    /// Remove a node instance by id, returning it if present.
    ///
    /// Only searches top-level nodes; composite sub-graphs are owned by
    /// their container.
    pub fn remove_node_instance(&mut self, id: &str) -> Option<Box<dyn NodeInstance>> {
        let index = self.nodes.iter().position(|n| n.id() == id)?;
        self.mark_dirty();
        Some(self.nodes.remove(index))
    }

    /// Look up a variable value by name.
    pub fn variable(&self, name: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.variables.get(name).map(|v| v.as_ref())
    }

    /// Look up a variable and downcast it to a concrete type.
    pub fn variable_as<T: 'static>(&self, name: &str) -> Option<&T> {
        self.variable(name).and_then(|v| v.downcast_ref::<T>())
    }

    /// Bind a variable, replacing any previous value under the same name.
    pub fn set_variable(&mut self, name: impl Into<String>, value: VariableValue) {
        self.variables.insert(name.into(), value);
        self.mark_dirty();
    }

    /// Remove a variable binding.
    pub fn remove_variable(&mut self, name: &str) -> Option<VariableValue> {
        let removed = self.variables.remove(name);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    /// Names of all bound variables, in no particular order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(|s| s.as_str())
    }

    /// Enable or disable change tracking.
    ///
    /// With tracking disabled, mutations no longer mark the instance dirty,
    /// so a dirty-aware persistence layer will not write it back.
    pub fn set_change_tracking(&mut self, track: bool) {
        self.track_changes = track;
    }

    /// Whether mutations are currently tracked.
    pub fn tracks_changes(&self) -> bool {
        self.track_changes
    }

    /// Whether the instance has tracked mutations since the last
    /// [`clear_dirty`](Self::clear_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Reset the dirty flag after the instance has been persisted.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn mark_dirty(&mut self) {
        if self.track_changes {
            self.dirty = true;
        }
    }

    /// Replace the instance's runtime state in place, preserving identity.
    ///
    /// Used when re-hydrating from marshalled state: the id, definition
    /// binding and change-tracking mode survive, the node graph and
    /// variable bag are swapped wholesale, and the instance stays clean
    /// (restored state is by definition already persisted).
    pub fn rehydrate(
        &mut self,
        state: ProcessState,
        started_at: DateTime<Utc>,
        nodes: Vec<Box<dyn NodeInstance>>,
        variables: HashMap<String, VariableValue>,
    ) {
        self.state = state;
        self.started_at = started_at;
        self.nodes = nodes;
        self.variables = variables;
        self.dirty = false;
    }
}

impl std::fmt::Debug for ProcessInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.variable_names().collect();
        names.sort_unstable();
        f.debug_struct("ProcessInstance")
            .field("id", &self.id)
            .field("process", &self.definition.id())
            .field("state", &self.state)
            .field("nodes", &self.nodes.len())
            .field("variables", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TaskNodeInstance;

    fn definition() -> Arc<ProcessDefinition> {
        Arc::new(ProcessDefinition::new("orders", "1.0", "Orders"))
    }

    #[test]
    fn test_new_instance_is_clean() {
        let instance = ProcessInstance::new(definition(), "i-1");
        assert_eq!(instance.state(), ProcessState::Active);
        assert!(!instance.is_dirty());
        assert!(instance.tracks_changes());
    }

    #[test]
    fn test_mutation_marks_dirty() {
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.set_variable("x", Box::new(5i64));
        assert!(instance.is_dirty());

        instance.clear_dirty();
        instance.add_node_instance(Box::new(TaskNodeInstance::new("n-1", "Task1")));
        assert!(instance.is_dirty());
    }

    #[test]
    fn test_untracked_mutation_stays_clean() {
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.set_change_tracking(false);
        instance.set_variable("x", Box::new(5i64));
        instance.set_state(ProcessState::Completed);
        assert!(!instance.is_dirty());
    }

    #[test]
    fn test_variable_downcast() {
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.set_variable("x", Box::new(5i64));
        instance.set_variable("who", Box::new("ada".to_string()));

        assert_eq!(instance.variable_as::<i64>("x"), Some(&5));
        assert_eq!(instance.variable_as::<String>("who").map(String::as_str), Some("ada"));
        assert!(instance.variable_as::<bool>("x").is_none());
        assert!(instance.variable("missing").is_none());
    }

    #[test]
    fn test_rehydrate_preserves_identity_and_stays_clean() {
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.set_variable("x", Box::new(1i64));
        assert!(instance.is_dirty());

        let started = instance.started_at();
        let mut variables: HashMap<String, VariableValue> = HashMap::new();
        variables.insert("x".to_string(), Box::new(2i64));
        instance.rehydrate(
            ProcessState::Active,
            started,
            vec![Box::new(TaskNodeInstance::new("n-1", "Task1"))],
            variables,
        );

        assert_eq!(instance.id(), "i-1");
        assert_eq!(instance.variable_as::<i64>("x"), Some(&2));
        assert_eq!(instance.node_instances().len(), 1);
        assert!(!instance.is_dirty());
    }

    #[test]
    fn test_remove_node_instance() {
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.add_node_instance(Box::new(TaskNodeInstance::new("n-1", "Task1")));
        instance.clear_dirty();

        let removed = instance.remove_node_instance("n-1");
        assert!(removed.is_some());
        assert!(instance.node_instances().is_empty());
        assert!(instance.is_dirty());
        assert!(instance.remove_node_instance("n-1").is_none());
    }
}
