//! Runtime node instances.
//!
//! A node instance is the runtime record of one active step within a
//! process instance. The set of kinds is open: the engine (or an
//! extension) can introduce new kinds without this crate knowing about
//! them, and the marshalling layer dispatches on [`NodeInstance::kind`]
//! through pluggable codecs. `as_any` is the single escape hatch a codec
//! uses to recover the concrete type it accepted.

use chrono::{DateTime, Utc};
use std::any::Any;

/// Kind tag for [`TaskNodeInstance`].
pub const TASK_NODE_KIND: &str = "task";
/// Kind tag for [`EventNodeInstance`].
pub const EVENT_NODE_KIND: &str = "event";
/// Kind tag for [`TimerNodeInstance`].
pub const TIMER_NODE_KIND: &str = "timer";
/// Kind tag for [`CompositeNodeInstance`].
pub const COMPOSITE_NODE_KIND: &str = "composite";

/// One active step within a process instance.
///
/// Composite kinds own an embedded sub-graph exposed through
/// [`children`](NodeInstance::children); leaf kinds keep the default
/// empty slice.
pub trait NodeInstance: Any + Send + Sync {
    /// Unique identifier of this node instance within its process instance.
    fn id(&self) -> &str;

    /// Name of the definition node this instance was spawned from.
    fn node_name(&self) -> &str;

    /// Kind tag used for codec dispatch.
    fn kind(&self) -> &str;

    /// Embedded sub-graph of a composite node instance.
    fn children(&self) -> &[Box<dyn NodeInstance>] {
        &[]
    }

    /// Downcast support for codecs that accepted this instance.
    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn NodeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInstance")
            .field("id", &self.id())
            .field("node_name", &self.node_name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// An active task step awaiting completion.
#[derive(Debug, Clone)]
pub struct TaskNodeInstance {
    id: String,
    node_name: String,
}

impl TaskNodeInstance {
    pub fn new(id: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_name: node_name.into(),
        }
    }
}

impl NodeInstance for TaskNodeInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_name(&self) -> &str {
        &self.node_name
    }

    fn kind(&self) -> &str {
        TASK_NODE_KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An active step waiting for an external event of a given type.
#[derive(Debug, Clone)]
pub struct EventNodeInstance {
    id: String,
    node_name: String,
    event_type: String,
}

impl EventNodeInstance {
    pub fn new(
        id: impl Into<String>,
        node_name: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            node_name: node_name.into(),
            event_type: event_type.into(),
        }
    }

    /// Event type this node is correlated on.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

impl NodeInstance for EventNodeInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_name(&self) -> &str {
        &self.node_name
    }

    fn kind(&self) -> &str {
        EVENT_NODE_KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An active step waiting for a deadline.
#[derive(Debug, Clone)]
pub struct TimerNodeInstance {
    id: String,
    node_name: String,
    expires_at: DateTime<Utc>,
}

impl TimerNodeInstance {
    pub fn new(
        id: impl Into<String>,
        node_name: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            node_name: node_name.into(),
            expires_at,
        }
    }

    /// Deadline at which the timer fires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl NodeInstance for TimerNodeInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_name(&self) -> &str {
        &self.node_name
    }

    fn kind(&self) -> &str {
        TIMER_NODE_KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A container step holding an embedded sub-graph of node instances.
pub struct CompositeNodeInstance {
    id: String,
    node_name: String,
    children: Vec<Box<dyn NodeInstance>>,
}

impl CompositeNodeInstance {
    pub fn new(id: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_name: node_name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(
        id: impl Into<String>,
        node_name: impl Into<String>,
        children: Vec<Box<dyn NodeInstance>>,
    ) -> Self {
        Self {
            id: id.into(),
            node_name: node_name.into(),
            children,
        }
    }

    /// Add a node instance to the embedded sub-graph.
    pub fn add_child(&mut self, child: Box<dyn NodeInstance>) {
        self.children.push(child);
    }
}

impl NodeInstance for CompositeNodeInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_name(&self) -> &str {
        &self.node_name
    }

    fn kind(&self) -> &str {
        COMPOSITE_NODE_KIND
    }

    fn children(&self) -> &[Box<dyn NodeInstance>] {
        &self.children
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
