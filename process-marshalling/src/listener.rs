//! Observation hooks around (un)marshalling.

use process_core::{NodeInstance, ProcessInstance};

/// Before/after hooks around process-level and node-level marshalling.
///
/// Every hook is a no-op by default. Listeners may observe and perform
/// side effects (metrics, domain events) but must not be relied upon to
/// mutate the instance being processed. When several listeners are
/// registered they fire in registration order.
pub trait MarshallingListener: Send + Sync {
    /// Fired before any node of the instance is written.
    fn before_marshall_process(&self, _instance: &ProcessInstance) {}

    /// Fired after the last node of the instance has been written.
    fn after_marshall_process(&self, _instance: &ProcessInstance) {}

    /// Fired after the envelope is decoded, before any node is read.
    fn before_unmarshall_process(&self, _instance_id: &str) {}

    /// Fired once the instance is fully reconstructed.
    fn after_unmarshall_process(&self, _instance: &ProcessInstance) {}

    /// Fired before one node instance is written.
    fn before_marshall_node(&self, _node: &dyn NodeInstance) {}

    /// Fired after one node instance has been written.
    fn after_marshall_node(&self, _node: &dyn NodeInstance) {}

    /// Fired before one persisted node record is read.
    fn before_unmarshall_node(&self, _kind: &str) {}

    /// Fired after one node instance has been reconstructed.
    fn after_unmarshall_node(&self, _node: &dyn NodeInstance) {}
}
