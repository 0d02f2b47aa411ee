//! Pluggable codecs for node-instance kinds.
//!
//! Writers and readers follow the same ordered, first-acceptor-wins shape
//! as object-marshalling strategies, keyed by node kind instead of value
//! type. The built-in codecs cover the four core kinds and sit at
//! [`DEFAULT_CODEC_PRIORITY`]; an extension persists a new node kind by
//! registering a writer/reader pair, and overrides a built-in kind by
//! registering at a lower priority number.

use crate::context::{ReadContext, WriteContext};
use crate::records::NodeInstanceRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use process_core::node::{
    COMPOSITE_NODE_KIND, EVENT_NODE_KIND, TASK_NODE_KIND, TIMER_NODE_KIND,
};
use process_core::{
    CompositeNodeInstance, EventNodeInstance, NodeInstance, TaskNodeInstance, TimerNodeInstance,
};
use serde::{Deserialize, Serialize};

/// Priority of the built-in codecs. Custom codecs registered with a lower
/// number take precedence.
pub const DEFAULT_CODEC_PRIORITY: i32 = 10;

/// Serializer for one family of node-instance kinds.
pub trait NodeInstanceWriter: Send + Sync {
    /// Ordering of this writer within the chain; lower runs first.
    fn priority(&self) -> i32 {
        DEFAULT_CODEC_PRIORITY
    }

    /// Whether this writer can persist the given node instance.
    fn accepts(&self, node: &dyn NodeInstance) -> bool;

    /// Persist the node instance's own envelope and payload.
    ///
    /// Children of a composite node are written by the marshaller through
    /// the same writer-selection process and attached to the returned
    /// record afterwards; a writer only encodes the node itself.
    fn write(&self, ctx: &mut WriteContext, node: &dyn NodeInstance)
        -> Result<NodeInstanceRecord>;
}

/// Deserializer for one family of node-instance kinds.
pub trait NodeInstanceReader: Send + Sync {
    /// Ordering of this reader within the chain; lower runs first.
    fn priority(&self) -> i32 {
        DEFAULT_CODEC_PRIORITY
    }

    /// Whether this reader can reconstruct the given persisted kind.
    fn accepts(&self, kind: &str) -> bool;

    /// Reconstruct a node instance from its record.
    ///
    /// `children` holds the already-reconstructed sub-graph of a
    /// composite record, in persisted order.
    fn read(
        &self,
        ctx: &ReadContext,
        record: &NodeInstanceRecord,
        children: Vec<Box<dyn NodeInstance>>,
    ) -> Result<Box<dyn NodeInstance>>;
}

#[derive(Serialize, Deserialize)]
struct EventPayload {
    event_type: String,
}

#[derive(Serialize, Deserialize)]
struct TimerPayload {
    expires_at: DateTime<Utc>,
}

/// Built-in writer for the core node kinds.
pub struct BuiltinNodeWriter;

impl NodeInstanceWriter for BuiltinNodeWriter {
    fn accepts(&self, node: &dyn NodeInstance) -> bool {
        matches!(
            node.kind(),
            TASK_NODE_KIND | EVENT_NODE_KIND | TIMER_NODE_KIND | COMPOSITE_NODE_KIND
        )
    }

    fn write(
        &self,
        _ctx: &mut WriteContext,
        node: &dyn NodeInstance,
    ) -> Result<NodeInstanceRecord> {
        let payload = match node.kind() {
            EVENT_NODE_KIND => {
                let event = node
                    .as_any()
                    .downcast_ref::<EventNodeInstance>()
                    .context("Node tagged as event is not an EventNodeInstance")?;
                serde_json::to_vec(&EventPayload {
                    event_type: event.event_type().to_string(),
                })
                .context("Failed to encode event payload")?
            }
            TIMER_NODE_KIND => {
                let timer = node
                    .as_any()
                    .downcast_ref::<TimerNodeInstance>()
                    .context("Node tagged as timer is not a TimerNodeInstance")?;
                serde_json::to_vec(&TimerPayload {
                    expires_at: timer.expires_at(),
                })
                .context("Failed to encode timer payload")?
            }
            // Task and composite carry no kind-specific state beyond the envelope.
            _ => Vec::new(),
        };
        Ok(NodeInstanceRecord::new(
            node.id(),
            node.node_name(),
            node.kind(),
            payload,
        ))
    }
}

/// Built-in reader for the core node kinds.
pub struct BuiltinNodeReader;

impl NodeInstanceReader for BuiltinNodeReader {
    fn accepts(&self, kind: &str) -> bool {
        matches!(
            kind,
            TASK_NODE_KIND | EVENT_NODE_KIND | TIMER_NODE_KIND | COMPOSITE_NODE_KIND
        )
    }

    fn read(
        &self,
        _ctx: &ReadContext,
        record: &NodeInstanceRecord,
        children: Vec<Box<dyn NodeInstance>>,
    ) -> Result<Box<dyn NodeInstance>> {
        Ok(match record.kind.as_str() {
            TASK_NODE_KIND => Box::new(TaskNodeInstance::new(&record.id, &record.node_name)),
            EVENT_NODE_KIND => {
                let payload: EventPayload = serde_json::from_slice(&record.payload)
                    .context("Failed to decode event payload")?;
                Box::new(EventNodeInstance::new(
                    &record.id,
                    &record.node_name,
                    payload.event_type,
                ))
            }
            TIMER_NODE_KIND => {
                let payload: TimerPayload = serde_json::from_slice(&record.payload)
                    .context("Failed to decode timer payload")?;
                Box::new(TimerNodeInstance::new(
                    &record.id,
                    &record.node_name,
                    payload.expires_at,
                ))
            }
            COMPOSITE_NODE_KIND => Box::new(CompositeNodeInstance::with_children(
                &record.id,
                &record.node_name,
                children,
            )),
            other => anyhow::bail!("built-in reader asked to decode unknown kind '{other}'"),
        })
    }
}
