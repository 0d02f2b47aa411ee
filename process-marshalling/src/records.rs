//! Wire records for the default JSON encoding backend.
//!
//! Records carry identity and structure plus opaque codec payloads; the
//! payload bytes are owned by whichever strategy or node codec produced
//! them. Variables are written sorted by name so that marshalling the
//! same unmutated instance twice yields byte-identical output (map
//! iteration order is not guaranteed).

use chrono::{DateTime, Utc};
use process_core::ProcessState;
use serde::{Deserialize, Serialize};

/// Persisted lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateRecord {
    Active,
    Completed,
    Aborted,
}

impl From<ProcessState> for StateRecord {
    fn from(state: ProcessState) -> Self {
        match state {
            ProcessState::Active => StateRecord::Active,
            ProcessState::Completed => StateRecord::Completed,
            ProcessState::Aborted => StateRecord::Aborted,
        }
    }
}

impl From<StateRecord> for ProcessState {
    fn from(record: StateRecord) -> Self {
        match record {
            StateRecord::Active => ProcessState::Active,
            StateRecord::Completed => ProcessState::Completed,
            StateRecord::Aborted => ProcessState::Aborted,
        }
    }
}

/// One persisted node instance, recursively including its sub-graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstanceRecord {
    pub id: String,
    pub node_name: String,
    /// Kind tag used to select a reader on the way back in.
    pub kind: String,
    /// Kind-specific payload produced by the selected writer.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    /// Embedded sub-graph of a composite node instance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeInstanceRecord>,
}

impl NodeInstanceRecord {
    /// Record for a leaf node with a codec payload.
    pub fn new(id: &str, node_name: &str, kind: &str, payload: Vec<u8>) -> Self {
        Self {
            id: id.to_string(),
            node_name: node_name.to_string(),
            kind: kind.to_string(),
            payload,
            children: Vec::new(),
        }
    }
}

/// One persisted variable binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    /// Name of the strategy that encoded the payload; the reading side
    /// selects the strategy with the same name.
    pub strategy: String,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

/// The complete persisted form of one process instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInstanceRecord {
    /// Discriminator of the wire encoding that produced this record.
    pub format: String,
    pub instance_id: String,
    pub process_id: String,
    pub process_version: String,
    pub state: StateRecord,
    pub started_at: DateTime<Utc>,
    pub nodes: Vec<NodeInstanceRecord>,
    pub variables: Vec<VariableRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_record_round_trip() {
        for state in [ProcessState::Active, ProcessState::Completed, ProcessState::Aborted] {
            let record = StateRecord::from(state);
            assert_eq!(ProcessState::from(record), state);
        }
    }

    #[test]
    fn test_empty_children_are_omitted() {
        let record = NodeInstanceRecord::new("n-1", "Task1", "task", Vec::new());
        let json = serde_json::to_string(&record).expect("record should serialize");
        assert!(!json.contains("children"));

        let parsed: NodeInstanceRecord =
            serde_json::from_str(&json).expect("record should deserialize");
        assert!(parsed.children.is_empty());
    }
}
