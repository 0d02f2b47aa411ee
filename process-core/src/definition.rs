//! Process definition references.
//!
//! A definition is the static description of a process: marshalled state
//! only records the definition's identity, never its structure. Both the
//! marshalling and unmarshalling sides must resolve the same definition
//! from an external registry, the same way a task registry is rebuilt from
//! code on both sides of a serialization boundary.

/// Identity of a process definition.
///
/// Instances hold an `Arc<ProcessDefinition>`; the marshalling layer uses
/// the id/version pair to validate that persisted state is re-bound to the
/// definition it was created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDefinition {
    id: String,
    version: String,
    name: String,
}

impl ProcessDefinition {
    /// Create a new definition reference.
    pub fn new(id: impl Into<String>, version: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            name: name.into(),
        }
    }

    /// Stable identifier of the process.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version tag of the process definition.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Human-readable process name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
