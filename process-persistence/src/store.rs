//! Storage trait for marshalled process-instance state.

use bytes::Bytes;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No state is stored for the instance.
    #[error("No marshalled state found for instance: {0}")]
    NotFound(String),
    /// Store-specific error.
    #[error("Store error: {0}")]
    Store(String),
}

/// Storage of marshalled process-instance state, keyed by instance id.
///
/// Implementations own durability only; what the bytes mean is entirely
/// the marshalling layer's concern. Saving under an existing id
/// overwrites the previous state.
pub trait InstanceStore: Send + Sync {
    /// Persist marshalled state for an instance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the state cannot be saved.
    fn save(&self, instance_id: &str, data: Bytes) -> Result<(), StoreError>;

    /// Load the marshalled state of an instance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing is stored under the id.
    fn load(&self, instance_id: &str) -> Result<Bytes, StoreError>;

    /// Remove the marshalled state of an instance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing is stored under the id.
    fn delete(&self, instance_id: &str) -> Result<(), StoreError>;

    /// List all stored instance ids.
    fn list(&self) -> Result<Vec<String>, StoreError>;
}
