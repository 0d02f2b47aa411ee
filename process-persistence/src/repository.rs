//! Repository combining a store with the marshalling service.

use crate::store::{InstanceStore, StoreError};
use process_core::{ProcessDefinition, ProcessInstance};
use process_marshalling::{MarshallingError, MarshallingService, UnmarshallMode};
use std::sync::Arc;

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Marshalling(#[from] MarshallingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persists live process instances through a [`MarshallingService`].
///
/// `update` consults the instance's dirty flag, so instances
/// reconstructed in read-only mode (or otherwise untouched) are never
/// written back.
pub struct InstanceRepository {
    store: Arc<dyn InstanceStore>,
    service: MarshallingService,
}

impl InstanceRepository {
    pub fn new(store: Arc<dyn InstanceStore>, service: MarshallingService) -> Self {
        Self { store, service }
    }

    /// Marshall and store the instance unconditionally.
    pub fn save(&self, instance: &mut ProcessInstance) -> Result<(), RepositoryError> {
        let data = self.service.marshall(instance)?;
        self.store.save(instance.id(), data)?;
        instance.clear_dirty();
        Ok(())
    }

    /// Write the instance back only if it has tracked mutations.
    ///
    /// Returns whether a write happened.
    pub fn update(&self, instance: &mut ProcessInstance) -> Result<bool, RepositoryError> {
        if !instance.is_dirty() {
            tracing::trace!(instance_id = %instance.id(), "instance clean, skipping persistence");
            return Ok(false);
        }
        self.save(instance)?;
        Ok(true)
    }

    /// Load and unmarshall an instance, or `None` if nothing is stored.
    pub fn find(
        &self,
        instance_id: &str,
        definition: Arc<ProcessDefinition>,
        mode: UnmarshallMode,
    ) -> Result<Option<ProcessInstance>, RepositoryError> {
        match self.store.load(instance_id) {
            Ok(data) => Ok(Some(self.service.unmarshall(data, definition, mode)?)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove an instance's stored state.
    pub fn remove(&self, instance_id: &str) -> Result<(), RepositoryError> {
        self.store.delete(instance_id)?;
        Ok(())
    }

    /// Best-effort refresh of a potentially stale in-memory instance from
    /// its stored state.
    ///
    /// Follows the lenient reload contract: if no state is stored or
    /// reloading fails, a warning is logged and the instance keeps its
    /// prior state.
    pub fn refresh(&self, instance: &mut ProcessInstance) {
        let store = Arc::clone(&self.store);
        let instance_id = instance.id().to_string();
        let reload = self
            .service
            .create_reload_function(move || store.load(&instance_id).ok());
        reload(instance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use process_core::{ProcessState, TaskNodeInstance};

    fn definition() -> Arc<ProcessDefinition> {
        Arc::new(ProcessDefinition::new("orders", "1.0", "Orders"))
    }

    fn repository() -> (InstanceRepository, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let repository = InstanceRepository::new(
            Arc::clone(&store) as Arc<dyn InstanceStore>,
            MarshallingService::builder().build(),
        );
        (repository, store)
    }

    #[test]
    fn test_save_then_find_round_trip() {
        let (repository, _store) = repository();
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.add_node_instance(Box::new(TaskNodeInstance::new("n-1", "Task1")));
        instance.set_variable("x", Box::new(5i64));

        repository.save(&mut instance).expect("save should succeed");
        assert!(!instance.is_dirty());

        let found = repository
            .find("i-1", definition(), UnmarshallMode::Mutable)
            .expect("find should succeed")
            .expect("instance should be stored");
        assert_eq!(found.id(), "i-1");
        assert_eq!(found.node_instances().len(), 1);
        assert_eq!(found.variable_as::<i64>("x"), Some(&5));
    }

    #[test]
    fn test_find_missing_yields_none() {
        let (repository, _store) = repository();
        let found = repository
            .find("missing", definition(), UnmarshallMode::Mutable)
            .expect("find should succeed");
        assert!(found.is_none());
    }

    #[test]
    fn test_update_skips_clean_instance() {
        let (repository, store) = repository();
        let mut instance = ProcessInstance::new(definition(), "i-1");
        repository.save(&mut instance).expect("save should succeed");
        let before = store.load("i-1").expect("state should be stored");

        let written = repository.update(&mut instance).expect("update should succeed");
        assert!(!written);
        assert_eq!(store.load("i-1").expect("state should remain"), before);
    }

    #[test]
    fn test_update_writes_dirty_instance() {
        let (repository, _store) = repository();
        let mut instance = ProcessInstance::new(definition(), "i-1");
        repository.save(&mut instance).expect("save should succeed");

        instance.set_state(ProcessState::Completed);
        let written = repository.update(&mut instance).expect("update should succeed");
        assert!(written);

        let found = repository
            .find("i-1", definition(), UnmarshallMode::Mutable)
            .expect("find should succeed")
            .expect("instance should be stored");
        assert_eq!(found.state(), ProcessState::Completed);
    }

    #[test]
    fn test_read_only_instance_is_never_persisted() {
        let (repository, store) = repository();
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.set_variable("x", Box::new(5i64));
        repository.save(&mut instance).expect("save should succeed");

        let mut inspection = repository
            .find("i-1", definition(), UnmarshallMode::ReadOnly)
            .expect("find should succeed")
            .expect("instance should be stored");
        let before = store.load("i-1").expect("state should be stored");

        inspection.set_variable("x", Box::new(99i64));
        let written = repository.update(&mut inspection).expect("update should succeed");

        assert!(!written);
        assert_eq!(store.load("i-1").expect("state should remain"), before);
    }

    #[test]
    fn test_refresh_restores_stale_state() {
        let (repository, _store) = repository();
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.set_variable("x", Box::new(5i64));
        repository.save(&mut instance).expect("save should succeed");

        instance.set_variable("x", Box::new(42i64));
        repository.refresh(&mut instance);

        assert_eq!(instance.variable_as::<i64>("x"), Some(&5));
        assert!(!instance.is_dirty());
    }

    #[test]
    fn test_refresh_with_nothing_stored_keeps_state() {
        let (repository, _store) = repository();
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.set_variable("x", Box::new(5i64));
        instance.clear_dirty();

        repository.refresh(&mut instance);

        assert_eq!(instance.variable_as::<i64>("x"), Some(&5));
        assert!(!instance.is_dirty());
    }

    #[test]
    fn test_remove() {
        let (repository, _store) = repository();
        let mut instance = ProcessInstance::new(definition(), "i-1");
        repository.save(&mut instance).expect("save should succeed");

        repository.remove("i-1").expect("remove should succeed");
        let found = repository
            .find("i-1", definition(), UnmarshallMode::Mutable)
            .expect("find should succeed");
        assert!(found.is_none());
    }
}
