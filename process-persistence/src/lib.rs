//! Persistence layer for marshalled process instances.
//!
//! This crate stores the bytes produced by `process-marshalling` and
//! wires them back into live instances:
//!
//! - **InstanceStore**: a trait that abstracts the storage mechanism for
//!   marshalled instance state, keyed by instance id.
//! - **InMemoryStore**: a reference implementation using an in-memory
//!   HashMap.
//! - **InstanceRepository**: combines a store with a
//!   `MarshallingService`; writes back only dirty instances, so an
//!   instance unmarshalled in read-only mode never reaches the store.
//!
//! # Example
//!
//! ```rust,ignore
//! use process_persistence::{InMemoryStore, InstanceRepository};
//! use process_marshalling::MarshallingService;
//! use std::sync::Arc;
//!
//! let repository = InstanceRepository::new(
//!     Arc::new(InMemoryStore::new()),
//!     MarshallingService::builder().build(),
//! );
//! repository.save(&mut instance)?;
//! let restored = repository.find("instance-123", definition, UnmarshallMode::Mutable)?;
//! ```

mod in_memory;
mod repository;
mod store;

pub use in_memory::InMemoryStore;
pub use repository::{InstanceRepository, RepositoryError};
pub use store::{InstanceStore, StoreError};
