//! Marshalling of live process-instance state to and from bytes.
//!
//! The service facade wires per-call contexts, ordered codec chains and
//! listener hooks around a pluggable encoding backend:
//!
//! ```rust,ignore
//! use process_marshalling::{MarshallingService, UnmarshallMode};
//!
//! let service = MarshallingService::builder()
//!     .add_strategy(MyDomainStrategy)
//!     .with_catalog(&catalog)
//!     .build();
//!
//! let data = service.marshall(&instance)?;
//! let restored = service.unmarshall(data, definition, UnmarshallMode::Mutable)?;
//! ```

pub mod context;
pub mod error;
pub mod listener;
pub mod marshaller;
pub mod node_codec;
pub mod records;
pub mod service;
pub mod strategy;

// Re-exports
pub use context::{keys, ContextKey, ReadContext, TypedValues, WriteContext};
pub use error::MarshallingError;
pub use listener::MarshallingListener;
pub use marshaller::{
    JsonMarshaller, JsonMarshallerFactory, MarshallerFactory, ProcessInstanceMarshaller,
    JSON_FORMAT,
};
pub use node_codec::{
    BuiltinNodeReader, BuiltinNodeWriter, NodeInstanceReader, NodeInstanceWriter,
    DEFAULT_CODEC_PRIORITY,
};
pub use service::{CodecCatalog, MarshallingService, MarshallingServiceBuilder, UnmarshallMode};
pub use strategy::{ObjectMarshallingStrategy, PrimitiveStrategy};
