//! Per-call marshalling contexts and typed context keys.
//!
//! A context is created at the start of one marshall/unmarshall/reload
//! invocation, populated by the service, handed to the marshaller, and
//! discarded when the call returns. It is never shared across calls or
//! threads. The container is type-erased internally; [`ContextKey::cast`]
//! is the single point where a value crosses back into typed code.

use crate::listener::MarshallingListener;
use crate::node_codec::{NodeInstanceReader, NodeInstanceWriter};
use crate::strategy::ObjectMarshallingStrategy;
use bytes::{Bytes, BytesMut};
use process_core::ProcessDefinition;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A named, typed slot in a marshalling context.
///
/// Keys are process-wide constants; see [`keys`]. The declared type `T`
/// must match the type of every value stored under the key. That contract
/// is enforced at the call site, not by the container.
pub struct ContextKey<T: 'static> {
    name: &'static str,
    default: fn() -> T,
}

impl<T: 'static> ContextKey<T> {
    /// Declare a key with a fallback used when the key is absent.
    pub const fn new(name: &'static str, default: fn() -> T) -> Self {
        Self { name, default }
    }

    /// Stable identity of the key.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Evaluate the fallback value.
    pub fn default_value(&self) -> T {
        (self.default)()
    }

    /// Cast an erased value stored under this key back to `T`.
    ///
    /// # Panics
    ///
    /// Panics if a caller stored a value of a different type under this
    /// key, violating the key's type contract.
    pub fn cast<'a>(&self, value: &'a (dyn Any + Send + Sync)) -> &'a T {
        value.downcast_ref::<T>().unwrap_or_else(|| {
            panic!("context key '{}' holds a value of an unexpected type", self.name)
        })
    }
}

/// Type-erased key/value storage behind the typed-key API.
#[derive(Default)]
pub struct TypedValues {
    entries: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl TypedValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under a typed key, replacing any previous value.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &ContextKey<T>, value: T) {
        self.entries.insert(key.name(), Box::new(value));
    }

    /// Retrieve a value by key, falling back to the key's default when
    /// absent.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &ContextKey<T>) -> T {
        match self.entries.get(key.name()) {
            Some(value) => key.cast(value.as_ref()).clone(),
            None => key.default_value(),
        }
    }

    /// Whether a value is present under the key.
    pub fn contains<T: 'static>(&self, key: &ContextKey<T>) -> bool {
        self.entries.contains_key(key.name())
    }
}

/// Write-side context: typed values plus the byte sink.
///
/// The sink is owned by the context, so it is released on every exit
/// path when the context is dropped.
pub struct WriteContext {
    values: TypedValues,
    sink: BytesMut,
}

impl Default for WriteContext {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteContext {
    pub fn new() -> Self {
        Self {
            values: TypedValues::new(),
            sink: BytesMut::new(),
        }
    }

    pub fn set<T: Send + Sync + 'static>(&mut self, key: &ContextKey<T>, value: T) {
        self.values.set(key, value);
    }

    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &ContextKey<T>) -> T {
        self.values.get(key)
    }

    pub fn values_mut(&mut self) -> &mut TypedValues {
        &mut self.values
    }

    /// The byte sink the marshaller writes into.
    pub fn sink_mut(&mut self) -> &mut BytesMut {
        &mut self.sink
    }

    /// Consume the context and take the written bytes.
    pub fn into_bytes(self) -> Bytes {
        self.sink.freeze()
    }
}

/// Read-side context: typed values plus the byte source.
pub struct ReadContext {
    values: TypedValues,
    source: Bytes,
}

impl ReadContext {
    pub fn new(source: Bytes) -> Self {
        Self {
            values: TypedValues::new(),
            source,
        }
    }

    pub fn set<T: Send + Sync + 'static>(&mut self, key: &ContextKey<T>, value: T) {
        self.values.set(key, value);
    }

    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &ContextKey<T>) -> T {
        self.values.get(key)
    }

    pub fn values_mut(&mut self) -> &mut TypedValues {
        &mut self.values
    }

    /// The byte source the marshaller reads from.
    pub fn source(&self) -> &[u8] {
        &self.source
    }
}

/// The stable set of context keys the service populates per call.
pub mod keys {
    use super::*;

    fn no_definition() -> Option<Arc<ProcessDefinition>> {
        None
    }

    fn no_instance_id() -> Option<String> {
        None
    }

    fn no_strategies() -> Arc<[Arc<dyn ObjectMarshallingStrategy>]> {
        Vec::new().into()
    }

    fn no_writers() -> Arc<[Arc<dyn NodeInstanceWriter>]> {
        Vec::new().into()
    }

    fn no_readers() -> Arc<[Arc<dyn NodeInstanceReader>]> {
        Vec::new().into()
    }

    fn no_listeners() -> Arc<[Arc<dyn MarshallingListener>]> {
        Vec::new().into()
    }

    /// Definition the instance being (un)marshalled is bound to.
    pub static PROCESS_DEFINITION: ContextKey<Option<Arc<ProcessDefinition>>> =
        ContextKey::new("process-definition", no_definition);

    /// Identity of the instance being marshalled or reloaded.
    pub static PROCESS_INSTANCE_ID: ContextKey<Option<String>> =
        ContextKey::new("process-instance-id", no_instance_id);

    /// Whether the reconstructed instance should skip change tracking.
    pub static READ_ONLY: ContextKey<bool> = ContextKey::new("read-only", || false);

    /// Discriminator naming the wire encoding in use.
    pub static FORMAT: ContextKey<String> = ContextKey::new("format", String::new);

    /// Frozen, priority-sorted object-marshalling strategies.
    pub static OBJECT_STRATEGIES: ContextKey<Arc<[Arc<dyn ObjectMarshallingStrategy>]>> =
        ContextKey::new("object-strategies", no_strategies);

    /// Frozen, priority-sorted node-instance writers.
    pub static NODE_WRITERS: ContextKey<Arc<[Arc<dyn NodeInstanceWriter>]>> =
        ContextKey::new("node-writers", no_writers);

    /// Frozen, priority-sorted node-instance readers.
    pub static NODE_READERS: ContextKey<Arc<[Arc<dyn NodeInstanceReader>]>> =
        ContextKey::new("node-readers", no_readers);

    /// Registered marshalling listeners, in registration order.
    pub static LISTENERS: ContextKey<Arc<[Arc<dyn MarshallingListener>]>> =
        ContextKey::new("listeners", no_listeners);
}

#[cfg(test)]
mod tests {
    use super::*;

    static COUNTER: ContextKey<i64> = ContextKey::new("counter", || 7);
    static LABEL: ContextKey<String> = ContextKey::new("label", String::new);

    #[test]
    fn test_absent_key_yields_default() {
        let values = TypedValues::new();
        assert_eq!(values.get(&COUNTER), 7);
        assert_eq!(values.get(&LABEL), "");
        assert!(!values.contains(&COUNTER));
    }

    #[test]
    fn test_set_then_get() {
        let mut values = TypedValues::new();
        values.set(&COUNTER, 41);
        values.set(&LABEL, "hello".to_string());
        assert_eq!(values.get(&COUNTER), 41);
        assert_eq!(values.get(&LABEL), "hello");
        assert!(values.contains(&COUNTER));
    }

    #[test]
    fn test_set_replaces_previous_value() {
        let mut values = TypedValues::new();
        values.set(&COUNTER, 1);
        values.set(&COUNTER, 2);
        assert_eq!(values.get(&COUNTER), 2);
    }

    #[test]
    #[should_panic(expected = "unexpected type")]
    fn test_cast_panics_on_type_violation() {
        let value: Box<dyn std::any::Any + Send + Sync> = Box::new("oops");
        COUNTER.cast(value.as_ref());
    }

    #[test]
    fn test_write_context_collects_bytes() {
        let mut ctx = WriteContext::new();
        ctx.sink_mut().extend_from_slice(b"abc");
        ctx.sink_mut().extend_from_slice(b"def");
        assert_eq!(ctx.into_bytes(), Bytes::from_static(b"abcdef"));
    }

    #[test]
    fn test_read_context_exposes_source() {
        let ctx = ReadContext::new(Bytes::from_static(b"xyz"));
        assert_eq!(ctx.source(), b"xyz");
    }
}
