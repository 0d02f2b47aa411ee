//! The marshalling service facade.
//!
//! A [`MarshallingServiceBuilder`] accumulates the encoding backend,
//! codecs, listeners and extra context entries, then `build()` sorts every
//! ordered collection exactly once and yields an immutable service. After
//! that point no further registration is possible; extension happens only
//! before `build()`. Because the frozen registries are the only shared
//! state, a built service can be used concurrently from multiple threads.
//!
//! The strict `marshall`/`unmarshall` paths surface every failure as a
//! [`MarshallingError`]; the reload path is lenient by design and only
//! logs (see [`MarshallingService::create_reload_function`]).

use crate::context::{keys, ContextKey, ReadContext, TypedValues, WriteContext};
use crate::error::MarshallingError;
use crate::listener::MarshallingListener;
use crate::marshaller::{JsonMarshallerFactory, MarshallerFactory, ProcessInstanceMarshaller};
use crate::node_codec::{
    BuiltinNodeReader, BuiltinNodeWriter, NodeInstanceReader, NodeInstanceWriter,
};
use crate::strategy::{ObjectMarshallingStrategy, PrimitiveStrategy};
use bytes::Bytes;
use process_core::{ProcessDefinition, ProcessInstance};
use std::sync::Arc;

/// Whether an unmarshalled instance should track changes for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmarshallMode {
    /// Reconstruct a live instance with change tracking enabled.
    Mutable,
    /// Reconstruct for inspection only; in-memory mutation will not mark
    /// the instance for persistence.
    ReadOnly,
}

impl UnmarshallMode {
    fn read_only(self) -> bool {
        matches!(self, UnmarshallMode::ReadOnly)
    }
}

/// Statically assembled set of discoverable codecs and listeners.
///
/// The environment builds one of these from code at startup (the
/// registry is code, not data) and hands it to
/// [`MarshallingServiceBuilder::with_catalog`]. This replaces dynamic
/// classpath-style discovery with an explicit, deterministic list.
#[derive(Default)]
pub struct CodecCatalog {
    strategies: Vec<Arc<dyn ObjectMarshallingStrategy>>,
    writers: Vec<Arc<dyn NodeInstanceWriter>>,
    readers: Vec<Arc<dyn NodeInstanceReader>>,
    listeners: Vec<Arc<dyn MarshallingListener>>,
}

impl CodecCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_strategy<S: ObjectMarshallingStrategy + 'static>(&mut self, strategy: S) {
        self.strategies.push(Arc::new(strategy));
    }

    pub fn register_writer<W: NodeInstanceWriter + 'static>(&mut self, writer: W) {
        self.writers.push(Arc::new(writer));
    }

    pub fn register_reader<R: NodeInstanceReader + 'static>(&mut self, reader: R) {
        self.readers.push(Arc::new(reader));
    }

    pub fn register_listener<L: MarshallingListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Arc::new(listener));
    }
}

type ContextEntry = Box<dyn Fn(&mut TypedValues) + Send + Sync>;

/// Builder accumulating codecs, listeners and configuration for a
/// [`MarshallingService`].
#[derive(Default)]
pub struct MarshallingServiceBuilder {
    factory: Option<Arc<dyn MarshallerFactory>>,
    strategies: Vec<Arc<dyn ObjectMarshallingStrategy>>,
    writers: Vec<Arc<dyn NodeInstanceWriter>>,
    readers: Vec<Arc<dyn NodeInstanceReader>>,
    listeners: Vec<Arc<dyn MarshallingListener>>,
    context_entries: Vec<ContextEntry>,
}

impl MarshallingServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific encoding backend instead of the default JSON one.
    pub fn with_factory<F: MarshallerFactory + 'static>(mut self, factory: F) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn add_strategy<S: ObjectMarshallingStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    pub fn add_node_writer<W: NodeInstanceWriter + 'static>(mut self, writer: W) -> Self {
        self.writers.push(Arc::new(writer));
        self
    }

    pub fn add_node_reader<R: NodeInstanceReader + 'static>(mut self, reader: R) -> Self {
        self.readers.push(Arc::new(reader));
        self
    }

    pub fn add_listener<L: MarshallingListener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Merge everything the environment's catalog exposes.
    pub fn with_catalog(mut self, catalog: &CodecCatalog) -> Self {
        self.strategies.extend(catalog.strategies.iter().cloned());
        self.writers.extend(catalog.writers.iter().cloned());
        self.readers.extend(catalog.readers.iter().cloned());
        self.listeners.extend(catalog.listeners.iter().cloned());
        self
    }

    /// Seed every per-call context with an extra typed entry.
    pub fn with_context_entry<T: Clone + Send + Sync + 'static>(
        mut self,
        key: &'static ContextKey<T>,
        value: T,
    ) -> Self {
        self.context_entries
            .push(Box::new(move |values| values.set(key, value.clone())));
        self
    }

    /// Sort all ordered collections once, freeze them, and produce the
    /// immutable service.
    ///
    /// The built-in strategy and node codecs are appended at the default
    /// priority, so explicitly registered codecs win either by a lower
    /// priority number or, at equal priority, by registration order
    /// (the sort is stable).
    pub fn build(mut self) -> MarshallingService {
        self.strategies.push(Arc::new(PrimitiveStrategy));
        self.writers.push(Arc::new(BuiltinNodeWriter));
        self.readers.push(Arc::new(BuiltinNodeReader));

        self.strategies.sort_by_key(|s| s.priority());
        self.writers.sort_by_key(|w| w.priority());
        self.readers.sort_by_key(|r| r.priority());

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(JsonMarshallerFactory));
        let marshaller = factory.create_marshaller();

        MarshallingService {
            inner: Arc::new(ServiceInner {
                factory,
                marshaller,
                strategies: self.strategies.into(),
                writers: self.writers.into(),
                readers: self.readers.into(),
                listeners: self.listeners.into(),
                context_entries: self.context_entries,
            }),
        }
    }
}

struct ServiceInner {
    factory: Arc<dyn MarshallerFactory>,
    marshaller: Box<dyn ProcessInstanceMarshaller>,
    strategies: Arc<[Arc<dyn ObjectMarshallingStrategy>]>,
    writers: Arc<[Arc<dyn NodeInstanceWriter>]>,
    readers: Arc<[Arc<dyn NodeInstanceReader>]>,
    listeners: Arc<[Arc<dyn MarshallingListener>]>,
    context_entries: Vec<ContextEntry>,
}

impl ServiceInner {
    /// Populate a fresh per-call context: caller-supplied entries first,
    /// then the service's own authoritative keys.
    fn seed(&self, values: &mut TypedValues) {
        for entry in &self.context_entries {
            entry(values);
        }
        values.set(&keys::FORMAT, self.factory.format().to_string());
        values.set(&keys::OBJECT_STRATEGIES, Arc::clone(&self.strategies));
        values.set(&keys::NODE_WRITERS, Arc::clone(&self.writers));
        values.set(&keys::NODE_READERS, Arc::clone(&self.readers));
        values.set(&keys::LISTENERS, Arc::clone(&self.listeners));
    }
}

/// Facade over the marshaller, codecs and listeners.
///
/// Cheap to clone; all clones share the same frozen registries.
#[derive(Clone)]
pub struct MarshallingService {
    inner: Arc<ServiceInner>,
}

impl MarshallingService {
    pub fn builder() -> MarshallingServiceBuilder {
        MarshallingServiceBuilder::new()
    }

    /// Serialize a process instance to bytes.
    ///
    /// The per-call context and its byte sink live only for this call and
    /// are released on every exit path. Any failure surfaces as a
    /// [`MarshallingError`]; nothing is retried.
    pub fn marshall(&self, instance: &ProcessInstance) -> Result<Bytes, MarshallingError> {
        let mut ctx = WriteContext::new();
        self.inner.seed(ctx.values_mut());
        ctx.set(&keys::PROCESS_DEFINITION, Some(Arc::clone(instance.definition())));
        ctx.set(&keys::PROCESS_INSTANCE_ID, Some(instance.id().to_string()));

        tracing::debug!(instance_id = %instance.id(), "marshalling process instance");
        self.inner.marshaller.write(&mut ctx, instance)?;
        Ok(ctx.into_bytes())
    }

    /// Reconstruct a process instance from bytes, bound to the given
    /// definition.
    pub fn unmarshall(
        &self,
        data: Bytes,
        definition: Arc<ProcessDefinition>,
        mode: UnmarshallMode,
    ) -> Result<ProcessInstance, MarshallingError> {
        let mut ctx = ReadContext::new(data);
        self.inner.seed(ctx.values_mut());
        ctx.set(&keys::PROCESS_DEFINITION, Some(definition));
        ctx.set(&keys::READ_ONLY, mode.read_only());

        tracing::debug!(?mode, "unmarshalling process instance");
        self.inner.marshaller.read(&mut ctx)
    }

    /// Partially-applied form of [`unmarshall`](Self::unmarshall) for
    /// unmarshalling many instances of the same definition.
    pub fn create_unmarshall_function(
        &self,
        definition: Arc<ProcessDefinition>,
        mode: UnmarshallMode,
    ) -> impl Fn(Bytes) -> Result<ProcessInstance, MarshallingError> {
        let service = self.clone();
        move |data| service.unmarshall(data, Arc::clone(&definition), mode)
    }

    /// Bound reload operation for best-effort refresh of live instances.
    ///
    /// Lenient by design: if the supplier yields no bytes or reloading
    /// fails, a warning carrying the instance id is logged and the
    /// instance is left in its prior state. Callers never observe a
    /// fault on this path.
    pub fn create_reload_function<S>(&self, supplier: S) -> impl Fn(&mut ProcessInstance)
    where
        S: Fn() -> Option<Bytes>,
    {
        let service = self.clone();
        move |instance| {
            let Some(data) = supplier() else {
                tracing::warn!(
                    instance_id = %instance.id(),
                    "no marshalled data available, instance left in its prior state"
                );
                return;
            };
            let mut ctx = ReadContext::new(data);
            service.inner.seed(ctx.values_mut());
            ctx.set(&keys::PROCESS_DEFINITION, Some(Arc::clone(instance.definition())));
            ctx.set(&keys::PROCESS_INSTANCE_ID, Some(instance.id().to_string()));

            if let Err(error) = service.inner.marshaller.reload(&mut ctx, instance) {
                tracing::warn!(
                    instance_id = %instance.id(),
                    %error,
                    "failed to reload process instance, prior state kept"
                );
            }
        }
    }
}
