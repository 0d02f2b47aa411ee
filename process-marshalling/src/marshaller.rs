//! Process-instance marshaller and the encoding-backend seam.
//!
//! [`ProcessInstanceMarshaller`] orchestrates writing and reading one
//! whole process instance through the codecs registered in the per-call
//! context. The concrete byte layout is owned by the backend behind
//! [`MarshallerFactory`]; [`JsonMarshaller`] is the default backend,
//! persisting the serde record tree from [`crate::records`] as JSON.
//!
//! Codec selection is a single linear scan over the frozen,
//! priority-sorted chains, stopping at the first acceptor. Composite node
//! instances are handled by recursive descent: the container's own
//! envelope is written first, then each contained node instance goes
//! through the same writer selection.

use crate::context::{keys, ReadContext, WriteContext};
use crate::error::MarshallingError;
use crate::listener::MarshallingListener;
use crate::node_codec::{NodeInstanceReader, NodeInstanceWriter};
use crate::records::{NodeInstanceRecord, ProcessInstanceRecord, VariableRecord};
use crate::strategy::ObjectMarshallingStrategy;
use bytes::Bytes;
use process_core::{NodeInstance, ProcessInstance, VariableValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Wire-format discriminator of the default JSON backend.
pub const JSON_FORMAT: &str = "json";

/// Orchestrates (un)marshalling of one whole process instance.
///
/// Implementations borrow the instance only for the duration of the call
/// and must not retain references to it afterwards.
pub trait ProcessInstanceMarshaller: Send + Sync {
    /// Serialize the instance into the context's byte sink.
    fn write(
        &self,
        ctx: &mut WriteContext,
        instance: &ProcessInstance,
    ) -> Result<(), MarshallingError>;

    /// Reconstruct an instance from the context's byte source.
    fn read(&self, ctx: &mut ReadContext) -> Result<ProcessInstance, MarshallingError>;

    /// Re-hydrate a live instance in place from the context's byte source.
    ///
    /// The instance's identity and engine-side bookkeeping survive the
    /// call; on any failure the instance is left untouched.
    fn reload(
        &self,
        ctx: &mut ReadContext,
        instance: &mut ProcessInstance,
    ) -> Result<(), MarshallingError>;
}

/// Produces the concrete marshaller of one wire encoding.
pub trait MarshallerFactory: Send + Sync {
    /// Discriminator tag recorded in the wire data.
    fn format(&self) -> &str;

    /// Create the marshaller for this encoding.
    fn create_marshaller(&self) -> Box<dyn ProcessInstanceMarshaller>;
}

/// Factory for the default JSON record backend.
pub struct JsonMarshallerFactory;

impl MarshallerFactory for JsonMarshallerFactory {
    fn format(&self) -> &str {
        JSON_FORMAT
    }

    fn create_marshaller(&self) -> Box<dyn ProcessInstanceMarshaller> {
        Box::new(JsonMarshaller)
    }
}

/// Default marshaller persisting the record tree as JSON.
pub struct JsonMarshaller;

type Listeners = Arc<[Arc<dyn MarshallingListener>]>;
type Writers = Arc<[Arc<dyn NodeInstanceWriter>]>;
type Readers = Arc<[Arc<dyn NodeInstanceReader>]>;
type Strategies = Arc<[Arc<dyn ObjectMarshallingStrategy>]>;

impl JsonMarshaller {
    fn write_node(
        ctx: &mut WriteContext,
        writers: &Writers,
        listeners: &Listeners,
        node: &dyn NodeInstance,
    ) -> Result<NodeInstanceRecord, MarshallingError> {
        for listener in listeners.iter() {
            listener.before_marshall_node(node);
        }
        let writer = writers.iter().find(|w| w.accepts(node)).ok_or_else(|| {
            MarshallingError::UnsupportedNodeKind {
                node_id: node.id().to_string(),
                kind: node.kind().to_string(),
            }
        })?;
        let mut record = writer.write(ctx, node).map_err(MarshallingError::codec)?;
        for child in node.children() {
            record
                .children
                .push(Self::write_node(ctx, writers, listeners, child.as_ref())?);
        }
        for listener in listeners.iter() {
            listener.after_marshall_node(node);
        }
        Ok(record)
    }

    fn read_node(
        ctx: &ReadContext,
        readers: &Readers,
        listeners: &Listeners,
        record: &NodeInstanceRecord,
    ) -> Result<Box<dyn NodeInstance>, MarshallingError> {
        for listener in listeners.iter() {
            listener.before_unmarshall_node(&record.kind);
        }
        let children = record
            .children
            .iter()
            .map(|child| Self::read_node(ctx, readers, listeners, child))
            .collect::<Result<Vec<_>, _>>()?;
        let reader = readers.iter().find(|r| r.accepts(&record.kind)).ok_or_else(|| {
            MarshallingError::UnknownNodeKind {
                kind: record.kind.clone(),
            }
        })?;
        let node = reader
            .read(ctx, record, children)
            .map_err(MarshallingError::codec)?;
        for listener in listeners.iter() {
            listener.after_unmarshall_node(node.as_ref());
        }
        Ok(node)
    }

    fn write_variables(
        strategies: &Strategies,
        instance: &ProcessInstance,
    ) -> Result<Vec<VariableRecord>, MarshallingError> {
        // Sorted by name so repeated marshalling is byte-identical.
        let mut names: Vec<&str> = instance.variable_names().collect();
        names.sort_unstable();

        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let Some(value) = instance.variable(name) else {
                continue;
            };
            let strategy = strategies
                .iter()
                .find(|s| s.accepts(value))
                .ok_or_else(|| MarshallingError::UnsupportedVariable(name.to_string()))?;
            let payload = strategy.encode(value).map_err(MarshallingError::codec)?;
            records.push(VariableRecord {
                name: name.to_string(),
                strategy: strategy.name().to_string(),
                payload: payload.to_vec(),
            });
        }
        Ok(records)
    }

    fn read_variables(
        strategies: &Strategies,
        records: &[VariableRecord],
    ) -> Result<HashMap<String, VariableValue>, MarshallingError> {
        let mut variables = HashMap::with_capacity(records.len());
        for record in records {
            let strategy = strategies
                .iter()
                .find(|s| s.name() == record.strategy)
                .ok_or_else(|| MarshallingError::UnknownStrategy {
                    strategy: record.strategy.clone(),
                    variable: record.name.clone(),
                })?;
            let value = strategy
                .decode(Bytes::from(record.payload.clone()))
                .map_err(MarshallingError::codec)?;
            variables.insert(record.name.clone(), value);
        }
        Ok(variables)
    }

    fn parse_record(ctx: &ReadContext) -> Result<ProcessInstanceRecord, MarshallingError> {
        let record: ProcessInstanceRecord = serde_json::from_slice(ctx.source())
            .map_err(|e| MarshallingError::Codec(e.to_string()))?;
        let expected = ctx.get(&keys::FORMAT);
        if record.format != expected {
            return Err(MarshallingError::FormatMismatch {
                expected,
                found: record.format,
            });
        }
        Ok(record)
    }
}

impl ProcessInstanceMarshaller for JsonMarshaller {
    fn write(
        &self,
        ctx: &mut WriteContext,
        instance: &ProcessInstance,
    ) -> Result<(), MarshallingError> {
        let listeners = ctx.get(&keys::LISTENERS);
        let writers = ctx.get(&keys::NODE_WRITERS);
        let strategies = ctx.get(&keys::OBJECT_STRATEGIES);

        for listener in listeners.iter() {
            listener.before_marshall_process(instance);
        }

        let mut nodes = Vec::with_capacity(instance.node_instances().len());
        for node in instance.node_instances() {
            nodes.push(Self::write_node(ctx, &writers, &listeners, node.as_ref())?);
        }
        let variables = Self::write_variables(&strategies, instance)?;

        let record = ProcessInstanceRecord {
            format: ctx.get(&keys::FORMAT),
            instance_id: instance.id().to_string(),
            process_id: instance.definition().id().to_string(),
            process_version: instance.definition().version().to_string(),
            state: instance.state().into(),
            started_at: instance.started_at(),
            nodes,
            variables,
        };
        let encoded =
            serde_json::to_vec(&record).map_err(|e| MarshallingError::Codec(e.to_string()))?;
        ctx.sink_mut().extend_from_slice(&encoded);

        for listener in listeners.iter() {
            listener.after_marshall_process(instance);
        }
        tracing::trace!(
            instance_id = %instance.id(),
            bytes = encoded.len(),
            "marshalled process instance"
        );
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext) -> Result<ProcessInstance, MarshallingError> {
        let record = Self::parse_record(ctx)?;
        let definition = ctx
            .get(&keys::PROCESS_DEFINITION)
            .ok_or(MarshallingError::MissingDefinition)?;
        if record.process_id != definition.id() || record.process_version != definition.version() {
            return Err(MarshallingError::DefinitionMismatch {
                expected: format!("{}:{}", definition.id(), definition.version()),
                found: format!("{}:{}", record.process_id, record.process_version),
            });
        }

        let listeners = ctx.get(&keys::LISTENERS);
        let readers = ctx.get(&keys::NODE_READERS);
        let strategies = ctx.get(&keys::OBJECT_STRATEGIES);

        for listener in listeners.iter() {
            listener.before_unmarshall_process(&record.instance_id);
        }

        let nodes = record
            .nodes
            .iter()
            .map(|r| Self::read_node(ctx, &readers, &listeners, r))
            .collect::<Result<Vec<_>, _>>()?;
        let variables = Self::read_variables(&strategies, &record.variables)?;

        let mut instance = ProcessInstance::new(definition, record.instance_id.clone());
        instance.rehydrate(record.state.into(), record.started_at, nodes, variables);
        instance.set_change_tracking(!ctx.get(&keys::READ_ONLY));

        for listener in listeners.iter() {
            listener.after_unmarshall_process(&instance);
        }
        tracing::trace!(instance_id = %instance.id(), "unmarshalled process instance");
        Ok(instance)
    }

    fn reload(
        &self,
        ctx: &mut ReadContext,
        instance: &mut ProcessInstance,
    ) -> Result<(), MarshallingError> {
        let record = Self::parse_record(ctx)?;
        if record.instance_id != instance.id() {
            return Err(MarshallingError::InstanceMismatch {
                expected: instance.id().to_string(),
                found: record.instance_id,
            });
        }
        let definition = instance.definition();
        if record.process_id != definition.id() || record.process_version != definition.version() {
            return Err(MarshallingError::DefinitionMismatch {
                expected: format!("{}:{}", definition.id(), definition.version()),
                found: format!("{}:{}", record.process_id, record.process_version),
            });
        }

        let listeners = ctx.get(&keys::LISTENERS);
        let readers = ctx.get(&keys::NODE_READERS);
        let strategies = ctx.get(&keys::OBJECT_STRATEGIES);

        for listener in listeners.iter() {
            listener.before_unmarshall_process(&record.instance_id);
        }

        // Decode fully into locals before touching the instance, so a
        // failure leaves the caller's state exactly as it was.
        let nodes = record
            .nodes
            .iter()
            .map(|r| Self::read_node(ctx, &readers, &listeners, r))
            .collect::<Result<Vec<_>, _>>()?;
        let variables = Self::read_variables(&strategies, &record.variables)?;

        instance.rehydrate(record.state.into(), record.started_at, nodes, variables);

        for listener in listeners.iter() {
            listener.after_unmarshall_process(instance);
        }
        tracing::trace!(instance_id = %instance.id(), "reloaded process instance");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_codec::{BuiltinNodeReader, BuiltinNodeWriter};
    use crate::strategy::PrimitiveStrategy;
    use process_core::{ProcessDefinition, TaskNodeInstance};

    fn definition() -> Arc<ProcessDefinition> {
        Arc::new(ProcessDefinition::new("orders", "1.0", "Orders"))
    }

    fn seed_write(ctx: &mut WriteContext) {
        ctx.set(&keys::FORMAT, JSON_FORMAT.to_string());
        let strategies: Strategies = vec![
            Arc::new(PrimitiveStrategy) as Arc<dyn ObjectMarshallingStrategy>
        ]
        .into();
        let writers: Writers =
            vec![Arc::new(BuiltinNodeWriter) as Arc<dyn NodeInstanceWriter>].into();
        ctx.set(&keys::OBJECT_STRATEGIES, strategies);
        ctx.set(&keys::NODE_WRITERS, writers);
    }

    fn seed_read(ctx: &mut ReadContext, definition: Arc<ProcessDefinition>) {
        ctx.set(&keys::FORMAT, JSON_FORMAT.to_string());
        ctx.set(&keys::PROCESS_DEFINITION, Some(definition));
        let strategies: Strategies = vec![
            Arc::new(PrimitiveStrategy) as Arc<dyn ObjectMarshallingStrategy>
        ]
        .into();
        let readers: Readers =
            vec![Arc::new(BuiltinNodeReader) as Arc<dyn NodeInstanceReader>].into();
        ctx.set(&keys::OBJECT_STRATEGIES, strategies);
        ctx.set(&keys::NODE_READERS, readers);
    }

    fn marshall(instance: &ProcessInstance) -> Bytes {
        let mut ctx = WriteContext::new();
        seed_write(&mut ctx);
        JsonMarshaller
            .write(&mut ctx, instance)
            .expect("write should succeed");
        ctx.into_bytes()
    }

    #[test]
    fn test_format_mismatch_is_rejected() {
        let mut instance = ProcessInstance::new(definition(), "i-1");
        instance.add_node_instance(Box::new(TaskNodeInstance::new("n-1", "Task1")));
        let data = marshall(&instance);

        let mut ctx = ReadContext::new(data);
        seed_read(&mut ctx, definition());
        ctx.set(&keys::FORMAT, "protobuf".to_string());

        let result = JsonMarshaller.read(&mut ctx);
        assert!(matches!(result, Err(MarshallingError::FormatMismatch { .. })));
    }

    #[test]
    fn test_definition_mismatch_is_rejected() {
        let instance = ProcessInstance::new(definition(), "i-1");
        let data = marshall(&instance);

        let other = Arc::new(ProcessDefinition::new("billing", "1.0", "Billing"));
        let mut ctx = ReadContext::new(data);
        seed_read(&mut ctx, other);

        let result = JsonMarshaller.read(&mut ctx);
        assert!(matches!(result, Err(MarshallingError::DefinitionMismatch { .. })));
    }

    #[test]
    fn test_read_without_definition_fails() {
        let instance = ProcessInstance::new(definition(), "i-1");
        let data = marshall(&instance);

        let mut ctx = ReadContext::new(data);
        seed_read(&mut ctx, definition());
        ctx.set(&keys::PROCESS_DEFINITION, None);

        let result = JsonMarshaller.read(&mut ctx);
        assert!(matches!(result, Err(MarshallingError::MissingDefinition)));
    }

    #[test]
    fn test_reload_rejects_foreign_instance_bytes() {
        let instance_a = ProcessInstance::new(definition(), "i-a");
        let data = marshall(&instance_a);

        let mut instance_b = ProcessInstance::new(definition(), "i-b");
        instance_b.set_variable("x", Box::new(1i64));
        instance_b.clear_dirty();

        let mut ctx = ReadContext::new(data);
        seed_read(&mut ctx, definition());
        let result = JsonMarshaller.reload(&mut ctx, &mut instance_b);

        assert!(matches!(result, Err(MarshallingError::InstanceMismatch { .. })));
        // Failed reload must leave the target untouched.
        assert_eq!(instance_b.variable_as::<i64>("x"), Some(&1));
    }

    #[test]
    fn test_garbage_bytes_fail_as_codec_error() {
        let mut ctx = ReadContext::new(Bytes::from_static(b"not json"));
        seed_read(&mut ctx, definition());
        let result = JsonMarshaller.read(&mut ctx);
        assert!(matches!(result, Err(MarshallingError::Codec(_))));
    }
}
