//! Pluggable codecs for process-variable values.
//!
//! Strategies form an ordered chain: at service-build time the chain is
//! sorted once by ascending priority and frozen, and at encode time the
//! first strategy whose `accepts` returns true wins. The strategy name is
//! recorded next to the payload so the reading side can pick the same
//! strategy back out of the chain.

use crate::node_codec::DEFAULT_CODEC_PRIORITY;
use anyhow::{Context, Result};
use bytes::Bytes;
use process_core::VariableValue;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// A pluggable codec for one family of variable value types.
///
/// `accepts` must be a pure predicate; `encode`/`decode` must be
/// deterministic for the same input.
pub trait ObjectMarshallingStrategy: Send + Sync {
    /// Stable name recorded in the wire data.
    fn name(&self) -> &str;

    /// Ordering of this strategy within the chain; lower runs first.
    fn priority(&self) -> i32 {
        DEFAULT_CODEC_PRIORITY
    }

    /// Whether this strategy can encode the given value.
    fn accepts(&self, value: &(dyn Any + Send + Sync)) -> bool;

    /// Serialize an accepted value.
    fn encode(&self, value: &(dyn Any + Send + Sync)) -> Result<Bytes>;

    /// Reconstruct a value from bytes this strategy produced.
    fn decode(&self, payload: Bytes) -> Result<VariableValue>;
}

/// Tagged wire form of the built-in value types.
///
/// The tag preserves the exact Rust type across the round trip; encoding
/// everything as a bare JSON value would hand back a `serde_json::Value`
/// where an `i64` went in.
#[derive(Debug, Serialize, Deserialize)]
enum PrimitivePayload {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Json(serde_json::Value),
}

/// Built-in strategy for primitive variable values.
///
/// Covers `i64`, `f64`, `bool`, `String` and `serde_json::Value`. Appended
/// automatically at the default priority when a service is built; register
/// a custom strategy with a lower priority number to take over any of
/// these types.
pub struct PrimitiveStrategy;

impl PrimitiveStrategy {
    const NAME: &'static str = "primitive";
}

impl ObjectMarshallingStrategy for PrimitiveStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accepts(&self, value: &(dyn Any + Send + Sync)) -> bool {
        value.is::<i64>()
            || value.is::<f64>()
            || value.is::<bool>()
            || value.is::<String>()
            || value.is::<serde_json::Value>()
    }

    fn encode(&self, value: &(dyn Any + Send + Sync)) -> Result<Bytes> {
        let payload = if let Some(v) = value.downcast_ref::<i64>() {
            PrimitivePayload::Int(*v)
        } else if let Some(v) = value.downcast_ref::<f64>() {
            // JSON cannot represent NaN or infinity; serde_json emits null,
            // which no longer decodes as a float.
            if !v.is_finite() {
                anyhow::bail!("cannot encode non-finite float variable value");
            }
            PrimitivePayload::Float(*v)
        } else if let Some(v) = value.downcast_ref::<bool>() {
            PrimitivePayload::Bool(*v)
        } else if let Some(v) = value.downcast_ref::<String>() {
            PrimitivePayload::Text(v.clone())
        } else if let Some(v) = value.downcast_ref::<serde_json::Value>() {
            PrimitivePayload::Json(v.clone())
        } else {
            anyhow::bail!("primitive strategy cannot encode this value type");
        };
        let encoded = serde_json::to_vec(&payload).context("Failed to encode primitive value")?;
        Ok(Bytes::from(encoded))
    }

    fn decode(&self, payload: Bytes) -> Result<VariableValue> {
        let payload: PrimitivePayload =
            serde_json::from_slice(&payload).context("Failed to decode primitive value")?;
        Ok(match payload {
            PrimitivePayload::Int(v) => Box::new(v),
            PrimitivePayload::Float(v) => Box::new(v),
            PrimitivePayload::Bool(v) => Box::new(v),
            PrimitivePayload::Text(v) => Box::new(v),
            PrimitivePayload::Json(v) => Box::new(v),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: VariableValue) -> VariableValue {
        let strategy = PrimitiveStrategy;
        assert!(strategy.accepts(value.as_ref()));
        let payload = strategy.encode(value.as_ref()).expect("encode should succeed");
        strategy.decode(payload).expect("decode should succeed")
    }

    #[test]
    fn test_int_round_trip_preserves_type() {
        let back = round_trip(Box::new(5i64));
        assert_eq!(back.downcast_ref::<i64>(), Some(&5));
    }

    #[test]
    fn test_text_round_trip() {
        let back = round_trip(Box::new("hello".to_string()));
        assert_eq!(back.downcast_ref::<String>().map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_bool_and_float_round_trip() {
        let back = round_trip(Box::new(true));
        assert_eq!(back.downcast_ref::<bool>(), Some(&true));

        let back = round_trip(Box::new(2.5f64));
        assert_eq!(back.downcast_ref::<f64>(), Some(&2.5));
    }

    #[test]
    fn test_json_value_round_trip() {
        let value = serde_json::json!({"total": 42, "lines": ["a", "b"]});
        let back = round_trip(Box::new(value.clone()));
        assert_eq!(back.downcast_ref::<serde_json::Value>(), Some(&value));
    }

    #[test]
    fn test_rejects_non_finite_floats() {
        let strategy = PrimitiveStrategy;
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let boxed: VariableValue = Box::new(value);
            assert!(strategy.accepts(boxed.as_ref()));
            assert!(strategy.encode(boxed.as_ref()).is_err());
        }
    }

    #[test]
    fn test_rejects_unknown_type() {
        struct Opaque;
        let value: VariableValue = Box::new(Opaque);
        let strategy = PrimitiveStrategy;
        assert!(!strategy.accepts(value.as_ref()));
        assert!(strategy.encode(value.as_ref()).is_err());
    }
}
