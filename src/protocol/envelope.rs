//! Message framing and inbound wrapping.
//!
//! Messages are opaque JSON values carried in UTF-8 text frames. Outbound
//! messages are sent as-is; inbound messages are wrapped according to the
//! active [`WrapPolicy`] before they reach the application core.
//!
//! # Inbound Envelope
//!
//! ```json
//! { "data": <payload>, "timeStamp": 1234.5 }
//! ```
//!
//! `timeStamp` is the receipt time in milliseconds since the bridge's
//! [`ReceiptClock`] origin.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// WrapPolicy
// ============================================================================

/// How inbound payloads are presented to the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapPolicy {
    /// Payload delivered verbatim.
    Unwrapped,
    /// Payload delivered inside an [`InboundEnvelope`].
    Timestamped,
}

impl WrapPolicy {
    /// Applies the policy to a parsed payload received at `received_at` ms.
    #[must_use]
    pub fn apply(self, payload: Value, received_at: f64) -> Value {
        match self {
            Self::Unwrapped => payload,
            Self::Timestamped => InboundEnvelope::new(payload, received_at).into_value(),
        }
    }
}

// ============================================================================
// InboundEnvelope
// ============================================================================

/// Inbound payload plus its receipt timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Parsed payload.
    pub data: Value,

    /// Receipt time in milliseconds.
    #[serde(rename = "timeStamp")]
    pub time_stamp: f64,
}

impl InboundEnvelope {
    /// Creates a new envelope.
    #[inline]
    #[must_use]
    pub fn new(data: Value, time_stamp: f64) -> Self {
        Self { data, time_stamp }
    }

    /// Converts the envelope into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut map = serde_json::Map::with_capacity(2);
        map.insert("data".to_string(), self.data);
        map.insert("timeStamp".to_string(), Value::from(self.time_stamp));
        Value::Object(map)
    }
}

// ============================================================================
// ReceiptClock
// ============================================================================

/// Monotonic clock for inbound receipt timestamps.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptClock {
    origin: Instant,
}

impl Default for ReceiptClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptClock {
    /// Starts a clock whose origin is now.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the origin.
    #[inline]
    #[must_use]
    pub fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Parses an inbound text frame.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if the frame is not valid JSON.
#[inline]
pub fn decode(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Serializes an outbound message into a text frame.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if the value cannot be serialized.
#[inline]
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            any::<u64>().prop_map(Value::from),
            any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::from),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::hash_map(".*", inner, 0..8)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    #[test]
    fn test_unwrapped_policy_passes_payload_through() {
        let payload = json!({"count": 3, "private_count": 1});
        assert_eq!(WrapPolicy::Unwrapped.apply(payload.clone(), 12.0), payload);
    }

    #[test]
    fn test_timestamped_policy_wraps_payload() {
        let payload = json!({"count": 3});
        let wrapped = WrapPolicy::Timestamped.apply(payload.clone(), 42.5);
        assert_eq!(wrapped, json!({"data": payload, "timeStamp": 42.5}));
    }

    #[test]
    fn test_envelope_serde_field_names() {
        let envelope = InboundEnvelope::new(json!("Increment"), 1.0);
        let json = encode(&envelope).unwrap();
        assert!(json.contains("\"timeStamp\""));
        assert!(json.contains("\"data\":\"Increment\""));

        let back: InboundEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_decode_rejects_malformed_frame() {
        assert!(decode("{\"count\": ").is_err());
        assert!(decode("Increment").is_err());
    }

    #[test]
    fn test_decode_accepts_bare_scalars() {
        assert_eq!(decode("\"Increment\"").unwrap(), json!("Increment"));
        assert_eq!(decode("null").unwrap(), Value::Null);
    }

    #[test]
    fn test_receipt_clock_is_monotonic() {
        let clock = ReceiptClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(a >= 0.0);
        assert!(b >= a);
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(value in arb_json()) {
            let text = encode(&value).unwrap();
            prop_assert_eq!(decode(&text).unwrap(), value);
        }

        #[test]
        fn prop_wrapped_data_deep_equals_payload(value in arb_json(), at in 0.0f64..1.0e9) {
            let wrapped = WrapPolicy::Timestamped.apply(value.clone(), at);
            prop_assert_eq!(&wrapped["data"], &value);
            prop_assert_eq!(wrapped["timeStamp"].as_f64(), Some(at));
        }
    }
}
