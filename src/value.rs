//! Tagged value model for the KV store.
//!
//! The remote store holds opaque bytes. Rather than guessing types on the
//! way out, the encoding is tagged through the record's `Flags` field so a
//! value round-trips to the same variant it was stored as. Keys written by
//! other tools carry unknown flags and decode as `String`/`Bytes`.

use base64::Engine;
use serde_json::json;

use crate::error::Result;

/// Flags value for raw (string) payloads. The default, interoperable with
/// keys written by foreign tools.
pub const FLAGS_RAW: u64 = 0;

/// Flags value tagging a JSON-encoded payload ("JSON" in ASCII).
pub const FLAGS_JSON: u64 = 0x4a53_4f4e;

/// Flags value tagging an opaque binary payload ("BYTE" in ASCII).
pub const FLAGS_BYTES: u64 = 0x4259_5445;

/// A value stored in the KV namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Structured JSON (array or object). Scalars are normalized to the
    /// dedicated variants on decode.
    Json(serde_json::Value),
}

impl Value {
    /// Encodes the value into a payload plus the flags tag to store with it.
    pub fn encode(&self) -> Result<(Vec<u8>, u64)> {
        match self {
            Value::String(s) => Ok((s.as_bytes().to_vec(), FLAGS_RAW)),
            Value::Bytes(b) => Ok((b.clone(), FLAGS_BYTES)),
            Value::Null => Ok((b"null".to_vec(), FLAGS_JSON)),
            Value::Bool(b) => Ok((serde_json::to_vec(&json!(b))?, FLAGS_JSON)),
            Value::Int(i) => Ok((serde_json::to_vec(&json!(i))?, FLAGS_JSON)),
            Value::Float(f) => Ok((serde_json::to_vec(&json!(f))?, FLAGS_JSON)),
            Value::Json(v) => Ok((serde_json::to_vec(v)?, FLAGS_JSON)),
        }
    }

    /// Decodes a stored payload according to its flags tag.
    pub fn decode(payload: &[u8], flags: u64) -> Value {
        match flags {
            FLAGS_BYTES => Value::Bytes(payload.to_vec()),
            FLAGS_JSON => match serde_json::from_slice::<serde_json::Value>(payload) {
                Ok(v) => Value::from_json(v),
                // Tag says JSON but the payload does not parse; fall back
                // to the raw interpretation rather than failing the read.
                Err(_) => Self::decode_raw(payload),
            },
            _ => Self::decode_raw(payload),
        }
    }

    fn decode_raw(payload: &[u8]) -> Value {
        match std::str::from_utf8(payload) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::Bytes(payload.to_vec()),
        }
    }

    /// Canonicalizes a JSON document: scalars map to the dedicated
    /// variants, arrays and objects stay structured.
    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }

    /// Returns the string content when the value is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the payload length in bytes once encoded.
    pub fn encoded_len(&self) -> usize {
        self.encode().map(|(payload, _)| payload.len()).unwrap_or(0)
    }

    /// Returns true for the empty string, empty bytes, or null.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => {
                write!(f, "{}", base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}
