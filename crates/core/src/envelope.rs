//! Decoding for the backend's normalized error envelope.
//!
//! The backend wraps failures as `{"error": {"detail": …, "status_code": …}}`
//! (older endpoints return the body bare). `detail` arrives in one of three
//! shapes; extraction resolves them in a fixed precedence order and falls back
//! to a generic message when none decode.

use std::collections::BTreeMap;

use serde::Deserialize;

pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

/// The three known shapes of `detail`. Variant order doubles as the extraction
/// precedence: a direct string, then a nested detail, then a field-keyed
/// validation map.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Nested { detail: String },
    Fields(BTreeMap<String, Vec<String>>),
}

impl ErrorDetail {
    /// First user-facing message found, per the precedence above. Field maps
    /// report the first message of the first field (keys in sorted order).
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Message(message) => Some(message.clone()),
            Self::Nested { detail } => Some(detail.clone()),
            Self::Fields(fields) => {
                fields.values().next().and_then(|messages| messages.first().cloned())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    error: Option<ErrorBody>,
    detail: Option<ErrorDetail>,
}

/// Extract the user-facing message from a raw error response body.
pub fn extract_message(raw: &str) -> String {
    serde_json::from_str::<Envelope>(raw)
        .ok()
        .and_then(|envelope| envelope.error.and_then(|body| body.detail).or(envelope.detail))
        .and_then(|detail| detail.message())
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}
