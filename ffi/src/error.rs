//! Failure values produced on the native side of the boundary.
//!
//! # Design
//! A `NativeError` is what the engine hands back instead of a response. It
//! carries an open-ended `type` tag, a human-readable message and a JSON
//! `details` object. The host classifies the tag into its own closed
//! taxonomy; this side only promises to use the tags listed in
//! [`kinds`](crate::error::kinds).

use serde::Serialize;
use serde_json::{json, Value};

/// Tags the native side emits in `NativeError::type_name`.
pub mod kinds {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const DECODE_REQUEST: &str = "decode_request";
    pub const TRANSPORT_ERROR: &str = "transport_error";
    pub const RUNTIME_ERROR: &str = "runtime_error";
    pub const NIF_PANIC: &str = "nif_panic";
}

#[derive(Debug, Clone, Serialize)]
pub struct NativeError {
    #[serde(rename = "type")]
    pub type_name: String,
    pub message: String,
    pub details: Value,
}

impl NativeError {
    pub fn new(type_name: &str, message: impl Into<String>, details: Value) -> Self {
        Self {
            type_name: type_name.to_string(),
            message: message.into(),
            details,
        }
    }

    pub fn invalid_request(message: impl Into<String>, details: Value) -> Self {
        Self::new(kinds::INVALID_REQUEST, message, details)
    }

    pub fn transport(message: impl Into<String>, reason: &dyn std::error::Error) -> Self {
        // reason = Display for people, debug = Debug for the inner error chain
        Self::new(
            kinds::TRANSPORT_ERROR,
            message,
            json!({"reason": reason.to_string(), "debug": format!("{reason:?}")}),
        )
    }

    /// A payload field that could not be read off the C structs.
    pub fn decode(field: &str) -> Self {
        Self::new(
            kinds::DECODE_REQUEST,
            "failed to decode request payload",
            json!({"field": field}),
        )
    }

    /// Serializes as a JSON string.
    ///
    /// Never fails: if serde cannot encode the value (it has no reason to),
    /// a fixed `runtime_error` document is returned so the host still gets a
    /// well-formed error envelope.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            json!({
                "type": kinds::RUNTIME_ERROR,
                "message": "failed to serialize native error",
                "details": {}
            })
            .to_string()
        })
    }
}

impl std::fmt::Display for NativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_serializes_expected_shape() {
        let error = NativeError::invalid_request(
            "invalid HTTP method",
            json!({"value": "BAD METHOD"}),
        );

        let decoded: Value = serde_json::from_str(&error.encode()).unwrap();

        assert_eq!(decoded["type"], "invalid_request");
        assert_eq!(decoded["message"], "invalid HTTP method");
        assert_eq!(decoded["details"]["value"], "BAD METHOD");
    }

    #[test]
    fn encode_keeps_empty_message_and_details() {
        let error = NativeError::new(kinds::RUNTIME_ERROR, "", json!({}));
        let decoded: Value = serde_json::from_str(&error.encode()).unwrap();

        assert_eq!(decoded["message"], "");
        assert!(decoded["details"].as_object().unwrap().is_empty());
    }

    #[test]
    fn decode_error_names_the_field() {
        let error = NativeError::decode("headers[2].value");
        assert_eq!(error.type_name, "decode_request");
        assert_eq!(error.details["field"], "headers[2].value");
    }

    #[test]
    fn transport_error_carries_reason_and_debug() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let error = NativeError::transport("request execution failed", &io);

        assert_eq!(error.type_name, "transport_error");
        assert_eq!(error.details["reason"], "timed out");
        assert!(error.details["debug"].as_str().unwrap().contains("TimedOut"));
    }

    #[test]
    fn display_is_kind_colon_message() {
        let error = NativeError::new(kinds::NIF_PANIC, "boom", json!({}));
        assert_eq!(error.to_string(), "nif_panic: boom");
    }
}
