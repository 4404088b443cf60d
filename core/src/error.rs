//! The single failure value shared by every stage of a request.
//!
//! # Design
//! `Error` is data, not a hierarchy: a closed `kind`, a message and a JSON
//! `details` map. Native failures arrive with free-form string tags;
//! `ErrorKind::from_native_tag` folds anything unknown into `NativeError` so
//! an unrecognized tag never reaches callers untyped.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open-ended structured context attached to an [`Error`].
pub type Details = Map<String, Value>;

/// Closed failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Host-side validation failed; nothing was sent to the native engine.
    InvalidRequest,
    /// The native engine could not read the payload it was given.
    DecodeRequest,
    /// I/O, TLS or timeout failure inside the native engine.
    TransportError,
    /// Native failure unrelated to transport.
    RuntimeError,
    /// The native result did not have the agreed shape.
    InvalidNativeResponse,
    /// Native code panicked; the panic was contained.
    NifPanic,
    /// A native failure whose tag is not part of this taxonomy.
    NativeError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::DecodeRequest => "decode_request",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::RuntimeError => "runtime_error",
            ErrorKind::InvalidNativeResponse => "invalid_native_response",
            ErrorKind::NifPanic => "nif_panic",
            ErrorKind::NativeError => "native_error",
        }
    }

    /// Classify a tag reported by the native side.
    ///
    /// `invalid_native_response` is deliberately not accepted from native
    /// code: only the host decides that the native channel is malformed.
    pub fn from_native_tag(tag: &str) -> ErrorKind {
        match tag {
            "invalid_request" => ErrorKind::InvalidRequest,
            "decode_request" => ErrorKind::DecodeRequest,
            "transport_error" => ErrorKind::TransportError,
            "runtime_error" => ErrorKind::RuntimeError,
            "nif_panic" => ErrorKind::NifPanic,
            _ => ErrorKind::NativeError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure: `{kind, message, details}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub details: Details,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Details::new(),
        }
    }

    pub fn with_details(kind: ErrorKind, message: impl Into<String>, details: Details) -> Self {
        Self {
            kind,
            message: message.into(),
            details,
        }
    }

    /// Add one detail entry.
    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn invalid_native_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidNativeResponse, message)
    }

    pub fn nif_panic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NifPanic, message)
    }

    /// `"{kind}: {message}"`.
    pub fn format(&self) -> String {
        self.to_string()
    }
}
