//! Error types for every fallible seam in the subsystem runtime.
//!
//! Each concern gets its own `thiserror`-derived enum rather than one
//! grand error type, mirroring how the transport crates each define a
//! `TransportError` scoped to their own protocol.

use thiserror::Error;

/// Raised while parsing a declarative record schema (`uint64,float,string_16`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown field type token: {0:?}")]
    UnknownToken(String),
    #[error("string_N token has an invalid width: {0:?}")]
    InvalidStringWidth(String),
    #[error("schema must contain at least one field")]
    Empty,
    #[error("value {value:?} does not parse as a {field:?} field")]
    InvalidFieldValue { field: String, value: String },
}

/// Raised while decoding/encoding a control's wire payload.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control payload is empty")]
    EmptyPayload,
    #[error("control payload has type {found:?}, expected {expected:?}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("control payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("memory map buffer is too small: need {need} bytes at offset {start}, buffer is {len} bytes")]
    BufferTooSmall {
        start: usize,
        need: usize,
        len: usize,
    },
}

/// Raised while loading the YAML configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("configuration field {0:?} is invalid: {1}")]
    Invalid(&'static str, String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
