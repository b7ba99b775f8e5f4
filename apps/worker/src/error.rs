use std::io::Error as IoError;

use thiserror::Error;

/// Failures of the check record store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record {category}/{id} not found")]
    NotFound { category: String, id: String },
    #[error("record {category}/{id} already exists")]
    AlreadyExists { category: String, id: String },
    #[error("{0:?} is not a valid record name")]
    InvalidName(String),
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the per-check log store
#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("archive {0} already exists")]
    ArchiveExists(String),
    #[error("{0:?} is not a valid log name")]
    InvalidName(String),
    #[error("Archive decoding error: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Archive is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failures of the outbound messaging provider
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Request to messaging provider failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Messaging provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// A stored record that could not be turned into a check definition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record rejected, invalid fields: {}", .fields.join(", "))]
    Rejected { fields: Vec<&'static str> },
}

/// Configuration loading and writing failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed { path: String, source: IoError },
    #[error("Failed to write config {path}: {source}")]
    WriteFailed { path: String, source: IoError },
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: &'static str },
    #[error("No config path available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}
