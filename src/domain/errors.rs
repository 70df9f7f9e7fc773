//! Domain error types
//!
//! This module defines the error hierarchy for Sowtrack. Every failure that can cross a
//! public boundary maps onto an [`ErrorKind`], which is what callers inspect and what the
//! wire envelopes carry. Backend-specific failures are captured in [`StoreError`] and never
//! expose driver types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main Sowtrack error type
///
/// This is the primary error type used throughout the library.
#[derive(Debug, Error)]
pub enum SowtrackError {
    /// A storage key or identifier could not be derived or parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A pagination cursor was malformed or issued for a different query
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// The requested stage edge is not part of the production pipeline
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// The source record was changed by someone else; refresh and retry
    #[error("Stale transition: {0}")]
    StaleTransition(String),

    /// Attempted to modify a completed stage record
    #[error("Record is not active: {0}")]
    RecordNotActive(String),

    /// A required identifier was absent from the request
    #[error("Missing identifier: {0}")]
    MissingIdentifier(String),

    /// No data exists for the requested identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// The storage engine or network could not serve the request
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    /// No valid bearer token for the current session
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// A client-side transition is already pending
    #[error("Transition already in flight for record {0}")]
    TransitionInFlight(String),

    /// Request parameters failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// A failure reported by the remote stage API
    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },
}

impl SowtrackError {
    /// Returns the wire-level classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::InvalidCursor(_) => ErrorKind::InvalidCursor,
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::StaleTransition(_) => ErrorKind::StaleTransition,
            Self::RecordNotActive(_) => ErrorKind::RecordNotActive,
            Self::MissingIdentifier(_) => ErrorKind::MissingIdentifier,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::TransitionInFlight(_) => ErrorKind::TransitionInFlight,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Io(_) => ErrorKind::Internal,
            Self::Remote { kind, .. } => *kind,
        }
    }
}

/// Wire-level error classification
///
/// Serialized into failed envelopes so callers can branch on the kind (e.g. refresh on
/// `StaleTransition`, reject on `IllegalTransition`) without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidKey,
    InvalidCursor,
    IllegalTransition,
    StaleTransition,
    RecordNotActive,
    MissingIdentifier,
    NotFound,
    StorageUnavailable,
    Unauthenticated,
    TransitionInFlight,
    Validation,
    Configuration,
    Serialization,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status used by the lookup endpoints
    pub fn http_status(self) -> u16 {
        match self {
            Self::MissingIdentifier
            | Self::InvalidKey
            | Self::InvalidCursor
            | Self::Validation => 400,
            Self::Unauthenticated => 401,
            Self::NotFound => 404,
            Self::IllegalTransition
            | Self::StaleTransition
            | Self::RecordNotActive
            | Self::TransitionInFlight => 409,
            Self::StorageUnavailable
            | Self::Configuration
            | Self::Serialization
            | Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Storage backend errors
///
/// Errors raised by [`crate::adapters::database::ItemStore`] implementations. These
/// don't expose driver types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A conditional write found the item in an unexpected state
    #[error("Condition check failed: {0}")]
    ConditionFailed(String),

    /// Failed to reach the storage engine
    #[error("Failed to connect to storage: {0}")]
    ConnectionFailed(String),

    /// Failed to query items
    #[error("Failed to query items: {0}")]
    QueryFailed(String),

    /// Failed to write an item
    #[error("Failed to write item: {0}")]
    WriteFailed(String),

    /// No response within the configured deadline
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Stored item could not be decoded
    #[error("Failed to deserialize item: {0}")]
    DeserializationFailed(String),
}

impl StoreError {
    /// Whether this is a failed conditional write rather than an outage
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed(_))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for SowtrackError {
    fn from(err: std::io::Error) -> Self {
        SowtrackError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SowtrackError {
    fn from(err: serde_json::Error) -> Self {
        SowtrackError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SowtrackError {
    fn from(err: toml::de::Error) -> Self {
        SowtrackError::Configuration(format!("TOML parse error: {err}"))
    }
}
