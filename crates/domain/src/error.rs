//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`ThingError`]
//! at port boundaries.

use crate::value::DataType;

/// Top-level error shared by the domain and application layers.
#[derive(Debug, thiserror::Error)]
pub enum ThingError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// Authentication was requested but no username/password is configured.
    #[error("broker authentication required but no credentials configured")]
    MissingCredentials,

    /// Failure reported by a transport adapter (broker client, network).
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),
}

/// Violations of domain invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("identifier {0:?} is already registered")]
    DuplicateId(String),

    #[error("expected a {expected} value, got {found}")]
    TypeMismatch {
        expected: DataType,
        found: &'static str,
    },

    #[error("invalid hardware address {0:?}")]
    InvalidMacAddress(String),
}
