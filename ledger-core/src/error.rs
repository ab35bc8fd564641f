//! Error types for the ledger

use crate::types::{MemberId, ProviderId, ServiceCode};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Member not present in the directory
    #[error("Unknown member: {0}")]
    UnknownMember(MemberId),

    /// Provider not present in the directory
    #[error("Unknown provider: {0}")]
    UnknownProvider(ProviderId),

    /// Service code not offered by the provider
    #[error("Provider {provider} does not offer service {code}")]
    UnknownService {
        /// Provider whose catalog was searched
        provider: ProviderId,
        /// Missing service code
        code: ServiceCode,
    },

    /// Id already registered
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
