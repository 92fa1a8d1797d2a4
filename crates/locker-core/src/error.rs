//! Error types for Locker core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the calling layer maps these
//! to user-facing messages (see [`LockerError::hint`]).

use thiserror::Error;

/// Result type alias for Locker operations.
pub type Result<T> = std::result::Result<T, LockerError>;

/// Hint shown to users when a record fails authentication.
const MASTER_SECRET_HINT: &str = "double check your master secret";

/// Core error type for Locker operations.
#[derive(Debug, Error)]
pub enum LockerError {
    /// Namespace argument was empty
    #[error("namespace cannot be empty")]
    EmptyNamespace,

    /// Key argument was empty
    #[error("key cannot be empty")]
    EmptyKey,

    /// Read or delete against a namespace that was never created
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// No master secret available to encrypt or decrypt
    #[error("master secret cannot be empty")]
    MasterSecretUnset,

    /// Stored record could not be decoded into a ciphertext blob
    #[error("stored record is malformed: {0}")]
    DecodeFailure(String),

    /// Ciphertext failed authentication (wrong master secret or tampering)
    #[error("stored record failed authentication")]
    AuthenticationFailure,

    /// Backend lock could not be acquired, handle is closed, or the engine failed
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Plaintext value exceeds the per-record limit
    #[error("value too large: {size} bytes (max {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// Key derivation, RNG, or cipher setup error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl LockerError {
    /// A short remediation hint suitable for end users, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            LockerError::AuthenticationFailure => Some(MASTER_SECRET_HINT),
            _ => None,
        }
    }
}
