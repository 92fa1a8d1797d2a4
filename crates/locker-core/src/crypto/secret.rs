//! Master secret validation.

use crate::error::{LockerError, Result};

/// Validate that a master secret is usable.
///
/// The only requirement is that it is not empty or whitespace-only; length
/// and strength policy belongs to the calling layer.
///
/// # Examples
///
/// ```
/// use locker_core::crypto::validate_master_secret;
///
/// assert!(validate_master_secret("MAGIK").is_ok());
/// assert!(validate_master_secret("  ").is_err());
/// ```
pub fn validate_master_secret(secret: &str) -> Result<()> {
    if secret.trim().is_empty() {
        return Err(LockerError::MasterSecretUnset);
    }
    Ok(())
}
