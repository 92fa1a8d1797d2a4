//! Argument validation shared by every store implementation.

use crate::error::{LockerError, Result};

/// Largest plaintext accepted for a single value (128 KiB).
pub const MAX_VALUE_BYTES: usize = 128 * 1024;

/// Reject an empty namespace.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(LockerError::EmptyNamespace);
    }
    Ok(())
}

/// Reject an empty namespace, then an empty key.
pub fn validate_address(namespace: &str, key: &str) -> Result<()> {
    validate_namespace(namespace)?;
    if key.is_empty() {
        return Err(LockerError::EmptyKey);
    }
    Ok(())
}

/// Reject values over [`MAX_VALUE_BYTES`].
pub fn validate_value(value: &str) -> Result<()> {
    if value.len() > MAX_VALUE_BYTES {
        return Err(LockerError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_BYTES,
        });
    }
    Ok(())
}

/// Validate a batch of items against `namespace`, key by key.
pub fn validate_items(namespace: &str, items: &[(&str, &str)]) -> Result<()> {
    validate_namespace(namespace)?;
    for (key, value) in items {
        validate_address(namespace, key)?;
        validate_value(value)?;
    }
    Ok(())
}
