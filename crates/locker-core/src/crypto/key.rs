//! Key derivation using Argon2id.
//!
//! Every stored record carries its own random salt, so each record is
//! encrypted under a distinct key derived from the master secret.

use argon2::Argon2;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::error::{LockerError, Result};

/// Length of derived key in bytes (32 bytes = 256 bits for ChaCha20-Poly1305).
pub const KEY_LENGTH: usize = 32;

/// Minimum accepted salt length in bytes.
pub const MIN_SALT_LENGTH: usize = 16;

/// Upper bound on the Argon2 memory cost, for new and stored records (64 MiB).
///
/// Stored records carry their own cost, so these bounds also cap how much
/// work a corrupted record can force before it fails authentication.
pub const MAX_MEMORY_KIB: u32 = 64 * 1024;

/// Upper bound on Argon2 iterations.
pub const MAX_ITERATIONS: u32 = 4;

/// Upper bound on Argon2 lanes.
pub const MAX_PARALLELISM: u32 = 4;

/// Argon2id cost parameters.
///
/// Defaults follow the argon2 crate (19 MiB, 2 iterations, 1 lane).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl KdfParams {
    /// Build parameters as given; call [`KdfParams::validate`] before use.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    /// Check the parameters against Argon2's limits and our own upper bounds.
    ///
    /// # Errors
    ///
    /// Returns `LockerError::Crypto` describing the offending parameter.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(LockerError::Crypto(format!(
                "Argon2 parallelism must be between 1 and {} (got {})",
                MAX_PARALLELISM, self.parallelism
            )));
        }
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(LockerError::Crypto(format!(
                "Argon2 iterations must be between 1 and {} (got {})",
                MAX_ITERATIONS, self.iterations
            )));
        }
        let min_memory = 8 * self.parallelism;
        if self.memory_kib < min_memory || self.memory_kib > MAX_MEMORY_KIB {
            return Err(LockerError::Crypto(format!(
                "Argon2 memory must be between {} and {} KiB (got {})",
                min_memory, MAX_MEMORY_KIB, self.memory_kib
            )));
        }
        Ok(())
    }

    fn to_argon2(self) -> Result<argon2::Params> {
        self.validate()?;
        argon2::Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LENGTH),
        )
        .map_err(|e| LockerError::Crypto(format!("Failed to create Argon2 params: {}", e)))
    }
}

/// A cryptographic key derived from the master secret.
///
/// Key material is zeroized from memory when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// Avoid storing or logging this value.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive an encryption key from the master secret using Argon2id.
///
/// Same secret, salt and parameters always produce the same key.
///
/// # Errors
///
/// - `LockerError::MasterSecretUnset` if `secret` is empty
/// - `LockerError::Crypto` if the salt is too short, the parameters are
///   invalid, or derivation fails
pub fn derive_key(secret: &str, salt: &[u8], params: &KdfParams) -> Result<DerivedKey> {
    if secret.is_empty() {
        return Err(LockerError::MasterSecretUnset);
    }

    if salt.len() < MIN_SALT_LENGTH {
        return Err(LockerError::Crypto(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.to_argon2()?,
    );

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(secret.as_bytes(), salt, &mut key_bytes)
        .map_err(|e| LockerError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(DerivedKey::from_bytes(key_bytes))
}
