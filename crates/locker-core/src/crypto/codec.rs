//! Record codec: plaintext bytes to authenticated, base64-encoded records.
//!
//! A stored record decodes to the following blob:
//!
//! ```text
//! version (1) | m_cost (4, LE) | t_cost (4, LE) | p_cost (4, LE)
//! salt (16) | nonce (12) | ciphertext | tag (16)
//! ```
//!
//! Everything before the ciphertext is authenticated as associated data.
//! The key for each record is derived with Argon2id from the master secret
//! and the record's own salt; the cipher is ChaCha20-Poly1305.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use secrecy::{ExposeSecret, SecretString};

use crate::crypto::key::{derive_key, KdfParams};
use crate::error::{LockerError, Result};

/// Current record format version.
pub const RECORD_VERSION: u8 = 1;
/// Length of the version + KDF parameter header.
pub const HEADER_LEN: usize = 13;
/// Length of the per-record Argon2 salt.
pub const SALT_LEN: usize = 16;
/// Length of the ChaCha20-Poly1305 nonce.
pub const NONCE_LEN: usize = 12;
/// Length of the Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;

const PREFIX_LEN: usize = HEADER_LEN + SALT_LEN + NONCE_LEN;

/// Encodes secrets to storable records and back.
///
/// Implementations must be non-deterministic on `marshal` (fresh nonce per
/// call) and must fail `unmarshal` on any tampering rather than return
/// garbage.
pub trait Codec: Send + Sync {
    /// Encrypt and encode a plaintext into a printable record.
    fn marshal(&self, plaintext: &[u8]) -> Result<String>;

    /// Decode and decrypt a record produced by [`Codec::marshal`].
    fn unmarshal(&self, record: &str) -> Result<Vec<u8>>;
}

/// Argon2id + ChaCha20-Poly1305 codec keyed by a master secret.
#[derive(Debug)]
pub struct CryptoCodec {
    secret: SecretString,
    params: KdfParams,
}

impl CryptoCodec {
    /// Create a codec with default key-derivation cost.
    pub fn new(secret: SecretString) -> Self {
        Self::with_params(secret, KdfParams::default())
    }

    /// Create a codec with explicit key-derivation cost for new records.
    ///
    /// Existing records carry their own parameters and are always read
    /// with those.
    pub fn with_params(secret: SecretString, params: KdfParams) -> Self {
        Self { secret, params }
    }

    /// Parameters used for newly marshalled records.
    pub fn params(&self) -> KdfParams {
        self.params
    }

    fn secret(&self) -> Result<&str> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(LockerError::MasterSecretUnset);
        }
        Ok(secret)
    }
}

impl Codec for CryptoCodec {
    fn marshal(&self, plaintext: &[u8]) -> Result<String> {
        let secret = self.secret()?;
        let salt: [u8; SALT_LEN] = random_bytes()?;
        let nonce: [u8; NONCE_LEN] = random_bytes()?;
        let key = derive_key(secret, &salt, &self.params)?;

        let mut blob = Vec::with_capacity(PREFIX_LEN + plaintext.len() + TAG_LEN);
        blob.extend_from_slice(&encode_header(&self.params));
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &blob,
                },
            )
            .map_err(|_| LockerError::Crypto("Encryption failed".to_string()))?;
        blob.extend_from_slice(&sealed);

        Ok(STANDARD.encode(&blob))
    }

    fn unmarshal(&self, record: &str) -> Result<Vec<u8>> {
        let secret = self.secret()?;
        let blob = STANDARD
            .decode(record.as_bytes())
            .map_err(|e| LockerError::DecodeFailure(format!("invalid base64: {}", e)))?;

        if blob.len() < PREFIX_LEN + TAG_LEN {
            return Err(LockerError::DecodeFailure(format!(
                "record too short: {} bytes (min {})",
                blob.len(),
                PREFIX_LEN + TAG_LEN
            )));
        }

        let (prefix, sealed) = blob.split_at(PREFIX_LEN);
        let params = decode_header(&prefix[..HEADER_LEN])?;
        let salt = &prefix[HEADER_LEN..HEADER_LEN + SALT_LEN];
        let nonce = &prefix[HEADER_LEN + SALT_LEN..];

        let key = derive_key(secret, salt, &params)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: prefix,
                },
            )
            .map_err(|_| LockerError::AuthenticationFailure)
    }
}

fn encode_header(params: &KdfParams) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = RECORD_VERSION;
    header[1..5].copy_from_slice(&params.memory_kib.to_le_bytes());
    header[5..9].copy_from_slice(&params.iterations.to_le_bytes());
    header[9..13].copy_from_slice(&params.parallelism.to_le_bytes());
    header
}

fn decode_header(header: &[u8]) -> Result<KdfParams> {
    if header[0] != RECORD_VERSION {
        return Err(LockerError::DecodeFailure(format!(
            "unsupported record version {}",
            header[0]
        )));
    }

    let read_u32 = |range: std::ops::Range<usize>| {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&header[range]);
        u32::from_le_bytes(bytes)
    };
    let params = KdfParams::new(read_u32(1..5), read_u32(5..9), read_u32(9..13));
    params
        .validate()
        .map_err(|e| LockerError::DecodeFailure(format!("invalid key parameters: {}", e)))?;
    Ok(params)
}

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| LockerError::Crypto(format!("System RNG unavailable: {}", e)))?;
    Ok(buf)
}
