//! Cryptographic operations for Locker.
//!
//! - **Argon2id**: memory-hard derivation of a per-record key from the
//!   master secret and a random salt
//! - **ChaCha20-Poly1305**: authenticated encryption of each record with a
//!   fresh random nonce
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the store file
//! - Tampering with stored records
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Disclosure of namespace and key names (stored in clear)

pub mod codec;
pub mod key;
pub mod secret;

pub use codec::{Codec, CryptoCodec};
pub use key::{derive_key, DerivedKey, KdfParams};
pub use secret::validate_master_secret;
