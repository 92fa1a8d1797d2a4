//! # Locker Core
//!
//! Core library for Locker - a local, file-resident store for secrets
//! (credentials, tokens, TOTP seeds).
//!
//! Values live under a two-level address (namespace, key), are sealed with
//! an authenticated cipher before they touch the disk, and can only be read
//! back with the master secret they were written with.
//!
//! ## Architecture
//!
//! - **crypto**: key derivation and the record `Codec`
//! - **storage**: the `Store` trait and its SQLite backend
//! - **config**: store options, config file, default locations
//! - **fs**: store file preparation
//!
//! ## Example
//!
//! ```no_run
//! use locker_core::config::{master_secret_from_env, StoreOptions};
//! use locker_core::{CryptoCodec, SqliteStore, Store};
//!
//! # fn main() -> locker_core::Result<()> {
//! let codec = CryptoCodec::new(master_secret_from_env()?);
//! let store = SqliteStore::open(&StoreOptions::new("secrets.db"), codec)?;
//!
//! store.put_one("google", "user", "a@b.com")?;
//! assert_eq!(store.get_one("google", "user")?.as_deref(), Some("a@b.com"));
//! store.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod storage;

pub use crypto::{Codec, CryptoCodec, KdfParams};
pub use error::{LockerError, Result};
pub use storage::{SqliteStore, Store};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
