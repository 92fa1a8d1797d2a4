//! Storage abstraction for Locker.
//!
//! This module defines the `Store` trait and its SQLite implementation.
//!
//! ## Architecture
//!
//! - `traits`: the namespaced store contract
//! - `validation`: argument checks shared by every implementation
//! - `sqlite`: one SQLite file per store, one bucket per namespace
//!
//! ## Security
//!
//! Stores are responsible for:
//! - Sealing every value with a `Codec` before it is written
//! - Running each operation in a single transaction
//! - Holding an exclusive lock on the store file while open

pub mod sqlite;
pub mod traits;
pub mod validation;

pub use sqlite::SqliteStore;
pub use traits::Store;
pub use validation::MAX_VALUE_BYTES;
