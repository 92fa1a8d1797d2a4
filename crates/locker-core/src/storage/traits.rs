//! Store trait definition.
//!
//! The `Store` trait is the contract every backend implements. Values are
//! encrypted before they reach the backend and decrypted after they leave
//! it; namespaces are isolated buckets of keys.

use std::collections::BTreeMap;

use crate::error::Result;

/// Namespaced, encrypted key-value store.
///
/// All implementations must ensure:
/// - Values are never persisted unencrypted
/// - Each operation runs in exactly one backend transaction
/// - Namespace and key are validated non-empty before anything else
/// - A missing namespace is reported as `NamespaceNotFound`, never as an
///   empty success, on every read and delete path
pub trait Store: Send + Sync {
    /// Store `value` under `key` in `namespace`, creating the namespace if
    /// it does not exist. An existing value is overwritten.
    ///
    /// # Errors
    ///
    /// - `EmptyNamespace` / `EmptyKey` for empty arguments
    /// - `ValueTooLarge` if `value` exceeds
    ///   [`MAX_VALUE_BYTES`](super::validation::MAX_VALUE_BYTES)
    /// - codec errors from encryption
    fn put_one(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    /// Retrieve the value for `key` in `namespace`.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(value))` if found, `Ok(None)` if the namespace exists
    /// but the key does not.
    ///
    /// # Errors
    ///
    /// - `NamespaceNotFound` if the namespace was never created
    /// - `DecodeFailure` / `AuthenticationFailure` from the codec
    fn get_one(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Retrieve every value in `namespace`, in key byte order.
    ///
    /// When `keys` is non-empty only those keys are decrypted and returned;
    /// all others are skipped without touching the codec.
    fn get_all(&self, namespace: &str, keys: &[&str]) -> Result<BTreeMap<String, String>>;

    /// Delete `key` from `namespace`. Deleting a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace does not exist.
    fn delete_one(&self, namespace: &str, key: &str) -> Result<()>;

    /// Delete `namespace` and everything in it, atomically.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace does not exist.
    fn delete_all(&self, namespace: &str) -> Result<()>;

    /// List all namespace names in byte order.
    fn namespaces(&self) -> Result<Vec<String>>;

    /// List all keys in `namespace` in byte order.
    fn keys(&self, namespace: &str) -> Result<Vec<String>>;

    /// Check whether `key` exists in `namespace` without decrypting it.
    fn contains(&self, namespace: &str, key: &str) -> Result<bool>;

    /// Store `value` only if `key` is absent, as one atomic step.
    ///
    /// # Returns
    ///
    /// Returns `true` if the value was written, `false` if the key existed.
    fn put_if_absent(&self, namespace: &str, key: &str, value: &str) -> Result<bool>;

    /// Store several items in one transaction; either all are written or
    /// none are. Later items overwrite earlier ones with the same key.
    fn put_many(&self, namespace: &str, items: &[(&str, &str)]) -> Result<()>;

    /// Store several items in one transaction, skipping keys that already
    /// exist. For duplicate keys within `items` the first one wins.
    ///
    /// # Returns
    ///
    /// Returns the number of items written.
    fn put_many_if_absent(&self, namespace: &str, items: &[(&str, &str)]) -> Result<usize>;

    /// Release the backend and its file lock.
    ///
    /// Idempotent: closing an already closed store succeeds. Every other
    /// operation on a closed store fails with `StoreUnavailable`.
    fn close(&self) -> Result<()>;
}
