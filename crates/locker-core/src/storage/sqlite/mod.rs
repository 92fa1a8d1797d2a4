//! SQLite storage backend.
//!
//! Each namespace is a bucket row and each secret a record row keyed by
//! `(bucket, key)`. The connection runs in `EXCLUSIVE` locking mode, so the
//! file lock taken at open is held until the store is closed or dropped.
//! Every logical operation maps to one SQLite transaction: `IMMEDIATE` for
//! writes, `DEFERRED` (and rolled back) for reads.

mod bucket;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use crate::config::StoreOptions;
use crate::crypto::{Codec, CryptoCodec};
use crate::error::{LockerError, Result};
use crate::fs::{create_private_file, ensure_parent_dir, restrict_sidecars};
use crate::storage::traits::Store;
use crate::storage::validation::{
    validate_address, validate_items, validate_namespace, validate_value,
};

use bucket::{Bucket, FORMAT_VERSION, SCHEMA};

/// Convert an engine error into a store failure.
pub(crate) fn sqlite_error(err: rusqlite::Error) -> LockerError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            LockerError::StoreUnavailable(format!("database is locked: {}", err))
        }
        _ => LockerError::StoreUnavailable(format!("SQLite error: {}", err)),
    }
}

/// Prefix engine failures with the operation that hit them.
fn during(operation: &'static str) -> impl Fn(LockerError) -> LockerError {
    move |err| match err {
        LockerError::StoreUnavailable(msg) => {
            LockerError::StoreUnavailable(format!("{}: {}", operation, msg))
        }
        other => other,
    }
}

fn not_found(namespace: &str) -> LockerError {
    LockerError::NamespaceNotFound(namespace.to_string())
}

/// Encrypted store on a single SQLite file.
pub struct SqliteStore<C: Codec = CryptoCodec> {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    codec: C,
}

impl<C: Codec> SqliteStore<C> {
    /// Open (or create) the store at `options.path`.
    ///
    /// Waits up to `options.lock_timeout` for the exclusive file lock.
    ///
    /// # Errors
    ///
    /// - `LockerError::StoreUnavailable` if the lock is not acquired in time,
    ///   the file is not a store, or its format version is unknown
    /// - `LockerError::Io` if the parent directory cannot be created
    pub fn open(options: &StoreOptions, codec: C) -> Result<Self> {
        ensure_parent_dir(&options.path)?;
        create_private_file(&options.path)?;
        restrict_sidecars(&options.path)?;

        let mut conn = Connection::open(&options.path)
            .map_err(sqlite_error)
            .map_err(during("open"))?;
        conn.busy_timeout(options.lock_timeout)
            .map_err(sqlite_error)
            .map_err(during("open"))?;
        conn.pragma_update_and_check(None, "locking_mode", "EXCLUSIVE", |row| {
            row.get::<_, String>(0)
        })
        .map_err(sqlite_error)
        .map_err(during("open"))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(sqlite_error)
            .map_err(during("open"))?;

        Self::acquire(&mut conn, options)?;
        restrict_sidecars(&options.path)?;

        debug!(path = %options.path.display(), "opened store");

        Ok(Self {
            path: options.path.clone(),
            conn: Mutex::new(Some(conn)),
            codec,
        })
    }

    /// Take the exclusive lock and make sure the schema is in place.
    ///
    /// The connection is dropped by the caller on error, which releases
    /// whatever lock was obtained.
    fn acquire(conn: &mut Connection, options: &StoreOptions) -> Result<()> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)
            .map_err(|err| match err.sqlite_error_code() {
                Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                    warn!(
                        path = %options.path.display(),
                        timeout_ms = options.lock_timeout.as_millis() as u64,
                        "timed out waiting for store lock"
                    );
                    LockerError::StoreUnavailable(format!(
                        "open: could not lock {} within {:?}",
                        options.path.display(),
                        options.lock_timeout
                    ))
                }
                _ => during("open")(sqlite_error(err)),
            })?;

        tx.execute_batch(SCHEMA)
            .map_err(sqlite_error)
            .map_err(during("open"))?;

        let version: Option<String> = tx
            .query_row(
                "SELECT value FROM meta WHERE key = 'format_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_error)
            .map_err(during("open"))?;
        if let Some(version) = version {
            if version != FORMAT_VERSION {
                return Err(LockerError::StoreUnavailable(format!(
                    "open: unsupported store format version {}",
                    version
                )));
            }
        }

        // Always write, so the exclusive lock is held from here on.
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('format_version', ?)",
            [FORMAT_VERSION],
        )
        .map_err(sqlite_error)
        .map_err(during("open"))?;

        tx.commit().map_err(sqlite_error).map_err(during("open"))?;
        Ok(())
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The codec records are sealed with.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Verify the database file and its bucket/record relationships.
    pub fn check_integrity(&self) -> Result<()> {
        self.view("check_integrity", |conn| {
            let status: String = conn
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))
                .map_err(sqlite_error)?;
            if status != "ok" {
                return Err(LockerError::StoreUnavailable(format!(
                    "integrity check failed: {}",
                    status
                )));
            }

            let mut stmt = conn
                .prepare("PRAGMA foreign_key_check")
                .map_err(sqlite_error)?;
            let mut rows = stmt.query([]).map_err(sqlite_error)?;
            if rows.next().map_err(sqlite_error)?.is_some() {
                return Err(LockerError::StoreUnavailable(
                    "records reference missing buckets".to_string(),
                ));
            }
            Ok(())
        })
    }

    /// Lock the connection slot, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| LockerError::StoreUnavailable("SQLite connection poisoned".to_string()))
    }

    /// Run `f` in a read-only transaction.
    fn view<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut guard = self.lock_conn()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| LockerError::StoreUnavailable(format!("{}: store is closed", operation)))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(sqlite_error)
            .map_err(during(operation))?;
        let out = f(&*tx).map_err(during(operation))?;
        tx.rollback().map_err(sqlite_error).map_err(during(operation))?;
        Ok(out)
    }

    /// Run `f` in a read-write transaction, committing only if it succeeds.
    fn update<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut guard = self.lock_conn()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| LockerError::StoreUnavailable(format!("{}: store is closed", operation)))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite_error)
            .map_err(during(operation))?;
        let out = f(&*tx).map_err(during(operation))?;
        tx.commit().map_err(sqlite_error).map_err(during(operation))?;
        Ok(out)
    }

    fn seal(&self, value: &str) -> Result<String> {
        self.codec.marshal(value.as_bytes())
    }

    /// Decrypt the record stored at `(namespace, key)`. Failures keep their
    /// variant and are logged with the address.
    fn open_record(&self, namespace: &str, key: &str, record: &str) -> Result<String> {
        self.codec
            .unmarshal(record)
            .and_then(|plaintext| {
                String::from_utf8(plaintext).map_err(|e| {
                    LockerError::DecodeFailure(format!("value is not valid UTF-8: {}", e))
                })
            })
            .map_err(|err| {
                warn!(namespace, key, error = %err, "could not open stored record");
                err
            })
    }

    fn seal_items(&self, items: &[(&str, &str)]) -> Result<Vec<(String, String)>> {
        items
            .iter()
            .map(|(key, value)| -> Result<(String, String)> {
                Ok((key.to_string(), self.seal(value)?))
            })
            .collect()
    }
}

impl<C: Codec> Store for SqliteStore<C> {
    fn put_one(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        validate_address(namespace, key)?;
        validate_value(value)?;

        let record = self.seal(value)?;
        self.update("put_one", |conn| {
            Bucket::create_if_absent(conn, namespace)?.put(key, &record)
        })?;

        debug!(namespace, "stored value");
        Ok(())
    }

    fn get_one(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        validate_address(namespace, key)?;

        let record = self.view("get_one", |conn| {
            Bucket::open(conn, namespace)?
                .ok_or_else(|| not_found(namespace))?
                .get(key)
        })?;

        record
            .map(|record| self.open_record(namespace, key, &record))
            .transpose()
    }

    fn get_all(&self, namespace: &str, keys: &[&str]) -> Result<BTreeMap<String, String>> {
        validate_namespace(namespace)?;
        for key in keys {
            validate_address(namespace, key)?;
        }
        let wanted: HashSet<&str> = keys.iter().copied().collect();

        let records = self.view("get_all", |conn| {
            let bucket = Bucket::open(conn, namespace)?.ok_or_else(|| not_found(namespace))?;
            let mut selected = Vec::new();
            bucket.for_each(|key, record| {
                if wanted.is_empty() || wanted.contains(key) {
                    selected.push((key.to_string(), record.to_string()));
                }
                Ok(())
            })?;
            Ok(selected)
        })?;

        debug!(namespace, count = records.len(), "read values");

        records
            .into_iter()
            .map(|(key, record)| -> Result<(String, String)> {
                let value = self.open_record(namespace, &key, &record)?;
                Ok((key, value))
            })
            .collect()
    }

    fn delete_one(&self, namespace: &str, key: &str) -> Result<()> {
        validate_address(namespace, key)?;

        self.update("delete_one", |conn| {
            Bucket::open(conn, namespace)?
                .ok_or_else(|| not_found(namespace))?
                .remove(key)
        })?;

        debug!(namespace, "deleted value");
        Ok(())
    }

    fn delete_all(&self, namespace: &str) -> Result<()> {
        validate_namespace(namespace)?;

        self.update("delete_all", |conn| {
            Bucket::open(conn, namespace)?
                .ok_or_else(|| not_found(namespace))?
                .delete()
        })?;

        debug!(namespace, "deleted namespace");
        Ok(())
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        self.view("namespaces", |conn| Bucket::names(conn))
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        validate_namespace(namespace)?;

        self.view("keys", |conn| {
            Bucket::open(conn, namespace)?
                .ok_or_else(|| not_found(namespace))?
                .keys()
        })
    }

    fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        validate_address(namespace, key)?;

        self.view("contains", |conn| {
            Bucket::open(conn, namespace)?
                .ok_or_else(|| not_found(namespace))?
                .contains(key)
        })
    }

    fn put_if_absent(&self, namespace: &str, key: &str, value: &str) -> Result<bool> {
        validate_address(namespace, key)?;
        validate_value(value)?;

        let record = self.seal(value)?;
        let written = self.update("put_if_absent", |conn| {
            Bucket::create_if_absent(conn, namespace)?.put_if_absent(key, &record)
        })?;

        debug!(namespace, written, "conditional store");
        Ok(written)
    }

    fn put_many(&self, namespace: &str, items: &[(&str, &str)]) -> Result<()> {
        validate_items(namespace, items)?;
        if items.is_empty() {
            return Ok(());
        }

        let records = self.seal_items(items)?;
        self.update("put_many", |conn| {
            let bucket = Bucket::create_if_absent(conn, namespace)?;
            for (key, record) in &records {
                bucket.put(key, record)?;
            }
            Ok(())
        })?;

        debug!(namespace, count = records.len(), "stored batch");
        Ok(())
    }

    fn put_many_if_absent(&self, namespace: &str, items: &[(&str, &str)]) -> Result<usize> {
        validate_items(namespace, items)?;
        if items.is_empty() {
            return Ok(0);
        }

        let records = self.seal_items(items)?;
        let written = self.update("put_many_if_absent", |conn| {
            let bucket = Bucket::create_if_absent(conn, namespace)?;
            let mut written = 0;
            for (key, record) in &records {
                if bucket.put_if_absent(key, record)? {
                    written += 1;
                }
            }
            Ok(written)
        })?;

        debug!(namespace, written, "conditional batch");
        Ok(written)
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.lock_conn()?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, err)| during("close")(sqlite_error(err)))?;
            debug!(path = %self.path.display(), "closed store");
        }
        Ok(())
    }
}

impl<C: Codec> std::fmt::Debug for SqliteStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
