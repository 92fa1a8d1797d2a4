//! Bucket handle: all SQL for one namespace inside an open transaction.
//!
//! A `Bucket` borrows the connection of the transaction that created it, so
//! every call it makes is part of that transaction. Keys are compared with
//! SQLite's `BINARY` collation, which orders them byte by byte.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

use super::sqlite_error;

/// Store file format version recorded in `meta`.
pub(super) const FORMAT_VERSION: &str = "1";

pub(super) const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS buckets (
        name TEXT PRIMARY KEY COLLATE BINARY
    ) WITHOUT ROWID;

    CREATE TABLE IF NOT EXISTS records (
        bucket TEXT NOT NULL COLLATE BINARY,
        key TEXT NOT NULL COLLATE BINARY,
        value TEXT NOT NULL,

        PRIMARY KEY(bucket, key),
        FOREIGN KEY(bucket) REFERENCES buckets(name) ON DELETE CASCADE
    ) WITHOUT ROWID;
"#;

/// A namespace that exists in the store.
#[derive(Debug)]
pub(super) struct Bucket<'a> {
    conn: &'a Connection,
    name: &'a str,
}

impl<'a> Bucket<'a> {
    /// Look up an existing bucket; `None` if it was never created.
    pub(super) fn open(conn: &'a Connection, name: &'a str) -> Result<Option<Self>> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM buckets WHERE name = ?",
                [name],
                |_| Ok(()),
            )
            .optional()
            .map_err(sqlite_error)?;
        Ok(exists.map(|_| Self { conn, name }))
    }

    /// Return the bucket, creating it first if needed.
    pub(super) fn create_if_absent(conn: &'a Connection, name: &'a str) -> Result<Self> {
        conn.execute(
            "INSERT INTO buckets (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
            [name],
        )
        .map_err(sqlite_error)?;
        Ok(Self { conn, name })
    }

    /// Names of all buckets in byte order.
    pub(super) fn names(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare_cached("SELECT name FROM buckets ORDER BY name")
            .map_err(sqlite_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sqlite_error)?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(sqlite_error)?);
        }
        Ok(names)
    }

    /// Remove the bucket and all of its records.
    pub(super) fn delete(self) -> Result<()> {
        self.conn
            .execute("DELETE FROM records WHERE bucket = ?", [self.name])
            .map_err(sqlite_error)?;
        self.conn
            .execute("DELETE FROM buckets WHERE name = ?", [self.name])
            .map_err(sqlite_error)?;
        Ok(())
    }

    pub(super) fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM records WHERE bucket = ? AND key = ?",
                [self.name, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_error)
    }

    pub(super) fn contains(&self, key: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE bucket = ? AND key = ?",
                [self.name, key],
                |_| Ok(()),
            )
            .optional()
            .map_err(sqlite_error)?;
        Ok(found.is_some())
    }

    /// Insert or overwrite `key`.
    pub(super) fn put(&self, key: &str, record: &str) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO records (bucket, key, value) VALUES (?, ?, ?)
                ON CONFLICT(bucket, key) DO UPDATE SET value = excluded.value
                "#,
                params![self.name, key, record],
            )
            .map_err(sqlite_error)?;
        Ok(())
    }

    /// Insert `key` only if it is missing. Returns whether a row was written.
    pub(super) fn put_if_absent(&self, key: &str, record: &str) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                r#"
                INSERT INTO records (bucket, key, value) VALUES (?, ?, ?)
                ON CONFLICT(bucket, key) DO NOTHING
                "#,
                params![self.name, key, record],
            )
            .map_err(sqlite_error)?;
        Ok(inserted == 1)
    }

    /// Delete `key`; a missing key is not an error.
    pub(super) fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM records WHERE bucket = ? AND key = ?",
                [self.name, key],
            )
            .map_err(sqlite_error)?;
        Ok(())
    }

    /// Keys in byte order.
    pub(super) fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.for_each(|key, _| {
            keys.push(key.to_string());
            Ok(())
        })?;
        Ok(keys)
    }

    /// Walk every `(key, record)` pair in byte order, stopping at the first
    /// error returned by `visit`.
    pub(super) fn for_each<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> Result<()>,
    {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key, value FROM records WHERE bucket = ? ORDER BY key")
            .map_err(sqlite_error)?;
        let mut rows = stmt.query([self.name]).map_err(sqlite_error)?;

        while let Some(row) = rows.next().map_err(sqlite_error)? {
            let key: String = row.get(0).map_err(sqlite_error)?;
            let record: String = row.get(1).map_err(sqlite_error)?;
            visit(&key, &record)?;
        }
        Ok(())
    }
}
