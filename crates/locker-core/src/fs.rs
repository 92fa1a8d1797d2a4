//! Filesystem preparation for store files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Create the parent directory of `path` if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Suffixes SQLite appends to the store path for its journal files.
pub const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Restrict a store file to owner read/write (0600).
///
/// No-op on non-Unix platforms.
pub fn restrict_permissions(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Create the store file owner-only if it is missing, and restrict it if it
/// already exists.
///
/// SQLite gives its journal files the mode of the main file, so this must
/// run before the database is opened. An existing file is never opened
/// here: closing a second descriptor would drop the POSIX locks another
/// connection in this process holds on it.
pub fn create_private_file(path: &Path) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    match options.open(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => restrict_permissions(path),
        Err(err) => Err(err),
    }
}

/// Path of the SQLite sidecar file for `path` with the given suffix.
pub fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Restrict every sidecar file of `path` that exists.
pub fn restrict_sidecars(path: &Path) -> io::Result<()> {
    for suffix in SIDECAR_SUFFIXES {
        let sidecar = sidecar_path(path, suffix);
        match restrict_permissions(&sidecar) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            other => other?,
        }
    }
    Ok(())
}
