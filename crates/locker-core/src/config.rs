//! Store configuration, default locations and master secret sourcing.
//!
//! Nothing in here is consulted by the codec or the store on their own; the
//! calling layer resolves a [`LockerConfig`] (or builds [`StoreOptions`]
//! directly) and a master secret once at startup, then hands both in.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::crypto::{validate_master_secret, KdfParams};
use crate::error::{LockerError, Result};

/// Environment variable holding the master secret.
pub const ENV_MASTER_SECRET: &str = "LOCKER_SECRET";

/// Name of the store used when none is given.
pub const DEFAULT_STORE_NAME: &str = "locker";

/// Extension of store files inside the store directory.
pub const STORE_EXTENSION: &str = "db";

/// How long `open` waits for the exclusive file lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for opening a store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Path of the database file.
    pub path: PathBuf,
    /// Bounded wait for the exclusive file lock.
    pub lock_timeout: Duration,
}

impl StoreOptions {
    /// Options for `path` with the default lock timeout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Replace the lock timeout.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

/// On-disk configuration file (TOML).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockerConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub kdf: KdfParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Directory holding store files; platform default when unset.
    pub dir: Option<String>,
    pub name: String,
    pub lock_timeout_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: None,
            name: DEFAULT_STORE_NAME.to_string(),
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT.as_secs(),
        }
    }
}

impl LockerConfig {
    /// Resolve the options for the configured store.
    ///
    /// # Errors
    ///
    /// Returns `LockerError::Config` if no directory is configured and the
    /// default one cannot be resolved.
    pub fn store_options(&self) -> Result<StoreOptions> {
        let dir = match self.store.dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_store_dir()?,
        };
        Ok(StoreOptions::new(store_path(&dir, &self.store.name))
            .with_lock_timeout(Duration::from_secs(self.store.lock_timeout_secs)))
    }
}

/// Read and validate a TOML config file.
pub fn read_config(path: &Path) -> Result<LockerConfig> {
    let contents = fs::read_to_string(path).map_err(|e| {
        LockerError::Config(format!("Failed to read config {}: {}", path.display(), e))
    })?;
    let config: LockerConfig = toml::from_str(&contents).map_err(|e| {
        LockerError::Config(format!("Failed to parse config {}: {}", path.display(), e))
    })?;
    config.kdf.validate()?;
    Ok(config)
}

/// Write `config` as TOML, creating the parent directory if needed.
pub fn write_config(path: &Path, config: &LockerConfig) -> Result<()> {
    crate::fs::ensure_parent_dir(path)?;
    let contents = toml::to_string_pretty(config)
        .map_err(|e| LockerError::Config(format!("TOML error: {}", e)))?;
    fs::write(path, contents).map_err(|e| {
        LockerError::Config(format!("Failed to write config {}: {}", path.display(), e))
    })?;
    Ok(())
}

/// Read the master secret from [`ENV_MASTER_SECRET`].
///
/// # Errors
///
/// Returns `LockerError::MasterSecretUnset` when the variable is missing,
/// not valid Unicode, or blank.
pub fn master_secret_from_env() -> Result<SecretString> {
    let value = std::env::var(ENV_MASTER_SECRET).map_err(|_| LockerError::MasterSecretUnset)?;
    validate_master_secret(&value)?;
    Ok(SecretString::from(value))
}

/// `$XDG_CONFIG_HOME/locker`, falling back to `$HOME/.config/locker`.
pub fn default_store_dir() -> Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join(DEFAULT_STORE_NAME));
        }
    }
    let home = std::env::var("HOME").map_err(|_| {
        LockerError::Config("HOME is not set; cannot resolve default paths".to_string())
    })?;
    Ok(PathBuf::from(home).join(".config").join(DEFAULT_STORE_NAME))
}

/// Path of the store called `name` inside `dir`.
pub fn store_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, STORE_EXTENSION))
}

/// All stores in `dir`, keyed by name. A missing directory has no stores.
pub fn list_stores(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut stores = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(stores),
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(STORE_EXTENSION)
        {
            continue;
        }
        if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
            stores.insert(name.to_string(), path.clone());
        }
    }

    Ok(stores)
}
