use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use locker_core::config::StoreOptions;
use locker_core::storage::MAX_VALUE_BYTES;
use locker_core::{CryptoCodec, KdfParams, LockerError, SqliteStore, Store};
use secrecy::SecretString;
use tempfile::{tempdir, TempDir};

struct TempStore {
    dir: TempDir,
}

impl TempStore {
    fn new() -> Self {
        Self {
            dir: tempdir().expect("tempdir should be available"),
        }
    }

    fn path(&self) -> PathBuf {
        self.dir.path().join("secrets.db")
    }

    fn open(&self, secret: &str) -> SqliteStore {
        open_at(&self.path(), secret, Duration::from_secs(5)).expect("open should succeed")
    }
}

fn open_at(path: &Path, secret: &str, lock_timeout: Duration) -> locker_core::Result<SqliteStore> {
    let codec = CryptoCodec::with_params(
        SecretString::from(secret.to_string()),
        KdfParams::new(64, 1, 1),
    );
    SqliteStore::open(&StoreOptions::new(path).with_lock_timeout(lock_timeout), codec)
}

#[test]
fn test_put_then_get_round_trip() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");

    store.put_one("google", "user", "a@b.com").expect("put should succeed");
    store.put_one("google", "pass", "p4ss").expect("put should succeed");

    assert_eq!(
        store.get_one("google", "user").expect("get should succeed").as_deref(),
        Some("a@b.com")
    );
    assert_eq!(
        store.get_one("google", "pass").expect("get should succeed").as_deref(),
        Some("p4ss")
    );
    assert_eq!(store.get_one("google", "missing").expect("get should succeed"), None);
}

#[test]
fn test_get_all_with_and_without_filter() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    store.put_one("google", "user", "a@b.com").unwrap();
    store.put_one("google", "pass", "p4ss").unwrap();
    store.put_one("google", "totp", "JBSWY3DP").unwrap();

    let all = store.get_all("google", &[]).expect("get_all should succeed");
    let expected: BTreeMap<String, String> = [
        ("pass", "p4ss"),
        ("totp", "JBSWY3DP"),
        ("user", "a@b.com"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(all, expected);

    let some = store
        .get_all("google", &["user", "nope"])
        .expect("get_all should succeed");
    assert_eq!(some.len(), 1);
    assert_eq!(some["user"], "a@b.com");
}

#[test]
fn test_delete_all_removes_namespace() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    store.put_one("google", "user", "a@b.com").unwrap();
    store.put_one("github", "token", "ghp_x").unwrap();

    store.delete_all("google").expect("delete_all should succeed");

    assert_eq!(store.namespaces().unwrap(), vec!["github".to_string()]);
    assert!(matches!(
        store.get_one("google", "user"),
        Err(LockerError::NamespaceNotFound(ns)) if ns == "google"
    ));
    assert!(matches!(
        store.delete_all("google"),
        Err(LockerError::NamespaceNotFound(_))
    ));
}

#[test]
fn test_values_persist_across_reopen() {
    let temp = TempStore::new();
    {
        let store = temp.open("MAGIK");
        store.put_one("google", "user", "a@b.com").unwrap();
        store.close().expect("close should succeed");
    }

    let store = temp.open("MAGIK");
    assert_eq!(
        store.get_one("google", "user").unwrap().as_deref(),
        Some("a@b.com")
    );
    assert_eq!(store.keys("google").unwrap(), vec!["user".to_string()]);
}

#[test]
fn test_wrong_secret_fails_authentication() {
    let temp = TempStore::new();
    {
        let store = temp.open("X");
        store.put_one("google", "user", "a@b.com").unwrap();
        store.close().unwrap();
    }

    let store = temp.open("Y");
    let err = store.get_one("google", "user").unwrap_err();
    assert!(matches!(err, LockerError::AuthenticationFailure));
    assert_eq!(err.hint(), Some("double check your master secret"));

    assert!(matches!(
        store.get_all("google", &[]),
        Err(LockerError::AuthenticationFailure)
    ));
    // Listing needs no decryption.
    assert_eq!(store.keys("google").unwrap(), vec!["user".to_string()]);
}

#[test]
fn test_namespaces_are_isolated() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    store.put_one("a", "k", "from-a").unwrap();
    store.put_one("b", "k", "from-b").unwrap();

    store.delete_one("a", "k").unwrap();

    assert_eq!(store.get_one("a", "k").unwrap(), None);
    assert_eq!(store.get_one("b", "k").unwrap().as_deref(), Some("from-b"));
    assert_eq!(
        store.namespaces().unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
}

#[test]
fn test_delete_one_is_idempotent() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    store.put_one("ns", "k", "v").unwrap();

    store.delete_one("ns", "k").expect("first delete should succeed");
    store.delete_one("ns", "k").expect("second delete should succeed");
    store.delete_one("ns", "never").expect("missing key delete should succeed");

    assert!(store.keys("ns").unwrap().is_empty());
}

#[test]
fn test_overwrite_replaces_value() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    store.put_one("ns", "k", "old").unwrap();
    store.put_one("ns", "k", "new").unwrap();

    assert_eq!(store.get_one("ns", "k").unwrap().as_deref(), Some("new"));
    assert_eq!(store.keys("ns").unwrap(), vec!["k".to_string()]);
}

#[test]
fn test_missing_namespace_reported_everywhere() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    let missing = |result: locker_core::Result<()>| {
        assert!(
            matches!(result, Err(LockerError::NamespaceNotFound(ref ns)) if ns == "ghost"),
            "unexpected result: {:?}",
            result
        );
    };

    missing(store.get_one("ghost", "k").map(|_| ()));
    missing(store.get_all("ghost", &[]).map(|_| ()));
    missing(store.keys("ghost").map(|_| ()));
    missing(store.contains("ghost", "k").map(|_| ()));
    missing(store.delete_one("ghost", "k"));
    missing(store.delete_all("ghost"));

    assert!(store.namespaces().unwrap().is_empty());
}

#[test]
fn test_empty_arguments_rejected() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");

    assert!(matches!(store.put_one("", "k", "v"), Err(LockerError::EmptyNamespace)));
    assert!(matches!(store.put_one("ns", "", "v"), Err(LockerError::EmptyKey)));
    assert!(matches!(store.get_one("", "k"), Err(LockerError::EmptyNamespace)));
    assert!(matches!(store.get_one("ns", ""), Err(LockerError::EmptyKey)));
    assert!(matches!(store.get_all("", &[]), Err(LockerError::EmptyNamespace)));
    assert!(matches!(store.get_all("ns", &[""]), Err(LockerError::EmptyKey)));
    assert!(matches!(store.delete_one("", "k"), Err(LockerError::EmptyNamespace)));
    assert!(matches!(store.delete_all(""), Err(LockerError::EmptyNamespace)));
    assert!(matches!(store.keys(""), Err(LockerError::EmptyNamespace)));

    assert!(store.namespaces().unwrap().is_empty());
}

#[test]
fn test_empty_value_is_allowed() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    store.put_one("ns", "k", "").unwrap();
    assert_eq!(store.get_one("ns", "k").unwrap().as_deref(), Some(""));
}

#[test]
fn test_value_size_limit() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");

    let at_limit = "x".repeat(MAX_VALUE_BYTES);
    store.put_one("ns", "big", &at_limit).expect("value at limit should fit");
    assert_eq!(store.get_one("ns", "big").unwrap().map(|v| v.len()), Some(MAX_VALUE_BYTES));

    let over = "x".repeat(MAX_VALUE_BYTES + 1);
    assert!(matches!(
        store.put_one("ns", "huge", &over),
        Err(LockerError::ValueTooLarge { size, max }) if size == MAX_VALUE_BYTES + 1 && max == MAX_VALUE_BYTES
    ));
    assert!(!store.contains("ns", "huge").unwrap());
}

#[test]
fn test_keys_and_namespaces_are_byte_ordered() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    for ns in ["zeta", "Alpha", "alpha", "_x"] {
        store.put_one(ns, "k", "v").unwrap();
    }
    for key in ["b", "B", "a/b", "a", "ä"] {
        store.put_one("alpha", key, "v").unwrap();
    }

    assert_eq!(store.namespaces().unwrap(), vec!["Alpha", "_x", "alpha", "zeta"]);
    assert_eq!(store.keys("alpha").unwrap(), vec!["B", "a", "a/b", "b", "k", "ä"]);
    let all: Vec<String> = store.get_all("alpha", &[]).unwrap().into_keys().collect();
    assert_eq!(all, vec!["B", "a", "a/b", "b", "k", "ä"]);
}

#[test]
fn test_second_open_times_out_while_locked() {
    let temp = TempStore::new();
    let first = temp.open("MAGIK");
    first.put_one("ns", "k", "v").unwrap();

    let second = open_at(&temp.path(), "MAGIK", Duration::from_millis(200));
    match second {
        Err(LockerError::StoreUnavailable(msg)) => assert!(msg.contains("open"), "{}", msg),
        other => panic!("expected StoreUnavailable, got {:?}", other),
    }

    first.close().unwrap();

    let reopened = open_at(&temp.path(), "MAGIK", Duration::from_millis(200))
        .expect("open after close should succeed");
    assert_eq!(reopened.get_one("ns", "k").unwrap().as_deref(), Some("v"));
}

#[test]
fn test_drop_releases_lock() {
    let temp = TempStore::new();
    drop(temp.open("MAGIK"));
    let store = open_at(&temp.path(), "MAGIK", Duration::from_millis(200))
        .expect("open after drop should succeed");
    store.close().unwrap();
}

#[test]
fn test_operations_after_close_fail() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    store.put_one("ns", "k", "v").unwrap();

    store.close().expect("close should succeed");
    store.close().expect("second close should succeed");

    assert!(matches!(
        store.get_one("ns", "k"),
        Err(LockerError::StoreUnavailable(msg)) if msg.contains("closed")
    ));
    assert!(matches!(
        store.put_one("ns", "k", "v"),
        Err(LockerError::StoreUnavailable(_))
    ));
    assert!(matches!(store.namespaces(), Err(LockerError::StoreUnavailable(_))));
}

#[test]
fn test_put_if_absent() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");

    assert!(store.put_if_absent("ns", "k", "first").unwrap());
    assert!(!store.put_if_absent("ns", "k", "second").unwrap());
    assert_eq!(store.get_one("ns", "k").unwrap().as_deref(), Some("first"));
    assert!(store.contains("ns", "k").unwrap());
    assert!(!store.contains("ns", "other").unwrap());
}

#[test]
fn test_put_many_and_put_many_if_absent() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");

    store
        .put_many("ns", &[("a", "1"), ("b", "2")])
        .expect("put_many should succeed");
    assert_eq!(store.keys("ns").unwrap(), vec!["a", "b"]);

    let written = store
        .put_many_if_absent("ns", &[("b", "changed"), ("c", "3")])
        .expect("put_many_if_absent should succeed");
    assert_eq!(written, 1);
    assert_eq!(store.get_one("ns", "b").unwrap().as_deref(), Some("2"));
    assert_eq!(store.get_one("ns", "c").unwrap().as_deref(), Some("3"));

    store.put_many("ns", &[("a", "10"), ("d", "4")]).unwrap();
    assert_eq!(store.get_one("ns", "a").unwrap().as_deref(), Some("10"));
    assert_eq!(store.keys("ns").unwrap(), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_oversized_item_rejects_whole_batch() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    let over = "x".repeat(MAX_VALUE_BYTES + 1);

    let result = store.put_many("ns", &[("a", "1"), ("b", over.as_str())]);
    assert!(matches!(result, Err(LockerError::ValueTooLarge { .. })));
    assert!(store.namespaces().unwrap().is_empty());
}

#[test]
fn test_non_database_file_is_unavailable() {
    let temp = TempStore::new();
    fs::write(temp.path(), b"definitely not a sqlite database, just some text padding it out")
        .unwrap();

    let result = open_at(&temp.path(), "MAGIK", Duration::from_millis(200));
    assert!(matches!(result, Err(LockerError::StoreUnavailable(_))));
}

#[test]
fn test_open_creates_parent_directories() {
    let temp = TempStore::new();
    let path = temp.dir.path().join("nested").join("deeper").join("s.db");

    let store = open_at(&path, "MAGIK", Duration::from_secs(1)).expect("open should succeed");
    assert!(path.exists());
    assert_eq!(store.path(), path.as_path());
    store.check_integrity().expect("fresh store should be intact");
}

#[cfg(unix)]
fn mode_of(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).expect("file should exist").permissions().mode() & 0o777
}

#[cfg(unix)]
fn journal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push("-journal");
    PathBuf::from(name)
}

#[cfg(unix)]
#[test]
fn test_store_file_is_owner_only() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");
    store.put_one("google", "user", "a@b.com").unwrap();

    assert_eq!(mode_of(&temp.path()), 0o600);
    let journal = journal_path(&temp.path());
    assert!(journal.exists(), "exclusive mode keeps the journal while open");
    assert_eq!(mode_of(&journal), 0o600);

    store.close().unwrap();
    assert_eq!(mode_of(&temp.path()), 0o600);
}

#[cfg(unix)]
#[test]
fn test_open_restricts_existing_world_readable_files() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempStore::new();
    temp.open("MAGIK").close().unwrap();

    let journal = journal_path(&temp.path());
    fs::write(&journal, b"").unwrap();
    for path in [temp.path(), journal.clone()] {
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    }

    let store = temp.open("MAGIK");
    assert_eq!(mode_of(&temp.path()), 0o600);
    assert_eq!(mode_of(&journal), 0o600);
    store.close().unwrap();
}

#[test]
fn test_store_is_usable_as_trait_object() {
    let temp = TempStore::new();
    let store: Box<dyn Store> = Box::new(temp.open("MAGIK"));
    store.put_one("ns", "k", "v").unwrap();
    assert_eq!(store.get_one("ns", "k").unwrap().as_deref(), Some("v"));
    store.close().unwrap();
}

#[test]
fn test_duplicate_keys_in_conditional_batch_keep_first() {
    let temp = TempStore::new();
    let store = temp.open("MAGIK");

    let written = store
        .put_many_if_absent("ns", &[("k", "first"), ("k", "second")])
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(store.get_one("ns", "k").unwrap().as_deref(), Some("first"));
}
