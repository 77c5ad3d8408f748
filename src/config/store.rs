//! Flat string key-value storage for session state.
//!
//! Individual reads and writes are atomic; nothing here offers
//! multi-key transactions.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::RwLock;

/// Opaque get/set/remove string store.
///
/// Failures to persist are swallowed: a failed `set` is observably
/// identical to a `set` that never happened.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local store, used in tests and when no disk is wanted.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

/// TOML-backed store that survives process restarts.
///
/// The file is read lazily on first access. Writes go to a sibling temp
/// file which is then renamed over the original.
pub struct FileStore {
    path: PathBuf,
    cache: OnceLock<RwLock<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn values(&self) -> &RwLock<BTreeMap<String, String>> {
        self.cache
            .get_or_init(|| RwLock::new(read_entries(&self.path)))
    }

    /// Apply `change` to a copy of the entries and keep it only if it was
    /// written to disk.
    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) {
        let mut guard = self.values().write();
        let mut next = guard.clone();
        change(&mut next);

        match write_entries(&self.path, &next) {
            Ok(()) => *guard = next,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist session store");
            }
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values().read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| {
            entries.remove(key);
        });
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read session store");
            return BTreeMap::new();
        }
    };

    toml::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Session store is corrupt, starting empty");
        BTreeMap::new()
    })
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string(entries).map_err(io::Error::other)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v");
        assert_eq!(store.get("k"), Some("v".to_string()));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn unwritable_file_store_behaves_as_never_set() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("session.toml");
        fs::create_dir_all(&path).unwrap();

        let store = FileStore::new(&path);
        store.set("auth_token", "abc");
        assert_eq!(store.get("auth_token"), None);
    }
}
