//! Client-local key/value persistence.
//!
//! Progress snapshots, the legacy demographics flag and the completion outbox all sit
//! behind [`KeyValueStore`]. Browsers get `localStorage`, native builds a directory of
//! small JSON files, tests an in-memory map.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend refused the write for lack of space.
    #[error("storage quota exceeded")]
    QuotaExceeded,
    /// The backend cannot be reached at all (no window, no data directory, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Minimal string store. Every `set` replaces the whole value or leaves the old one intact.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys()
    }
}

/// In-memory store with an optional byte budget to mimic browser quotas.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once keys plus values would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a consistent map; keep serving it.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock();
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().keys().cloned().collect())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::FileStore;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fs;
    use std::io::{ErrorKind, Write};
    use std::path::{Path, PathBuf};

    use super::{KeyValueStore, StoreError};

    const EXTENSION: &str = "json";

    /// One file per key inside a directory. Writes go to a sibling temp file and are
    /// renamed into place, so readers only ever see a complete value.
    #[derive(Debug, Clone)]
    pub struct FileStore {
        dir: PathBuf,
    }

    impl FileStore {
        pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
            let dir = dir.into();
            fs::create_dir_all(&dir)?;
            Ok(Self { dir })
        }

        /// Store under the platform data directory (`…/Hearcourse/progress`).
        pub fn open_default() -> Result<Self, StoreError> {
            let dirs = directories::ProjectDirs::from("org", "Hearcourse", "Hearcourse")
                .ok_or_else(|| StoreError::Unavailable("no data directory".into()))?;
            Self::open(dirs.data_dir().join("progress"))
        }

        pub fn dir(&self) -> &Path {
            &self.dir
        }

        fn path_for(&self, key: &str) -> PathBuf {
            self.dir.join(format!("{}.{EXTENSION}", encode_key(key)))
        }
    }

    impl KeyValueStore for FileStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            match fs::read_to_string(self.path_for(key)) {
                Ok(value) => Ok(Some(value)),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            }
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            let target = self.path_for(key);
            let staging = target.with_extension("tmp");
            let written = fs::File::create(&staging).and_then(|mut file| {
                file.write_all(value.as_bytes())?;
                file.sync_all()
            });
            if let Err(err) = written {
                let _ = fs::remove_file(&staging);
                return Err(map_write_error(err));
            }
            fs::rename(&staging, &target).map_err(map_write_error)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            match fs::remove_file(self.path_for(key)) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            }
        }

        fn keys(&self) -> Result<Vec<String>, StoreError> {
            let mut keys = Vec::new();
            for entry in fs::read_dir(&self.dir)? {
                let path = entry?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                    continue;
                }
                if let Some(key) = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(decode_key)
                {
                    keys.push(key);
                }
            }
            keys.sort();
            Ok(keys)
        }
    }

    fn map_write_error(err: std::io::Error) -> StoreError {
        if err.kind() == ErrorKind::StorageFull {
            StoreError::QuotaExceeded
        } else {
            StoreError::Io(err)
        }
    }

    /// Keys contain `/`; file names may not. Hex-escape anything outside `[A-Za-z0-9_-]`.
    fn encode_key(key: &str) -> String {
        let mut encoded = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                encoded.push(byte as char);
            } else {
                encoded.push_str(&format!("~{byte:02x}"));
            }
        }
        encoded
    }

    fn decode_key(encoded: &str) -> Option<String> {
        let mut bytes = Vec::with_capacity(encoded.len());
        let raw = encoded.as_bytes();
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'~' {
                let hex = encoded.get(i + 1..i + 3)?;
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            } else {
                bytes.push(raw[i]);
                i += 1;
            }
        }
        String::from_utf8(bytes).ok()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn key_encoding_round_trips() {
            let key = "progress/p~1/pretest/effort";
            let encoded = encode_key(key);
            assert!(!encoded.contains('/'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }

        #[test]
        fn file_store_replaces_values_whole() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileStore::open(dir.path()).unwrap();
            store.set("progress/p1/pretest/effort", "{\"a\":1}").unwrap();
            store.set("progress/p1/pretest/effort", "{\"a\":2}").unwrap();
            assert_eq!(
                store.get("progress/p1/pretest/effort").unwrap().as_deref(),
                Some("{\"a\":2}")
            );
            assert_eq!(store.keys().unwrap(), vec!["progress/p1/pretest/effort"]);

            store.remove("progress/p1/pretest/effort").unwrap();
            store.remove("progress/p1/pretest/effort").unwrap();
            assert!(store.get("progress/p1/pretest/effort").unwrap().is_none());
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserStore;

#[cfg(target_arch = "wasm32")]
mod browser {
    use wasm_bindgen::JsCast;

    use super::{KeyValueStore, StoreError};

    /// `window.localStorage`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct BrowserStore;

    impl BrowserStore {
        fn storage(&self) -> Result<web_sys::Storage, StoreError> {
            web_sys::window()
                .ok_or_else(|| StoreError::Unavailable("window unavailable".into()))?
                .local_storage()
                .map_err(|_| StoreError::Unavailable("localStorage blocked".into()))?
                .ok_or_else(|| StoreError::Unavailable("localStorage missing".into()))
        }
    }

    impl KeyValueStore for BrowserStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.storage()?
                .get_item(key)
                .map_err(|_| StoreError::Unavailable("localStorage read failed".into()))
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.storage()?.set_item(key, value).map_err(|err| {
                let quota = err
                    .dyn_ref::<web_sys::DomException>()
                    .map(|ex| ex.name() == "QuotaExceededError" || ex.code() == 22)
                    .unwrap_or(false);
                if quota {
                    StoreError::QuotaExceeded
                } else {
                    StoreError::Unavailable("localStorage write failed".into())
                }
            })
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.storage()?
                .remove_item(key)
                .map_err(|_| StoreError::Unavailable("localStorage remove failed".into()))
        }

        fn keys(&self) -> Result<Vec<String>, StoreError> {
            let storage = self.storage()?;
            let len = storage
                .length()
                .map_err(|_| StoreError::Unavailable("localStorage length failed".into()))?;
            let mut keys = Vec::with_capacity(len as usize);
            for index in 0..len {
                if let Ok(Some(key)) = storage.key(index) {
                    keys.push(key);
                }
            }
            Ok(keys)
        }
    }
}

/// The store this platform persists participant data in. Falls back to memory (and
/// says so in the log) when the real backend cannot be opened.
pub fn platform_store() -> Rc<dyn KeyValueStore> {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(BrowserStore)
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        match FileStore::open_default() {
            Ok(store) => Rc::new(store),
            Err(err) => {
                log::warn!("falling back to in-memory progress store: {err}");
                Rc::new(MemoryStore::new())
            }
        }
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Rc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_basic_operations() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
        store.remove("a").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn quota_rejects_without_touching_prior_value() {
        let store = MemoryStore::with_quota(8);
        store.set("k", "1234").unwrap();
        let err = store.set("k", "123456789").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn overwriting_counts_only_new_value() {
        let store = MemoryStore::with_quota(6);
        store.set("k", "12345").unwrap();
        store.set("k", "54321").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("54321"));
    }
}
