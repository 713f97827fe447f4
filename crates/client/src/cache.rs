//! Client-side persistent key-value cache.
//!
//! The localStorage analog: one [`CacheStore`] owns the shared state
//! (optionally backed by a JSON file on disk), and each execution context —
//! a tab, a window, a CLI invocation — works through its own
//! [`CacheHandle`] carrying a unique context ID.
//!
//! Mutations go through transactions: every key touched in one transaction
//! is committed, persisted, and announced together, or rolled back together.
//! Committed transactions emit a [`CacheEvent`] on a broadcast channel so
//! other contexts can observe the change; the emitting context is
//! identified in the event so subscribers can ignore their own writes.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Well-known cache keys.
pub mod keys {
    /// Key for the serialized [`crate::types::Cart`].
    pub const CART: &str = "cart";

    /// Key for the serialized [`crate::types::Order`] returned by the last
    /// order creation.
    pub const ORDER_DETAILS: &str = "orderDetails";

    /// Key for the total agreed at order-creation time.
    pub const CACHED_TOTAL: &str = "cachedTotal";
}

/// Broadcast channel capacity for change events.
const EVENT_CAPACITY: usize = 64;

/// Errors from the persistent cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Writing the backing file failed; the transaction was rolled back.
    #[error("failed to persist cache to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading the backing file failed.
    #[error("failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The backing file is not valid cache JSON.
    #[error("corrupt cache file {path}: {source}")]
    CorruptFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A stored entry no longer deserializes to its expected type.
    #[error("corrupt cache entry '{key}': {source}")]
    CorruptEntry {
        key: String,
        source: serde_json::Error,
    },

    /// A value could not be serialized for storage.
    #[error("failed to encode cache entry '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

/// Identifies one execution context sharing the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Announcement of a committed transaction.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Context that performed the mutation.
    pub context: ContextId,
    /// Keys written or removed, in transaction order.
    pub keys: Vec<String>,
}

impl CacheEvent {
    /// Whether the event touched the given key.
    #[must_use]
    pub fn touches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// On-disk representation of the cache.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    updated_at: DateTime<Utc>,
    entries: BTreeMap<String, String>,
}

struct StoreInner {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
    events: broadcast::Sender<CacheEvent>,
}

/// Shared persistent key-value store.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

impl CacheStore {
    /// Create a cache with no backing file. State lives for the lifetime
    /// of the process; used by tests and ephemeral sessions.
    #[must_use]
    pub fn in_memory() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                path: None,
                entries: Mutex::new(BTreeMap::new()),
                events,
            }),
        }
    }

    /// Open a file-backed cache, loading existing entries if the file is
    /// present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let file: CacheFile =
                    serde_json::from_str(&raw).map_err(|source| CacheError::CorruptFile {
                        path: path.clone(),
                        source,
                    })?;
                file.entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(CacheError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(StoreInner {
                path: Some(path),
                entries: Mutex::new(entries),
                events,
            }),
        })
    }

    /// Create a handle for a new execution context.
    #[must_use]
    pub fn handle(&self) -> CacheHandle {
        CacheHandle {
            store: self.clone(),
            context: ContextId::generate(),
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let Some(path) = self.inner.path.as_ref() else {
            return Ok(());
        };

        let file = CacheFile {
            updated_at: Utc::now(),
            entries: entries.clone(),
        };
        let raw = serde_json::to_string(&file).map_err(|source| CacheError::Encode {
            key: "<cache file>".to_string(),
            source,
        })?;

        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|source| CacheError::Persist {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| CacheError::Persist {
            path: path.clone(),
            source,
        })
    }
}

/// One execution context's view of the shared cache.
#[derive(Clone)]
pub struct CacheHandle {
    store: CacheStore,
    context: ContextId,
}

impl CacheHandle {
    /// This context's ID, as carried in emitted events.
    #[must_use]
    pub const fn context_id(&self) -> ContextId {
        self.context
    }

    /// Subscribe to committed-transaction announcements.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.store.inner.events.subscribe()
    }

    /// Read and deserialize the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored entry does not deserialize to `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let entries = lock(&self.store.inner.entries);
        entries
            .get(key)
            .map(|raw| {
                serde_json::from_str(raw).map_err(|source| CacheError::CorruptEntry {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Serialize and store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write-through fails;
    /// on failure the cache is unchanged.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.transaction(|txn| txn.put(key, value))
    }

    /// Remove the entry under `key`. Removing an absent key is a no-op
    /// that emits no event.
    ///
    /// # Errors
    ///
    /// Returns an error if the file write-through fails.
    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.transaction(|txn| {
            txn.remove(key);
            Ok(())
        })
    }

    /// Hash of the raw stored entry, for cheap change detection.
    /// `None` when the key is absent.
    #[must_use]
    pub fn fingerprint(&self, key: &str) -> Option<u64> {
        let entries = lock(&self.store.inner.entries);
        entries.get(key).map(|raw| {
            let mut hasher = DefaultHasher::new();
            raw.hash(&mut hasher);
            hasher.finish()
        })
    }

    /// Run a multi-key transaction.
    ///
    /// The closure mutates a working copy; if it returns `Ok` and the file
    /// write-through succeeds, the copy is committed and one event is
    /// emitted covering every key touched. On any failure the working copy
    /// is discarded and the cache is exactly as before.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error or the write-through failure.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Transaction) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let mut entries = lock(&self.store.inner.entries);
        let mut working = entries.clone();
        let mut txn = Transaction {
            entries: &mut working,
            touched: Vec::new(),
        };

        let value = f(&mut txn)?;
        let touched = txn.touched;

        if touched.is_empty() {
            return Ok(value);
        }

        self.store.persist(&working)?;
        *entries = working;

        // Nobody listening is fine; send only fails with no receivers.
        let _ = self.store.inner.events.send(CacheEvent {
            context: self.context,
            keys: touched,
        });

        Ok(value)
    }
}

/// Working copy of the cache inside a [`CacheHandle::transaction`].
pub struct Transaction<'a> {
    entries: &'a mut BTreeMap<String, String>,
    touched: Vec<String>,
}

impl Transaction<'_> {
    /// Read a value from the working copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored entry does not deserialize to `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        self.entries
            .get(key)
            .map(|raw| {
                serde_json::from_str(raw).map_err(|source| CacheError::CorruptEntry {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Write a value into the working copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), raw);
        self.touch(key);
        Ok(())
    }

    /// Remove a key from the working copy.
    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.touch(key);
        }
    }

    fn touch(&mut self, key: &str) {
        if !self.touched.iter().any(|k| k == key) {
            self.touched.push(key.to_string());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A poisoned lock means a panic mid-transaction; the working-copy
    // design keeps the committed map coherent, so continue with it.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("pomelo-cache-test-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn test_put_get_roundtrip() {
        let handle = CacheStore::in_memory().handle();
        handle.put("k", &vec![1, 2, 3]).unwrap();
        let back: Option<Vec<i32>> = handle.get("k").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_get_absent_is_none() {
        let handle = CacheStore::in_memory().handle();
        let got: Option<String> = handle.get("missing").unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn test_transaction_commits_all_keys_in_one_event() {
        let store = CacheStore::in_memory();
        let writer = store.handle();
        let mut events = writer.subscribe();

        writer
            .transaction(|txn| {
                txn.put("a", &1)?;
                txn.put("b", &2)?;
                txn.remove("c"); // absent, should not appear in the event
                Ok(())
            })
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.context, writer.context_id());
        assert_eq!(event.keys, vec!["a".to_string(), "b".to_string()]);
        assert!(events.try_recv().is_err(), "exactly one event per txn");
    }

    #[test]
    fn test_transaction_error_rolls_back() {
        let handle = CacheStore::in_memory().handle();
        handle.put("a", &1).unwrap();

        let result: Result<(), CacheError> = handle.transaction(|txn| {
            txn.put("a", &2)?;
            Err(CacheError::CorruptEntry {
                key: "a".to_string(),
                source: serde_json::from_str::<i32>("x").unwrap_err(),
            })
        });
        assert!(result.is_err());

        let a: Option<i32> = handle.get("a").unwrap();
        assert_eq!(a, Some(1), "failed transaction must not commit");
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let handle = CacheStore::in_memory().handle();
        assert_eq!(handle.fingerprint("k"), None);

        handle.put("k", &"one").unwrap();
        let first = handle.fingerprint("k");
        assert!(first.is_some());

        handle.put("k", &"two").unwrap();
        assert_ne!(handle.fingerprint("k"), first);

        handle.remove("k").unwrap();
        assert_eq!(handle.fingerprint("k"), None);
    }

    #[test]
    fn test_file_backed_cache_survives_reopen() {
        let path = temp_path();
        {
            let handle = CacheStore::open(&path).unwrap().handle();
            handle.put("k", &"persisted").unwrap();
        }
        {
            let handle = CacheStore::open(&path).unwrap().handle();
            let got: Option<String> = handle.get("k").unwrap();
            assert_eq!(got, Some("persisted".to_string()));
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_corrupt_entry_reports_key() {
        let handle = CacheStore::in_memory().handle();
        handle.put("k", &"text").unwrap();
        let err = handle.get::<i32>("k").unwrap_err();
        assert!(matches!(err, CacheError::CorruptEntry { ref key, .. } if key == "k"));
    }
}
