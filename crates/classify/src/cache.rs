use anyhow::{Context, Result};
use extract::PathKey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::label::ClassificationResult;

pub type ClassificationMap = BTreeMap<PathKey, ClassificationResult>;

/// Durable storage for the classification map. Saves replace everything.
pub trait CacheStore {
    /// An absent or unreadable store loads as empty.
    fn load(&self) -> ClassificationMap;
    fn save(&self, entries: &ClassificationMap) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Pretty-printed JSON object keyed by serialized path keys.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> ClassificationMap {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ClassificationMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read cache, starting empty");
                return ClassificationMap::new();
            }
        };

        match serde_json::from_str::<ClassificationMap>(&content) {
            Ok(entries) => {
                info!(path = %self.path.display(), entries = entries.len(), "Loaded classification cache");
                entries
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to parse cache, starting empty");
                ClassificationMap::new()
            }
        }
    }

    fn save(&self, entries: &ClassificationMap) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).context("Failed to serialize cache")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write cache to {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Deleted classification cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to delete cache {}", self.path.display())),
        }
    }
}

/// In-memory store; clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<ClassificationMap>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: ClassificationMap) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
            saves: Arc::default(),
        }
    }

    pub fn snapshot(&self) -> ClassificationMap {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> ClassificationMap {
        self.snapshot()
    }

    fn save(&self, entries: &ClassificationMap) -> Result<()> {
        let mut stored = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        *stored = entries.clone();
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.save(&ClassificationMap::new())
    }
}

/// Classification results for the run, owned by one driver.
pub struct ClassificationCache<S: CacheStore> {
    store: S,
    entries: ClassificationMap,
    unsaved: usize,
}

impl<S: CacheStore> ClassificationCache<S> {
    pub fn load(store: S) -> Self {
        let entries = store.load();
        Self {
            store,
            entries,
            unsaved: 0,
        }
    }

    pub fn get(&self, key: &PathKey) -> Option<&ClassificationResult> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: PathKey, result: ClassificationResult) {
        self.entries.insert(key, result);
        self.unsaved += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unsaved(&self) -> usize {
        self.unsaved
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathKey, &ClassificationResult)> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &ClassificationMap {
        &self.entries
    }

    /// Save only when something changed since the last save.
    pub fn checkpoint(&mut self) -> Result<()> {
        if self.unsaved == 0 {
            return Ok(());
        }
        self.save()
    }

    pub fn save(&mut self) -> Result<()> {
        self.store.save(&self.entries)?;
        self.unsaved = 0;
        Ok(())
    }

    /// Drop every entry, in memory and in the store.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.unsaved = 0;
        self.store.clear()
    }

    pub fn into_entries(self) -> ClassificationMap {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{ErrorKind, SensitivityLabel};

    fn sample() -> ClassificationMap {
        let mut map = ClassificationMap::new();
        map.insert(
            PathKey::new("user.json", ["properties", "email"]),
            ClassificationResult::new(SensitivityLabel::PersonalDataHighSensitivity, "email address")
                .with_digest("abc".to_string()),
        );
        map.insert(
            PathKey::new("user.json", ["properties", "flag"]),
            ClassificationResult::error(ErrorKind::Timeout, "timed out"),
        );
        map
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cache.json"));

        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"user.json::properties.email\""));
    }

    #[test]
    fn test_missing_or_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cache.json"));
        assert!(store.load().is_empty());

        std::fs::write(store.path(), "{ broken").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cache.json"));
        store.save(&sample()).unwrap();

        let mut cache = ClassificationCache::load(store);
        assert_eq!(cache.len(), 2);
        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(!dir.path().join("cache.json").exists());

        // clearing twice is fine
        cache.clear().unwrap();
    }

    #[test]
    fn test_checkpoint_only_when_dirty() {
        let store = MemoryStore::new();
        let mut cache = ClassificationCache::load(store.clone());

        cache.checkpoint().unwrap();
        assert_eq!(store.save_count(), 0);

        let (key, value) = sample().into_iter().next().unwrap();
        cache.insert(key.clone(), value);
        assert_eq!(cache.unsaved(), 1);
        cache.checkpoint().unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(cache.unsaved(), 0);
        assert!(store.snapshot().contains_key(&key));
    }

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryStore::with_entries(sample());
        let mut cache = ClassificationCache::load(store.clone());
        cache.save().unwrap();
        assert_eq!(store.load(), sample());
        assert_eq!(cache.into_entries(), sample());
    }
}
