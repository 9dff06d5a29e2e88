//! Level loading and caching
//!
//! Levels are static JSON files read from a single directory. A level is
//! parsed at most once per process: successful parses are cached as shared
//! `Arc<Level>` values, and malformed files are cached as absent so a broken
//! file is not re-read on every join. A missing or unreadable file is not
//! cached, so a level dropped into the directory later becomes joinable. The
//! raw file contents are also served over HTTP, and that path always reads the
//! file as stored.
//!
//! [`LevelStore::load`] reads from disk on a cache miss and blocks the calling
//! thread while doing so. Async callers use [`LevelStore::warm`] first, which
//! does the read on the blocking pool.

use crate::error::LevelError;
use crate::utils::is_valid_level_name;
use log::{info, warn};
use shared::Level;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub struct LevelStore {
    dir: PathBuf,
    /// `None` marks a level that failed to load
    cache: Mutex<HashMap<String, Option<Arc<Level>>>>,
}

impl LevelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves a level name to its file, rejecting names that could escape the directory
    pub fn path_for(&self, name: &str) -> Result<PathBuf, LevelError> {
        if !is_valid_level_name(name) {
            return Err(LevelError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }

    /// Loads a level by name, hitting storage only on a cache miss
    pub fn load(&self, name: &str) -> Result<Arc<Level>, LevelError> {
        self.load_quiet(name).map_err(|e| {
            warn!("Level '{}' unavailable: {}", name, e);
            e
        })
    }

    /// Loads `name` into the cache on the blocking pool
    pub async fn warm(self: &Arc<Self>, name: &str) -> Result<Arc<Level>, LevelError> {
        let store = Arc::clone(self);
        let name = name.to_string();
        tokio::task::spawn_blocking(move || store.load_quiet(&name)).await?
    }

    fn load_quiet(&self, name: &str) -> Result<Arc<Level>, LevelError> {
        let path = self.path_for(name)?;

        if let Some(cached) = self.cache().get(name) {
            return cached
                .clone()
                .ok_or_else(|| LevelError::NotFound(name.to_string()));
        }

        let result = read_level(name, &path);
        let cacheable = match &result {
            Ok(level) => Some(Some(Arc::clone(level))),
            Err(LevelError::InvalidFormat { .. }) => Some(None),
            Err(_) => None,
        };
        let Some(cacheable) = cacheable else {
            return result;
        };

        let mut cache = self.cache();
        match (cache.entry(name.to_string()).or_insert(cacheable), result) {
            (Some(level), _) => Ok(Arc::clone(level)),
            (None, Err(e)) => Err(e),
            (None, Ok(_)) => Err(LevelError::NotFound(name.to_string())),
        }
    }

    /// Registers an already-built level under `name`, replacing any cached entry
    pub fn insert(&self, name: &str, level: Level) -> Arc<Level> {
        let level = Arc::new(level);
        self.cache()
            .insert(name.to_string(), Some(Arc::clone(&level)));
        level
    }

    /// Reads the level file verbatim for the HTTP endpoint
    pub async fn read_raw(&self, name: &str) -> Result<String, LevelError> {
        let path = self.path_for(name)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error(name, e))
    }

    pub fn cached_count(&self) -> usize {
        self.cache().len()
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<Arc<Level>>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn io_error(name: &str, e: std::io::Error) -> LevelError {
    if e.kind() == ErrorKind::NotFound {
        LevelError::NotFound(name.to_string())
    } else {
        LevelError::Io {
            name: name.to_string(),
            source: e,
        }
    }
}

fn read_level(name: &str, path: &Path) -> Result<Arc<Level>, LevelError> {
    let text = std::fs::read_to_string(path).map_err(|e| io_error(name, e))?;
    let mut level: Level =
        serde_json::from_str(&text).map_err(|source| LevelError::InvalidFormat {
            name: name.to_string(),
            source,
        })?;

    // First template wins when a level repeats an id
    let mut seen = HashSet::new();
    level.collectibles.retain(|template| {
        let fresh = seen.insert(template.id.clone());
        if !fresh {
            warn!(
                "Level '{}' repeats collectible id '{}', skipping duplicate",
                name, template.id
            );
        }
        fresh
    });

    info!(
        "Loaded level '{}' ({} collectibles, {} decorations)",
        name,
        level.collectibles.len(),
        level.decorations.len()
    );
    Ok(Arc::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const YARD: &str = r#"{
        "bounds": {"width": 1200, "height": 900},
        "spawn": {"x": 300, "y": 320},
        "decorations": [{"type": "tree", "x": 10, "y": 10}],
        "collectibles": [
            {"id": "bone1", "tags": ["good", "chew:soft"]},
            {"id": "bone1", "tags": ["bad"]},
            {"id": "shoe", "tags": ["bad", "chew:tough"]}
        ]
    }"#;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, LevelStore) {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(format!("{}.json", name)), body).unwrap();
        }
        let store = LevelStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_load_and_cache() {
        let (_dir, store) = store_with(&[("yard", YARD)]);

        let level = store.load("yard").unwrap();
        assert_eq!(level.spawn.x, 300.0);
        assert_eq!(level.decorations.len(), 1);
        assert_eq!(store.cached_count(), 1);

        let again = store.load("yard").unwrap();
        assert!(Arc::ptr_eq(&level, &again));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let (_dir, store) = store_with(&[("yard", YARD)]);
        let level = store.load("yard").unwrap();
        let ids: Vec<&str> = level.collectibles.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bone1", "shoe"]);
        assert_eq!(level.collectibles[0].tags, vec!["good", "chew:soft"]);
    }

    #[test]
    fn test_missing_level_is_not_remembered() {
        let (dir, store) = store_with(&[]);
        assert!(matches!(store.load("nowhere"), Err(LevelError::NotFound(_))));
        assert_eq!(store.cached_count(), 0);

        fs::write(dir.path().join("nowhere.json"), YARD).unwrap();
        let level = store.load("nowhere").unwrap();
        assert_eq!(level.collectibles.len(), 2);
        assert_eq!(store.cached_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_warm_fills_cache() {
        let (_dir, store) = store_with(&[("yard", YARD)]);
        let store = Arc::new(store);

        let warmed = store.warm("yard").await.unwrap();
        assert_eq!(store.cached_count(), 1);
        assert!(Arc::ptr_eq(&warmed, &store.load("yard").unwrap()));

        assert!(matches!(
            store.warm("missing").await,
            Err(LevelError::NotFound(_))
        ));
        assert_eq!(store.cached_count(), 1);
    }

    #[test]
    fn test_malformed_level_is_cached_as_absent() {
        let (dir, store) = store_with(&[("broken", "{ not json")]);
        assert!(matches!(
            store.load("broken"),
            Err(LevelError::InvalidFormat { .. })
        ));

        // Fixing the file on disk does not help: the failure is remembered
        fs::write(dir.path().join("broken.json"), YARD).unwrap();
        assert!(matches!(store.load("broken"), Err(LevelError::NotFound(_))));
        assert_eq!(store.cached_count(), 1);
    }

    #[test]
    fn test_invalid_names_never_touch_storage() {
        let (_dir, store) = store_with(&[]);
        assert!(matches!(
            store.load("../etc/passwd"),
            Err(LevelError::InvalidName(_))
        ));
        assert_eq!(store.cached_count(), 0);
    }

    #[test]
    fn test_insert_overrides_cache() {
        let (_dir, store) = store_with(&[]);
        store.insert("custom", Level::empty(100.0, 100.0));
        let level = store.load("custom").unwrap();
        assert_eq!(level.bounds.width, 100.0);
    }

    #[tokio::test]
    async fn test_read_raw_is_verbatim() {
        let (_dir, store) = store_with(&[("yard", YARD)]);
        assert_eq!(store.read_raw("yard").await.unwrap(), YARD);
        assert!(matches!(
            store.read_raw("missing").await,
            Err(LevelError::NotFound(_))
        ));
        assert!(matches!(
            store.read_raw("a/b").await,
            Err(LevelError::InvalidName(_))
        ));
    }
}
