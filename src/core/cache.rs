//! Memoized single-turn responses, persisted as timestamped snapshot shards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

const SHARD_EXTENSION: &str = "json";
const PARTIAL_EXTENSION: &str = "json.partial";
const SHARD_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model: String,
    pub message: String,
}

impl CacheKey {
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
        }
    }
}

/// On-disk form of a cache entry. Tuple keys have no JSON map form, so a
/// shard is a flat list.
#[derive(Debug, Serialize, Deserialize)]
struct ShardEntry {
    model: String,
    message: String,
    response: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Shard {
    entries: Vec<ShardEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: HashMap<CacheKey, String>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, model: &str, message: &str) -> Option<&str> {
        // Borrowed lookup would need a custom Borrow impl; keys are small.
        self.entries
            .get(&CacheKey::new(model, message))
            .map(String::as_str)
    }

    pub fn insert(&mut self, key: CacheKey, response: impl Into<String>) {
        self.entries.insert(key, response.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into this cache; entries from `other` win.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Write the whole cache as a new snapshot shard in `dir`.
    pub fn save_shard(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| ChatError::cache_io(dir, e))?;

        let file_name = format!(
            "{}.{SHARD_EXTENSION}",
            Local::now().format(SHARD_TIMESTAMP_FORMAT)
        );
        let path = dir.join(file_name);

        let mut entries: Vec<ShardEntry> = self
            .entries
            .iter()
            .map(|(key, response)| ShardEntry {
                model: key.model.clone(),
                message: key.message.clone(),
                response: response.clone(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.model, &a.message).cmp(&(&b.model, &b.message)));

        let json = serde_json::to_string_pretty(&Shard { entries }).map_err(|source| {
            ChatError::CacheFormat {
                path: path.clone(),
                source,
            }
        })?;
        // Written under a non-shard name first so a torn write is never loaded.
        let partial = path.with_extension(PARTIAL_EXTENSION);
        fs::write(&partial, json).map_err(|e| ChatError::cache_io(&partial, e))?;
        fs::rename(&partial, &path).map_err(|e| ChatError::cache_io(&path, e))?;

        debug!("Saved {} cache entries to {}", self.len(), path.display());
        Ok(path)
    }

    /// Merge a single shard file into the cache.
    pub fn load_shard(&mut self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path).map_err(|e| ChatError::cache_io(path, e))?;
        let shard: Shard = serde_json::from_str(&json).map_err(|source| ChatError::CacheFormat {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(
            "Loaded {} cache entries from {}",
            shard.entries.len(),
            path.display()
        );
        for entry in shard.entries {
            self.insert(CacheKey::new(entry.model, entry.message), entry.response);
        }
        Ok(())
    }

    /// Merge every shard in `dir`, oldest first. Returns the number of
    /// shards read. A missing directory loads nothing.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            warn!("Cache directory {} does not exist", dir.display());
            return Ok(0);
        }

        let mut shards = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ChatError::cache_io(dir, e))? {
            let path = entry.map_err(|e| ChatError::cache_io(dir, e))?.path();
            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == SHARD_EXTENSION)
            {
                shards.push(path);
            }
        }
        // Timestamped names sort chronologically, so newer snapshots win.
        shards.sort();

        for path in &shards {
            self.load_shard(path)?;
        }
        Ok(shards.len())
    }
}
