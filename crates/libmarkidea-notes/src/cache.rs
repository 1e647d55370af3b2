//! Content and preview caches fronting the working trees
//!
//! Both caches are keyed by `NoteKey`, bounded by the summed byte length of
//! their values and expire entries after an idle period that is refreshed on
//! every read and write. Concurrent misses on one key share a single load.
//!
//! A missing note is not an error and is not cached.

use std::path::PathBuf;
use std::sync::Arc;

use libmarkidea_core::config::CacheConfig;
use libmarkidea_core::{MarkideaError, NoteKey};
use moka::sync::Cache;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::index::ContentIndex;

/// Number of characters kept in a preview
pub const PREVIEW_CHARS: usize = 60;

/// Loader failures
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("failed to load note {key}: {reason}")]
    Load { key: String, reason: String },
}

impl From<CacheError> for MarkideaError {
    fn from(err: CacheError) -> Self {
        MarkideaError::Internal(err.to_string())
    }
}

/// Where cache misses read note content from
pub trait NoteSource: Send + Sync {
    /// `Ok(None)` when the note does not exist
    fn read(&self, key: &NoteKey) -> std::io::Result<Option<String>>;
}

/// Reads `<notes_dir>/<username>/<notebook>/<title>.md`
#[derive(Debug, Clone)]
pub struct WorkingTreeSource {
    notes_dir: PathBuf,
}

impl WorkingTreeSource {
    pub fn new(notes_dir: impl Into<PathBuf>) -> Self {
        Self {
            notes_dir: notes_dir.into(),
        }
    }
}

impl NoteSource for WorkingTreeSource {
    fn read(&self, key: &NoteKey) -> std::io::Result<Option<String>> {
        let path = self.notes_dir.join(&key.username).join(key.relative_path());
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// Loader outcome that must not be cached
#[derive(Debug)]
enum Miss {
    Absent,
    Failed(String),
}

fn resolve<V>(key: &NoteKey, result: Result<V, Arc<Miss>>) -> Result<Option<V>, CacheError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(miss) => match miss.as_ref() {
            Miss::Absent => Ok(None),
            Miss::Failed(reason) => Err(CacheError::Load {
                key: format!("{}:{}", key.username, key.relative_path()),
                reason: reason.clone(),
            }),
        },
    }
}

fn weight(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Note content by key
#[derive(Clone)]
pub struct ContentCache {
    cache: Cache<NoteKey, String>,
    source: Arc<dyn NoteSource>,
}

impl ContentCache {
    pub fn new(config: &CacheConfig, source: Arc<dyn NoteSource>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.content_max_bytes)
            .weigher(|_key: &NoteKey, value: &String| weight(value.len()))
            .time_to_idle(config.ttl())
            .build();
        Self { cache, source }
    }

    /// Cached content, loading from the source on a miss
    pub fn get(&self, key: &NoteKey) -> Result<Option<String>, CacheError> {
        let result = self.cache.try_get_with_by_ref(key, || {
            debug!(user = %key.username, path = %key.relative_path(), "content cache miss");
            match self.source.read(key) {
                Ok(Some(content)) => Ok(content),
                Ok(None) => Err(Miss::Absent),
                Err(e) => Err(Miss::Failed(e.to_string())),
            }
        });
        resolve(key, result)
    }

    /// Populate `key` with content already known to the caller
    pub fn put(&self, key: NoteKey, content: String) {
        self.cache.insert(key, content);
    }

    pub fn invalidate(&self, key: &NoteKey) {
        self.cache.invalidate(key);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Whether `key` is currently cached
    pub fn contains(&self, key: &NoteKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Summed byte weight after pending maintenance has run
    pub fn weighted_size(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.weighted_size()
    }
}

/// Short prefix of a note plus its linked index record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotePreview {
    pub preview: String,
    pub record_id: Option<i64>,
}

impl NotePreview {
    pub fn from_content(content: &str, record_id: Option<i64>) -> Self {
        Self {
            preview: content.chars().take(PREVIEW_CHARS).collect(),
            record_id,
        }
    }
}

/// Previews by key, derived from `ContentCache`
#[derive(Clone)]
pub struct PreviewCache {
    cache: Cache<NoteKey, NotePreview>,
    content: ContentCache,
    index: Arc<dyn ContentIndex>,
}

impl PreviewCache {
    pub fn new(config: &CacheConfig, content: ContentCache, index: Arc<dyn ContentIndex>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.preview_max_bytes)
            .weigher(|_key: &NoteKey, value: &NotePreview| {
                weight(value.preview.len() + std::mem::size_of::<i64>())
            })
            .time_to_idle(config.ttl())
            .build();
        Self {
            cache,
            content,
            index,
        }
    }

    pub fn get(&self, key: &NoteKey) -> Result<Option<NotePreview>, CacheError> {
        let result = self.cache.try_get_with_by_ref(key, || {
            let content = match self.content.get(key) {
                Ok(Some(content)) => content,
                Ok(None) => return Err(Miss::Absent),
                Err(e) => return Err(Miss::Failed(e.to_string())),
            };
            let record_id = self
                .index
                .find_by_notebook_and_title(&key.username, &key.notebook, &key.title)
                .map_err(|e| Miss::Failed(e.to_string()))?;
            Ok(NotePreview::from_content(&content, record_id))
        });
        resolve(key, result)
    }

    pub fn invalidate(&self, key: &NoteKey) {
        self.cache.invalidate(key);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn contains(&self, key: &NoteKey) -> bool {
        self.cache.contains_key(key)
    }
}
