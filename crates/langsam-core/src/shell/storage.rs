//! Named cache stores for shell responses.
//!
//! A store is identified by its generation tag (`shell-v1`) and maps request
//! paths to the last response saved for them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ShellError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellResponse {
    pub status: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ShellResponse {
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", (minutes + 30) / 60)
        } else {
            format!("{}d ago", (minutes + 720) / 1440)
        }
    }
}

pub type CachedResponse = CachedData<ShellResponse>;

/// Storage owned by the shell worker. Writing to a tag creates its store.
pub trait CacheStorage: Send {
    /// Tags of every live store.
    fn keys(&self) -> Result<Vec<String>, ShellError>;

    fn has(&self, tag: &str) -> Result<bool, ShellError>;

    fn get(&self, tag: &str, path: &str) -> Result<Option<CachedResponse>, ShellError>;

    fn put(&mut self, tag: &str, path: &str, response: &ShellResponse) -> Result<(), ShellError>;

    /// Remove a whole store. Returns false if it did not exist.
    fn delete(&mut self, tag: &str) -> Result<bool, ShellError>;
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStorage {
    stores: BTreeMap<String, BTreeMap<String, CachedResponse>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn keys(&self) -> Result<Vec<String>, ShellError> {
        Ok(self.stores.keys().cloned().collect())
    }

    fn has(&self, tag: &str) -> Result<bool, ShellError> {
        Ok(self.stores.contains_key(tag))
    }

    fn get(&self, tag: &str, path: &str) -> Result<Option<CachedResponse>, ShellError> {
        Ok(self
            .stores
            .get(tag)
            .and_then(|store| store.get(path))
            .cloned())
    }

    fn put(&mut self, tag: &str, path: &str, response: &ShellResponse) -> Result<(), ShellError> {
        self.stores
            .entry(tag.to_string())
            .or_default()
            .insert(path.to_string(), CachedData::new(response.clone()));
        Ok(())
    }

    fn delete(&mut self, tag: &str) -> Result<bool, ShellError> {
        Ok(self.stores.remove(tag).is_some())
    }
}

// ============================================================================
// On disk
// ============================================================================

/// One directory per tag, one JSON file per path:
/// `<root>/<tag>/<escaped path>.json`.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ShellError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, tag: &str) -> Result<PathBuf, ShellError> {
        if !is_valid_tag(tag) {
            return Err(ShellError::InvalidTag(tag.to_string()));
        }
        Ok(self.root.join(tag))
    }

    fn entry_path(&self, tag: &str, path: &str) -> Result<PathBuf, ShellError> {
        Ok(self
            .store_dir(tag)?
            .join(format!("{}.json", escape_path(path))))
    }
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag != "."
        && tag != ".."
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl CacheStorage for DiskCacheStorage {
    /// Tags of the stores under the root. Directories whose names could not
    /// be a tag are not stores and are left alone.
    fn keys(&self) -> Result<Vec<String>, ShellError> {
        let mut tags = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if is_valid_tag(name) => tags.push(name.to_string()),
                _ => debug!(dir = ?entry.file_name(), "Skipping non-store directory"),
            }
        }
        tags.sort();
        Ok(tags)
    }

    fn has(&self, tag: &str) -> Result<bool, ShellError> {
        Ok(self.store_dir(tag)?.is_dir())
    }

    fn get(&self, tag: &str, path: &str) -> Result<Option<CachedResponse>, ShellError> {
        let file = self.entry_path(tag, path)?;
        if !file.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&file)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn put(&mut self, tag: &str, path: &str, response: &ShellResponse) -> Result<(), ShellError> {
        std::fs::create_dir_all(self.store_dir(tag)?)?;
        let file = self.entry_path(tag, path)?;
        let contents = serde_json::to_string_pretty(&CachedData::new(response))?;
        std::fs::write(&file, contents)?;
        debug!(tag, path, file = %file.display(), "Stored shell response");
        Ok(())
    }

    fn delete(&mut self, tag: &str) -> Result<bool, ShellError> {
        let dir = self.store_dir(tag)?;
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(true)
    }
}

/// Turn a request path into a file name: unreserved bytes stay, the rest is
/// percent-encoded (`/index.html` → `%2Findex.html`).
fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len() * 3);
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}
