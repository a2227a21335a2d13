//! Persistent property storage
//!
//! Simple string key/value settings that outlive the process. Integers are
//! stored as their decimal string form.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::PropertyError;

#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PropertyError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), PropertyError>;
    async fn remove(&self, key: &str) -> Result<(), PropertyError>;

    /// Flush to durable storage. No-op for memory-only stores.
    async fn save(&self) -> Result<(), PropertyError> {
        Ok(())
    }

    async fn get_int(&self, key: &str) -> Result<i64, PropertyError> {
        let value = self
            .get(key)
            .await?
            .ok_or_else(|| PropertyError::NotFound(key.to_string()))?;
        value
            .trim()
            .parse()
            .map_err(|_| PropertyError::NotAnInteger {
                key: key.to_string(),
                value,
            })
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), PropertyError> {
        self.set(key, &value.to_string()).await
    }

    /// Add `by` to an integer property and return the new value, atomically.
    /// A missing key starts at 0; a non-integer value is left untouched.
    async fn increment_int(&self, key: &str, by: i64) -> Result<i64, PropertyError>;
}

fn increment_in(
    props: &mut BTreeMap<String, String>,
    key: &str,
    by: i64,
) -> Result<i64, PropertyError> {
    let current = match props.get(key) {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|_| PropertyError::NotAnInteger {
                key: key.to_string(),
                value: value.clone(),
            })?,
        None => 0,
    };
    let next = current.saturating_add(by);
    props.insert(key.to_string(), next.to_string());
    Ok(next)
}

/// Memory-only store, for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryPropertyStore {
    props: RwLock<BTreeMap<String, String>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for MemoryPropertyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PropertyError> {
        Ok(self.props.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PropertyError> {
        self.props
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PropertyError> {
        self.props.write().await.remove(key);
        Ok(())
    }

    async fn increment_int(&self, key: &str, by: i64) -> Result<i64, PropertyError> {
        increment_in(&mut *self.props.write().await, key, by)
    }
}

/// JSON-file backed store. Changes are kept in memory until [`save`](PropertyStore::save).
pub struct FilePropertyStore {
    path: PathBuf,
    props: RwLock<BTreeMap<String, String>>,
}

impl FilePropertyStore {
    /// Load `path` if it exists, otherwise start empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PropertyError> {
        let path = path.into();
        let props = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "Properties loaded");
        Ok(Self {
            path,
            props: RwLock::new(props),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PropertyStore for FilePropertyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PropertyError> {
        Ok(self.props.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PropertyError> {
        self.props
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PropertyError> {
        self.props.write().await.remove(key);
        Ok(())
    }

    async fn increment_int(&self, key: &str, by: i64) -> Result<i64, PropertyError> {
        increment_in(&mut *self.props.write().await, key, by)
    }

    async fn save(&self) -> Result<(), PropertyError> {
        let json = serde_json::to_vec_pretty(&*self.props.read().await)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
