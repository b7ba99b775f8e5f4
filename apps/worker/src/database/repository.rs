use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

use crate::error::StorageError;

/// Key-value store holding raw check records, grouped by category
#[async_trait]
pub trait CheckStore: Send + Sync {
    /// Ids of every record in a category
    async fn list(&self, category: &str) -> Result<Vec<String>, StorageError>;

    /// Read one record
    async fn read(&self, category: &str, id: &str) -> Result<Value, StorageError>;

    /// Atomically overwrite an existing record
    async fn update(&self, category: &str, id: &str, record: &Value) -> Result<(), StorageError>;

    /// Store a new record
    async fn create(&self, category: &str, id: &str, record: &Value) -> Result<(), StorageError>;
}

/// Names must stay inside the store directory
fn file_stem(name: &str) -> Result<&str, StorageError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Records kept as `<base>/<category>/<id>.json`
pub struct FileCheckStore {
    base_dir: PathBuf,
}

impl FileCheckStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn category_dir(&self, category: &str) -> Result<PathBuf, StorageError> {
        Ok(self.base_dir.join(file_stem(category)?))
    }

    fn record_path(&self, category: &str, id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.category_dir(category)?.join(format!("{}.json", file_stem(id)?)))
    }

    fn not_found(category: &str, id: &str) -> StorageError {
        StorageError::NotFound { category: category.to_string(), id: id.to_string() }
    }

    /// Write next to the target, then rename over it
    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let tmp = path.with_extension(format!("json.tmp-{nanos}"));

        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl CheckStore for FileCheckStore {
    async fn list(&self, category: &str) -> Result<Vec<String>, StorageError> {
        let mut entries = match fs::read_dir(self.category_dir(category)?).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();

        Ok(ids)
    }

    async fn read(&self, category: &str, id: &str) -> Result<Value, StorageError> {
        let raw = match fs::read(self.record_path(category, id)?).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Self::not_found(category, id)),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&raw)?)
    }

    async fn update(&self, category: &str, id: &str, record: &Value) -> Result<(), StorageError> {
        let path = self.record_path(category, id)?;
        if !fs::try_exists(&path).await? {
            return Err(Self::not_found(category, id));
        }

        let contents = serde_json::to_vec(record)?;
        Self::write_atomic(&path, &contents).await
    }

    async fn create(&self, category: &str, id: &str, record: &Value) -> Result<(), StorageError> {
        let path = self.record_path(category, id)?;
        if fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyExists {
                category: category.to_string(),
                id: id.to_string(),
            });
        }

        fs::create_dir_all(self.category_dir(category)?).await?;
        let contents = serde_json::to_vec(record)?;
        Self::write_atomic(&path, &contents).await
    }
}
