use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::LogStoreError;

const ACTIVE_EXT: &str = ".log";
const ARCHIVE_EXT: &str = ".gz.b64";

/// Append-only per-check logs plus their compressed archives
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one line to the active log `id`, creating it if needed
    async fn append(&self, id: &str, line: &str) -> Result<(), LogStoreError>;

    /// Names of active logs, and archives when `include_archived` is set
    async fn list(&self, include_archived: bool) -> Result<Vec<String>, LogStoreError>;

    /// Copy the active log `id` into a new compressed archive
    async fn compress(&self, id: &str, archive_id: &str) -> Result<(), LogStoreError>;

    /// Contents of an archive
    async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError>;

    /// Empty the active log `id`
    async fn truncate(&self, id: &str) -> Result<(), LogStoreError>;
}

/// Logs kept as `<dir>/<id>.log`, archives as gzip + base64 in `<dir>/<archive>.gz.b64`
pub struct FileLogStore {
    dir: PathBuf,
}

impl FileLogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn active_path(&self, id: &str) -> Result<PathBuf, LogStoreError> {
        Ok(self.dir.join(format!("{}{ACTIVE_EXT}", file_stem(id)?)))
    }

    fn archive_path(&self, archive_id: &str) -> Result<PathBuf, LogStoreError> {
        Ok(self.dir.join(format!("{}{ARCHIVE_EXT}", file_stem(archive_id)?)))
    }
}

/// Names must stay inside the log directory
fn file_stem(name: &str) -> Result<&str, LogStoreError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(LogStoreError::InvalidName(name.to_string()));
    }
    Ok(name)
}

fn gzip(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    encoder.finish()
}

fn gunzip(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    GzDecoder::new(compressed).read_to_end(&mut raw)?;
    Ok(raw)
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, id: &str, line: &str) -> Result<(), LogStoreError> {
        fs::create_dir_all(&self.dir).await?;

        let mut file =
            OpenOptions::new().create(true).append(true).open(self.active_path(id)?).await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    async fn list(&self, include_archived: bool) -> Result<Vec<String>, LogStoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };

            if let Some(name) = file_name.strip_suffix(ACTIVE_EXT) {
                names.push(name.to_string());
            } else if let Some(name) = file_name.strip_suffix(ARCHIVE_EXT) {
                if include_archived {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        Ok(names)
    }

    async fn compress(&self, id: &str, archive_id: &str) -> Result<(), LogStoreError> {
        let archive_path = self.archive_path(archive_id)?;
        let raw = fs::read(self.active_path(id)?).await?;
        let encoded = STANDARD.encode(gzip(&raw)?);

        let mut archive = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(archive_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LogStoreError::ArchiveExists(archive_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        archive.write_all(encoded.as_bytes()).await?;
        archive.flush().await?;

        Ok(())
    }

    async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError> {
        let encoded = fs::read_to_string(self.archive_path(archive_id)?).await?;
        let compressed = STANDARD.decode(encoded.trim())?;

        Ok(String::from_utf8(gunzip(&compressed)?)?)
    }

    async fn truncate(&self, id: &str) -> Result<(), LogStoreError> {
        let file = OpenOptions::new().write(true).open(self.active_path(id)?).await?;
        file.set_len(0).await?;

        Ok(())
    }
}
