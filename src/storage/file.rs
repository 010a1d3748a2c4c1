//! Single-document file backend.

use super::DataStorage;
use super::staging::BlobStage;
use crate::core::{Payload, Result, SaveError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{Level, event};

const STORAGE_DOCUMENT_VERSION: u32 = 1;

// ============================================================================
// Configuration
// ============================================================================

/// On-disk encoding of the storage document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Pretty printed JSON, easy to inspect by hand.
    #[default]
    Json,
    /// Compact binary encoding.
    MessagePack,
}

impl FileFormat {
    /// Picks the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("msgpack") | Some("mpk") => FileFormat::MessagePack,
            _ => FileFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Location of the storage document
    pub path: PathBuf,

    /// Encoding of the document
    pub format: FileFormat,

    /// Create missing parent directories on commit
    pub create_dirs: bool,
}

impl FileStorageConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        Self {
            path,
            format,
            create_dirs: true,
        }
    }

    pub fn format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }
}

// ============================================================================
// Storage Document
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StorageDocument {
    version: u32,
    blobs: BTreeMap<String, Payload>,
}

fn encode_document(document: &StorageDocument, format: FileFormat) -> Result<Vec<u8>> {
    match format {
        FileFormat::Json => Ok(serde_json::to_vec_pretty(document)?),
        FileFormat::MessagePack => rmp_serde::to_vec_named(document).map_err(|e| {
            SaveError::Serialization(format!("Failed to encode storage document: {}", e))
        }),
    }
}

fn decode_document(bytes: &[u8], format: FileFormat) -> Result<StorageDocument> {
    match format {
        FileFormat::Json => Ok(serde_json::from_slice(bytes)?),
        FileFormat::MessagePack => rmp_serde::from_slice(bytes).map_err(|e| {
            SaveError::Serialization(format!("Failed to decode storage document: {}", e))
        }),
    }
}

/// Sibling temp path: the full file name plus `.tmp`, so `save.json` and
/// `save.msgpack` never share one.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn atomic_write(path: &Path, bytes: &[u8], create_dirs: bool) -> Result<()> {
    if create_dirs {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|err| {
                SaveError::Io(format!(
                    "Failed to create parent directory '{}': {}",
                    parent.display(),
                    err
                ))
            })?;
        }
    }

    let tmp = temp_path(path);
    fs::write(&tmp, bytes).await.map_err(|err| {
        SaveError::Io(format!("Failed to write temp file '{}': {}", tmp.display(), err))
    })?;

    fs::rename(&tmp, path).await.map_err(|err| {
        SaveError::Io(format!(
            "Failed to rename temp file '{}' -> '{}': {}",
            tmp.display(),
            path.display(),
            err
        ))
    })?;
    Ok(())
}

// ============================================================================
// File Storage
// ============================================================================

/// Keeps every blob in one document file.
///
/// Writes and deletes are staged in memory. `commit` rewrites the whole
/// document through a temp file and a rename, so a commit is either fully on
/// disk or not at all.
pub struct FileStorage {
    config: FileStorageConfig,
    stage: Mutex<BlobStage>,
}

impl FileStorage {
    /// Opens the document at `config.path`. A missing file is an empty store.
    pub async fn open(config: FileStorageConfig) -> Result<Self> {
        let committed = match fs::read(&config.path).await {
            Ok(bytes) => {
                let document = decode_document(&bytes, config.format)?;
                if document.version > STORAGE_DOCUMENT_VERSION {
                    return Err(SaveError::Storage(format!(
                        "Storage document '{}' has unsupported version {}",
                        config.path.display(),
                        document.version
                    )));
                }
                document.blobs
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(SaveError::Io(format!(
                    "Failed to read storage document '{}': {}",
                    config.path.display(),
                    err
                )));
            }
        };

        event!(
            Level::DEBUG,
            path = %config.path.display(),
            blobs = committed.len(),
            "file storage opened"
        );

        Ok(Self {
            config,
            stage: Mutex::new(BlobStage::from_committed(committed)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn format(&self) -> FileFormat {
        self.config.format
    }

    /// Keys visible after the last commit, in ascending order.
    pub async fn committed_keys(&self) -> Vec<String> {
        self.stage.lock().await.committed().keys().cloned().collect()
    }
}

#[async_trait]
impl DataStorage for FileStorage {
    async fn get_blob(&self, key: &str) -> Result<Option<Payload>> {
        Ok(self.stage.lock().await.get(key))
    }

    async fn set_blob(&self, key: &str, payload: Payload) -> Result<()> {
        self.stage.lock().await.set(key, payload);
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.stage.lock().await.delete(key);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut stage = self.stage.lock().await;
        if !stage.is_dirty() {
            return Ok(());
        }

        let blobs = stage.merged();
        let document = StorageDocument {
            version: STORAGE_DOCUMENT_VERSION,
            blobs,
        };
        let bytes = encode_document(&document, self.config.format)?;
        atomic_write(&self.config.path, &bytes, self.config.create_dirs).await?;

        event!(
            Level::DEBUG,
            path = %self.config.path.display(),
            blobs = document.blobs.len(),
            "file storage committed"
        );
        stage.finish_commit(document.blobs);
        Ok(())
    }
}
