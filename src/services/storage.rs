use anyhow::Result;
use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

/// Characters that cannot appear raw in a URL path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'/')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A durably committed file as reported by the active backend.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredObject {
    pub name: String,
    /// Backend identifier: the filename for local storage, the opaque
    /// object id for remote storage
    pub id: String,
    /// Addressable download link for this object
    pub link: String,
}

/// System of record for uploaded files. One implementation is selected at
/// startup and never switched at runtime.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Makes a staged file durable under `name` and returns its backend
    /// identifier. A failed commit must leave no durable record behind;
    /// the caller owns cleanup of the staged file either way.
    async fn commit(&self, staged: &Path, name: &str) -> Result<String>;

    /// Full enumeration of stored objects. No caching, no pagination.
    async fn list(&self) -> Result<Vec<StoredObject>>;

    /// Path a named file can be served from, if this backend keeps files
    /// on the local filesystem. Remote backends return `None`.
    fn download_path(&self, name: &str) -> Option<PathBuf>;
}

/// Local filesystem backend: the upload directory is the system of record
/// and files are addressed by their sanitized name.
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    pub fn new(root: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn commit(&self, staged: &Path, name: &str) -> Result<String> {
        let dest = self.root.join(name);
        match tokio::fs::rename(staged, &dest).await {
            Ok(()) => {}
            // Staging may live on a different filesystem; fall back to copy
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                tokio::fs::copy(staged, &dest).await?;
            }
            Err(e) => return Err(e.into()),
        }
        tracing::debug!("Committed '{}' to {}", name, dest.display());
        Ok(name.to_string())
    }

    async fn list(&self) -> Result<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let link = format!("/files/{}", utf8_percent_encode(&name, PATH_SEGMENT));
            objects.push(StoredObject {
                id: name.clone(),
                name,
                link,
            });
        }
        Ok(objects)
    }

    fn download_path(&self, name: &str) -> Option<PathBuf> {
        Some(self.root.join(name))
    }
}
