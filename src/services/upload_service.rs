use crate::services::storage::StorageBackend;
use crate::utils::validation::sanitize_filename;
use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// One file entry as received in the multipart request. The filename is the
/// untrusted client-supplied string, possibly empty.
pub struct RawUpload {
    pub filename: String,
    pub data: Bytes,
}

/// A staged file owned by the pipeline for exactly one iteration: it is
/// either committed away or discarded before the iteration ends.
struct StagedFile {
    name: String,
    path: PathBuf,
    size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Error,
}

/// Per-file outcome of one batch entry, in input order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadOutcome {
    pub name: String,
    pub status: UploadStatus,
    /// Backend identifier on success, error message on failure
    pub detail: String,
}

impl UploadOutcome {
    fn success(name: &str, id: String) -> Self {
        Self {
            name: name.to_string(),
            status: UploadStatus::Success,
            detail: id,
        }
    }

    fn error(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: UploadStatus::Error,
            detail: message,
        }
    }
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<UploadOutcome>,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.status == UploadStatus::Success)
    }
}

/// Whole-batch validation failures. No staging or backend call has happened
/// when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
}

/// Orchestrates sanitize -> stage -> commit -> cleanup for each file of a
/// batch. Entries are processed in input order and independently: one bad
/// file records its own error and never stops its siblings, and the staged
/// copy is removed on the success and failure paths alike.
pub struct UploadService {
    staging_dir: PathBuf,
    storage: Arc<dyn StorageBackend>,
}

impl UploadService {
    pub fn new(staging_dir: PathBuf, storage: Arc<dyn StorageBackend>) -> std::io::Result<Self> {
        std::fs::create_dir_all(&staging_dir)?;
        Ok(Self {
            staging_dir,
            storage,
        })
    }

    pub async fn handle_batch(&self, batch: Vec<RawUpload>) -> Result<BatchOutcome, BatchError> {
        if batch.is_empty() {
            return Err(BatchError::NoFilePart);
        }
        if batch.iter().any(|entry| entry.filename.is_empty()) {
            return Err(BatchError::NoSelectedFile);
        }

        let mut results = Vec::with_capacity(batch.len());
        for entry in &batch {
            results.push(self.process_entry(entry).await);
        }

        let failed = results
            .iter()
            .filter(|r| r.status == UploadStatus::Error)
            .count();
        if failed > 0 {
            tracing::warn!("Batch finished with {}/{} failures", failed, results.len());
        } else {
            tracing::info!("Batch of {} file(s) uploaded", results.len());
        }

        Ok(BatchOutcome { results })
    }

    async fn process_entry(&self, entry: &RawUpload) -> UploadOutcome {
        let name = match sanitize_filename(&entry.filename) {
            Ok(name) => name,
            Err(e) => return UploadOutcome::error(&entry.filename, e.to_string()),
        };

        let staged = match self.stage(&name, &entry.data).await {
            Ok(staged) => staged,
            Err(e) => {
                return UploadOutcome::error(&name, format!("Staging failed: {e}"));
            }
        };
        tracing::debug!(
            "Staged '{}' ({} bytes) at {}",
            staged.name,
            staged.size,
            staged.path.display()
        );

        let committed = self.storage.commit(&staged.path, &staged.name).await;

        // The staged copy must not outlive this iteration, whatever the
        // commit outcome was
        self.discard(&staged.path).await;

        match committed {
            Ok(id) => UploadOutcome::success(&staged.name, id),
            Err(e) => UploadOutcome::error(&staged.name, e.to_string()),
        }
    }

    /// Writes the entry's bytes under a per-request unique key so that
    /// concurrent uploads of the same filename never share a staged path.
    async fn stage(&self, name: &str, data: &Bytes) -> std::io::Result<StagedFile> {
        let key = format!("{}_{}", Uuid::new_v4().simple(), name);
        let path = self.staging_dir.join(key);
        tokio::fs::write(&path, data).await?;
        Ok(StagedFile {
            name: name.to_string(),
            path,
            size: data.len(),
        })
    }

    async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            // A local-backend commit renames the staged file away
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("Failed to remove staged file {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{LocalStorageBackend, StoredObject};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend that fails commits for configured names and records the rest.
    struct FlakyBackend {
        fail_names: Vec<String>,
        committed: Mutex<Vec<String>>,
    }

    impl FlakyBackend {
        fn new(fail_names: &[&str]) -> Self {
            Self {
                fail_names: fail_names.iter().map(|s| s.to_string()).collect(),
                committed: Mutex::new(Vec::new()),
            }
        }

        fn committed(&self) -> Vec<String> {
            self.committed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StorageBackend for FlakyBackend {
        fn kind(&self) -> &'static str {
            "flaky"
        }

        async fn commit(&self, staged: &Path, name: &str) -> Result<String> {
            assert!(staged.exists(), "commit must see the staged file");
            if self.fail_names.iter().any(|n| n == name) {
                return Err(anyhow!("network error"));
            }
            self.committed.lock().unwrap().push(name.to_string());
            Ok(format!("id-{name}"))
        }

        async fn list(&self) -> Result<Vec<StoredObject>> {
            Ok(Vec::new())
        }

        fn download_path(&self, _name: &str) -> Option<PathBuf> {
            None
        }
    }

    fn raw(name: &str, data: &[u8]) -> RawUpload {
        RawUpload {
            filename: name.to_string(),
            data: Bytes::copy_from_slice(data),
        }
    }

    fn staging_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected_before_any_backend_call() {
        let staging = tempfile::tempdir().unwrap();
        let backend = Arc::new(FlakyBackend::new(&[]));
        let service = UploadService::new(staging.path().to_path_buf(), backend.clone()).unwrap();

        let err = service.handle_batch(Vec::new()).await.unwrap_err();
        assert_eq!(err, BatchError::NoFilePart);
        assert!(backend.committed().is_empty());
    }

    #[tokio::test]
    async fn test_empty_filename_aborts_whole_batch() {
        let staging = tempfile::tempdir().unwrap();
        let backend = Arc::new(FlakyBackend::new(&[]));
        let service = UploadService::new(staging.path().to_path_buf(), backend.clone()).unwrap();

        let batch = vec![raw("a.txt", b"hi"), raw("", b"x")];
        let err = service.handle_batch(batch).await.unwrap_err();
        assert_eq!(err, BatchError::NoSelectedFile);
        // No commit was attempted for either entry, including the valid one
        assert!(backend.committed().is_empty());
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn test_successful_batch_reports_one_outcome_per_entry_in_order() {
        let staging = tempfile::tempdir().unwrap();
        let backend = Arc::new(FlakyBackend::new(&[]));
        let service = UploadService::new(staging.path().to_path_buf(), backend.clone()).unwrap();

        let batch = vec![raw("a.txt", b"aa"), raw("b.txt", b"bb"), raw("c.txt", b"cc")];
        let outcome = service.handle_batch(batch).await.unwrap();

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.results.len(), 3);
        let names: Vec<_> = outcome.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
        assert_eq!(outcome.results[0].detail, "id-a.txt");
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn test_commit_failure_is_isolated_and_staging_still_cleaned() {
        let staging = tempfile::tempdir().unwrap();
        let backend = Arc::new(FlakyBackend::new(&["b.txt"]));
        let service = UploadService::new(staging.path().to_path_buf(), backend.clone()).unwrap();

        let batch = vec![raw("a.txt", b"aa"), raw("b.txt", b"bb")];
        let outcome = service.handle_batch(batch).await.unwrap();

        assert!(!outcome.all_succeeded());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].status, UploadStatus::Success);
        assert_eq!(outcome.results[1].status, UploadStatus::Error);
        assert!(outcome.results[1].detail.contains("network error"));
        // Only the good file got a durable record
        assert_eq!(backend.committed(), vec!["a.txt".to_string()]);
        // Both staged copies are gone, failure path included
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn test_unsanitizable_name_fails_only_that_entry() {
        let staging = tempfile::tempdir().unwrap();
        let backend = Arc::new(FlakyBackend::new(&[]));
        let service = UploadService::new(staging.path().to_path_buf(), backend.clone()).unwrap();

        let batch = vec![raw("..", b"evil"), raw("ok.txt", b"fine")];
        let outcome = service.handle_batch(batch).await.unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].status, UploadStatus::Error);
        assert_eq!(outcome.results[1].status, UploadStatus::Success);
        assert_eq!(backend.committed(), vec!["ok.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_traversal_name_is_neutralized_before_staging() {
        let staging = tempfile::tempdir().unwrap();
        let backend = Arc::new(FlakyBackend::new(&[]));
        let service = UploadService::new(staging.path().to_path_buf(), backend.clone()).unwrap();

        let batch = vec![raw("../../etc/passwd", b"pwned")];
        let outcome = service.handle_batch(batch).await.unwrap();

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.results[0].name, "passwd");
    }

    #[tokio::test]
    async fn test_local_backend_single_upload_leaves_one_object_no_staging() {
        let staging = tempfile::tempdir().unwrap();
        let durable = tempfile::tempdir().unwrap();
        let backend =
            Arc::new(LocalStorageBackend::new(durable.path().to_path_buf()).unwrap());
        let service = UploadService::new(staging.path().to_path_buf(), backend.clone()).unwrap();

        let outcome = service
            .handle_batch(vec![raw("note.txt", b"hello")])
            .await
            .unwrap();

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.results[0].detail, "note.txt");
        assert_eq!(
            std::fs::read(durable.path().join("note.txt")).unwrap(),
            b"hello"
        );
        assert!(staging_is_empty(staging.path()));
    }
}
