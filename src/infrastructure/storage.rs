use crate::config::{AppConfig, BackendKind};
use crate::services::drive::{DriveBackend, ServiceAccountKey};
use crate::services::storage::{LocalStorageBackend, StorageBackend};
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tracing::info;

/// Builds the durable backend selected by configuration. Drive credential
/// problems are fatal here, before the server starts accepting requests.
pub async fn setup_storage(config: &AppConfig) -> Result<Arc<dyn StorageBackend>> {
    match config.backend {
        BackendKind::Local => {
            let backend = LocalStorageBackend::new(config.upload_dir.clone())
                .with_context(|| {
                    format!("Failed to prepare upload dir {}", config.upload_dir.display())
                })?;
            info!("💾 Local storage: {}", config.upload_dir.display());
            Ok(Arc::new(backend))
        }
        BackendKind::Drive => {
            let Some(folder_id) = config.drive_folder_id.clone() else {
                bail!("DRIVE_FOLDER_ID must be set for the drive backend");
            };
            let Some(blob) = config.drive_service_account_json.as_deref() else {
                bail!("DRIVE_SERVICE_ACCOUNT_JSON must be set for the drive backend");
            };
            let key: ServiceAccountKey = serde_json::from_str(blob)
                .context("DRIVE_SERVICE_ACCOUNT_JSON is not a valid credential blob")?;

            let backend = DriveBackend::new(&key, folder_id.clone())?;
            backend
                .verify_credentials()
                .await
                .context("Drive credential check failed")?;

            info!("☁️  Drive storage: folder {}", folder_id);
            Ok(Arc::new(backend))
        }
    }
}
