use std::env;
use std::path::PathBuf;

/// Which durable backend the service commits files to. Chosen once at
/// startup; never switched at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Drive,
}

/// Service configuration, loaded once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen port (default: 3000)
    pub port: u16,

    /// Active durable backend (default: local)
    pub backend: BackendKind,

    /// Durable directory for the local backend (default: "uploads")
    pub upload_dir: PathBuf,

    /// Transient staging directory (default: "staging")
    pub staging_dir: PathBuf,

    /// Request body cap in bytes (default: 1 GB)
    pub max_upload_size: usize,

    /// Parent folder id for the Drive backend
    pub drive_folder_id: Option<String>,

    /// Raw service-account credential JSON for the Drive backend
    pub drive_service_account_json: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            backend: BackendKind::Local,
            upload_dir: PathBuf::from("uploads"),
            staging_dir: PathBuf::from("staging"),
            max_upload_size: 1024 * 1024 * 1024, // 1 GB
            drive_folder_id: None,
            drive_service_account_json: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            backend: match env::var("STORAGE_BACKEND").as_deref() {
                Ok("drive") => BackendKind::Drive,
                _ => BackendKind::Local,
            },

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            drive_folder_id: env::var("DRIVE_FOLDER_ID").ok(),

            drive_service_account_json: env::var("DRIVE_SERVICE_ACCOUNT_JSON").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_upload_size, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_backend_selection_from_env() {
        unsafe { env::set_var("STORAGE_BACKEND", "drive") };
        let config = AppConfig::from_env();
        unsafe { env::remove_var("STORAGE_BACKEND") };
        assert_eq!(config.backend, BackendKind::Drive);

        let config = AppConfig::from_env();
        assert_eq!(config.backend, BackendKind::Local);
    }
}
