pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::storage::StorageBackend;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::upload_files,
        api::handlers::files::download_file,
        api::handlers::files::list_files,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::files::UploadResponse,
            api::handlers::files::ListResponse,
            api::handlers::health::HealthResponse,
            services::upload_service::UploadOutcome,
            services::upload_service::UploadStatus,
            services::storage::StoredObject,
        )
    ),
    tags(
        (name = "files", description = "File upload and browsing endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub uploads: Arc<UploadService>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::files::home))
        .route("/health", get(api::handlers::health::health_check))
        .route("/upload", post(api::handlers::files::upload_files))
        .route("/files/:name", get(api::handlers::files::download_file))
        .route("/list-files", get(api::handlers::files::list_files))
        .route("/browse", get(api::handlers::files::browse))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_upload_size + 10 * 1024 * 1024, // multipart overhead allowance
        ))
        .with_state(state)
}
