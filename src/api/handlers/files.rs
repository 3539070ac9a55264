use crate::api::error::AppError;
use crate::services::storage::StoredObject;
use crate::services::upload_service::{RawUpload, UploadOutcome};
use crate::utils::validation::sanitize_filename;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<UploadOutcome>,
}

#[derive(Serialize, ToSchema)]
pub struct ListResponse {
    pub files: Vec<StoredObject>,
}

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>File Upload</title>
</head>
<body>
    <h1>Upload Files</h1>
    <form action="/upload" method="post" enctype="multipart/form-data">
        <input type="file" name="file" multiple>
        <button type="submit">Upload</button>
    </form>
    <p><a href="/browse">Browse Uploaded Files</a></p>
</body>
</html>
"#;

pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content = String,
        description = "Multipart form with one or more repeated 'file' fields",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "All files uploaded", body = UploadResponse),
        (status = 400, description = "Empty batch or missing filename"),
        (status = 500, description = "One or more files failed to commit")
    )
)]
pub async fn upload_files(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut batch = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        batch.push(RawUpload { filename, data });
    }

    let outcome = state
        .uploads
        .handle_batch(batch)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if outcome.all_succeeded() {
        let response = UploadResponse {
            message: "Files uploaded successfully".to_string(),
            files: outcome.results,
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    } else {
        // Partial failure: per-entry detail lets the caller tell the good
        // files from the bad ones
        let body = serde_json::json!({
            "error": "One or more files failed to upload",
            "details": outcome.results,
        });
        Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
    }
}

#[utoipa::path(
    get,
    path = "/files/{name}",
    params(("name" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "File streamed as attachment"),
        (status = 404, description = "File not found or backend is remote")
    )
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let safe = sanitize_filename(&name).map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Downloads are only served from local storage; the remote backend is
    // addressed through the links the listing returns
    let path = state
        .storage
        .download_path(&safe)
        .ok_or_else(|| AppError::NotFound(format!("File '{}' not found", safe)))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| AppError::NotFound(format!("File '{}' not found", safe)))?;

    let headers = [
        (
            header::CONTENT_TYPE,
            mime::APPLICATION_OCTET_STREAM.as_ref().to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", safe),
        ),
    ];
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body))
}

#[utoipa::path(
    get,
    path = "/list-files",
    responses(
        (status = 200, description = "Stored objects from the active backend", body = ListResponse),
        (status = 500, description = "Backend listing failed")
    )
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
) -> Result<Json<ListResponse>, AppError> {
    let files = state
        .storage
        .list()
        .await
        .map_err(|e| AppError::Internal(format!("Listing failed: {e}")))?;
    Ok(Json(ListResponse { files }))
}

pub async fn browse(State(state): State<crate::AppState>) -> Result<Html<String>, AppError> {
    let files = state
        .storage
        .list()
        .await
        .map_err(|e| AppError::Internal(format!("Listing failed: {e}")))?;

    let items: String = files
        .iter()
        .map(|f| {
            format!(
                "<li><a href=\"{}\" download>{}</a></li>\n",
                f.link,
                html_escape(&f.name)
            )
        })
        .collect();

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>File Browser</title>
</head>
<body>
    <h1>Uploaded Files</h1>
    <ul>
{items}    </ul>
</body>
</html>
"#
    )))
}

fn html_escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            c => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a&b.txt"), "a&amp;b.txt");
        assert_eq!(html_escape("plain.txt"), "plain.txt");
        assert_eq!(html_escape("\"x\".txt"), "&quot;x&quot;.txt");
    }
}
