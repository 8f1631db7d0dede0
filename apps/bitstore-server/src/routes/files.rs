//! File Routes
//!
//! HTTP surface of the file orchestrator.
//!
//! Endpoints:
//! - POST /api/v1/files/upload - Upload a file (multipart field `file`)
//! - GET /api/v1/files - List metadata records
//! - GET /api/v1/files/:file_name - Download a file by name
//! - GET /api/v1/files/:file_name/metadata - Metadata record for a file
//! - GET /api/v1/files/download/:id - Download a file by record id

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::files::{FileMetadata, FileOrchestrator, UploadReceipt};

use super::read_file_field;

/// Mount point of the file routes
pub const FILES_PATH: &str = "/api/v1/files";

/// File route state
#[derive(Clone)]
pub struct FilesState {
    pub orchestrator: FileOrchestrator,
}

/// Create the files router
pub fn router<S>(orchestrator: FileOrchestrator) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list_files))
        .route("/upload", post(upload_file))
        .route("/download/:id", get(download_by_id))
        .route("/:file_name", get(download_file))
        .route("/:file_name/metadata", get(file_metadata))
        .with_state(FilesState { orchestrator })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: &'static str,
    #[serde(flatten)]
    receipt: UploadReceipt,
}

/// POST /api/v1/files/upload
async fn upload_file(
    State(state): State<FilesState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let (file_name, data) = read_file_field(&mut multipart).await?;
    let file_name = file_name
        .ok_or_else(|| AppError::BadRequest("The file part has no filename".to_string()))?;

    let receipt = state.orchestrator.upload(&file_name, data).await?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        receipt,
    }))
}

/// GET /api/v1/files
async fn list_files(State(state): State<FilesState>) -> Result<Json<Vec<FileMetadata>>> {
    Ok(Json(state.orchestrator.list().await?))
}

/// GET /api/v1/files/:file_name
async fn download_file(
    State(state): State<FilesState>,
    Path(file_name): Path<String>,
) -> Result<Response> {
    let data = state.orchestrator.download(&file_name).await?;
    attachment(&file_name, data)
}

/// GET /api/v1/files/:file_name/metadata
async fn file_metadata(
    State(state): State<FilesState>,
    Path(file_name): Path<String>,
) -> Result<Json<FileMetadata>> {
    Ok(Json(state.orchestrator.metadata(&file_name).await?))
}

/// GET /api/v1/files/download/:id
async fn download_by_id(
    State(state): State<FilesState>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let (file, data) = state.orchestrator.download_by_id(id).await?;
    attachment(&file.file_name, data)
}

/// Build a download response for reconstructed file bytes
fn attachment(file_name: &str, data: Bytes) -> Result<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, content_disposition(file_name))
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// `attachment; filename="..."`, plus an RFC 5987 `filename*` when the name
/// is not plain ASCII
fn content_disposition(file_name: &str) -> String {
    if file_name.is_ascii() {
        return format!("attachment; filename=\"{}\"", file_name);
    }

    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}
