//! Route modules for Bitstore Server

pub mod blocks;
pub mod files;
pub mod health;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Name of the multipart field carrying file or block bytes
pub const FILE_FIELD: &str = "file";

/// Build the full application router for the configured role
pub fn app(state: AppState) -> Router {
    let config = state.config();

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check));

    if let Some(store) = state.served_blocks() {
        router = router.nest(blocks::BLOCKS_PATH, blocks::router(store.clone()));
    }

    if let Some(orchestrator) = state.files() {
        router = router.nest(files::FILES_PATH, files::router(orchestrator.clone()));
    }

    router
        .layer(DefaultBodyLimit::max(config.limits.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Pull the `file` field out of a multipart body, with its filename if any
pub(crate) async fn read_file_field(multipart: &mut Multipart) -> Result<(Option<String>, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?;

        return Ok((file_name, data));
    }

    Err(AppError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}
