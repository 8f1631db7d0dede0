//! Block Routes
//!
//! HTTP surface of the content-addressable block store.
//!
//! Endpoints:
//! - POST /api/v1/blocks - Store a block (raw body or multipart field `file`)
//! - GET /api/v1/blocks/:digest - Fetch block bytes
//! - HEAD /api/v1/blocks/:digest - Check whether a block exists

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::blocks::{BlockStore, Digest, PutOutcome};
use crate::error::{AppError, Result};

use super::read_file_field;

/// Mount point of the block routes
pub const BLOCKS_PATH: &str = "/api/v1/blocks";

/// Block route state
#[derive(Clone)]
pub struct BlocksState {
    pub store: Arc<dyn BlockStore>,
}

/// Create the blocks router
pub fn router<S>(store: Arc<dyn BlockStore>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", post(put_block))
        .route("/:digest", get(get_block).head(head_block))
        .with_state(BlocksState { store })
}

/// POST /api/v1/blocks
///
/// Responds with the canonical digest and whether this request stored it.
async fn put_block(
    State(state): State<BlocksState>,
    request: Request,
) -> Result<Json<PutOutcome>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let data = if is_multipart {
        let mut multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        read_file_field(&mut multipart).await?.1
    } else {
        Bytes::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
    };

    let size = data.len();
    let outcome = state.store.put(data).await?;

    tracing::debug!(
        digest = %outcome.digest,
        size = size,
        created = outcome.created,
        "Block stored"
    );

    Ok(Json(outcome))
}

/// GET /api/v1/blocks/:digest
async fn get_block(
    State(state): State<BlocksState>,
    Path(digest): Path<String>,
) -> Result<Response> {
    let digest = Digest::parse(&digest)?;
    let data = state.store.get(&digest).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    )
        .into_response())
}

/// HEAD /api/v1/blocks/:digest
async fn head_block(
    State(state): State<BlocksState>,
    Path(digest): Path<String>,
) -> Result<StatusCode> {
    let digest = Digest::parse(&digest)?;

    if state.store.exists(&digest).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
