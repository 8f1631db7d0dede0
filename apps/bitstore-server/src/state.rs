//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::blocks::{BlockError, BlockStore, LocalBlockStore, RemoteBlockStore};
use crate::config::Config;
use crate::db::{self, SqliteFileRepository};
use crate::error::AppError;
use crate::files::{FileOrchestrator, OrchestratorOptions};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to open block store: {0}")]
    BlockStoreInit(#[from] BlockError),

    #[error("Failed to initialize database: {0}")]
    DatabaseInit(#[from] AppError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pub config: Config,
    pub served_blocks: Option<Arc<dyn BlockStore>>,
    pub local_blocks: Option<Arc<LocalBlockStore>>,
    pub files: Option<FileOrchestrator>,
    pub db: Option<SqlitePool>,
}

impl AppState {
    /// Create a new application state for the configured role
    ///
    /// The blocks and standalone roles open the on-disk block store. The files
    /// role reaches the block store over HTTP at `BLOCK_STORE_URL`.
    pub async fn new(config: Config) -> Result<Self, StateError> {
        let local_blocks = if config.role.serves_blocks() {
            Some(Arc::new(LocalBlockStore::open(&config.storage).await?))
        } else {
            None
        };

        let (files, db) = if config.role.serves_files() {
            let blocks: Arc<dyn BlockStore> = match &local_blocks {
                Some(local) => local.clone(),
                None => Arc::new(RemoteBlockStore::new(
                    &config.storage,
                    config.limits.operation_timeout,
                )?),
            };

            let pool = db::create_pool(&config.database.url).await?;
            tracing::info!("Database initialized at {}", config.database.url);

            let orchestrator = FileOrchestrator::new(
                blocks,
                Arc::new(SqliteFileRepository::new(pool.clone())),
                OrchestratorOptions::from_config(&config),
            );
            (Some(orchestrator), Some(pool))
        } else {
            (None, None)
        };

        Ok(Self::from_parts(config, local_blocks, files, db))
    }

    /// Assemble state from already-built components
    pub fn from_parts(
        config: Config,
        local_blocks: Option<Arc<LocalBlockStore>>,
        files: Option<FileOrchestrator>,
        db: Option<SqlitePool>,
    ) -> Self {
        let served_blocks = local_blocks
            .clone()
            .map(|store| store as Arc<dyn BlockStore>);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                served_blocks,
                local_blocks,
                files,
                db,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Block store exposed on the HTTP surface, if this role serves one
    pub fn served_blocks(&self) -> Option<&Arc<dyn BlockStore>> {
        self.inner.served_blocks.as_ref()
    }

    /// Get the file orchestrator, if this role serves files
    pub fn files(&self) -> Option<&FileOrchestrator> {
        self.inner.files.as_ref()
    }

    /// Get the database pool, if this role keeps metadata
    pub fn db(&self) -> Option<&SqlitePool> {
        self.inner.db.as_ref()
    }

    /// Release the database pool and the block store
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application state...");

        if let Some(pool) = &self.inner.db {
            pool.close().await;
        }
        if let Some(store) = &self.inner.local_blocks {
            store.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{self, StatusCode};
    use tower::ServiceExt;

    use crate::config::ServiceRole;
    use crate::routes;

    fn config(role: ServiceRole, dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.role = role;
        config.storage.root = dir.path().join("blocks");
        config.database.url = format!("sqlite:{}", dir.path().join("bitstore.db").display());
        config
    }

    async fn status(app: axum::Router, method: &str, uri: &str) -> StatusCode {
        app.oneshot(
            http::Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_standalone_serves_both_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config(ServiceRole::Standalone, &dir)).await.unwrap();
        assert!(state.served_blocks().is_some());
        assert!(state.files().is_some());
        assert!(state.db().is_some());

        let app = routes::app(state.clone());
        assert_eq!(status(app.clone(), "GET", "/health").await, StatusCode::OK);
        assert_eq!(status(app.clone(), "GET", "/api/v1/files").await, StatusCode::OK);
        let missing = format!("/api/v1/blocks/{}", crate::blocks::Digest::of(b"x"));
        assert_eq!(status(app, "HEAD", &missing).await, StatusCode::NOT_FOUND);

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_blocks_role_has_no_file_surface() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config(ServiceRole::Blocks, &dir)).await.unwrap();
        assert!(state.files().is_none());
        assert!(state.db().is_none());

        let app = routes::app(state);
        assert_eq!(status(app, "GET", "/api/v1/files").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_files_role_uses_remote_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config(ServiceRole::Files, &dir)).await.unwrap();
        assert!(state.served_blocks().is_none());
        assert!(state.files().is_some());

        let app = routes::app(state);
        let missing = format!("/api/v1/blocks/{}", crate::blocks::Digest::of(b"x"));
        assert_eq!(status(app, "GET", &missing).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_role() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config(ServiceRole::Blocks, &dir)).await.unwrap();
        let response = routes::app(state)
            .oneshot(
                http::Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "bitstore-server");
        assert_eq!(body["role"], "blocks");
    }
}
