//! File metadata database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::blocks::Digest;
use crate::files::{FileMetadata, NewFileMetadata};

use super::repository::{MetadataError, MetadataRepository};

/// Raw row of the `files` table
#[derive(Debug, Clone, sqlx::FromRow)]
struct FileRow {
    id: i64,
    file_name: String,
    size: i64,
    block_hashes: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<FileRow> for FileMetadata {
    type Error = MetadataError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let block_hashes: Vec<Digest> =
            serde_json::from_str(&row.block_hashes).map_err(|e| MetadataError::Corrupt {
                id: row.id,
                reason: format!("block_hashes: {}", e),
            })?;

        let size = u64::try_from(row.size).map_err(|_| MetadataError::Corrupt {
            id: row.id,
            reason: format!("negative size {}", row.size),
        })?;

        Ok(FileMetadata {
            id: row.id,
            file_name: row.file_name,
            size,
            block_hashes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// SQLite-backed metadata repository
#[derive(Clone)]
pub struct SqliteFileRepository {
    pool: SqlitePool,
}

impl SqliteFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Encode the columns shared by insert and upsert
    fn encode(record: &NewFileMetadata) -> Result<(i64, String), MetadataError> {
        let size = i64::try_from(record.size).map_err(|_| {
            MetadataError::Invalid(format!("size {} does not fit the database", record.size))
        })?;
        let hashes = serde_json::to_string(&record.block_hashes)
            .map_err(|e| MetadataError::Invalid(e.to_string()))?;
        Ok((size, hashes))
    }
}

#[async_trait]
impl MetadataRepository for SqliteFileRepository {
    async fn create(&self, record: NewFileMetadata) -> Result<FileMetadata, MetadataError> {
        let (size, hashes) = Self::encode(&record)?;
        let now = Utc::now().to_rfc3339();

        let row = sqlx::query_as::<_, FileRow>(
            r#"
            INSERT INTO files (file_name, size, block_hashes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, file_name, size, block_hashes, created_at, updated_at
            "#,
        )
        .bind(&record.file_name)
        .bind(size)
        .bind(&hashes)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                MetadataError::Conflict(record.file_name.clone())
            }
            other => MetadataError::Database(other),
        })?;

        row.try_into()
    }

    async fn replace(&self, record: NewFileMetadata) -> Result<FileMetadata, MetadataError> {
        let (size, hashes) = Self::encode(&record)?;
        let now = Utc::now().to_rfc3339();

        // Single statement, so readers see either the old row or the new one
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            INSERT INTO files (file_name, size, block_hashes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(file_name) DO UPDATE SET
                size = excluded.size,
                block_hashes = excluded.block_hashes,
                updated_at = excluded.updated_at
            RETURNING id, file_name, size, block_hashes, created_at, updated_at
            "#,
        )
        .bind(&record.file_name)
        .bind(size)
        .bind(&hashes)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_name(&self, file_name: &str) -> Result<Option<FileMetadata>, MetadataError> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, file_name, size, block_hashes, created_at, updated_at
            FROM files
            WHERE file_name = ?
            "#,
        )
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileMetadata::try_from).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<FileMetadata>, MetadataError> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, file_name, size, block_hashes, created_at, updated_at
            FROM files
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileMetadata::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<FileMetadata>, MetadataError> {
        let rows = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, file_name, size, block_hashes, created_at, updated_at
            FROM files
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FileMetadata::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::db::create_pool;

    async fn repository(dir: &TempDir) -> SqliteFileRepository {
        let url = format!("sqlite:{}", dir.path().join("metadata.db").display());
        SqliteFileRepository::new(create_pool(&url).await.unwrap())
    }

    fn record(name: &str, chunks: &[&[u8]]) -> NewFileMetadata {
        NewFileMetadata {
            file_name: name.to_string(),
            size: chunks.iter().map(|c| c.len() as u64).sum(),
            block_hashes: chunks.iter().map(|c| Digest::of(c)).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir).await;

        let created = repo.create(record("a.txt", &[b"one", b"two", b"one"])).await.unwrap();
        assert_eq!(created.file_name, "a.txt");
        assert_eq!(created.size, 9);
        assert_eq!(created.block_hashes.len(), 3);
        assert_eq!(created.block_hashes[0], created.block_hashes[2]);

        let by_name = repo.find_by_name("a.txt").await.unwrap().unwrap();
        assert_eq!(by_name, created);

        let by_id = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id, created);

        assert!(repo.find_by_name("b.txt").await.unwrap().is_none());
        assert!(repo.find_by_id(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir).await;

        repo.create(record("dup.bin", &[b"x"])).await.unwrap();
        let result = repo.create(record("dup.bin", &[b"y"])).await;

        assert!(matches!(result, Err(MetadataError::Conflict(name)) if name == "dup.bin"));
    }

    #[tokio::test]
    async fn test_replace_keeps_id() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir).await;

        let first = repo.replace(record("doc", &[b"v1"])).await.unwrap();
        let second = repo.replace(record("doc", &[b"version", b"2"])).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.size, 8);
        assert_eq!(second.block_hashes, vec![Digest::of(b"version"), Digest::of(b"2")]);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_record_and_ordering() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir).await;

        repo.create(record("z-empty", &[])).await.unwrap();
        repo.create(record("a-full", &[b"data"])).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].file_name, "z-empty");
        assert!(all[0].block_hashes.is_empty());
        assert_eq!(all[0].size, 0);
        assert_eq!(all[1].file_name, "a-full");
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let repo = repository(&dir).await;
            let created = repo.create(record("kept", &[b"abc"])).await.unwrap();
            repo.pool.close().await;
            created.id
        };

        let repo = repository(&dir).await;
        let found = repo.find_by_name("kept").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.block_hashes, vec![Digest::of(b"abc")]);
    }
}
