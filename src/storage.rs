use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{config::S3Config, error::AppError};

/// BlobStore
///
/// The contract for where file bytes live. Metadata (name, owner, content type)
/// always stays in the repository; a blob store only maps a file id to bytes.
/// Lets the handlers run unchanged against Postgres, S3/MinIO or memory.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Provisions whatever the backend needs before serving (e.g. the bucket).
    async fn prepare(&self) -> Result<(), AppError>;

    /// Stores or replaces the bytes of a file.
    async fn put(&self, id: Uuid, content_type: &str, data: Vec<u8>) -> Result<(), AppError>;

    /// `Ok(None)` if nothing is stored under `id`.
    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, AppError>;

    /// Removing a missing blob is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

/// BlobState
///
/// The concrete type used to share the blob store across the application state.
pub type BlobState = Arc<dyn BlobStore>;

// --- Postgres ---

/// PostgresBlobStore
///
/// Keeps bytes in the `file_blobs` table, next to the metadata. The `files` row
/// must exist before `put`; deleting it cascades to the blob.
#[derive(Clone)]
pub struct PostgresBlobStore {
    pool: PgPool,
}

impl PostgresBlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlobStore for PostgresBlobStore {
    async fn prepare(&self) -> Result<(), AppError> {
        // The table comes with the migrations.
        Ok(())
    }

    async fn put(&self, id: Uuid, _content_type: &str, data: Vec<u8>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO file_blobs (file_id, data) VALUES ($1, $2)
            ON CONFLICT (file_id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(id)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        let data =
            sqlx::query_scalar::<_, Vec<u8>>("SELECT data FROM file_blobs WHERE file_id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(data)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM file_blobs WHERE file_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// --- S3 ---

/// S3BlobStore
///
/// Stores each file as `files/<id>` in one bucket. Works against MinIO locally
/// and any S3-compatible service in production. `force_path_style(true)` is
/// required by MinIO.
#[derive(Clone)]
pub struct S3BlobStore {
    client: s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(config: &S3Config) -> Self {
        let credentials = s3::config::Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let s3_config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .region(s3::config::Region::new(config.region.clone()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    fn key(id: Uuid) -> String {
        format!("files/{id}")
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    /// prepare
    ///
    /// CreateBucket fails harmlessly when the bucket already exists, so the
    /// result is only logged.
    async fn prepare(&self) -> Result<(), AppError> {
        if let Err(e) = self.client.create_bucket().bucket(&self.bucket).send().await {
            tracing::debug!(bucket = %self.bucket, error = %e, "create_bucket skipped");
        }
        Ok(())
    }

    async fn put(&self, id: Uuid, content_type: &str, data: Vec<u8>) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(Self::key(id))
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("put_object {id}: {e}")))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(Self::key(id))
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None);
            }
            Err(e) => return Err(AppError::Storage(format!("get_object {id}: {e}"))),
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("reading object {id}: {e}")))?;
        Ok(Some(data.into_bytes().to_vec()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(Self::key(id))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete_object {id}: {e}")))?;
        Ok(())
    }
}

// --- Memory ---

/// MemoryBlobStore
///
/// Keeps bytes in a map. Used by the test suite; `new_failing` simulates an
/// unreachable backend.
#[derive(Default)]
pub struct MemoryBlobStore {
    /// When true, every operation fails with a storage error.
    pub should_fail: bool,
    blobs: RwLock<HashMap<Uuid, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.should_fail {
            return Err(AppError::Storage("simulated blob store failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn prepare(&self) -> Result<(), AppError> {
        self.check()
    }

    async fn put(&self, id: Uuid, _content_type: &str, data: Vec<u8>) -> Result<(), AppError> {
        self.check()?;
        self.blobs.write().await.insert(id, data);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        self.check()?;
        Ok(self.blobs.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.check()?;
        self.blobs.write().await.remove(&id);
        Ok(())
    }
}
