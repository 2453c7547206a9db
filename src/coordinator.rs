use crate::blob::filesystem::FilesystemBlobStore;
use crate::blob::{BlobStats, BlobStore};
use crate::cache::{CacheLayer, MokaCache, NoopCache};
use crate::catalog::{FileCatalog, FileRecord, SqliteFileCatalog};
use crate::config::Config;
use crate::error::{DepotError, Result};
use crate::utils::digest::ContentHash;
use crate::utils::validation::{is_valid_owner, is_valid_path};

use rand::Rng;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::create_dir_all;
use tokio::time::sleep;

/// Bounded retry with exponential backoff for transient backend failures.
/// Only idempotent operations go through it; catalog writes never do.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << (attempt - 1).min(8));
        let jitter_ms = (self.base_backoff.as_millis() as u64 / 2).max(1);
        exp + Duration::from_millis(rand::rng().random_range(0..jitter_ms))
    }
}

/// The storage coordinator: sequences catalog lookups, cache consults, and
/// blob I/O for every logical operation, and owns the process-wide resources
/// (pool, cache) from bootstrap to shutdown.
pub struct Depot {
    blobs: Arc<dyn BlobStore>,
    catalog: Arc<dyn FileCatalog>,
    cache: Arc<dyn CacheLayer>,
    retry: RetryPolicy,
    cache_ttl: Duration,
    max_upload: u64,
    pool: SqlitePool,
}

fn data_key(owner: &str, path: &str) -> String {
    format!("data:{owner}/{path}")
}

fn meta_key(owner: &str, path: &str) -> String {
    format!("meta:{owner}/{path}")
}

fn validate(owner: &str, path: &str) -> Result<()> {
    if !is_valid_owner(owner) {
        return Err(DepotError::NameInvalid(format!("owner `{owner}`")));
    }
    if !is_valid_path(path) {
        return Err(DepotError::NameInvalid(format!("path `{path}`")));
    }
    Ok(())
}

impl Depot {
    /// Opens the process-wide resources and wires the components together:
    /// storage root, connection pool, schema migrations, cache.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        create_dir_all(&config.root_dir).await?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.db_connections)
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let blobs: Arc<dyn BlobStore> =
            Arc::new(FilesystemBlobStore::new(&config.root_dir, pool.clone()));
        let catalog: Arc<dyn FileCatalog> = Arc::new(SqliteFileCatalog::new(pool.clone()));
        let cache: Arc<dyn CacheLayer> = if config.cache_capacity > 0 {
            Arc::new(MokaCache::new(config.cache_capacity))
        } else {
            Arc::new(NoopCache)
        };

        tracing::info!(root = %config.root_dir, "storage coordinator ready");
        Ok(Self {
            blobs,
            catalog,
            cache,
            retry: RetryPolicy {
                attempts: config.retry_attempts,
                base_backoff: config.retry_backoff(),
            },
            cache_ttl: config.cache_ttl(),
            max_upload: config.max_upload,
            pool,
        })
    }

    /// Explicit teardown of the process-wide resources.
    pub async fn shutdown(&self) {
        self.pool.close().await;
    }

    /// Stores `bytes` under `(owner, path)`: blob write, catalog upsert,
    /// release of the replaced reference, cache invalidation. A failure
    /// after the blob write leaves at worst an unreferenced blob for the
    /// external collector.
    pub async fn upload(
        &self,
        owner: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<FileRecord> {
        validate(owner, path)?;
        if self.max_upload > 0 && bytes.len() as u64 > self.max_upload {
            return Err(DepotError::SizeInvalid(format!(
                "{} bytes exceeds the {} byte limit",
                bytes.len(),
                self.max_upload
            )));
        }

        // Blob put is idempotent, so transient failures may be retried.
        let mut attempt = 0;
        let hash = loop {
            match self.blobs.put(bytes).await {
                Ok(hash) => break hash,
                Err(err) if err.is_transient() && attempt < self.retry.attempts => {
                    attempt += 1;
                    tracing::warn!(owner, path, attempt, error = %err, "blob write failed, backing off");
                    sleep(self.retry.backoff_for(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        };

        let outcome = match self
            .catalog
            .upsert(owner, path, &hash, bytes.len() as i64, content_type)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                // The record never came to reference the new content; drop
                // the reference taken by put so the loser ends as a plain
                // orphan instead of a counted one.
                if let Err(release_err) = self.blobs.release(&hash).await {
                    tracing::warn!(hash = %hash, error = %release_err, "release after catalog failure did not complete");
                }
                return Err(err);
            }
        };

        if let Some(previous) = outcome.previous {
            // Also covers the same-hash overwrite: put counted a fresh
            // reference while the record still holds exactly one.
            if let Err(err) = self.blobs.release(&previous).await {
                tracing::warn!(hash = %previous, error = %err, "deferred release of replaced blob");
            }
        }

        self.cache.invalidate(&data_key(owner, path)).await;
        self.cache.invalidate(&meta_key(owner, path)).await;
        tracing::info!(owner, path, hash = %outcome.record.hash, size = outcome.record.size, "upload complete");
        Ok(outcome.record)
    }

    /// Fetches the current content for `(owner, path)`, consulting the cache
    /// first and populating it on the way out.
    pub async fn download(&self, owner: &str, path: &str) -> Result<Vec<u8>> {
        validate(owner, path)?;

        let key = data_key(owner, path);
        if let Some(bytes) = self.cache.get_bytes(&key).await {
            tracing::debug!(owner, path, "download served from cache");
            return Ok(bytes);
        }

        let record = self.resolve_catalog(owner, path).await?;
        let bytes = self.read_blob(&record.hash).await?;
        self.cache
            .put_bytes(&key, bytes.clone(), self.cache_ttl)
            .await;
        Ok(bytes)
    }

    /// Looks up the current metadata for `(owner, path)`.
    pub async fn resolve(&self, owner: &str, path: &str) -> Result<FileRecord> {
        validate(owner, path)?;

        let key = meta_key(owner, path);
        if let Some(raw) = self.cache.get_bytes(&key).await {
            match serde_json::from_slice::<FileRecord>(&raw) {
                Ok(record) => return Ok(record),
                Err(err) => {
                    tracing::warn!(owner, path, error = %err, "discarding undecodable cached metadata");
                    self.cache.invalidate(&key).await;
                }
            }
        }

        let record = self.resolve_catalog(owner, path).await?;
        if let Ok(raw) = serde_json::to_vec(&record) {
            self.cache.put_bytes(&key, raw, self.cache_ttl).await;
        }
        Ok(record)
    }

    /// Soft-deletes `(owner, path)` and releases its blob reference.
    pub async fn delete(&self, owner: &str, path: &str) -> Result<()> {
        validate(owner, path)?;

        let previous = self.catalog.soft_delete(owner, path).await?;
        if let Err(err) = self.blobs.release(&previous).await {
            tracing::warn!(hash = %previous, error = %err, "deferred release of deleted blob");
        }

        self.cache.invalidate(&data_key(owner, path)).await;
        self.cache.invalidate(&meta_key(owner, path)).await;
        tracing::info!(owner, path, "delete complete");
        Ok(())
    }

    /// Non-deleted records for `owner`, newest first. `limit` is clamped to
    /// a sane page size.
    pub async fn list(&self, owner: &str, skip: i64, limit: i64) -> Result<Vec<FileRecord>> {
        if !is_valid_owner(owner) {
            return Err(DepotError::NameInvalid(format!("owner `{owner}`")));
        }
        self.catalog.list(owner, skip.max(0), limit.clamp(1, 100)).await
    }

    /// Zero-reference blobs awaiting the external collector.
    pub async fn orphaned(&self, limit: i64) -> Result<Vec<ContentHash>> {
        self.blobs.orphaned(limit).await
    }

    pub async fn stats(&self) -> Result<BlobStats> {
        self.blobs.stats().await
    }

    async fn resolve_catalog(&self, owner: &str, path: &str) -> Result<FileRecord> {
        let mut attempt = 0;
        loop {
            match self.catalog.resolve(owner, path).await {
                Ok(record) => return Ok(record),
                Err(err) if err.is_transient() && attempt < self.retry.attempts => {
                    attempt += 1;
                    tracing::warn!(owner, path, attempt, error = %err, "catalog read failed, backing off");
                    sleep(self.retry.backoff_for(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn read_blob(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.blobs.get(hash).await {
                Ok(bytes) => return Ok(bytes),
                // Integrity failures are not transient and must surface
                // untouched.
                Err(err) if err.is_transient() && attempt < self.retry.attempts => {
                    attempt += 1;
                    tracing::warn!(hash = %hash, attempt, error = %err, "blob read failed, backing off");
                    sleep(self.retry.backoff_for(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
