use crate::blob::paths::PathManager;
use crate::blob::{BlobStats, BlobStore};
use crate::error::{DepotError, Result};
use crate::utils::digest::ContentHash;

use chrono::Utc;
use sqlx::SqlitePool;
use std::io;
use std::path::Path;
use tokio::fs::{File, create_dir_all, remove_file, rename};
use tokio::io::AsyncWriteExt;

/// Blob store backed by a filesystem content-addressable tree, with
/// reference counters kept in the relational `blobs` table.
pub struct FilesystemBlobStore {
    paths: PathManager,
    pool: SqlitePool,
}

impl FilesystemBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, pool: SqlitePool) -> Self {
        Self {
            paths: PathManager::new(root),
            pool,
        }
    }

    /// Writes `bytes` to a fresh staging file and fsyncs it. The returned
    /// path holds complete, durable content ready to be renamed into the
    /// blob tree.
    async fn stage(&self, bytes: &[u8]) -> io::Result<std::path::PathBuf> {
        let staging = self.paths.staging_file(&uuid::Uuid::new_v4().to_string());
        if let Some(parent) = staging.parent() {
            create_dir_all(parent).await?;
        }
        let mut file = File::create(&staging).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(staging)
    }
}

#[async_trait::async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::of(bytes);
        let data_path = self.paths.blob_data_path(&hash);

        if tokio::fs::metadata(&data_path).await.is_err() {
            let staging = self.stage(bytes).await?;
            if let Some(parent) = data_path.parent() {
                create_dir_all(parent).await?;
            }
            // A concurrent put of the same content may win the rename race;
            // both sides rename identical bytes, so last-wins is harmless.
            if let Err(err) = rename(&staging, &data_path).await {
                let _ = remove_file(&staging).await;
                return Err(err.into());
            }
            tracing::debug!(hash = %hash, size = bytes.len(), "stored new blob content");
        } else {
            tracing::debug!(hash = %hash, "blob content already present");
        }

        sqlx::query(
            "INSERT INTO blobs (hash, size, ref_count, created_at) VALUES (?1, ?2, 1, ?3) \
             ON CONFLICT(hash) DO UPDATE SET ref_count = ref_count + 1",
        )
        .bind(&hash)
        .bind(bytes.len() as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let data_path = self.paths.blob_data_path(hash);
        let bytes = match tokio::fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(DepotError::NotFound(format!("blob {hash}")));
            }
            Err(err) => return Err(err.into()),
        };

        let actual = ContentHash::of(&bytes);
        if actual != *hash {
            return Err(DepotError::Integrity {
                expected: hash.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(bytes)
    }

    async fn release(&self, hash: &ContentHash) -> Result<i64> {
        let result =
            sqlx::query("UPDATE blobs SET ref_count = ref_count - 1 WHERE hash = ?1 AND ref_count > 0")
                .bind(hash)
                .execute(&self.pool)
                .await?;

        let remaining = self.refcount(hash).await?;
        if result.rows_affected() == 0 {
            tracing::warn!(hash = %hash, "release on blob with no outstanding references");
        } else if remaining == 0 {
            tracing::debug!(hash = %hash, "blob dropped to zero references");
        }
        Ok(remaining)
    }

    async fn refcount(&self, hash: &ContentHash) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT ref_count FROM blobs WHERE hash = ?1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DepotError::NotFound(format!("blob {hash}")))
    }

    async fn orphaned(&self, limit: i64) -> Result<Vec<ContentHash>> {
        let hashes = sqlx::query_scalar::<_, String>(
            "SELECT hash FROM blobs WHERE ref_count = 0 ORDER BY created_at LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        hashes.iter().map(|raw| raw.parse()).collect()
    }

    async fn stats(&self) -> Result<BlobStats> {
        let (blob_count, total_bytes) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM blobs",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(BlobStats {
            blob_count,
            total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> (tempfile::TempDir, FilesystemBlobStore) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let store = FilesystemBlobStore::new(tmp.path(), pool);
        (tmp, store)
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let (_tmp, store) = store().await;
        let hash = store.put(b"some file content").await.unwrap();
        assert_eq!(store.get(&hash).await.unwrap(), b"some file content");
    }

    #[tokio::test]
    async fn put_deduplicates_but_counts_references() {
        let (_tmp, store) = store().await;
        let first = store.put(b"same bytes").await.unwrap();
        let second = store.put(b"same bytes").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.refcount(&first).await.unwrap(), 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.blob_count, 1);
        assert_eq!(stats.total_bytes, b"same bytes".len() as i64);
    }

    #[tokio::test]
    async fn release_floors_at_zero_and_reports_orphans() {
        let (_tmp, store) = store().await;
        let hash = store.put(b"short lived").await.unwrap();
        assert_eq!(store.release(&hash).await.unwrap(), 0);
        // a second release must not go negative
        assert_eq!(store.release(&hash).await.unwrap(), 0);

        let orphans = store.orphaned(10).await.unwrap();
        assert_eq!(orphans, vec![hash.clone()]);
        // content stays in place until the external collector runs
        assert_eq!(store.get(&hash).await.unwrap(), b"short lived");
    }

    #[tokio::test]
    async fn get_unknown_hash_is_not_found() {
        let (_tmp, store) = store().await;
        let missing = ContentHash::of(b"never stored");
        assert!(matches!(
            store.get(&missing).await,
            Err(DepotError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn corrupted_content_fails_integrity() {
        let (_tmp, store) = store().await;
        let hash = store.put(b"pristine").await.unwrap();
        std::fs::write(store.paths.blob_data_path(&hash), b"tampered").unwrap();
        assert!(matches!(
            store.get(&hash).await,
            Err(DepotError::Integrity { .. })
        ));
    }
}
