use crate::catalog::model::FileRecord;
use crate::error::{DepotError, Result};
use crate::utils::digest::ContentHash;
use chrono::Utc;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub record: FileRecord,
    /// Hash the record pointed at before this write, for the caller to
    /// release. `None` on first upload.
    pub previous: Option<ContentHash>,
}

/// Relational access layer for logical file records. Every write runs inside
/// a single transaction with a version-checked conditional update, so
/// concurrent writers to the same `(owner, path)` serialize through the
/// database rather than an application lock; the loser of a race surfaces as
/// `Conflict`.
#[async_trait::async_trait]
pub trait FileCatalog: Send + Sync {
    async fn upsert(
        &self,
        owner: &str,
        path: &str,
        hash: &ContentHash,
        size: i64,
        content_type: &str,
    ) -> Result<UpsertOutcome>;

    async fn resolve(&self, owner: &str, path: &str) -> Result<FileRecord>;

    /// Marks the record deleted and returns the hash it referenced.
    async fn soft_delete(&self, owner: &str, path: &str) -> Result<ContentHash>;

    /// Non-deleted records for `owner`, most recently modified first.
    async fn list(&self, owner: &str, skip: i64, limit: i64) -> Result<Vec<FileRecord>>;
}

pub struct SqliteFileCatalog {
    pool: SqlitePool,
}

impl SqliteFileCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FileCatalog for SqliteFileCatalog {
    async fn upsert(
        &self,
        owner: &str,
        path: &str,
        hash: &ContentHash,
        size: i64,
        content_type: &str,
    ) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE owner = ?1 AND path = ?2 AND deleted = 0",
        )
        .bind(owner)
        .bind(path)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match current {
            Some(mut record) => {
                let now = Utc::now();
                let updated = sqlx::query(
                    "UPDATE files SET hash = ?1, size = ?2, content_type = ?3, \
                     modified_at = ?4, version = version + 1 \
                     WHERE id = ?5 AND version = ?6",
                )
                .bind(hash)
                .bind(size)
                .bind(content_type)
                .bind(now)
                .bind(&record.id)
                .bind(record.version)
                .execute(&mut *tx)
                .await?;
                if updated.rows_affected() == 0 {
                    return Err(DepotError::Conflict(format!("{owner}/{path}")));
                }

                let previous = std::mem::replace(&mut record.hash, hash.clone());
                record.size = size;
                record.content_type = content_type.to_owned();
                record.modified_at = now;
                record.version += 1;
                UpsertOutcome {
                    record,
                    previous: Some(previous),
                }
            }
            None => {
                let record = FileRecord::new(owner, path, hash.clone(), size, content_type);
                let inserted = sqlx::query(
                    "INSERT INTO files \
                     (id, owner, path, hash, size, content_type, version, deleted, created_at, modified_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9)",
                )
                .bind(&record.id)
                .bind(&record.owner)
                .bind(&record.path)
                .bind(&record.hash)
                .bind(record.size)
                .bind(&record.content_type)
                .bind(record.version)
                .bind(record.created_at)
                .bind(record.modified_at)
                .execute(&mut *tx)
                .await;
                match inserted {
                    Ok(_) => UpsertOutcome {
                        record,
                        previous: None,
                    },
                    // Another writer inserted the same live identity between
                    // our read and this insert.
                    Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                        return Err(DepotError::Conflict(format!("{owner}/{path}")));
                    }
                    Err(other) => return Err(other.into()),
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn resolve(&self, owner: &str, path: &str) -> Result<FileRecord> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE owner = ?1 AND path = ?2 AND deleted = 0",
        )
        .bind(owner)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DepotError::NotFound(format!("{owner}/{path}")))
    }

    async fn soft_delete(&self, owner: &str, path: &str) -> Result<ContentHash> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE owner = ?1 AND path = ?2 AND deleted = 0",
        )
        .bind(owner)
        .bind(path)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DepotError::NotFound(format!("{owner}/{path}")))?;

        let updated = sqlx::query(
            "UPDATE files SET deleted = 1, modified_at = ?1, version = version + 1 \
             WHERE id = ?2 AND version = ?3",
        )
        .bind(Utc::now())
        .bind(&record.id)
        .bind(record.version)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(DepotError::Conflict(format!("{owner}/{path}")));
        }

        tx.commit().await?;
        Ok(record.hash)
    }

    async fn list(&self, owner: &str, skip: i64, limit: i64) -> Result<Vec<FileRecord>> {
        Ok(sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE owner = ?1 AND deleted = 0 \
             ORDER BY modified_at DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(owner)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?)
    }
}
