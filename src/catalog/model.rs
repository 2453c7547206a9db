use crate::utils::digest::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One logical file identity. At most one non-deleted record exists per
/// `(owner, path)` pair; `version` drives optimistic concurrency on every
/// write.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub owner: String,
    pub path: String,
    pub hash: ContentHash,
    pub size: i64,
    pub content_type: String,
    pub version: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        owner: &str,
        path: &str,
        hash: ContentHash,
        size: i64,
        content_type: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_owned(),
            path: path.to_owned(),
            hash,
            size,
            content_type: content_type.to_owned(),
            version: 1,
            deleted: false,
            created_at: now,
            modified_at: now,
        }
    }
}
