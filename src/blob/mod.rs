use crate::error::Result;
use crate::utils::digest::ContentHash;

pub mod filesystem;
pub mod paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobStats {
    pub blob_count: i64,
    pub total_bytes: i64,
}

/// Content-addressed blob persistence with reference counting.
///
/// Implementations must make content durable before `put` returns, so a
/// catalog row can never reference unflushed bytes. Counters are adjusted
/// with atomic storage-level updates, never read-modify-write.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` if their hash is not yet stored and records one
    /// logical reference. Idempotent with respect to content: repeated puts
    /// of identical bytes share a single stored copy.
    async fn put(&self, bytes: &[u8]) -> Result<ContentHash>;

    /// Reads the content for `hash`, verifying it against the digest on the
    /// way back.
    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>>;

    /// Drops one logical reference and returns the remaining count. Content
    /// is not removed synchronously; zero-reference blobs await deferred
    /// collection.
    async fn release(&self, hash: &ContentHash) -> Result<i64>;

    /// Current reference count for `hash`.
    async fn refcount(&self, hash: &ContentHash) -> Result<i64>;

    /// Hashes with zero references, oldest first, for the external
    /// collector.
    async fn orphaned(&self, limit: i64) -> Result<Vec<ContentHash>>;

    async fn stats(&self) -> Result<BlobStats>;
}
