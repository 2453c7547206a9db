use std::sync::Arc;
use std::time::{Duration, Instant};

/// Advisory cache in front of the catalog and blob store. Implementations
/// swallow their own failures: a miss is always a safe answer, and every
/// coordinator path falls back to the durable layers.
#[async_trait::async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>>;

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>, ttl: Duration);

    /// After this returns, the next `get_bytes(key)` observes a miss.
    async fn invalidate(&self, key: &str);
}

#[derive(Clone)]
struct Cached {
    bytes: Arc<Vec<u8>>,
    ttl: Duration,
}

struct PerEntryTtl;

impl moka::Expiry<String, Cached> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Cached,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Cached,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache with a byte-weighted capacity bound and per-entry TTL.
pub struct MokaCache {
    inner: moka::future::Cache<String, Cached>,
}

impl MokaCache {
    pub fn new(capacity_bytes: u64) -> Self {
        let inner = moka::future::Cache::builder()
            .max_capacity(capacity_bytes)
            .weigher(|_key: &String, value: &Cached| {
                value.bytes.len().try_into().unwrap_or(u32::MAX)
            })
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }
}

#[async_trait::async_trait]
impl CacheLayer for MokaCache {
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await.map(|entry| entry.bytes.to_vec())
    }

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        self.inner
            .insert(
                key.to_string(),
                Cached {
                    bytes: Arc::new(bytes),
                    ttl,
                },
            )
            .await;
    }

    async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

/// The disabled cache: every lookup misses. Used when the configured
/// capacity is zero, and a stand-in for an absent cache backend.
pub struct NoopCache;

#[async_trait::async_trait]
impl CacheLayer for NoopCache {
    async fn get_bytes(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    async fn put_bytes(&self, _key: &str, _bytes: Vec<u8>, _ttl: Duration) {}

    async fn invalidate(&self, _key: &str) {}
}
