use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub root_dir: String,
    pub database_url: String,
    pub db_connections: u32,
    pub cache_capacity: u64,
    pub cache_ttl_secs: u64,
    pub max_upload: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
