use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Blob storage root path
    #[arg(long, env = "DEPOT_ROOTDIR", default_value = "/var/lib/depot")]
    pub root: String,

    /// Catalog database connection string
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://depot.db?mode=rwc"
    )]
    pub database_url: String,

    /// Catalog connection pool size
    #[arg(long, env = "DEPOT_DB_CONNECTIONS", default_value_t = 12)]
    pub db_connections: u32,

    /// Cache capacity in bytes (0 disables the cache)
    #[arg(long, env = "DEPOT_CACHE_CAPACITY", default_value_t = 256 * 1024 * 1024)]
    pub cache_capacity: u64,

    /// Cache entry time-to-live in seconds
    #[arg(long, env = "DEPOT_CACHE_TTL_SECONDS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "DEPOT_MAX_UPLOAD", default_value_t = 100 * 1024 * 1024)]
    pub max_upload: u64,

    /// Bounded retry attempts for transient backend failures
    #[arg(long, env = "DEPOT_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Base backoff between retries, in milliseconds
    #[arg(long, env = "DEPOT_RETRY_BACKOFF_MS", default_value_t = 50)]
    pub retry_backoff_ms: u64,
}
