use clap::Parser;
use depot::config::Config;
use depot::coordinator::Depot;
use depot::utils::cli::Args;
use std::path::Path;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = validate_config(&args).await;

    let depot = Depot::bootstrap(&config).await?;
    tracing::info!(root = %config.root_dir, db = %config.database_url, "depot ready");

    shutdown_signal().await;

    depot.shutdown().await;
    tracing::info!("depot stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down...");
}

async fn validate_config(args: &Args) -> Config {
    let mut validation_errors = Vec::new();

    let root_dir = Path::new(&args.root);
    if let Ok(meta) = tokio::fs::metadata(root_dir).await {
        if !meta.is_dir() {
            validation_errors.push(format!(
                "DEPOT_ROOTDIR `{}` exists but is not a directory",
                args.root,
            ));
        }
    }

    if let Some(file) = args
        .database_url
        .strip_prefix("sqlite://")
        .filter(|rest| !rest.starts_with(':'))
    {
        let db_path = Path::new(file.split('?').next().unwrap_or(file));
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                validation_errors.push(format!(
                    "The directory for the database `{}` does not exist",
                    parent.display(),
                ));
            }
        }
    }

    if args.retry_backoff_ms == 0 {
        validation_errors.push("DEPOT_RETRY_BACKOFF_MS must be greater than zero".to_string());
    }

    if !validation_errors.is_empty() {
        eprintln!("{}", validation_errors.join("\n"));
        std::process::exit(1);
    }

    Config {
        root_dir: args.root.clone(),
        database_url: args.database_url.clone(),
        db_connections: args.db_connections,
        cache_capacity: args.cache_capacity,
        cache_ttl_secs: args.cache_ttl_secs,
        max_upload: args.max_upload,
        retry_attempts: args.retry_attempts,
        retry_backoff_ms: args.retry_backoff_ms,
    }
}
