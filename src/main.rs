use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use feedreader::config::Config;
use feedreader::feed::Fetcher;
use feedreader::poller::Poller;
use feedreader::server;
use feedreader::service::FeedService;
use feedreader::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(name = "feedreader", version, about = "Self-hosted RSS reader with a JSON API")]
struct Args {
    /// Path to the TOML config file (missing file means defaults)
    #[arg(long, global = true, value_name = "FILE", default_value = "feedreader.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (and the poller, if enabled)
    Serve,
    /// Refresh every feed once and exit
    Refresh,
}

fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

async fn open_service(config: &Config) -> Result<FeedService> {
    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: {} is locked by another process. Please close it and try again.",
                config.database_path
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to open database {}: {}",
                config.database_path,
                e
            ))
        }
    };
    let fetcher = Fetcher::new().context("Failed to build HTTP client")?;

    Ok(FeedService::new(db, fetcher)
        .with_request_timeout(config.request_timeout())
        .with_host_policy(config.host_policy()))
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown requested"),
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        }
        token.cancel();
    });
}

async fn serve(config: Config) -> Result<()> {
    let service = open_service(&config).await?;
    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let poller = if config.poller.enabled {
        let poller = Poller::new(service.clone(), config.poller.interval());
        Some(tokio::spawn(poller.run(shutdown.child_token())))
    } else {
        tracing::info!("Feed poller disabled");
        None
    };

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let served = server::serve(listener, service.clone(), shutdown.clone()).await;
    // The server can also stop on its own (listener error); stop the poller too.
    shutdown.cancel();

    if let Some(handle) = poller {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Poller task panicked");
        }
    }
    service.database().close().await;

    served.context("HTTP server failed")
}

async fn refresh(config: Config) -> Result<()> {
    let service = open_service(&config).await?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let summary = service
        .refresh_all(&cancel)
        .await
        .context("Failed to refresh feeds")?;
    println!(
        "Refreshed {} feeds: {} new articles, {} failed",
        summary.feeds, summary.added, summary.failed
    );

    service.database().close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    tracing::debug!(?config, "Effective configuration");

    match args.command {
        Command::Serve => serve(config).await,
        Command::Refresh => refresh(config).await,
    }
}
