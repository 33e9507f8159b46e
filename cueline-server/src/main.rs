use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cueline_core::{
    BackgroundTasks, Catalog, ObjectStore, ProgressStore, S3ObjectStore, bootstrap,
};
use cueline_server::infra::app_state::AppState;
use cueline_server::infra::config::{
    Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions,
};
use cueline_server::routes::create_app;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "cueline-server")]
#[command(about = "Resumable per-user video playlists backed by S3-compatible storage")]
struct Cli {
    /// Path to a cueline.toml configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Local catalog file instead of the catalog object in the bucket
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Directory of static assets to serve (overrides config)
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli)?;
    run_server(config).await
}

fn load_runtime_config(cli: &Cli) -> anyhow::Result<Config> {
    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;

    if let Some(bind) = cli.bind.as_deref() {
        config.server.bind = bind
            .parse()
            .with_context(|| format!("invalid --bind address {bind:?}"))?;
    }
    if let Some(path) = cli.catalog.clone() {
        config.catalog.path = Some(path);
    }
    if let Some(dir) = cli.static_dir.clone() {
        config.server.static_dir = Some(dir);
    }

    init_tracing();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "loaded configuration file");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    Ok(config)
}

/// `RUST_LOG` wins; otherwise `LOGLEVEL=DEBUG` turns on debug output.
fn init_tracing() {
    let fallback = match std::env::var("LOGLEVEL") {
        Ok(level) if level.eq_ignore_ascii_case("debug") => "debug,tower_http=debug",
        _ => "info,tower_http=warn",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let objects = S3ObjectStore::connect(&config.storage.s3_settings())
        .await
        .context("failed to create object store client")?;
    let objects: Arc<dyn ObjectStore> = Arc::new(objects);

    let catalog = match config.catalog.path.as_deref() {
        Some(path) => Catalog::load_path(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => Catalog::load_remote(objects.as_ref(), &config.catalog.key)
            .await
            .with_context(|| format!("failed to load catalog object {}", config.catalog.key))?,
    };
    info!(
        users = catalog.users.len(),
        playlists = catalog.playlist_count(),
        "loaded playlists"
    );

    let store = ProgressStore::new(objects, config.store.snapshot_key.clone());
    bootstrap(&store, &catalog)
        .await
        .context("failed to restore snapshot")?;

    let shutdown = CancellationToken::new();
    let tasks = BackgroundTasks::spawn(
        store.clone(),
        config.store.intervals(),
        shutdown.child_token(),
    );

    let config = Arc::new(config);
    let addr = config.server.bind;
    let router = create_app(AppState::new(store, Arc::clone(&config)));

    info!(%addr, bucket = %config.storage.bucket, "starting cueline server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
                _ = signal.cancelled() => {}
            }
        })
        .await
        .context("server error")?;

    shutdown.cancel();
    tasks
        .shutdown()
        .await
        .context("failed to save snapshot during shutdown")?;
    info!("cueline server stopped");
    Ok(())
}
