use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docshare::{
    cache::build_cache,
    config::Config,
    media::{upload_pathname, Category},
    routes::create_router,
    storage::build_store,
    AppState,
};

#[derive(Parser, Debug)]
#[command(name = "docshare", version, about = "Keeps the newest uploads per category", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply the retention policy to one category and print what is kept
    Reconcile {
        /// video or archive
        category: Category,
    },
    /// Store a local file under its category and apply retention
    Upload {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docshare=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let store = build_store(&config.storage)?;
    let cache = build_cache(&config.redis)?;
    let state = AppState::new(config, store, cache);

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state.clone()).await,
        Command::Reconcile { category } => reconcile(&state, category).await,
        Command::Upload { file } => upload(&state, file).await,
    };

    state.cache.shutdown().await;
    result
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HOST/PORT: {}", e))?;

    let app = create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Server stopped");
    Ok(())
}

async fn reconcile(state: &AppState, category: Category) -> anyhow::Result<()> {
    let kept = state.retention.reconcile(category).await;
    println!("{} kept: {}", category, kept.len());
    for item in kept {
        let uploaded = item
            .uploaded_at()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  {}  {:>12} bytes  {}", uploaded, item.size, item.url);
    }
    Ok(())
}

async fn upload(state: &AppState, file: PathBuf) -> anyhow::Result<()> {
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("Not a file path: {}", file.display()))?;
    let (category, pathname) = upload_pathname(file_name)
        .ok_or_else(|| anyhow::anyhow!("No category accepts {}", file_name))?;

    let data = tokio::fs::read(&file).await?;
    let policy = state.retention.policy(category);
    if data.len() as u64 > policy.max_size_bytes {
        anyhow::bail!(
            "{} is {} bytes, over the {} limit of {} bytes",
            file_name,
            data.len(),
            category,
            policy.max_size_bytes
        );
    }

    let content_type = mime_guess::from_path(&file)
        .first_or_octet_stream()
        .to_string();
    let stored = state.store.put(&pathname, data, &content_type).await?;
    info!("Uploaded {} ({} bytes)", stored.url, stored.size);

    reconcile(state, category).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
