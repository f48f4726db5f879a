//! # mentor-agent
//!
//! Mentor delivery server binary — wires together the store, generator,
//! embeddings, engine, and HTTP server, then runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mentor_embeddings::RemoteEmbeddingService;
use mentor_engine::DeliveryOrchestrator;
use mentor_engine::producer::PendingProducer;
use mentor_llm::{HttpGenerator, HttpGeneratorConfig};
use mentor_server::{AppState, MentorServer, ServerConfig, ShutdownCoordinator};
use mentor_settings::MentorSettings;
use mentor_store::{ConnectionConfig, StateStore};

/// Mentor delivery server.
#[derive(Parser, Debug)]
#[command(name = "mentor-agent", about = "Adaptive micro-lesson delivery server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to the settings file (default `~/.mentor/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home)
        .join(".mentor")
        .join("database")
        .join("mentor.db")
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn init_tracing(settings: &MentorSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));
    if settings.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings: file (or defaults) + env overrides, cached globally.
    let settings = match &cli.settings {
        Some(path) => mentor_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => mentor_settings::load_settings().unwrap_or_default(),
    };
    mentor_settings::init_settings(settings.clone());
    init_tracing(&settings);

    // Store: file-backed, migrated at boot.
    let db_path = cli
        .db_path
        .clone()
        .or_else(|| {
            (!settings.store.db_path.is_empty()).then(|| PathBuf::from(&settings.store.db_path))
        })
        .unwrap_or_else(default_db_path);
    ensure_parent_dir(&db_path)?;
    let connection_config = ConnectionConfig {
        pool_size: settings.store.pool_size,
        busy_timeout_ms: settings.store.busy_timeout_ms,
        ..Default::default()
    };
    let store = Arc::new(
        StateStore::open_file(
            db_path.to_str().context("db path is not valid UTF-8")?,
            &connection_config,
        )
        .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(db_path = %db_path.display(), "state store ready");

    // External collaborators.
    let generator = Arc::new(HttpGenerator::new(HttpGeneratorConfig {
        base_url: settings.generator.base_url.clone(),
        api_key: settings.generator.api_key.clone(),
        timeout: Duration::from_secs(settings.generator.timeout_secs),
        fast_model: settings.generator.fast_model.clone(),
        slow_model: settings.generator.slow_model.clone(),
    })) as Arc<dyn mentor_llm::Generator>;
    let embedder = Arc::new(RemoteEmbeddingService::new(
        settings.embeddings.base_url.clone(),
        Duration::from_secs(settings.embeddings.timeout_secs),
        settings.embeddings.dims,
    )) as Arc<dyn mentor_embeddings::EmbeddingService>;

    // Background producer, decoupled from the request path.
    let shutdown = ShutdownCoordinator::new();
    let producer = Arc::new(PendingProducer::new(
        Arc::clone(&store),
        Arc::clone(&generator),
        Arc::clone(&embedder),
        settings.engine.clone(),
    ));
    let (producer_handle, producer_task) =
        Arc::clone(&producer).spawn(shutdown.token());

    // Engine + HTTP server.
    let orchestrator = Arc::new(DeliveryOrchestrator::new(
        Arc::clone(&store),
        generator,
        embedder,
        settings.engine.clone(),
        Some(producer_handle),
    ));
    let metrics_handle = mentor_server::metrics::install_recorder();
    let state = AppState::new(orchestrator, producer, Some(metrics_handle));

    let mut server_config = ServerConfig::from_settings(&settings.server);
    if let Some(host) = cli.host {
        server_config.host = host;
    }
    if let Some(port) = cli.port {
        server_config.port = port;
    }
    let server = MentorServer::new(server_config, state);

    // Serve until ctrl-c, then drain the producer.
    let serve_token = shutdown.token();
    let ctrlc_token = shutdown.token();
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            ctrlc_token.cancel();
        }
    });

    server.serve(serve_token).await.context("server failed")?;
    shutdown
        .graceful_shutdown(vec![producer_task], Some(Duration::from_secs(10)))
        .await;

    Ok(())
}
