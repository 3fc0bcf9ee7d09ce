//! Binary entry point: build the engine from config and keep it running
//! with the background reconcile loop until ctrl-c.

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mnemon::config::Config;
use mnemon::embedding::create_embedder;
use mnemon::engine::MemoryEngine;
use mnemon::ops::MemoryService;

#[derive(Parser)]
#[command(name = "mnemon", version, about = "Associative memory service")]
struct Cli {
    /// Path to config.toml (default: ~/.mnemon/config.toml)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Run one reconcile pass and exit.
    #[arg(long)]
    reconcile: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().context("loading config")?,
    };

    let embedder = create_embedder(&config.embedding);
    info!(
        backend = embedder.name(),
        dimension = embedder.dimension(),
        data_dir = %config.storage.data_dir.display(),
        "Starting mnemon"
    );

    let engine = Arc::new(MemoryEngine::new(config, embedder).context("opening stores")?);
    let service = MemoryService::new(Arc::clone(&engine));

    if cli.reconcile {
        let report = engine.reconcile().await;
        info!(?report, "Reconcile pass finished");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let reconcile_task = Arc::clone(&engine).spawn_reconcile_loop(shutdown.clone());

    let stats = engine.stats().await;
    info!(
        memories = stats.total_memories,
        vectors = stats.total_vectors,
        edges = stats.graph_edges,
        "Engine ready; serving in-process operations"
    );
    // The framing layer owns the transport; from here the service handle is
    // what it consumes.
    let _ = &service;

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("Shutting down");
    shutdown.cancel();
    let _ = reconcile_task.await;
    Ok(())
}
