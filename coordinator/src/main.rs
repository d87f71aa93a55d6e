mod args;

use anyhow::{Context, Result};
use clap::Parser;
use common::naming::{publish_rendezvous, rendezvous_path};
use std::fs;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;
use coordinator::Coordinator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coordinator=debug,tower_http=info,axum=info")),
        )
        .init();

    let args = Args::parse();
    let files = args.input_files()?;
    info!(
        "{} archivo(s) de entrada, n_reduce={}",
        files.len(),
        args.n_reduce
    );

    let coordinator = Coordinator::new(files, args.n_reduce, args.config())?;

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", args.bind))?;
    let base_url = format!("http://{}", listener.local_addr()?);

    // los workers encuentran al coordinator por este archivo
    let rendezvous = args.rendezvous.clone().unwrap_or_else(rendezvous_path);
    publish_rendezvous(&rendezvous, &base_url)
        .with_context(|| format!("publicando rendezvous en {}", rendezvous.display()))?;
    info!("rendezvous {} -> {}", rendezvous.display(), base_url);

    let result = coordinator.serve(listener).await;

    if let Err(e) = fs::remove_file(&rendezvous) {
        warn!("no se pudo borrar {}: {}", rendezvous.display(), e);
    }
    result
}
