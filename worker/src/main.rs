use anyhow::{anyhow, Result};
use clap::Parser;
use common::{app_by_name, naming::rendezvous_path, APP_NAMES};
use std::{path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

use worker::{CoordinatorClient, Worker, WorkerConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Worker de MapReduce: pide tareas al coordinator y las ejecuta", long_about = None)]
struct Args {
    /// App Map/Reduce enlazada (wc, indexer).
    #[arg(long, env = "MR_APP", default_value = "wc")]
    app: String,

    /// URL base del coordinator. Si falta, se lee del archivo de rendezvous.
    #[arg(long, env = "MR_COORDINATOR_URL")]
    coordinator: Option<String>,

    /// Archivo de rendezvous (por defecto /var/tmp/mr-coordinator-<usuario>).
    #[arg(long, env = "MR_RENDEZVOUS")]
    rendezvous: Option<PathBuf>,

    /// Directorio para shards intermedios y salidas.
    #[arg(long, env = "MR_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Espera entre polls cuando no hay tareas, en milisegundos.
    #[arg(long, env = "MR_WAIT_MS", default_value_t = 1000)]
    wait_ms: u64,

    /// Timeout de cada RPC, en segundos.
    #[arg(long, env = "MR_RPC_TIMEOUT_SECS", default_value_t = 5)]
    rpc_timeout_secs: u64,
}

/// hostname + sufijo aleatorio, sólo para logs del coordinator
fn worker_id() -> String {
    let host = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", host, &suffix[..8])
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,reqwest=info")),
        )
        .init();

    let args = Args::parse();
    let app = app_by_name(&args.app)
        .ok_or_else(|| anyhow!("app desconocida {:?} (disponibles: {:?})", args.app, APP_NAMES))?;
    let rpc_timeout = Duration::from_secs(args.rpc_timeout_secs.max(1));

    let client = match args.coordinator {
        Some(url) => CoordinatorClient::new(url, rpc_timeout)?,
        None => {
            let path = args.rendezvous.unwrap_or_else(rendezvous_path);
            match CoordinatorClient::from_rendezvous(&path, rpc_timeout) {
                Ok(c) => c,
                Err(e) => {
                    // sin coordinator publicado no hay job: igual que Exit
                    info!("sin coordinator ({e:#}); nada que hacer");
                    return Ok(());
                }
            }
        }
    };

    let config = WorkerConfig {
        work_dir: args.work_dir,
        wait_interval: Duration::from_millis(args.wait_ms),
    };
    let worker = Worker::new(worker_id(), client, app, config);
    let exit = worker.run().await;
    info!("worker {} terminó: {:?}", worker.id(), exit);
    Ok(())
}
