use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{
    app_by_name,
    engine::{default_sequential_output, run_sequential},
    naming::{read_rendezvous, rendezvous_path},
    rpc::STATUS_PATH,
    JobStatusReply, TaskCounts, APP_NAMES,
};
use reqwest::Client;

#[derive(Parser)]
#[command(name = "mrctl")]
#[command(about = "CLI para consultar el coordinator y correr la referencia secuencial")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consulta el estado del job en curso
    Status {
        /// URL del coordinator; si falta se lee el archivo de rendezvous
        #[arg(long, env = "MR_COORDINATOR_URL")]
        coordinator: Option<String>,

        #[arg(long, env = "MR_RENDEZVOUS")]
        rendezvous: Option<PathBuf>,
    },
    /// MapReduce secuencial en un solo proceso (salida de referencia)
    Seq {
        #[arg(long, default_value = "wc")]
        app: String,

        /// Ruta de salida; por defecto ./mr-out-0
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(value_name = "ARCHIVOS", required = true)]
        files: Vec<PathBuf>,
    },
}

fn coordinator_url(explicit: Option<String>, rendezvous: Option<PathBuf>) -> Result<String> {
    if let Some(url) = explicit {
        return Ok(url.trim_end_matches('/').to_string());
    }
    let path = rendezvous.unwrap_or_else(rendezvous_path);
    read_rendezvous(&path).with_context(|| {
        format!(
            "no hay coordinator publicado en {} (¿está corriendo?)",
            path.display()
        )
    })
}

fn print_counts(label: &str, c: &TaskCounts) {
    println!(
        "  {label:<7}: total={}, idle={}, en curso={}, completadas={}",
        c.total(),
        c.idle,
        c.in_progress,
        c.completed
    );
}

fn print_status(st: &JobStatusReply) {
    println!("Job:");
    println!("  fase: {:?}", st.phase);
    print_counts("map", &st.map);
    print_counts("reduce", &st.reduce);
    println!("  reducers: {}", st.n_reduce);
    println!("  reasignaciones: {}", st.reclaimed);

    let total = st.n_map + st.n_reduce;
    let done = st.map.completed + st.reduce.completed;
    if total > 0 {
        let pct = (done as f64 / total as f64) * 100.0;
        println!("  progreso: {:.1}%", pct);
    } else {
        println!("  progreso: (sin tareas)");
    }

    println!("  iniciado: {}", st.started_at);
    if let Some(ref finished) = st.finished_at {
        println!("  finalizado: {}", finished);
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status {
            coordinator,
            rendezvous,
        } => {
            let base_url = coordinator_url(coordinator, rendezvous)?;
            let url = format!("{}{}", base_url, STATUS_PATH);
            let resp = Client::new()
                .get(&url)
                .send()
                .await
                .with_context(|| format!("consultando {url}"))?;

            if resp.status().is_success() {
                let st: JobStatusReply = resp.json().await?;
                print_status(&st);
            } else {
                println!("Error consultando {} (status {})", STATUS_PATH, resp.status());
            }
        }

        Commands::Seq { app, output, files } => {
            let Some(mr_app) = app_by_name(&app) else {
                bail!("app desconocida {app:?}; disponibles: {}", APP_NAMES.join(", "));
            };
            let output = match output {
                Some(p) => p,
                None => default_sequential_output(&std::env::current_dir()?),
            };

            println!("Ejecutando {} secuencial sobre {} archivos", mr_app.name(), files.len());
            let keys = run_sequential(mr_app.as_ref(), &files, &output)
                .with_context(|| format!("corriendo {} secuencial", mr_app.name()))?;
            println!("Listo: {} claves en {}", keys, output.display());
        }
    }

    Ok(())
}
