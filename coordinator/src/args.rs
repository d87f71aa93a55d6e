use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use glob::glob;
use tracing::warn;

use coordinator::CoordinatorConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Coordinator de MapReduce: reparte tareas y reclama las abandonadas", long_about = None)]
pub struct Args {
    /// Archivos de entrada (se aceptan patrones glob). Una tarea Map por archivo.
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<String>,

    /// Cantidad de tareas Reduce (R).
    #[arg(long, env = "MR_N_REDUCE", default_value_t = 10)]
    pub n_reduce: u32,

    /// Segundos en InProgress antes de considerar caído al worker.
    #[arg(long, env = "MR_CRASH_TIMEOUT_SECS", default_value_t = 10)]
    pub crash_timeout_secs: u64,

    /// Intervalo del monitor de reclaim, en milisegundos.
    #[arg(long, env = "MR_SWEEP_INTERVAL_MS", default_value_t = 1000)]
    pub sweep_interval_ms: u64,

    /// Tiempo que se sigue respondiendo Exit tras terminar, en milisegundos.
    #[arg(long, env = "MR_GRACE_PERIOD_MS", default_value_t = 2000)]
    pub grace_period_ms: u64,

    /// Dirección de escucha. Por defecto loopback con puerto efímero.
    #[arg(long, env = "MR_BIND", default_value = "127.0.0.1:0")]
    pub bind: String,

    /// Archivo donde se publica la URL del coordinator.
    /// Por defecto /var/tmp/mr-coordinator-<usuario>.
    #[arg(long, env = "MR_RENDEZVOUS")]
    pub rendezvous: Option<PathBuf>,
}

impl Args {
    pub fn config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            crash_timeout: Duration::from_secs(self.crash_timeout_secs),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms.max(1)),
            grace_period: Duration::from_millis(self.grace_period_ms),
            ..CoordinatorConfig::default()
        }
    }

    /// Expande los patrones en orden; el orden define los ids de las tareas Map.
    pub fn input_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for pattern in &self.files {
            let before = files.len();
            let paths = glob(pattern).with_context(|| format!("patrón inválido: {pattern}"))?;
            for entry in paths {
                let path = entry.with_context(|| format!("leyendo {pattern}"))?;
                if path.is_file() {
                    files.push(path.to_string_lossy().to_string());
                }
            }
            if files.len() == before {
                warn!("el patrón {} no encontró archivos", pattern);
            }
        }
        Ok(files)
    }
}
