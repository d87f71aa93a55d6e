use anyhow::{Context, Result};
use common::{MapReduceApp, Task, TaskKind, WorkerId};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    client::CoordinatorClient,
    exec::{run_map_task, run_reduce_task},
};

const DEFAULT_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// directorio de shards intermedios y salidas
    pub work_dir: PathBuf,
    /// espera tras recibir Wait
    pub wait_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            wait_interval: DEFAULT_WAIT,
        }
    }
}

/// Por qué terminó el loop del worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// el coordinator respondió Exit
    Finished,
    /// el coordinator no responde: se asume que el job terminó
    CoordinatorGone,
}

pub struct Worker {
    id: WorkerId,
    client: CoordinatorClient,
    app: Arc<dyn MapReduceApp>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        id: impl Into<WorkerId>,
        client: CoordinatorClient,
        app: Arc<dyn MapReduceApp>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id: id.into(),
            client,
            app,
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Loop principal del worker.
    /// - Pide tarea al coordinator.
    /// - Map / Reduce: ejecuta y reporta.
    /// - Wait: duerme y vuelve a pedir.
    /// - Exit o coordinator caído: termina.
    pub async fn run(&self) -> WorkerExit {
        info!(
            "worker {} (app={}) contra {}, work_dir={}",
            self.id,
            self.app.name(),
            self.client.base_url(),
            self.config.work_dir.display()
        );

        loop {
            let task = match self.client.poll_task(&self.id).await {
                Ok(t) => t,
                Err(e) => {
                    info!("coordinator no responde ({e:#}); se asume job terminado");
                    return WorkerExit::CoordinatorGone;
                }
            };

            match task.kind {
                TaskKind::Exit => {
                    info!("worker {} recibió Exit, terminando", self.id);
                    return WorkerExit::Finished;
                }
                TaskKind::Wait => {
                    debug!("no hay tareas, esperando {:?}...", self.config.wait_interval);
                    sleep(self.config.wait_interval).await;
                }
                TaskKind::Map | TaskKind::Reduce => {
                    info!("tengo tarea {:?} {} (input={:?})", task.kind, task.id, task.input);

                    if let Err(e) = self.execute(&task).await {
                        // sin reporte: el coordinator la reclamará por timeout
                        warn!("tarea {:?} {} falló: {e:#}", task.kind, task.id);
                        continue;
                    }

                    match self.client.report_done(&task, &self.id).await {
                        Ok(reply) if !reply.accepted => debug!(
                            "reporte de {:?} {} ya no hacía falta",
                            task.kind, task.id
                        ),
                        Ok(_) => {}
                        Err(e) => {
                            info!("coordinator no responde al reportar ({e:#}); terminando");
                            return WorkerExit::CoordinatorGone;
                        }
                    }
                }
            }
        }
    }

    /// Ejecuta la tarea en un hilo de bloqueo. Un panic de la app es un fallo más.
    async fn execute(&self, task: &Task) -> Result<()> {
        let app = Arc::clone(&self.app);
        let dir = self.config.work_dir.clone();
        let task = task.clone();

        let handle = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            match task.kind {
                TaskKind::Map => run_map_task(app.as_ref(), &task, &dir).map(|s| {
                    format!("map {}: {} registros, {} shards", task.id, s.records, s.shards.len())
                }),
                TaskKind::Reduce => run_reduce_task(app.as_ref(), &task, &dir).map(|s| {
                    format!(
                        "reduce {}: {} shards, {} registros, {} claves -> {}",
                        task.id,
                        s.shards,
                        s.records,
                        s.keys,
                        s.output.display()
                    )
                }),
                TaskKind::Wait | TaskKind::Exit => Ok(String::new()),
            }
        });

        let summary = handle.await.context("la tarea terminó en panic")??;
        info!("terminé {}", summary);
        Ok(())
    }
}
