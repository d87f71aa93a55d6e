use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, time::sleep};
use tracing::info;

use crate::{
    handlers::build_router,
    monitor::run_reclaim_loop,
    state::{AppState, JobState},
};

/// Tiempos del coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// tiempo en InProgress tras el cual una tarea se reclama
    pub crash_timeout: Duration,
    pub sweep_interval: Duration,
    /// cuánto se sigue respondiendo Exit después de Done
    pub grace_period: Duration,
    /// cada cuánto el driver pregunta si el job terminó
    pub done_poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            crash_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(2),
            done_poll_interval: Duration::from_secs(1),
        }
    }
}

pub struct Coordinator {
    state: AppState,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Crea el coordinator con una tarea Map por archivo.
    pub fn new(files: Vec<String>, n_reduce: u32, config: CoordinatorConfig) -> Result<Self> {
        let job = JobState::new(files, n_reduce)?;
        Ok(Self {
            state: AppState::new(job, config.crash_timeout),
            config,
        })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Consulta de fin de job para el driver.
    pub fn done(&self) -> bool {
        self.state.is_done()
    }

    /// Sirve RPCs en `listener` con el monitor de reclaim corriendo al lado.
    /// Vuelve cuando el job terminó y pasó el período de gracia.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr().context("leyendo dirección local")?;
        let app = build_router(self.state.clone());

        let monitor = tokio::spawn(run_reclaim_loop(
            self.state.clone(),
            self.config.sweep_interval,
        ));

        info!(
            "coordinator escuchando en {} (crash_timeout={:?})",
            addr, self.config.crash_timeout
        );

        let shutdown = wait_until_done(
            self.state.clone(),
            self.config.done_poll_interval,
            self.config.grace_period,
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("servidor RPC")?;

        monitor.abort();
        info!("coordinator detenido");
        Ok(())
    }
}

async fn wait_until_done(state: AppState, poll: Duration, grace: Duration) {
    while !state.is_done() {
        sleep(poll).await;
    }
    info!("job terminado; respondiendo Exit durante {:?} más", grace);
    sleep(grace).await;
}
