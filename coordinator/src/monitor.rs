use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info};

use crate::state::AppState;

/// Loop de tolerancia a fallos: cada `sweep_interval` devuelve a Idle las
/// tareas InProgress que superaron `crash_timeout`. Termina cuando el job
/// llega a Done.
pub async fn run_reclaim_loop(state: AppState, sweep_interval: Duration) {
    loop {
        sleep(sweep_interval).await;

        if sweep_once(&state) {
            debug!("job terminado, monitor de reclaim detenido");
            return;
        }
    }
}

/// Una pasada de chequeo bajo el mismo lock que los handlers.
/// Devuelve true si el job ya terminó.
pub fn sweep_once(state: &AppState) -> bool {
    let mut job = state.lock();
    let reclaimed = job.reclaim_expired(Instant::now(), state.crash_timeout);
    if !reclaimed.is_empty() {
        info!(
            "{} tarea(s) vuelven a Idle por timeout: {:?}",
            reclaimed.len(),
            reclaimed
        );
    }
    job.is_done()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobState;
    use common::{TaskKind, TaskStatus};

    #[tokio::test]
    async fn monitor_reclama_tareas_abandonadas() {
        let state = AppState::new(
            JobState::new(vec!["a.txt".into()], 1).unwrap(),
            Duration::from_millis(50),
        );
        let task = state.lock().poll("muerto", Instant::now());
        assert_eq!(task.kind, TaskKind::Map);

        let monitor = tokio::spawn(run_reclaim_loop(state.clone(), Duration::from_millis(10)));
        sleep(Duration::from_millis(300)).await;

        assert_eq!(
            state.lock().task(TaskKind::Map, 0).unwrap().status,
            TaskStatus::Idle
        );
        let again = state.lock().poll("vivo", Instant::now());
        assert_eq!((again.kind, again.id), (TaskKind::Map, 0));
        monitor.abort();
    }

    #[tokio::test]
    async fn monitor_termina_cuando_el_job_termina() {
        let state = AppState::new(JobState::new(Vec::new(), 1).unwrap(), Duration::from_secs(10));
        {
            let mut job = state.lock();
            let t = job.poll("w", Instant::now());
            job.report_done(t.kind, t.id);
        }

        let monitor = tokio::spawn(run_reclaim_loop(state, Duration::from_millis(10)));
        tokio::time::timeout(Duration::from_secs(2), monitor)
            .await
            .expect("el monitor debería terminar")
            .unwrap();
    }

    #[test]
    fn sweep_once_no_toca_tareas_recientes() {
        let state = AppState::new(
            JobState::new(vec!["a.txt".into(), "b.txt".into()], 1).unwrap(),
            Duration::from_secs(10),
        );
        state.lock().poll("w", Instant::now());

        assert!(!sweep_once(&state));
        assert_eq!(state.lock().status().map.in_progress, 1);
    }
}
