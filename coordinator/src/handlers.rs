use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use common::{
    rpc::{HEALTH_PATH, POLL_TASK_PATH, REPORT_DONE_PATH, STATUS_PATH},
    JobStatusReply, PollTaskRequest, ReportDoneReply, ReportDoneRequest, Task, TaskKind,
};
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::state::{AppState, ReportOutcome};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(POLL_TASK_PATH, post(poll_task))
        .route(REPORT_DONE_PATH, post(report_done))
        .route(STATUS_PATH, get(job_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Entrega la siguiente tarea (o Wait / Exit). Nunca bloquea esperando trabajo.
async fn poll_task(
    State(state): State<AppState>,
    Json(req): Json<PollTaskRequest>,
) -> Json<Task> {
    let task = state.lock().poll(&req.worker_id, Instant::now());

    match task.kind {
        TaskKind::Map => info!(
            "asignando map {} (input={}) al worker {}",
            task.id, task.input, req.worker_id
        ),
        TaskKind::Reduce => info!(
            "asignando reduce {} al worker {}",
            task.id, req.worker_id
        ),
        TaskKind::Wait => debug!("worker {} pidió tarea pero no hay, Wait", req.worker_id),
        TaskKind::Exit => debug!("worker {} pidió tarea, job terminado: Exit", req.worker_id),
    }

    Json(task)
}

// Worker reporta que terminó una tarea. Siempre es un ack.
async fn report_done(
    State(state): State<AppState>,
    Json(req): Json<ReportDoneRequest>,
) -> Json<ReportDoneReply> {
    let (outcome, phase) = {
        let mut job = state.lock();
        let outcome = job.report_done(req.kind, req.task_id);
        (outcome, job.phase())
    };

    match outcome {
        ReportOutcome::Completed => info!(
            "tarea {:?} {} completada por worker {} (fase={:?})",
            req.kind, req.task_id, req.worker_id, phase
        ),
        ReportOutcome::AlreadyCompleted => info!(
            "reporte duplicado de {:?} {} (worker {}), ignorado",
            req.kind, req.task_id, req.worker_id
        ),
        ReportOutcome::NeverAssigned | ReportOutcome::Unknown => warn!(
            "reporte de {:?} {} (worker {}) sin tarea asignada: {:?}",
            req.kind, req.task_id, req.worker_id, outcome
        ),
    }

    Json(ReportDoneReply {
        accepted: outcome == ReportOutcome::Completed,
    })
}

async fn job_status(State(state): State<AppState>) -> Json<JobStatusReply> {
    Json(state.lock().status())
}
