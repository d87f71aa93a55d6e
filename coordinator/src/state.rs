// coordinator/src/state.rs

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use common::{JobStatusReply, Phase, Task, TaskCounts, TaskId, TaskKind, TaskStatus, WorkerId};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tracing::{info, warn};

/// Estado compartido entre handlers, monitor y driver.
/// Un único mutex protege tablas de tareas + fase.
#[derive(Clone)]
pub struct AppState {
    pub job: Arc<Mutex<JobState>>,
    /// tiempo máximo en InProgress antes de reclamar la tarea
    pub crash_timeout: Duration,
}

impl AppState {
    pub fn new(job: JobState, crash_timeout: Duration) -> Self {
        Self {
            job: Arc::new(Mutex::new(job)),
            crash_timeout,
        }
    }

    /// Toma el lock. Un panic en otro handler no deja el job trabado.
    pub fn lock(&self) -> MutexGuard<'_, JobState> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_done(&self) -> bool {
        self.lock().is_done()
    }
}

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Map: archivo de entrada. Reduce: vacío.
    pub input: String,
    pub assigned_at: Option<Instant>,
    pub assigned_to: Option<WorkerId>,
    /// veces que se entregó a un worker
    pub attempts: u32,
}

impl TaskRecord {
    fn new(id: TaskId, kind: TaskKind, input: String) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Idle,
            input,
            assigned_at: None,
            assigned_to: None,
            attempts: 0,
        }
    }
}

/// Resultado de un ReportDone. Todos son ack para el worker;
/// sólo `Completed` cambia el estado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Completed,
    AlreadyCompleted,
    /// nunca se entregó: no puede completarse por un reporte
    NeverAssigned,
    Unknown,
}

#[derive(Debug)]
pub struct JobState {
    n_reduce: u32,
    phase: Phase,
    map_tasks: Vec<TaskRecord>,
    // se crean recién al pasar a la fase Reduce
    reduce_tasks: Vec<TaskRecord>,
    reclaimed: u64,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    /// Una tarea Map por archivo de entrada, ids 0..M en el orden dado.
    pub fn new(files: Vec<String>, n_reduce: u32) -> Result<Self> {
        ensure!(n_reduce > 0, "n_reduce debe ser mayor que cero");

        let map_tasks = files
            .into_iter()
            .enumerate()
            .map(|(i, f)| TaskRecord::new(i as TaskId, TaskKind::Map, f))
            .collect();

        let mut job = Self {
            n_reduce,
            phase: Phase::Map,
            map_tasks,
            reduce_tasks: Vec::new(),
            reclaimed: 0,
            started_at: Utc::now(),
            finished_at: None,
        };
        // sin archivos de entrada la fase Map ya está completa
        job.advance_phase();
        Ok(job)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn n_reduce(&self) -> u32 {
        self.n_reduce
    }

    pub fn task(&self, kind: TaskKind, id: TaskId) -> Option<&TaskRecord> {
        match kind {
            TaskKind::Map => self.map_tasks.get(id as usize),
            TaskKind::Reduce => self.reduce_tasks.get(id as usize),
            TaskKind::Wait | TaskKind::Exit => None,
        }
    }

    fn table_mut(&mut self, kind: TaskKind) -> Option<&mut Vec<TaskRecord>> {
        match kind {
            TaskKind::Map => Some(&mut self.map_tasks),
            TaskKind::Reduce => Some(&mut self.reduce_tasks),
            TaskKind::Wait | TaskKind::Exit => None,
        }
    }

    /// PollTask: Exit si terminó, si no la tarea Idle de menor id de la fase
    /// actual (pasa a InProgress), si no Wait.
    pub fn poll(&mut self, worker_id: &str, now: Instant) -> Task {
        let kind = match self.phase {
            Phase::Done => return Task::exit(),
            Phase::Map => TaskKind::Map,
            Phase::Reduce => TaskKind::Reduce,
        };
        let n_reduce = self.n_reduce;
        let n_map = self.map_tasks.len() as u32;

        let Some(tasks) = self.table_mut(kind) else {
            return Task::wait();
        };
        let Some(rec) = tasks.iter_mut().find(|t| t.status == TaskStatus::Idle) else {
            return Task::wait();
        };

        rec.status = TaskStatus::InProgress;
        rec.assigned_at = Some(now);
        rec.assigned_to = Some(worker_id.to_string());
        rec.attempts += 1;

        Task {
            kind: rec.kind,
            id: rec.id,
            reducer_count: n_reduce,
            map_count: n_map,
            input: rec.input.clone(),
        }
    }

    /// ReportDone: InProgress -> Completed. Duplicados y reportes tardíos
    /// son no-ops. Si la fase quedó completa, avanza.
    pub fn report_done(&mut self, kind: TaskKind, id: TaskId) -> ReportOutcome {
        let Some(rec) = self
            .table_mut(kind)
            .and_then(|tasks| tasks.get_mut(id as usize))
        else {
            return ReportOutcome::Unknown;
        };

        match rec.status {
            TaskStatus::Completed => return ReportOutcome::AlreadyCompleted,
            TaskStatus::Idle if rec.attempts == 0 => return ReportOutcome::NeverAssigned,
            // InProgress, o Idle tras un reclaim: el worker original sí terminó
            TaskStatus::InProgress | TaskStatus::Idle => {
                rec.status = TaskStatus::Completed;
            }
        }

        self.advance_phase();
        ReportOutcome::Completed
    }

    /// Devuelve a Idle toda tarea InProgress con más de `timeout` desde su asignación.
    /// `assigned_at` / `assigned_to` quedan como estaban.
    pub fn reclaim_expired(&mut self, now: Instant, timeout: Duration) -> Vec<(TaskKind, TaskId)> {
        let mut reclaimed = Vec::new();

        for rec in self.map_tasks.iter_mut().chain(self.reduce_tasks.iter_mut()) {
            if rec.status != TaskStatus::InProgress {
                continue;
            }
            let Some(at) = rec.assigned_at else {
                continue;
            };
            let elapsed = now.saturating_duration_since(at);
            if elapsed > timeout {
                warn!(
                    "reclamando tarea {:?} {} (worker={:?}, {:?} en curso, intento {})",
                    rec.kind, rec.id, rec.assigned_to, elapsed, rec.attempts
                );
                rec.status = TaskStatus::Idle;
                reclaimed.push((rec.kind, rec.id));
            }
        }

        self.reclaimed += reclaimed.len() as u64;
        reclaimed
    }

    fn advance_phase(&mut self) {
        loop {
            match self.phase {
                Phase::Map if all_completed(&self.map_tasks) => {
                    self.reduce_tasks = (0..self.n_reduce)
                        .map(|p| TaskRecord::new(p, TaskKind::Reduce, String::new()))
                        .collect();
                    self.phase = Phase::Reduce;
                    info!(
                        "fase Map completa ({} tareas), creando {} tareas Reduce",
                        self.map_tasks.len(),
                        self.n_reduce
                    );
                }
                Phase::Reduce if all_completed(&self.reduce_tasks) => {
                    self.phase = Phase::Done;
                    self.finished_at = Some(Utc::now());
                    info!("fase Reduce completa, job terminado");
                }
                _ => return,
            }
        }
    }

    pub fn status(&self) -> JobStatusReply {
        JobStatusReply {
            phase: self.phase,
            n_map: self.map_tasks.len() as u32,
            n_reduce: self.n_reduce,
            map: counts(&self.map_tasks),
            reduce: counts(&self.reduce_tasks),
            reclaimed: self.reclaimed,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

fn all_completed(tasks: &[TaskRecord]) -> bool {
    tasks.iter().all(|t| t.status == TaskStatus::Completed)
}

fn counts(tasks: &[TaskRecord]) -> TaskCounts {
    let mut c = TaskCounts::default();
    for t in tasks {
        match t.status {
            TaskStatus::Idle => c.idle += 1,
            TaskStatus::InProgress => c.in_progress += 1,
            TaskStatus::Completed => c.completed += 1,
        }
    }
    c
}
