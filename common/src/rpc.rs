use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = u32;
pub type WorkerId = String;

/// Rutas HTTP del coordinator. Worker y coordinator las comparten.
pub const POLL_TASK_PATH: &str = "/rpc/poll";
pub const REPORT_DONE_PATH: &str = "/rpc/done";
pub const STATUS_PATH: &str = "/api/v1/status";
pub const HEALTH_PATH: &str = "/health";

/* --------- Vocabulario de tareas --------- */

/// Tipo de tarea tal como viaja por el cable.
/// `Wait` y `Exit` son centinelas: no llevan id ni input útiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Map,
    Reduce,
    Wait,
    Exit,
}

impl TaskKind {
    /// true si la tarea implica trabajo real (Map o Reduce).
    pub fn is_work(self) -> bool {
        matches!(self, TaskKind::Map | TaskKind::Reduce)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Idle,
    InProgress,
    Completed,
}

/// Fase global del job. Sólo avanza: Map -> Reduce -> Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Map,
    Reduce,
    Done,
}

/// Descriptor de tarea que devuelve PollTask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub kind: TaskKind,
    pub id: TaskId,
    /// R: cantidad de reducers, necesaria para particionar en Map.
    pub reducer_count: u32,
    /// M: cantidad de tareas Map. Reduce lee exactamente `mr-tmp-0..M-<id>`.
    pub map_count: u32,
    /// Map: ruta del archivo de entrada. Reduce: vacío (la partición es `id`).
    pub input: String,
}

impl Task {
    pub fn wait() -> Self {
        Self {
            kind: TaskKind::Wait,
            id: 0,
            reducer_count: 0,
            map_count: 0,
            input: String::new(),
        }
    }

    pub fn exit() -> Self {
        Self {
            kind: TaskKind::Exit,
            id: 0,
            reducer_count: 0,
            map_count: 0,
            input: String::new(),
        }
    }
}

/* --------- Requests / responses --------- */

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollTaskRequest {
    #[serde(default)]
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDoneRequest {
    pub task_id: TaskId,
    pub kind: TaskKind,
    #[serde(default)]
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDoneReply {
    /// true sólo si este reporte completó la tarea; un reporte duplicado
    /// o tardío recibe `false` pero sigue siendo un ack válido.
    pub accepted: bool,
}

/* --------- Vista de estado (mrctl status) --------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCounts {
    pub idle: u32,
    pub in_progress: u32,
    pub completed: u32,
}

impl TaskCounts {
    pub fn total(&self) -> u32 {
        self.idle + self.in_progress + self.completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReply {
    pub phase: Phase,
    pub n_map: u32,
    pub n_reduce: u32,
    pub map: TaskCounts,
    pub reduce: TaskCounts,
    /// veces que el monitor devolvió una tarea a Idle
    pub reclaimed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
