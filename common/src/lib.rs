pub mod app;
pub mod engine;
pub mod kv;
pub mod naming;
pub mod rpc;

pub use app::{app_by_name, MapReduceApp, APP_NAMES};
pub use kv::{ihash, partition_for, KeyValue};
pub use rpc::{
    JobStatusReply, Phase, PollTaskRequest, ReportDoneReply, ReportDoneRequest, Task,
    TaskCounts, TaskId, TaskKind, TaskStatus, WorkerId,
};
