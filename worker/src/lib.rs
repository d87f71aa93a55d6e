pub mod client;
pub mod exec;
pub mod worker;

pub use client::CoordinatorClient;
pub use worker::{Worker, WorkerConfig, WorkerExit};
