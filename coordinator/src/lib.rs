pub mod handlers;
pub mod monitor;
pub mod server;
pub mod state;

pub use server::{Coordinator, CoordinatorConfig};
pub use state::{AppState, JobState, ReportOutcome};
