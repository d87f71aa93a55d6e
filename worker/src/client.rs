use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use common::{
    naming::read_rendezvous,
    rpc::{POLL_TASK_PATH, REPORT_DONE_PATH},
    PollTaskRequest, ReportDoneReply, ReportDoneRequest, Task,
};
use reqwest::Client;

/// Cliente HTTP de las dos RPC del coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    http: Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>, rpc_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(rpc_timeout)
            .build()
            .context("creando cliente HTTP")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    /// Resuelve la URL desde el archivo de rendezvous publicado por el coordinator.
    pub fn from_rendezvous(path: &Path, rpc_timeout: Duration) -> Result<Self> {
        let url = read_rendezvous(path)
            .with_context(|| format!("leyendo rendezvous {}", path.display()))?;
        Self::new(url, rpc_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn poll_task(&self, worker_id: &str) -> Result<Task> {
        let url = format!("{}{}", self.base_url, POLL_TASK_PATH);
        let task = self
            .http
            .post(&url)
            .json(&PollTaskRequest {
                worker_id: worker_id.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json::<Task>()
            .await?;
        Ok(task)
    }

    pub async fn report_done(&self, task: &Task, worker_id: &str) -> Result<ReportDoneReply> {
        let url = format!("{}{}", self.base_url, REPORT_DONE_PATH);
        let reply = self
            .http
            .post(&url)
            .json(&ReportDoneRequest {
                task_id: task.id,
                kind: task.kind,
                worker_id: worker_id.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json::<ReportDoneReply>()
            .await?;
        Ok(reply)
    }
}
