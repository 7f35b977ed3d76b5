use async_trait::async_trait;
use common::{TaskId, TaskKind, TaskPayload};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::worker::{SessionJob, SessionWorker, WorkOutcome, WorkerError};

/// Lo que se le manda al servicio externo por cada sesión.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteExecuteRequest {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub filename: String,
    pub phone: String,
    pub session_path: String,
    pub proxy: Option<String>,
    pub payload: TaskPayload,
    pub admin: bool,
}

impl From<&SessionJob> for RemoteExecuteRequest {
    fn from(job: &SessionJob) -> Self {
        Self {
            task_id: job.task_id.clone(),
            kind: job.payload.kind(),
            filename: job.item.filename.clone(),
            phone: job.item.phone.clone(),
            session_path: job.session_path.to_string_lossy().to_string(),
            proxy: job.proxy.clone(),
            payload: job.payload.as_ref().clone(),
            admin: job.admin,
        }
    }
}

/// Manda cada sesión a un servicio executor externo por HTTP.
/// El protocolo con la red destino vive del otro lado.
#[derive(Debug, Clone)]
pub struct HttpWorker {
    client: Client,
    base_url: String,
}

impl HttpWorker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn execute_url(&self) -> String {
        format!("{}/api/v1/sessions/execute", self.base_url)
    }
}

#[async_trait]
impl SessionWorker for HttpWorker {
    async fn execute(&self, job: SessionJob) -> Result<WorkOutcome, WorkerError> {
        let body = RemoteExecuteRequest::from(&job);
        debug!("enviando sesión {} a {}", body.filename, self.base_url);

        let resp = self
            .client
            .post(self.execute_url())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WorkerError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json::<WorkOutcome>().await?)
    }
}
