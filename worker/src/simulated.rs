use async_trait::async_trait;
use common::TaskPayload;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::worker::{SessionJob, SessionWorker, WorkOutcome, WorkerError};

/// Executor local que no toca la red: valida que el archivo de sesión
/// exista, "trabaja" un rato y contesta según el tipo de tarea.
#[derive(Debug, Clone)]
pub struct SimulatedWorker {
    work: Duration,
}

impl SimulatedWorker {
    pub fn new(work: Duration) -> Self {
        Self { work }
    }
}

#[async_trait]
impl SessionWorker for SimulatedWorker {
    async fn execute(&self, job: SessionJob) -> Result<WorkOutcome, WorkerError> {
        if !job.session_path.is_file() {
            return Err(WorkerError::SessionMissing(
                job.session_path.display().to_string(),
            ));
        }

        debug!(
            "simulando sesión {} (task={}, proxy={:?}) por {:?}",
            job.item.filename, job.task_id, job.proxy, self.work
        );
        sleep(self.work).await;

        let outcome = match job.payload.as_ref() {
            TaskPayload::CheckLive => WorkOutcome::ok("Live"),
            TaskPayload::JoinGroup { links } if links.is_empty() => {
                WorkOutcome::failed("sin links para unirse")
            }
            TaskPayload::JoinGroup { links } => {
                WorkOutcome::ok(format!("unido a {} grupos", links.len()))
                    .with_detail(json!({ "links": links }))
            }
            TaskPayload::Seeding { config } => {
                WorkOutcome::ok("seeding enviado").with_detail(config.clone())
            }
        };

        Ok(outcome)
    }
}
