use async_trait::async_trait;
use common::{TaskId, TaskPayload, WorkItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};

/// Todo lo que necesita un executor para procesar una sesión.
#[derive(Debug, Clone)]
pub struct SessionJob {
    pub task_id: TaskId,
    pub item: WorkItem,
    /// Ruta completa al archivo .session
    pub session_path: PathBuf,
    pub proxy: Option<String>,
    pub payload: Arc<TaskPayload>,
    /// true cuando es la invocación de mantenimiento con sesión admin
    pub admin: bool,
}

/// Resultado estructurado de una sesión.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOutcome {
    pub success: bool,
    pub status_text: String,
    #[serde(default)]
    pub detail: Value,
}

impl WorkOutcome {
    pub fn ok(status_text: impl Into<String>) -> Self {
        Self {
            success: true,
            status_text: status_text.into(),
            detail: Value::Null,
        }
    }

    pub fn failed(status_text: impl Into<String>) -> Self {
        Self {
            success: false,
            status_text: status_text.into(),
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Falla de una sola sesión. Nunca tumba el lote ni la tarea.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("sesión no encontrada: {0}")]
    SessionMissing(String),

    #[error("error HTTP hablando con el executor: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("el executor respondió {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Executor enchufable, uno por tipo de tarea.
#[async_trait]
pub trait SessionWorker: Send + Sync {
    async fn execute(&self, job: SessionJob) -> Result<WorkOutcome, WorkerError>;
}
