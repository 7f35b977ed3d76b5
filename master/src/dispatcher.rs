use common::{TaskKind, TaskPayload};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tracing::info;
use worker::{HttpWorker, SessionWorker, SimulatedWorker};

use crate::config::Settings;
use crate::error::{AppError, AppResult};

/// Executor + argumentos ya resueltos para una tarea.
#[derive(Clone)]
pub struct ResolvedWorker {
    pub kind: TaskKind,
    pub executor: Arc<dyn SessionWorker>,
    pub payload: Arc<TaskPayload>,
}

/// Tabla tipo de tarea -> executor. La resolución se hace una sola vez,
/// al recibir la tarea; un tipo desconocido nunca llega al loop.
#[derive(Clone, Default)]
pub struct WorkerDispatcher {
    workers: HashMap<TaskKind, Arc<dyn SessionWorker>>,
}

impl WorkerDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker(mut self, kind: TaskKind, worker: Arc<dyn SessionWorker>) -> Self {
        self.workers.insert(kind, worker);
        self
    }

    /// El mismo executor para todos los tipos.
    pub fn uniform(worker: Arc<dyn SessionWorker>) -> Self {
        TaskKind::ALL
            .into_iter()
            .fold(Self::new(), |d, kind| d.with_worker(kind, Arc::clone(&worker)))
    }

    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.executor_url {
            Some(url) => {
                info!("usando executor remoto en {}", url);
                Self::uniform(Arc::new(HttpWorker::new(url.clone())))
            }
            None => {
                info!(
                    "EXECUTOR_URL no definida, usando executor simulado ({:?} por sesión)",
                    settings.simulated_work
                );
                Self::uniform(Arc::new(SimulatedWorker::new(settings.simulated_work)))
            }
        }
    }

    pub fn resolve(&self, kind_name: &str, extra_config: &Value) -> AppResult<ResolvedWorker> {
        let kind: TaskKind = kind_name
            .parse()
            .map_err(|e: common::TaskKindParseError| AppError::Validation(e.to_string()))?;

        let executor = self
            .workers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("no hay executor para {}", kind)))?;

        let payload = build_payload(kind, extra_config)?;

        Ok(ResolvedWorker {
            kind,
            executor,
            payload: Arc::new(payload),
        })
    }
}

fn build_payload(kind: TaskKind, extra_config: &Value) -> AppResult<TaskPayload> {
    match kind {
        TaskKind::CheckLive => Ok(TaskPayload::CheckLive),
        TaskKind::JoinGroup => {
            let links = match extra_config.get("links") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|v| {
                        v.as_str().map(str::to_string).ok_or_else(|| {
                            AppError::Validation("config.links debe ser una lista de strings".into())
                        })
                    })
                    .collect::<AppResult<Vec<_>>>()?,
                Some(_) => {
                    return Err(AppError::Validation(
                        "config.links debe ser una lista de strings".into(),
                    ))
                }
            };
            Ok(TaskPayload::JoinGroup { links })
        }
        TaskKind::Seeding => {
            let config = if extra_config.is_null() {
                json!({})
            } else {
                extra_config.clone()
            };
            Ok(TaskPayload::Seeding { config })
        }
    }
}
