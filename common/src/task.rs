use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, fmt, path::Path, str::FromStr};

use crate::document::{load_document, save_document, DocumentError};

pub type TaskId = String;

/* --------- Tipo de tarea y payload por tipo --------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "check-live", alias = "liveness-check")]
    CheckLive,
    #[serde(rename = "joinGroup", alias = "group-join")]
    JoinGroup,
    #[serde(rename = "seedingGroup", alias = "seeding")]
    Seeding,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::CheckLive, TaskKind::JoinGroup, TaskKind::Seeding];

    /// Nombre que viaja por la API (el mismo que usa el dashboard).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::CheckLive => "check-live",
            TaskKind::JoinGroup => "joinGroup",
            TaskKind::Seeding => "seedingGroup",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tipo de tarea no soportado: {0}")]
pub struct TaskKindParseError(pub String);

impl FromStr for TaskKind {
    type Err = TaskKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "check-live" | "liveness-check" => Ok(TaskKind::CheckLive),
            "joinGroup" | "group-join" => Ok(TaskKind::JoinGroup),
            "seedingGroup" | "seeding" => Ok(TaskKind::Seeding),
            other => Err(TaskKindParseError(other.to_string())),
        }
    }
}

/// Argumentos extra que recibe el executor, uno por tipo de tarea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    CheckLive,
    JoinGroup { links: Vec<String> },
    Seeding { config: Value },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::CheckLive => TaskKind::CheckLive,
            TaskPayload::JoinGroup { .. } => TaskKind::JoinGroup,
            TaskPayload::Seeding { .. } => TaskKind::Seeding,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Stopped,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Las tareas activas son las que aparecen en /active-tasks.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Stopped)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/* --------- Peticiones y respuestas HTTP --------- */

fn default_core() -> usize {
    5
}
fn default_delay_per_session() -> u64 {
    10
}
fn default_delay_between_batches() -> u64 {
    600
}
fn default_admin_delay() -> u64 {
    10
}

/// Cuerpo de POST /run-task. Acepta tanto los nombres nuevos como los del dashboard viejo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTaskRequest {
    #[serde(default, alias = "groupId")]
    pub group_ref: String,
    #[serde(default, alias = "task")]
    pub task_kind: String,
    #[serde(default, alias = "config")]
    pub extra_config: Value,
    #[serde(default)]
    pub filenames: Vec<String>,

    #[serde(default = "default_core")]
    pub core: usize,
    /// Segundos entre el arranque de dos sesiones del mismo lote
    #[serde(default = "default_delay_per_session")]
    pub delay_per_session: u64,
    /// Segundos de espera entre lotes
    #[serde(default = "default_delay_between_batches")]
    pub delay_between_batches: u64,
    #[serde(default)]
    pub admin_enabled: bool,
    #[serde(default = "default_admin_delay")]
    pub admin_delay: u64,
}

impl RunTaskRequest {
    pub fn new(group_ref: &str, kind: TaskKind, filenames: Vec<String>) -> Self {
        let defaults = SeedingDefaults::default();
        Self {
            group_ref: group_ref.to_string(),
            task_kind: kind.as_str().to_string(),
            extra_config: Value::Null,
            filenames,
            core: defaults.core,
            delay_per_session: defaults.delay_per_session,
            delay_between_batches: defaults.delay_between_batches,
            admin_enabled: defaults.admin_enabled,
            admin_delay: defaults.admin_delay,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTaskResponse {
    pub task_id: TaskId,
}

/// Ajustes de ritmo guardados (los que precarga el formulario).
/// Campos ausentes en un POST toman el valor por defecto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedingDefaults {
    pub core: usize,
    pub delay_per_session: u64,
    pub delay_between_batches: u64,
    pub admin_enabled: bool,
    pub admin_delay: u64,
}

impl Default for SeedingDefaults {
    fn default() -> Self {
        Self {
            core: default_core(),
            delay_per_session: default_delay_per_session(),
            delay_between_batches: default_delay_between_batches(),
            admin_enabled: false,
            admin_delay: default_admin_delay(),
        }
    }
}

impl SeedingDefaults {
    pub fn load(path: &Path) -> Self {
        load_document(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        save_document(path, self)
    }
}

/// Config extra guardada por tipo de tarea, indexada por el nombre de la API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfigs(HashMap<String, Value>);

impl TaskConfigs {
    pub fn load(path: &Path) -> Self {
        load_document(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        save_document(path, self)
    }

    /// Config guardada para el tipo; `{}` si nunca se guardó nada.
    pub fn get(&self, kind: TaskKind) -> Value {
        self.0
            .get(kind.as_str())
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    pub fn set(&mut self, kind: TaskKind, config: Value) {
        self.0.insert(kind.as_str().to_string(), config);
    }
}

/// Resultado de una sesión individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub filename: String,
    pub phone: String,
    pub success: bool,
    pub proxy: Option<String>,
    pub status_text: String,
    #[serde(default)]
    pub detail: Value,
    pub finished_at: DateTime<Utc>,
}

/// Respuesta de GET /task-status/:id. results y messages vienen "drenados".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_name: TaskKind,
    pub group_id: String,
    pub status: TaskStatus,
    pub total: usize,
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    pub results: Vec<OutcomeRecord>,
    pub messages: Vec<String>,
    /// true mientras el runner siga vivo (también después de un stop,
    /// hasta que terminen las sesiones en vuelo)
    #[serde(default)]
    pub runner_active: bool,

    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Entrada de GET /active-tasks: sólo contadores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTask {
    pub task_name: TaskKind,
    pub group_id: String,
    pub status: TaskStatus,
    pub total: usize,
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
}

pub type ActiveTasks = HashMap<TaskId, ActiveTask>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_kind_acepta_nombres_nuevos_y_viejos() {
        assert_eq!("check-live".parse::<TaskKind>().unwrap(), TaskKind::CheckLive);
        assert_eq!("liveness-check".parse::<TaskKind>().unwrap(), TaskKind::CheckLive);
        assert_eq!("group-join".parse::<TaskKind>().unwrap(), TaskKind::JoinGroup);
        assert_eq!("seedingGroup".parse::<TaskKind>().unwrap(), TaskKind::Seeding);
        assert!("reboot".parse::<TaskKind>().is_err());
    }

    #[test]
    fn run_task_request_aplica_defaults() {
        let req: RunTaskRequest = serde_json::from_value(json!({
            "groupId": "grupo1",
            "task": "check-live",
            "filenames": ["a.session"]
        }))
        .unwrap();

        assert_eq!(req.group_ref, "grupo1");
        assert_eq!(req.task_kind, "check-live");
        assert_eq!(req.core, 5);
        assert_eq!(req.delay_per_session, 10);
        assert_eq!(req.delay_between_batches, 600);
        assert!(!req.admin_enabled);
        assert_eq!(req.admin_delay, 10);
    }

    #[test]
    fn run_task_request_sin_campos_deja_vacios() {
        let req: RunTaskRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.group_ref.is_empty());
        assert!(req.task_kind.is_empty());
        assert!(req.filenames.is_empty());
    }

    #[test]
    fn seeding_defaults_parciales_completan_con_default() {
        let s: SeedingDefaults = serde_json::from_value(json!({"core": 3, "run_time": "08:00"})).unwrap();
        assert_eq!(s.core, 3);
        assert_eq!(s.delay_between_batches, 600);
    }

    #[test]
    fn task_configs_por_tipo() {
        let mut cfgs = TaskConfigs::default();
        assert_eq!(cfgs.get(TaskKind::Seeding), json!({}));
        cfgs.set(TaskKind::JoinGroup, json!({"links": ["https://t.me/a"]}));
        assert_eq!(
            serde_json::to_value(&cfgs).unwrap(),
            json!({"joinGroup": {"links": ["https://t.me/a"]}})
        );
    }

    #[test]
    fn task_status_se_serializa_en_minusculas() {
        assert_eq!(serde_json::to_value(TaskStatus::Stopped).unwrap(), json!("stopped"));
        assert!(TaskStatus::Stopped.is_active());
        assert!(!TaskStatus::Completed.is_active());
        assert!(TaskStatus::Failed.is_terminal());
    }
}
