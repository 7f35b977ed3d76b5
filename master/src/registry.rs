// master/src/registry.rs
//
// Registro en memoria de tareas. El mapa exterior sólo se bloquea para
// insertar o buscar; cada tarea tiene su propio Mutex, así que dos tareas
// distintas nunca se bloquean entre sí.

use chrono::{DateTime, Utc};
use common::{ActiveTask, ActiveTasks, OutcomeRecord, TaskId, TaskKind, TaskSnapshot, TaskStatus};
use std::{
    collections::HashMap,
    mem,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("tarea {0} no encontrada")]
    NotFound(TaskId),
    #[error("tarea {task_id}: processed superaría total={total}")]
    Overflow { task_id: TaskId, total: usize },
}

#[derive(Debug)]
struct TaskEntry {
    kind: TaskKind,
    group_ref: String,
    status: TaskStatus,
    total: usize,
    processed: usize,
    success: usize,
    failed: usize,
    results: Vec<OutcomeRecord>,
    messages: Vec<String>,
    submitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    cancel: CancellationToken,
    /// El runner sigue vivo; puede haber sesiones en vuelo aunque esté stopped
    runner_active: bool,
}

impl TaskEntry {
    /// results y messages acumulados desde la última lectura, vaciándolos.
    fn take_pending(&mut self) -> (Vec<OutcomeRecord>, Vec<String>) {
        (mem::take(&mut self.results), mem::take(&mut self.messages))
    }

    fn active_summary(&self) -> ActiveTask {
        ActiveTask {
            task_name: self.kind,
            group_id: self.group_ref.clone(),
            status: self.status,
            total: self.total,
            processed: self.processed,
            success: self.success,
            failed: self.failed,
        }
    }
}

/// Estado y contadores de una tarea, sin drenar nada.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub status: TaskStatus,
    pub total: usize,
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// La tarea estaba corriendo y ahora está en `stopped`
    Stopped,
    /// Ya estaba parada o terminada: no se toca nada
    NotRunning,
    Unknown,
}

/// running -> cualquiera; stopped -> failed; terminales no cambian.
fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    match from {
        TaskStatus::Running => to != TaskStatus::Running,
        TaskStatus::Stopped => to == TaskStatus::Failed,
        TaskStatus::Completed | TaskStatus::Failed => false,
    }
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<TaskId, Arc<Mutex<TaskEntry>>>>>,
}

fn lock(entry: &Mutex<TaskEntry>) -> MutexGuard<'_, TaskEntry> {
    // nadie hace panic con el lock tomado; si pasara, el estado sigue siendo usable
    entry.lock().unwrap_or_else(|e| e.into_inner())
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, task_id: &str) -> Result<Arc<Mutex<TaskEntry>>, RegistryError> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))
    }

    fn entries(&self) -> Vec<(TaskId, Arc<Mutex<TaskEntry>>)> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        tasks
            .iter()
            .map(|(id, e)| (id.clone(), Arc::clone(e)))
            .collect()
    }

    pub fn create(&self, kind: TaskKind, group_ref: &str, total: usize) -> TaskId {
        let entry = TaskEntry {
            kind,
            group_ref: group_ref.to_string(),
            status: TaskStatus::Running,
            total,
            processed: 0,
            success: 0,
            failed: 0,
            results: Vec::new(),
            messages: Vec::new(),
            submitted_at: Utc::now(),
            finished_at: None,
            cancel: CancellationToken::new(),
            runner_active: false,
        };

        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        let mut task_id = uuid::Uuid::new_v4().to_string();
        while tasks.contains_key(&task_id) {
            task_id = uuid::Uuid::new_v4().to_string();
        }
        tasks.insert(task_id.clone(), Arc::new(Mutex::new(entry)));

        info!("tarea {} creada ({}, grupo={}, total={})", task_id, kind, group_ref, total);
        task_id
    }

    pub fn get(&self, task_id: &str) -> Result<TaskView, RegistryError> {
        let entry = self.entry(task_id)?;
        let e = lock(&entry);
        Ok(TaskView {
            status: e.status,
            total: e.total,
            processed: e.processed,
            success: e.success,
            failed: e.failed,
        })
    }

    /// Agrega el resultado y actualiza processed + success/failed bajo el mismo lock.
    pub fn record_outcome(&self, task_id: &str, record: OutcomeRecord) -> Result<(), RegistryError> {
        let entry = self.entry(task_id)?;
        let mut e = lock(&entry);

        if e.processed >= e.total {
            return Err(RegistryError::Overflow {
                task_id: task_id.to_string(),
                total: e.total,
            });
        }

        e.processed += 1;
        if record.success {
            e.success += 1;
        } else {
            e.failed += 1;
        }
        e.results.push(record);
        Ok(())
    }

    pub fn append_message(&self, task_id: &str, text: impl Into<String>) -> Result<(), RegistryError> {
        let entry = self.entry(task_id)?;
        lock(&entry).messages.push(text.into());
        Ok(())
    }

    /// Devuelve y vacía results y messages en un solo paso.
    #[cfg(test)]
    pub fn drain(&self, task_id: &str) -> Result<(Vec<OutcomeRecord>, Vec<String>), RegistryError> {
        let entry = self.entry(task_id)?;
        let pending = lock(&entry).take_pending();
        Ok(pending)
    }

    /// Cambia el estado si la transición es válida. Devuelve si se aplicó.
    pub fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, RegistryError> {
        let entry = self.entry(task_id)?;
        let mut e = lock(&entry);

        if !can_transition(e.status, status) {
            return Ok(false);
        }

        info!("tarea {}: {:?} -> {:?}", task_id, e.status, status);
        e.status = status;
        if status == TaskStatus::Stopped {
            e.cancel.cancel();
        }
        if e.finished_at.is_none() {
            e.finished_at = Some(Utc::now());
        }
        Ok(true)
    }

    pub fn list_active(&self) -> ActiveTasks {
        self.entries()
            .into_iter()
            .filter_map(|(id, entry)| {
                let e = lock(&entry);
                let summary = e.status.is_active().then(|| e.active_summary());
                summary.map(|s| (id, s))
            })
            .collect()
    }

    /// Estado + contadores + lo acumulado desde el último poll (que se drena).
    pub fn poll(&self, task_id: &str) -> Result<TaskSnapshot, RegistryError> {
        let entry = self.entry(task_id)?;
        let mut e = lock(&entry);
        let (results, messages) = e.take_pending();

        Ok(TaskSnapshot {
            task_name: e.kind,
            group_id: e.group_ref.clone(),
            status: e.status,
            total: e.total,
            processed: e.processed,
            success: e.success,
            failed: e.failed,
            results,
            messages,
            runner_active: e.runner_active,
            submitted_at: e.submitted_at,
            finished_at: e.finished_at,
        })
    }

    /// Pedido de parada cooperativo. Sólo actúa si la tarea está en `running`.
    pub fn stop(&self, task_id: &str) -> StopOutcome {
        let Ok(entry) = self.entry(task_id) else {
            return StopOutcome::Unknown;
        };
        let mut e = lock(&entry);

        if e.status != TaskStatus::Running {
            return StopOutcome::NotRunning;
        }

        e.status = TaskStatus::Stopped;
        e.finished_at = Some(Utc::now());
        e.cancel.cancel();
        info!("tarea {}: parada solicitada ({}/{} procesadas)", task_id, e.processed, e.total);
        StopOutcome::Stopped
    }

    pub fn cancel_token(&self, task_id: &str) -> Result<CancellationToken, RegistryError> {
        let entry = self.entry(task_id)?;
        let token = lock(&entry).cancel.clone();
        Ok(token)
    }

    /// Lo marca el supervisor del runner al arrancar y al terminar.
    pub fn set_runner_active(&self, task_id: &str, active: bool) -> Result<(), RegistryError> {
        let entry = self.entry(task_id)?;
        lock(&entry).runner_active = active;
        Ok(())
    }

    /// Alguna tarea de este grupo sigue usando sus archivos: está en
    /// `running` o su runner todavía no terminó (stop con sesiones en vuelo).
    pub fn has_running_for_group(&self, group_ref: &str) -> bool {
        self.entries().iter().any(|(_, entry)| {
            let e = lock(entry);
            (e.status == TaskStatus::Running || e.runner_active) && e.group_ref == group_ref
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
