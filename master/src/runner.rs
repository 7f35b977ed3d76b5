// master/src/runner.rs
//
// Motor de ejecución por lotes: parte las sesiones en lotes de `core`,
// lanza cada lote en paralelo (escalonando los arranques), espera a que
// termine el lote entero y recién ahí pasa al siguiente.

use anyhow::Context;
use chrono::Utc;
use common::{
    OutcomeRecord, ProxyAllocator, RunTaskRequest, TaskId, TaskStatus, WorkItem,
};
use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use worker::{SessionJob, WorkOutcome, WorkerError};

use crate::dispatcher::ResolvedWorker;
use crate::registry::TaskRegistry;

/// Parámetros de ritmo, congelados al momento de crear la tarea.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub core: usize,
    pub delay_per_session: Duration,
    pub delay_between_batches: Duration,
    pub admin_enabled: bool,
    pub admin_delay: Duration,
    pub item_timeout: Duration,
    pub proxies: ProxyAllocator,
    /// Carpeta y archivos de sesiones admin (vacío si admin está apagado)
    pub admin_folder: PathBuf,
    pub admin_sessions: Vec<String>,
}

impl BatchConfig {
    pub fn from_request(req: &RunTaskRequest, proxies: ProxyAllocator, item_timeout: Duration) -> Self {
        Self {
            core: req.core.max(1),
            delay_per_session: Duration::from_secs(req.delay_per_session),
            delay_between_batches: Duration::from_secs(req.delay_between_batches),
            admin_enabled: req.admin_enabled,
            admin_delay: Duration::from_secs(req.admin_delay),
            item_timeout,
            proxies,
            admin_folder: PathBuf::new(),
            admin_sessions: Vec::new(),
        }
    }

    pub fn with_admin_pool(mut self, folder: PathBuf, sessions: Vec<String>) -> Self {
        self.admin_folder = folder;
        self.admin_sessions = sessions;
        self
    }
}

/// Cantidad de lotes para `n` sesiones: ceil(n / core).
pub fn batch_count(n: usize, core: usize) -> usize {
    n.div_ceil(core.max(1))
}

/// Lotes consecutivos de tamaño `core`; el último puede ser más corto.
pub fn partition<T>(items: &[T], core: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(core.max(1))
}

#[derive(Debug, thiserror::Error)]
enum ItemError {
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("timeout tras {0:?}")]
    Timeout(Duration),
}

/// Una sesión lanzada y todavía sin juntar.
struct Unit {
    item: WorkItem,
    proxy: Option<String>,
    handle: JoinHandle<Result<WorkOutcome, ItemError>>,
}

pub struct BatchRunner {
    registry: TaskRegistry,
    task_id: TaskId,
    folder: PathBuf,
    items: Vec<WorkItem>,
    config: BatchConfig,
    worker: ResolvedWorker,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        registry: TaskRegistry,
        task_id: TaskId,
        folder: PathBuf,
        items: Vec<WorkItem>,
        config: BatchConfig,
        worker: ResolvedWorker,
    ) -> anyhow::Result<Self> {
        let cancel = registry
            .cancel_token(&task_id)
            .context("no se pudo preparar el runner")?;

        Ok(Self {
            registry,
            task_id,
            folder,
            items,
            config,
            worker,
            cancel,
        })
    }

    /// Lanza el runner desacoplado de la petición que lo creó.
    pub fn spawn(self) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let task_id = self.task_id.clone();
        launch(registry, task_id, self.run())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let core = self.config.core.max(1);
        let total_batches = batch_count(self.items.len(), core);

        self.message(format!(
            "iniciando {} sesiones en {} lotes (core={})",
            self.items.len(),
            total_batches,
            core
        ))?;

        for (batch_index, batch) in partition(&self.items, core).enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }

            info!(
                "tarea {}: lote {}/{} ({} sesiones)",
                self.task_id,
                batch_index + 1,
                total_batches,
                batch.len()
            );

            let units = self.dispatch_batch(batch_index * core, batch).await;
            let dispatched = units.len();

            // el límite de lote es un punto de unión: se esperan todas
            let mut records = Vec::with_capacity(dispatched);
            for unit in units {
                records.push(self.join_unit(unit).await);
            }

            for record in records {
                let line = describe(&record);
                self.registry.record_outcome(&self.task_id, record)?;
                self.message(line)?;
            }

            if dispatched < batch.len() || self.cancel.is_cancelled() {
                break;
            }

            if self.config.admin_enabled {
                self.run_admin(batch_index).await?;
            }

            let is_last = batch_index + 1 == total_batches;
            if !is_last && !self.cancel.is_cancelled() {
                info!(
                    "tarea {}: esperando {:?} hasta el próximo lote",
                    self.task_id, self.config.delay_between_batches
                );
                self.pause(self.config.delay_between_batches).await;
            }
        }

        if !self.cancel.is_cancelled() {
            self.registry.set_status(&self.task_id, TaskStatus::Completed)?;
        }

        // un stop que llega justo acá gana: la tarea queda stopped
        let view = self.registry.get(&self.task_id)?;
        if view.status == TaskStatus::Completed {
            self.message(format!(
                "tarea completada: {} ok, {} fallidas",
                view.success, view.failed
            ))?;
        } else {
            self.message(format!(
                "tarea detenida: {}/{} procesadas",
                view.processed, view.total
            ))?;
        }
        info!("tarea {}: fin del runner ({:?})", self.task_id, view.status);

        Ok(())
    }

    fn message(&self, text: impl Into<String>) -> anyhow::Result<()> {
        self.registry.append_message(&self.task_id, text)?;
        Ok(())
    }

    /// Duerme `d` salvo que llegue un stop antes. Devuelve false si se cortó.
    async fn pause(&self, d: Duration) -> bool {
        if d.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(d) => true,
        }
    }

    /// Lanza cada sesión del lote escalonando los arranques por
    /// `delay_per_session`. Antes de cada sesión se revisa el stop.
    async fn dispatch_batch(&self, base_index: usize, batch: &[WorkItem]) -> Vec<Unit> {
        let mut units = Vec::with_capacity(batch.len());

        for (offset, item) in batch.iter().enumerate() {
            if offset > 0 && !self.pause(self.config.delay_per_session).await {
                break;
            }
            if self.cancel.is_cancelled() {
                break;
            }

            let proxy = self
                .config
                .proxies
                .for_index(base_index + offset)
                .map(str::to_string);

            let job = SessionJob {
                task_id: self.task_id.clone(),
                item: item.clone(),
                session_path: self.folder.join(&item.filename),
                proxy: proxy.clone(),
                payload: Arc::clone(&self.worker.payload),
                admin: false,
            };

            units.push(Unit {
                item: item.clone(),
                proxy,
                handle: self.spawn_unit(job),
            });
        }

        units
    }

    fn spawn_unit(&self, job: SessionJob) -> JoinHandle<Result<WorkOutcome, ItemError>> {
        let executor = Arc::clone(&self.worker.executor);
        let limit = self.config.item_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(limit, executor.execute(job)).await {
                Ok(res) => res.map_err(ItemError::from),
                Err(_) => Err(ItemError::Timeout(limit)),
            }
        })
    }

    /// Espera una sesión. Cualquier falla queda como resultado fallido.
    async fn join_unit(&self, unit: Unit) -> OutcomeRecord {
        let outcome = settle(&self.task_id, &unit.item, unit.handle.await);

        OutcomeRecord {
            filename: unit.item.filename,
            phone: unit.item.phone,
            success: outcome.success,
            proxy: unit.proxy,
            status_text: outcome.status_text,
            detail: outcome.detail,
            finished_at: Utc::now(),
        }
    }

    /// Una invocación extra con sesión admin después de cada lote.
    /// No cuenta para total/processed; sólo deja un mensaje.
    async fn run_admin(&self, batch_index: usize) -> anyhow::Result<()> {
        if !self.pause(self.config.admin_delay).await {
            return Ok(());
        }

        let pool = &self.config.admin_sessions;
        if pool.is_empty() {
            return self.message("[admin] no hay sesiones admin, se omite");
        }

        let filename = &pool[batch_index % pool.len()];
        let item = WorkItem::new(filename.clone());
        let job = SessionJob {
            task_id: self.task_id.clone(),
            item: item.clone(),
            session_path: self.config.admin_folder.join(filename),
            proxy: self.config.proxies.for_index(batch_index).map(str::to_string),
            payload: Arc::clone(&self.worker.payload),
            admin: true,
        };

        let outcome = settle(&self.task_id, &item, self.spawn_unit(job).await);
        let estado = if outcome.success { "ok" } else { "error" };
        self.message(format!(
            "[admin] {} -> {} ({})",
            item.phone, estado, outcome.status_text
        ))
    }
}

fn settle(
    task_id: &str,
    item: &WorkItem,
    joined: Result<Result<WorkOutcome, ItemError>, tokio::task::JoinError>,
) -> WorkOutcome {
    match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!("tarea {}: sesión {} falló: {}", task_id, item.filename, e);
            WorkOutcome::failed(e.to_string())
        }
        Err(e) => {
            warn!("tarea {}: sesión {} abortó: {}", task_id, item.filename, e);
            WorkOutcome::failed(format!("el executor abortó: {e}"))
        }
    }
}

fn describe(record: &OutcomeRecord) -> String {
    let estado = if record.success { "ok" } else { "error" };
    format!("{} -> {} ({})", record.phone, estado, record.status_text)
}

/// Corre `run` en segundo plano y vigila que una falla del loop (error o
/// panic) deje la tarea en `failed` con el motivo en los mensajes.
/// Mientras el runner vive la tarea figura con `runner_active`.
pub fn launch<F>(registry: TaskRegistry, task_id: TaskId, run: F) -> JoinHandle<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    if let Err(e) = registry.set_runner_active(&task_id, true) {
        warn!("no se pudo marcar el runner de {} como activo: {}", task_id, e);
    }
    let inner = tokio::spawn(run);

    tokio::spawn(async move {
        let fault = match inner.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(e) => Some(format!("panic en el runner: {e}")),
        };

        if let Some(fault) = fault {
            error!("tarea {} terminó con error: {}", task_id, fault);
            if let Err(e) = registry.append_message(&task_id, format!("error interno: {fault}")) {
                warn!("no se pudo registrar el error de la tarea {}: {}", task_id, e);
            }
            if let Err(e) = registry.set_status(&task_id, TaskStatus::Failed) {
                warn!("no se pudo marcar la tarea {} como failed: {}", task_id, e);
            }
        }

        if let Err(e) = registry.set_runner_active(&task_id, false) {
            warn!("no se pudo cerrar el runner de {}: {}", task_id, e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{TaskKind, TaskPayload};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };
    use tokio::time::Instant;
    use worker::SessionWorker;

    /// Executor de prueba. Según el prefijo del archivo: "fail" devuelve
    /// error, "panic" hace panic, "hang" no termina nunca.
    struct FakeWorker {
        work: Duration,
        origin: Instant,
        log: Mutex<Vec<(String, Duration)>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
        admin_calls: AtomicUsize,
    }

    impl FakeWorker {
        fn new(work: Duration) -> Arc<Self> {
            Arc::new(Self {
                work,
                origin: Instant::now(),
                log: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                admin_calls: AtomicUsize::new(0),
            })
        }

        fn push(&self, event: String) {
            self.log.lock().unwrap().push((event, self.origin.elapsed()));
        }

        fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
        }

        fn at(&self, event: &str) -> Duration {
            self.log
                .lock()
                .unwrap()
                .iter()
                .find(|(e, _)| e == event)
                .map(|(_, t)| *t)
                .unwrap()
        }

        fn position(&self, event: &str) -> usize {
            self.events().iter().position(|e| e == event).unwrap()
        }
    }

    #[async_trait]
    impl SessionWorker for FakeWorker {
        async fn execute(&self, job: SessionJob) -> Result<WorkOutcome, WorkerError> {
            let name = job.item.filename.clone();
            self.calls.fetch_add(1, Ordering::SeqCst);
            if job.admin {
                self.admin_calls.fetch_add(1, Ordering::SeqCst);
            }

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.push(format!("start {name}"));

            if name.starts_with("hang") {
                sleep(Duration::from_secs(86_400)).await;
            }
            if name.starts_with("panic") {
                self.active.fetch_sub(1, Ordering::SeqCst);
                panic!("executor roto");
            }
            sleep(self.work).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.push(format!("end {name}"));

            if name.starts_with("fail") {
                return Err(WorkerError::Other("sesión muerta".into()));
            }
            Ok(WorkOutcome::ok("Live"))
        }
    }

    fn config(core: usize) -> BatchConfig {
        BatchConfig {
            core,
            delay_per_session: Duration::ZERO,
            delay_between_batches: Duration::ZERO,
            admin_enabled: false,
            admin_delay: Duration::ZERO,
            item_timeout: Duration::from_secs(60),
            proxies: ProxyAllocator::default(),
            admin_folder: PathBuf::from("/tmp/admin"),
            admin_sessions: Vec::new(),
        }
    }

    fn runner(
        names: &[&str],
        cfg: BatchConfig,
        fake: &Arc<FakeWorker>,
    ) -> (TaskRegistry, TaskId, BatchRunner) {
        let registry = TaskRegistry::new();
        let task_id = registry.create(TaskKind::CheckLive, "g1", names.len());
        let items = names.iter().map(|n| WorkItem::new(*n)).collect();
        let worker = ResolvedWorker {
            kind: TaskKind::CheckLive,
            executor: Arc::clone(fake) as Arc<dyn SessionWorker>,
            payload: Arc::new(TaskPayload::CheckLive),
        };
        let r = BatchRunner::new(
            registry.clone(),
            task_id.clone(),
            PathBuf::from("/tmp/g1"),
            items,
            cfg,
            worker,
        )
        .unwrap();
        (registry, task_id, r)
    }

    #[test]
    fn particion_en_lotes_de_core() {
        let items: Vec<u32> = (0..7).collect();
        let sizes: Vec<usize> = partition(&items, 3).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(batch_count(7, 3), 3);
        assert_eq!(batch_count(6, 3), 2);
        assert_eq!(batch_count(0, 5), 0);
        // core 0 se trata como 1
        assert_eq!(batch_count(4, 0), 4);

        for n in 0..20 {
            for k in 1..6 {
                let items: Vec<usize> = (0..n).collect();
                let batches: Vec<_> = partition(&items, k).collect();
                assert_eq!(batches.len(), batch_count(n, k));
                if let Some((last, rest)) = batches.split_last() {
                    assert!(rest.iter().all(|b| b.len() == k));
                    assert!(!last.is_empty() && last.len() <= k);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn core_2_con_tres_items_espera_el_primer_lote() {
        let fake = FakeWorker::new(Duration::from_secs(3));
        let (reg, id, r) = runner(&["A", "B", "C"], config(2), &fake);

        r.run().await.unwrap();

        // A y B corren juntos; C arranca recién cuando ambos terminaron
        assert_eq!(fake.max_active.load(Ordering::SeqCst), 2);
        assert!(fake.position("start C") > fake.position("end A"));
        assert!(fake.position("start C") > fake.position("end B"));
        assert_eq!(fake.at("start C"), Duration::from_secs(3));

        let v = reg.get(&id).unwrap();
        assert_eq!(v.status, TaskStatus::Completed);
        assert_eq!((v.processed, v.success, v.failed), (3, 3, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_per_session_escalona_sin_perder_concurrencia() {
        let fake = FakeWorker::new(Duration::from_secs(10));
        let mut cfg = config(3);
        cfg.delay_per_session = Duration::from_secs(2);
        let (_reg, _id, r) = runner(&["a", "b", "c"], cfg, &fake);

        r.run().await.unwrap();

        assert_eq!(fake.at("start a"), Duration::ZERO);
        assert_eq!(fake.at("start b"), Duration::from_secs(2));
        assert_eq!(fake.at("start c"), Duration::from_secs(4));
        assert_eq!(fake.max_active.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_between_batches_separa_los_lotes() {
        let fake = FakeWorker::new(Duration::from_secs(1));
        let mut cfg = config(1);
        cfg.delay_between_batches = Duration::from_secs(600);
        let (_reg, _id, r) = runner(&["a", "b"], cfg, &fake);

        r.run().await.unwrap();

        assert_eq!(fake.at("start b"), Duration::from_secs(601));
    }

    #[tokio::test(start_paused = true)]
    async fn fallas_individuales_no_tumban_el_lote() {
        let fake = FakeWorker::new(Duration::from_secs(1));
        let mut cfg = config(4);
        cfg.item_timeout = Duration::from_secs(5);
        let (reg, id, r) = runner(&["ok1", "fail1", "panic1", "hang1", "ok2"], cfg, &fake);

        r.run().await.unwrap();

        let snap = reg.poll(&id).unwrap();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!((snap.processed, snap.success, snap.failed), (5, 2, 3));

        let por_nombre = |n: &str| snap.results.iter().find(|r| r.filename == n).unwrap().clone();
        assert!(por_nombre("ok1").success);
        assert_eq!(por_nombre("fail1").status_text, "sesión muerta");
        assert!(por_nombre("hang1").status_text.contains("timeout"));
        assert!(!por_nombre("panic1").success);
    }

    #[tokio::test(start_paused = true)]
    async fn resultados_en_orden_y_proxies_round_robin() {
        let fake = FakeWorker::new(Duration::from_secs(1));
        let mut cfg = config(2);
        cfg.proxies = ProxyAllocator::new(vec!["p1".into(), "p2".into()]);
        let (reg, id, r) = runner(&["a", "b", "c", "d", "e"], cfg, &fake);

        r.run().await.unwrap();

        let snap = reg.poll(&id).unwrap();
        let files: Vec<_> = snap.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(files, vec!["a", "b", "c", "d", "e"]);
        let proxies: Vec<_> = snap.results.iter().map(|r| r.proxy.clone().unwrap()).collect();
        assert_eq!(proxies, vec!["p1", "p2", "p1", "p2", "p1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_no_lanza_mas_lotes() {
        let fake = FakeWorker::new(Duration::from_secs(10));
        let (reg, id, r) = runner(&["a", "b", "c"], config(1), &fake);

        let handle = r.spawn();
        sleep(Duration::from_secs(5)).await;
        reg.stop(&id);
        // "a" sigue en vuelo: el grupo no se libera hasta que termine
        assert!(reg.has_running_for_group("g1"));
        assert!(reg.poll(&id).unwrap().runner_active);
        handle.await.unwrap();
        assert!(!reg.has_running_for_group("g1"));

        // "a" ya estaba en vuelo: se espera y cuenta; "b" y "c" nunca arrancan
        let v = reg.get(&id).unwrap();
        assert_eq!(v.status, TaskStatus::Stopped);
        assert_eq!(v.processed, 1);
        assert!(v.processed < v.total);
        assert!(!fake.events().contains(&"start b".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_durante_la_pausa_entre_lotes_corta_enseguida() {
        let fake = FakeWorker::new(Duration::from_secs(1));
        let mut cfg = config(1);
        cfg.delay_between_batches = Duration::from_secs(600);
        let (reg, id, r) = runner(&["a", "b"], cfg, &fake);

        let origin = Instant::now();
        let handle = r.spawn();
        sleep(Duration::from_secs(100)).await;
        reg.stop(&id);
        handle.await.unwrap();

        assert!(origin.elapsed() < Duration::from_secs(600));
        assert_eq!(reg.get(&id).unwrap().processed, 1);
        let (_, messages) = reg.drain(&id).unwrap();
        assert!(messages.iter().any(|m| m.starts_with("tarea detenida")));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_durante_el_escalonado_no_lanza_el_resto_del_lote() {
        let fake = FakeWorker::new(Duration::from_secs(30));
        let mut cfg = config(3);
        cfg.delay_per_session = Duration::from_secs(10);
        let (reg, id, r) = runner(&["a", "b", "c"], cfg, &fake);

        let handle = r.spawn();
        sleep(Duration::from_secs(15)).await;
        reg.stop(&id);
        handle.await.unwrap();

        assert_eq!(fake.events().iter().filter(|e| e.starts_with("start")).count(), 2);
        assert_eq!(reg.get(&id).unwrap().processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn contadores_consistentes_en_todo_momento() {
        let fake = FakeWorker::new(Duration::from_secs(2));
        let mut cfg = config(2);
        cfg.delay_per_session = Duration::from_secs(1);
        cfg.delay_between_batches = Duration::from_secs(3);
        let (reg, id, r) = runner(&["a", "fail-b", "c", "d", "fail-e"], cfg, &fake);

        let handle = r.spawn();
        loop {
            sleep(Duration::from_millis(500)).await;
            let v = reg.get(&id).unwrap();
            assert!(v.processed <= v.total);
            assert_eq!(v.success + v.failed, v.processed);
            if v.status.is_terminal() {
                break;
            }
        }
        handle.await.unwrap();
        assert_eq!(reg.get(&id).unwrap().failed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn admin_una_invocacion_por_lote_fuera_de_contadores() {
        let fake = FakeWorker::new(Duration::from_secs(1));
        let mut cfg = config(2);
        cfg.admin_enabled = true;
        cfg.admin_delay = Duration::from_secs(5);
        cfg.admin_sessions = vec!["admin1.session".into()];
        let (reg, id, r) = runner(&["a", "b", "c"], cfg, &fake);

        r.run().await.unwrap();

        assert_eq!(fake.admin_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 5);

        let snap = reg.poll(&id).unwrap();
        assert_eq!((snap.total, snap.processed, snap.success, snap.failed), (3, 3, 3, 0));
        assert!(snap.results.iter().all(|r| r.filename != "admin1.session"));
        let admin_msgs = snap.messages.iter().filter(|m| m.starts_with("[admin]")).count();
        assert_eq!(admin_msgs, 2);

        // el segundo lote arranca después del admin_delay + la invocación admin
        assert_eq!(fake.at("start c"), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn admin_sin_pool_se_omite_con_mensaje() {
        let fake = FakeWorker::new(Duration::from_secs(1));
        let mut cfg = config(5);
        cfg.admin_enabled = true;
        let (reg, id, r) = runner(&["a"], cfg, &fake);

        r.run().await.unwrap();

        assert_eq!(fake.admin_calls.load(Ordering::SeqCst), 0);
        let (_, messages) = reg.drain(&id).unwrap();
        assert!(messages.iter().any(|m| m.contains("no hay sesiones admin")));
    }

    #[tokio::test(start_paused = true)]
    async fn lista_vacia_completa_sin_lotes() {
        let fake = FakeWorker::new(Duration::from_secs(1));
        let (reg, id, r) = runner(&[], config(5), &fake);
        r.run().await.unwrap();
        assert_eq!(reg.get(&id).unwrap().status, TaskStatus::Completed);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    async fn loop_con_error() -> anyhow::Result<()> {
        anyhow::bail!("disco lleno")
    }

    async fn loop_con_panic() -> anyhow::Result<()> {
        panic!("bug en el loop")
    }

    #[tokio::test]
    async fn falla_del_loop_deja_la_tarea_en_failed() {
        let reg = TaskRegistry::new();
        let id = reg.create(TaskKind::Seeding, "g1", 2);

        launch(reg.clone(), id.clone(), loop_con_error()).await.unwrap();

        let snap = reg.poll(&id).unwrap();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert!(snap.messages.iter().any(|m| m.contains("disco lleno")));
        assert!(!snap.runner_active);
    }

    #[tokio::test]
    async fn panic_del_loop_deja_la_tarea_en_failed() {
        let reg = TaskRegistry::new();
        let id = reg.create(TaskKind::Seeding, "g1", 2);

        launch(reg.clone(), id.clone(), loop_con_panic()).await.unwrap();

        assert_eq!(reg.get(&id).unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn runner_para_tarea_desconocida_es_error() {
        let fake = FakeWorker::new(Duration::from_secs(1));
        let worker = ResolvedWorker {
            kind: TaskKind::CheckLive,
            executor: fake as Arc<dyn SessionWorker>,
            payload: Arc::new(TaskPayload::CheckLive),
        };
        let res = BatchRunner::new(
            TaskRegistry::new(),
            "no-existe".into(),
            PathBuf::from("/tmp"),
            vec![],
            config(1),
            worker,
        );
        assert!(res.is_err());
    }
}
