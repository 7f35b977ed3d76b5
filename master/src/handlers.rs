use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{
    ActiveTasks, DeleteSessionsRequest, DeleteSessionsResponse, MessageResponse, ProxyAllocator,
    ProxyConfig, ProxyUpdateRequest, RunTaskRequest, RunTaskResponse, SeedingDefaults,
    SessionInfo, TaskConfigs, TaskKind, WorkItem,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::groups;
use crate::registry::StopOutcome;
use crate::runner::{BatchConfig, BatchRunner};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/telegram/api/run-task", post(run_task))
        .route("/telegram/api/task-status/:id", get(task_status))
        .route("/telegram/api/stop-task/:id", post(stop_task))
        .route("/telegram/api/active-tasks", get(active_tasks))
        .route("/telegram/api/proxies", get(get_proxies).post(update_proxies))
        .route("/telegram/api/groups/:group/sessions", get(group_sessions))
        .route("/telegram/api/sessions/delete", post(delete_sessions))
        .route("/telegram/api/upload-admin-sessions", post(upload_admin_sessions))
        .route("/telegram/api/config/:task_name", get(get_task_config).post(save_task_config))
        .route("/telegram/api/global-settings", post(save_seeding_settings))
        .route(
            "/automatic/api/seeding/settings",
            get(seeding_settings).post(save_seeding_settings),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

/// Todo lo que se puede chequear sin crear la tarea.
fn validate_submission(req: &RunTaskRequest) -> AppResult<()> {
    if req.group_ref.trim().is_empty() {
        return Err(AppError::Validation("falta group_ref".into()));
    }
    if req.task_kind.trim().is_empty() {
        return Err(AppError::Validation("falta task_kind".into()));
    }
    if req.filenames.is_empty() {
        return Err(AppError::Validation("filenames no puede estar vacío".into()));
    }
    if let Some(bad) = req
        .filenames
        .iter()
        .find(|f| f.trim().is_empty() || f.contains('/') || f.contains('\\') || f.as_str() == "..")
    {
        return Err(AppError::Validation(format!("nombre de sesión inválido: {bad:?}")));
    }
    Ok(())
}

// Crea la tarea y lanza el runner en segundo plano; responde enseguida
async fn run_task(
    State(state): State<AppState>,
    payload: Result<Json<RunTaskRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RunTaskResponse>)> {
    let Json(req) = payload?;
    validate_submission(&req)?;

    // sin config en la petición se usa la guardada para ese tipo
    let extra_config = match (&req.extra_config, req.task_kind.parse::<TaskKind>()) {
        (Value::Null, Ok(kind)) => TaskConfigs::load(&state.settings.task_configs_file()).get(kind),
        _ => req.extra_config.clone(),
    };
    let worker = state.dispatcher.resolve(&req.task_kind, &extra_config)?;
    let group_ref = req.group_ref.trim().to_string();
    let folder = groups::resolve_group_folder(&state.settings.sessions_dir(), &group_ref)?;

    // snapshot de proxies y parámetros: cambios posteriores no afectan a esta tarea
    let proxy_cfg = ProxyConfig::load(&state.settings.proxy_file());
    let mut config = BatchConfig::from_request(
        &req,
        ProxyAllocator::from_config(&proxy_cfg),
        state.settings.item_timeout,
    );
    if req.admin_enabled {
        let admin_dir = state.settings.admin_sessions_dir();
        let pool = groups::admin_pool(&admin_dir);
        config = config.with_admin_pool(admin_dir, pool);
    }

    let items: Vec<WorkItem> = req.filenames.iter().map(WorkItem::new).collect();
    let task_id = state.tasks.create(worker.kind, &group_ref, items.len());

    info!(
        "tarea {} aceptada: {} sesiones de {} (core={}, proxies={})",
        task_id,
        items.len(),
        group_ref,
        config.core,
        config.proxies.len()
    );

    let runner = BatchRunner::new(state.tasks.clone(), task_id.clone(), folder, items, config, worker)
        .map_err(|e| AppError::Internal(format!("{e:#}")))?;
    runner.spawn();

    Ok((StatusCode::ACCEPTED, Json(RunTaskResponse { task_id })))
}

// Estado + resultados nuevos desde el último poll
async fn task_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.tasks.poll(&id) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, Json(json!({ "status": "not_found" }))).into_response(),
    }
}

// Siempre contesta OK, aunque la tarea no exista o ya haya terminado
async fn stop_task(State(state): State<AppState>, Path(id): Path<String>) -> Json<MessageResponse> {
    let outcome = state.tasks.stop(&id);
    if outcome != StopOutcome::Stopped {
        info!("stop sobre tarea {} ignorado ({:?})", id, outcome);
    }
    Json(MessageResponse {
        message: "solicitud de parada enviada".into(),
    })
}

async fn active_tasks(State(state): State<AppState>) -> Json<ActiveTasks> {
    Json(state.tasks.list_active())
}

async fn get_proxies(State(state): State<AppState>) -> Json<ProxyConfig> {
    Json(ProxyConfig::load(&state.settings.proxy_file()))
}

async fn update_proxies(
    State(state): State<AppState>,
    payload: Result<Json<ProxyUpdateRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(req) = payload?;
    let cfg = req.into_config();
    cfg.save(&state.settings.proxy_file())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!("guardados {} proxies (enabled={})", cfg.proxies.len(), cfg.enabled);
    Ok(Json(MessageResponse {
        message: format!("guardados {} proxies", cfg.proxies.len()),
    }))
}

async fn group_sessions(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> AppResult<Json<Vec<SessionInfo>>> {
    Ok(Json(groups::group_sessions(&state.settings.sessions_dir(), &group)?))
}

// Borrado de sesiones: no se permite con una tarea corriendo sobre el grupo
async fn delete_sessions(
    State(state): State<AppState>,
    payload: Result<Json<DeleteSessionsRequest>, JsonRejection>,
) -> AppResult<Json<DeleteSessionsResponse>> {
    let Json(req) = payload?;
    let group_ref = req.group_id.trim();
    if group_ref.is_empty() {
        return Err(AppError::Validation("group_id es obligatorio".into()));
    }
    if req.filenames.is_empty() {
        return Err(AppError::Validation("filenames no puede estar vacío".into()));
    }
    if state.tasks.has_running_for_group(group_ref) {
        return Err(AppError::Conflict(format!(
            "hay una tarea corriendo sobre el grupo {group_ref}"
        )));
    }

    let folder = groups::resolve_group_folder(&state.settings.sessions_dir(), group_ref)?;
    Ok(Json(groups::delete_sessions(&folder, &req.filenames)))
}

// Sube sesiones admin al pool que usa el paso admin entre lotes
async fn upload_admin_sessions(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<MessageResponse>> {
    let mut multipart = multipart?;
    let admin_dir = state.settings.admin_sessions_dir();
    tokio::fs::create_dir_all(&admin_dir)
        .await
        .map_err(|e| AppError::Internal(format!("no se pudo crear {}: {e}", admin_dir.display())))?;

    let mut saved = 0usize;
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().and_then(groups::upload_basename) else {
            continue;
        };
        let data = field.bytes().await?;

        tokio::fs::write(admin_dir.join(&filename), &data)
            .await
            .map_err(|e| AppError::Internal(format!("no se pudo guardar {filename}: {e}")))?;
        saved += 1;
    }

    if saved == 0 {
        return Err(AppError::Validation("no se recibió ningún archivo .session".into()));
    }

    info!("subidas {} sesiones admin a {}", saved, admin_dir.display());
    Ok(Json(MessageResponse {
        message: format!("subidas {saved} sesiones admin"),
    }))
}

fn parse_kind(task_name: &str) -> AppResult<TaskKind> {
    task_name
        .parse()
        .map_err(|e: common::TaskKindParseError| AppError::Validation(e.to_string()))
}

async fn get_task_config(
    State(state): State<AppState>,
    Path(task_name): Path<String>,
) -> AppResult<Json<Value>> {
    let kind = parse_kind(&task_name)?;
    Ok(Json(TaskConfigs::load(&state.settings.task_configs_file()).get(kind)))
}

// Guarda la config extra de un tipo; se valida igual que en una tarea
async fn save_task_config(
    State(state): State<AppState>,
    Path(task_name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(config) = payload?;
    let kind = parse_kind(&task_name)?;
    state.dispatcher.resolve(kind.as_str(), &config)?;

    let path = state.settings.task_configs_file();
    let mut configs = TaskConfigs::load(&path);
    configs.set(kind, config);
    configs
        .save(&path)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!("config de {} guardada", kind);
    Ok(Json(MessageResponse {
        message: format!("config de {kind} guardada"),
    }))
}

async fn seeding_settings(State(state): State<AppState>) -> Json<SeedingDefaults> {
    Json(SeedingDefaults::load(&state.settings.seeding_settings_file()))
}

async fn save_seeding_settings(
    State(state): State<AppState>,
    payload: Result<Json<SeedingDefaults>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(settings) = payload?;
    if settings.core == 0 {
        return Err(AppError::Validation("core tiene que ser al menos 1".into()));
    }

    settings
        .save(&state.settings.seeding_settings_file())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(
        "ajustes guardados (core={}, delay_per_session={}, delay_between_batches={})",
        settings.core, settings.delay_per_session, settings.delay_between_batches
    );
    Ok(Json(MessageResponse {
        message: "ajustes guardados".into(),
    }))
}
