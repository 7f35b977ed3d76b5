use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{
    ActiveTasks, MessageResponse, ProxyConfig, ProxyList, ProxyUpdateRequest, RunTaskRequest,
    RunTaskResponse, SessionInfo, TaskKind, TaskSnapshot, TaskStatus,
};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::{env, time::Duration};

/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://localhost:8080
fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para hablar con el master")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Envía una tarea sobre sesiones de un grupo
    Submit {
        #[arg(value_name = "GRUPO")]
        group: String,

        /// check-live | joinGroup | seedingGroup
        #[arg(value_name = "TIPO")]
        kind: String,

        /// Archivos .session; vacío = todas las del grupo
        #[arg(value_name = "SESIONES")]
        files: Vec<String>,

        #[arg(long, default_value_t = 5)]
        core: usize,

        #[arg(long, default_value_t = 10)]
        delay_per_session: u64,

        #[arg(long, default_value_t = 600)]
        delay_between_batches: u64,

        /// Activa la sesión admin después de cada lote
        #[arg(long)]
        admin: bool,

        #[arg(long, default_value_t = 10)]
        admin_delay: u64,

        /// Links para joinGroup (se puede repetir)
        #[arg(long = "link")]
        links: Vec<String>,

        /// Config JSON extra (seedingGroup)
        #[arg(long)]
        config: Option<String>,
    },
    /// Consulta el estado de una tarea (drena resultados y mensajes)
    Status {
        #[arg(value_name = "TASK_ID")]
        id: String,

        /// Sigue consultando hasta que la tarea termine
        #[arg(long)]
        watch: bool,

        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
    /// Pide detener una tarea
    Stop {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Tareas corriendo o detenidas
    Active,
    /// Muestra o reemplaza la lista de proxies
    Proxies {
        /// Reemplaza la lista con estos proxies
        #[arg(long = "set")]
        set: Vec<String>,

        #[arg(long)]
        disable: bool,
    },
    /// Lista las sesiones de un grupo
    Sessions {
        #[arg(value_name = "GRUPO")]
        group: String,
    },
}

/// Arma el config extra: el JSON de --config más los links de --link.
fn build_extra_config(links: &[String], config: Option<&str>) -> Result<Value> {
    let mut extra = match config {
        Some(raw) => serde_json::from_str::<Value>(raw).context("--config no es JSON válido")?,
        None => json!({}),
    };

    if !links.is_empty() {
        match extra.as_object_mut() {
            Some(obj) => {
                obj.insert("links".to_string(), json!(links));
            }
            None => bail!("--config debe ser un objeto JSON para poder agregar links"),
        }
    }

    Ok(extra)
}

async fn fetch_sessions(client: &Client, base_url: &str, group: &str) -> Result<Vec<SessionInfo>> {
    let url = format!("{}/telegram/api/groups/{}/sessions", base_url, group);
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        bail!("no se pudo listar el grupo {} (status {})", group, resp.status());
    }
    Ok(resp.json().await?)
}

fn print_snapshot(snap: &TaskSnapshot) {
    for msg in &snap.messages {
        println!("  · {}", msg);
    }
    let pct = if snap.total > 0 {
        (snap.processed as f64 / snap.total as f64) * 100.0
    } else {
        100.0
    };
    println!(
        "[{:?}] {} {}/{} ({:.1}%) ok={} fallidas={}",
        snap.status, snap.task_name, snap.processed, snap.total, pct, snap.success, snap.failed
    );
}

/// Una tarea stopped todavía puede traer resultados de sesiones en vuelo
/// y el mensaje final; se sigue hasta que el runner termine.
fn keep_watching(snap: &TaskSnapshot) -> bool {
    snap.status == TaskStatus::Running || snap.runner_active
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = master_base_url();

    match cli.command {
        Commands::Submit {
            group,
            kind,
            files,
            core,
            delay_per_session,
            delay_between_batches,
            admin,
            admin_delay,
            links,
            config,
        } => {
            let kind: TaskKind = kind.parse()?;
            let extra_config = build_extra_config(&links, config.as_deref())?;

            let filenames = if files.is_empty() {
                fetch_sessions(&client, &base_url, &group)
                    .await?
                    .into_iter()
                    .map(|s| s.filename)
                    .collect()
            } else {
                files
            };

            let mut req = RunTaskRequest::new(&group, kind, filenames);
            req.extra_config = extra_config;
            req.core = core;
            req.delay_per_session = delay_per_session;
            req.delay_between_batches = delay_between_batches;
            req.admin_enabled = admin;
            req.admin_delay = admin_delay;

            let url = format!("{}/telegram/api/run-task", base_url);
            let resp = client.post(&url).json(&req).send().await?;
            if resp.status() != StatusCode::ACCEPTED {
                let status = resp.status();
                let body: Value = resp.json().await.unwrap_or(Value::Null);
                bail!("tarea rechazada (status {}): {}", status, body["error"]);
            }
            let accepted: RunTaskResponse = resp.json().await?;

            println!("Tarea creada:");
            println!("  id: {}", accepted.task_id);
            println!("  tipo: {}", kind);
            println!("  sesiones: {}", req.filenames.len());
        }

        Commands::Status { id, watch, interval } => {
            let url = format!("{}/telegram/api/task-status/{}", base_url, id);
            loop {
                let resp = client.get(&url).send().await?;
                if resp.status() == StatusCode::NOT_FOUND {
                    println!("No se encontró la tarea con id {id}");
                    break;
                }
                let snap: TaskSnapshot = resp.json().await?;
                print_snapshot(&snap);

                if !watch || !keep_watching(&snap) {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(interval.max(1))).await;
            }
        }

        Commands::Stop { id } => {
            let url = format!("{}/telegram/api/stop-task/{}", base_url, id);
            let resp: MessageResponse = client.post(&url).send().await?.json().await?;
            println!("{}", resp.message);
        }

        Commands::Active => {
            let url = format!("{}/telegram/api/active-tasks", base_url);
            let tasks: ActiveTasks = client.get(&url).send().await?.json().await?;
            if tasks.is_empty() {
                println!("No hay tareas activas.");
            }
            for (id, t) in tasks {
                println!("Tarea {}", id);
                println!("  tipo    : {}", t.task_name);
                println!("  grupo   : {}", t.group_id);
                println!("  estado  : {:?}", t.status);
                println!(
                    "  progreso: {}/{} (ok={}, fallidas={})",
                    t.processed, t.total, t.success, t.failed
                );
                println!();
            }
        }

        Commands::Proxies { set, disable } => {
            let url = format!("{}/telegram/api/proxies", base_url);
            if !set.is_empty() || disable {
                let req = ProxyUpdateRequest {
                    enabled: !disable,
                    proxies: ProxyList::List(set),
                };
                let resp: MessageResponse = client.post(&url).json(&req).send().await?.json().await?;
                println!("{}", resp.message);
            } else {
                let cfg: ProxyConfig = client.get(&url).send().await?.json().await?;
                println!("proxies habilitados: {}", cfg.enabled);
                for p in cfg.proxies {
                    println!("  - {}", p);
                }
            }
        }

        Commands::Sessions { group } => {
            let sessions = fetch_sessions(&client, &base_url, &group).await?;
            if sessions.is_empty() {
                println!("(grupo sin sesiones)");
            }
            for s in sessions {
                println!("{:>4}  {:<16} {}", s.stt, s.phone, s.filename);
            }
        }
    }

    Ok(())
}
