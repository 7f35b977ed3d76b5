pub mod document;
pub mod proxy;
pub mod session;
pub mod task;

pub use document::{load_document, save_document, DocumentError};
pub use proxy::{parse_proxy_lines, ProxyAllocator, ProxyConfig};
pub use session::{describe_sessions, extract_phone, list_session_files, SessionInfo, WorkItem};
pub use task::{
    ActiveTask, ActiveTasks, MessageResponse, OutcomeRecord, RunTaskRequest, RunTaskResponse,
    SeedingDefaults, TaskConfigs, TaskId, TaskKind, TaskKindParseError, TaskPayload, TaskSnapshot, TaskStatus,
};

/* --------- Cuerpos auxiliares del dashboard --------- */

use serde::{Deserialize, Serialize};

/// POST /proxies: el textarea manda un string con una línea por proxy,
/// pero también se acepta una lista ya separada.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyList {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyUpdateRequest {
    #[serde(default)]
    pub enabled: bool,
    pub proxies: ProxyList,
}

impl ProxyUpdateRequest {
    pub fn into_config(self) -> ProxyConfig {
        let proxies = match self.proxies {
            ProxyList::Text(text) => parse_proxy_lines(&text),
            ProxyList::List(list) => list
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        };
        ProxyConfig {
            enabled: self.enabled,
            proxies,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSessionsRequest {
    pub group_id: String,
    #[serde(default)]
    pub filenames: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteSessionsResponse {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
    pub failed: Vec<String>,
}
