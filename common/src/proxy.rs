use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::document::{load_document, save_document, DocumentError};

/// Documento de proxies tal como se guarda en disco.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl ProxyConfig {
    /// Lee el documento. Si no existe o está roto se usa "sin proxies".
    pub fn load(path: &Path) -> Self {
        load_document(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        save_document(path, self)
    }

    /// Lista efectiva: vacía si el proxy está deshabilitado.
    pub fn active_proxies(&self) -> &[String] {
        if self.enabled {
            &self.proxies
        } else {
            &[]
        }
    }
}

/// Una línea por proxy; se descartan las vacías.
pub fn parse_proxy_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Asignación round-robin determinista: item i -> proxies[i % len].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyAllocator {
    proxies: Vec<String>,
}

impl ProxyAllocator {
    pub fn new(proxies: Vec<String>) -> Self {
        Self { proxies }
    }

    pub fn from_config(cfg: &ProxyConfig) -> Self {
        Self::new(cfg.active_proxies().to_vec())
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn for_index(&self, index: usize) -> Option<&str> {
        if self.proxies.is_empty() {
            return None;
        }
        Some(self.proxies[index % self.proxies.len()].as_str())
    }
}
