use std::{env, path::PathBuf, time::Duration};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SIMULATED_WORK_MS: u64 = 2000;

/// Carpeta (dentro de uploaded_sessions) con las sesiones admin.
pub const ADMIN_SESSION_FOLDER: &str = "Adminsession";

/// Configuración del master, leída de variables de entorno.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    /// Tope por sesión; una llamada colgada no puede frenar el lote entero
    pub item_timeout: Duration,
    /// Si está definida, cada sesión se manda a este servicio externo
    pub executor_url: Option<String>,
    pub simulated_work: Duration,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let num = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            bind_addr: lookup("MASTER_BIND").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            item_timeout: Duration::from_secs(num("ITEM_TIMEOUT_SECS", DEFAULT_ITEM_TIMEOUT_SECS)),
            executor_url: lookup("EXECUTOR_URL").filter(|s| !s.trim().is_empty()),
            simulated_work: Duration::from_millis(num("SIMULATED_WORK_MS", DEFAULT_SIMULATED_WORK_MS)),
        }
    }

    #[cfg(test)]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut s = Self::from_lookup(|_| None);
        s.data_dir = data_dir.into();
        s
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("uploaded_sessions")
    }

    pub fn admin_sessions_dir(&self) -> PathBuf {
        self.sessions_dir().join(ADMIN_SESSION_FOLDER)
    }

    pub fn proxy_file(&self) -> PathBuf {
        self.data_dir.join("telegram").join("proxy_config.json")
    }

    /// Ajustes de ritmo guardados desde el dashboard.
    pub fn seeding_settings_file(&self) -> PathBuf {
        self.data_dir.join("telegram").join("seeding_settings.json")
    }

    pub fn task_configs_file(&self) -> PathBuf {
        self.data_dir.join("telegram").join("task_configs.json")
    }
}
