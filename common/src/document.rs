// Documentos JSON chicos guardados en el directorio de datos
// (proxies, ajustes de ritmo, config por tipo de tarea).

use serde::{de::DeserializeOwned, Serialize};
use std::{fs, io, path::Path};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("error de E/S con {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("error serializando documento: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lee un documento. Si no existe o está roto devuelve el default.
pub fn load_document<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return T::default(),
    };

    match serde_json::from_str(&raw) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("documento ilegible en {}: {}", path.display(), e);
            T::default()
        }
    }
}

/// Guarda en JSON legible, creando la carpeta si hace falta.
pub fn save_document<T: Serialize>(path: &Path, doc: &T) -> Result<(), DocumentError> {
    let io_err = |source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let body = serde_json::to_string_pretty(doc)?;
    fs::write(path, body).map_err(io_err)
}
