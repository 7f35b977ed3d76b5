use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path, sync::OnceLock};

pub const SESSION_EXT: &str = ".session";

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\d{9,15}").expect("regex de teléfono válida"))
}

/// Saca el teléfono del nombre de archivo; si no hay match devuelve el nombre tal cual.
pub fn extract_phone(filename: &str) -> String {
    let stem = filename.replace(SESSION_EXT, "");
    phone_regex()
        .find(&stem)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| filename.to_string())
}

/// Una sesión a procesar dentro de una tarea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub filename: String,
    pub phone: String,
}

impl WorkItem {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let phone = extract_phone(&filename);
        Self { filename, phone }
    }
}

/// Fila de GET /groups/:group/sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub stt: usize,
    pub phone: String,
    pub filename: String,
}

/// Archivos *.session de una carpeta, ordenados por nombre.
pub fn list_session_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        if let Ok(ft) = entry.file_type() {
            if !ft.is_file() {
                continue;
            }
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(SESSION_EXT) {
                files.push(name.to_string());
            }
        }
    }
    files.sort();
    Ok(files)
}

pub fn describe_sessions(files: &[String]) -> Vec<SessionInfo> {
    files
        .iter()
        .enumerate()
        .map(|(i, f)| SessionInfo {
            stt: i + 1,
            phone: extract_phone(f),
            filename: f.clone(),
        })
        .collect()
}
