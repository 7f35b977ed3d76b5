// Acceso a las carpetas de grupos de sesiones (uploaded_sessions/<grupo>).

use common::{list_session_files, session::SESSION_EXT, DeleteSessionsResponse, SessionInfo};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Un nombre de grupo o de archivo tiene que ser un único componente "normal".
fn is_plain_name(name: &str) -> bool {
    let mut comps = Path::new(name).components();
    matches!(
        (comps.next(), comps.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Carpeta de un grupo. NotFound si el nombre es inválido o no existe.
pub fn resolve_group_folder(sessions_dir: &Path, group_ref: &str) -> AppResult<PathBuf> {
    let group_ref = group_ref.trim();
    if !is_plain_name(group_ref) {
        return Err(AppError::NotFound(format!("grupo inválido: {group_ref}")));
    }

    let folder = sessions_dir.join(group_ref);
    if !folder.is_dir() {
        return Err(AppError::NotFound(format!("grupo {group_ref} no encontrado")));
    }
    Ok(folder)
}

pub fn group_sessions(sessions_dir: &Path, group_ref: &str) -> AppResult<Vec<SessionInfo>> {
    let folder = resolve_group_folder(sessions_dir, group_ref)?;
    let files = list_session_files(&folder)
        .map_err(|e| AppError::Internal(format!("no se pudo leer {}: {e}", folder.display())))?;
    Ok(common::describe_sessions(&files))
}

/// Nombre con el que se guarda un .session subido: sólo el último
/// componente, y tiene que terminar en `.session`.
pub fn upload_basename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    let valido = is_plain_name(name) && name.ends_with(SESSION_EXT) && name != SESSION_EXT;
    valido.then(|| name.to_string())
}

/// Sesiones admin disponibles; una carpeta inexistente es un pool vacío.
pub fn admin_pool(admin_dir: &Path) -> Vec<String> {
    match list_session_files(admin_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("no se pudo leer el pool admin {}: {}", admin_dir.display(), e);
            Vec::new()
        }
    }
}

/// Borra archivos de sesión de un grupo. Los nombres con rutas se rechazan.
pub fn delete_sessions(folder: &Path, filenames: &[String]) -> DeleteSessionsResponse {
    let mut out = DeleteSessionsResponse::default();

    for filename in filenames {
        if !is_plain_name(filename) {
            out.failed.push(filename.clone());
            continue;
        }

        let path = folder.join(filename);
        if !path.is_file() {
            out.missing.push(filename.clone());
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => out.deleted.push(filename.clone()),
            Err(e) => {
                warn!("no se pudo borrar {}: {}", path.display(), e);
                out.failed.push(filename.clone());
            }
        }
    }

    info!(
        "borrado en {}: {} ok, {} faltantes, {} fallidos",
        folder.display(),
        out.deleted.len(),
        out.missing.len(),
        out.failed.len()
    );
    out
}
