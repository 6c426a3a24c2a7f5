use std::path::{Component, Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Failed,
}

impl DeleteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteOutcome::Deleted => "OK",
            DeleteOutcome::Failed => "ERROR",
        }
    }
}

/// Joins `filename` onto the recording directory. Absolute paths and `..`
/// segments are refused so callers stay inside `dir`.
pub fn resolve_in_dir(dir: &Path, filename: &str) -> Option<PathBuf> {
    let relative = Path::new(filename);
    if filename.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(dir.join(relative))
}

pub async fn delete_file(dir: &Path, filename: &str) -> DeleteOutcome {
    let Some(path) = resolve_in_dir(dir, filename) else {
        error!("Error deleting file! Refusing path outside recording directory: {}", filename);
        return DeleteOutcome::Failed;
    };

    info!("Trying to delete file: {}", path.display());
    let is_file = tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
    if !is_file {
        error!("Error deleting file! {} does not exist", path.display());
        return DeleteOutcome::Failed;
    }

    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            info!("Deleted: {}", path.display());
            DeleteOutcome::Deleted
        }
        Err(e) => {
            error!("Error deleting file {}: {}", path.display(), e);
            DeleteOutcome::Failed
        }
    }
}
