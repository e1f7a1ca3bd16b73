use crate::config::{WorkspaceConfig, load_config, save_config};
use std::fs;
use std::path::{Path, PathBuf};
use trouve_core::{TrouveError, TrouveResult};

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub trouve_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub photo_cache_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_path: PathBuf,
    pub state_db_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WorkspaceInitResult {
    pub paths: WorkspacePaths,
    pub created: Vec<PathBuf>,
}

impl WorkspacePaths {
    pub fn from_root(root: PathBuf) -> Self {
        let trouve_dir = root.join(".trouve");
        let cache_dir = trouve_dir.join("cache");

        Self {
            photo_cache_dir: cache_dir.join("photos"),
            logs_dir: trouve_dir.join("logs"),
            config_path: trouve_dir.join("config.toml"),
            state_db_path: trouve_dir.join("state.db"),
            cache_dir,
            trouve_dir,
            root,
        }
    }
}

pub fn init_workspace(
    target: Option<&Path>,
    backend: Option<&str>,
) -> TrouveResult<WorkspaceInitResult> {
    let root = match target {
        Some(path) => absolutize(path)?,
        None => std::env::current_dir().map_err(|err| {
            TrouveError::io(format!(
                "failed to resolve current directory for init: {err}"
            ))
        })?,
    };

    let paths = WorkspacePaths::from_root(root);
    let mut created = Vec::new();

    ensure_dir(&paths.root, &mut created)?;
    ensure_dir(&paths.trouve_dir, &mut created)?;
    ensure_dir(&paths.cache_dir, &mut created)?;
    ensure_dir(&paths.photo_cache_dir, &mut created)?;
    ensure_dir(&paths.logs_dir, &mut created)?;

    if paths.config_path.exists() {
        let _ = load_config(&paths)?;
    } else {
        let config = WorkspaceConfig::with_default_profile(backend)?;
        save_config(&paths, &config)?;
        created.push(paths.config_path.clone());
    }

    Ok(WorkspaceInitResult { paths, created })
}

pub fn resolve_workspace(explicit: Option<&Path>) -> TrouveResult<WorkspacePaths> {
    let root = match explicit {
        Some(path) => absolutize(path)?,
        None => std::env::current_dir().map_err(|err| {
            TrouveError::io(format!(
                "failed to resolve current directory for workspace lookup: {err}"
            ))
        })?,
    };

    let paths = WorkspacePaths::from_root(root);
    if !paths.trouve_dir.is_dir() {
        let root_display = paths.root.display();
        return Err(TrouveError::usage(format!(
            "workspace is not initialized at '{root_display}'; run `trouve init --workspace {root_display}` first"
        )));
    }

    Ok(paths)
}

fn absolutize(path: &Path) -> TrouveResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().map_err(|err| {
        TrouveError::io(format!(
            "failed to resolve current directory for path: {err}"
        ))
    })?;

    Ok(cwd.join(path))
}

fn ensure_dir(path: &Path, created: &mut Vec<PathBuf>) -> TrouveResult<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(TrouveError::io(format!(
                "expected '{}' to be a directory",
                path.display()
            )));
        }
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|err| {
        TrouveError::io(format!(
            "failed to create directory '{}': {}",
            path.display(),
            err
        ))
    })?;
    created.push(path.to_path_buf());
    Ok(())
}
