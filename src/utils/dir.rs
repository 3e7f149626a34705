use std::{env, io, path::PathBuf};

use anyhow::{Result, anyhow};

const APP_DIR_NAME: &str = "tasktally";

/// Directories the application writes into. All of them exist once [AppDirs::resolve] returns.
#[derive(Debug, Clone)]
pub struct AppDirs {
    pub root: PathBuf,
    /// One JSON file per storage key.
    pub data: PathBuf,
    pub logs: PathBuf,
}

impl AppDirs {
    /// Uses `root` when given, the platform state directory otherwise.
    pub fn resolve(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => default_root()?,
        };
        Ok(Self {
            data: ensure_dir(root.join("data"))?,
            logs: ensure_dir(root.join("logs"))?,
            root: ensure_dir(root)?,
        })
    }
}

#[cfg(windows)]
fn default_root() -> Result<PathBuf> {
    env::var("APPDATA")
        .map(|app_data| PathBuf::from(app_data).join(APP_DIR_NAME))
        .map_err(|_| anyhow!("APPDATA should be present on Windows"))
}

#[cfg(not(windows))]
fn default_root() -> Result<PathBuf> {
    env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .map(|state| state.join(APP_DIR_NAME))
        .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))
}

pub fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
