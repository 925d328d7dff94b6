use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::config::Config;

/// `$TASKCENTER_HOME`, or `~/.taskcenter`.
pub fn taskcenter_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TASKCENTER_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".taskcenter"))
}

pub fn ensure_taskcenter_home() -> Result<PathBuf> {
    let dir = taskcenter_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Directory holding tasks.json / history.json / metadata.json.
pub fn data_dir(cfg: &Config) -> Result<PathBuf> {
    let dir = match &cfg.storage.data_dir {
        Some(d) => PathBuf::from(d),
        None => ensure_taskcenter_home()?.join("data"),
    };
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
