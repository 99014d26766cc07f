//! `rowbound.toml` - database location and pool sizing for the CLI

use crate::storage::PoolConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings read from `rowbound.toml`; every key is optional
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RowboundConfig {
    /// Database file, relative to the working directory
    pub database: Option<String>,
    /// `[pool]` table, merged over [`PoolConfig::default`]
    #[serde(default)]
    pub pool: PoolConfig,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("rowbound.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("rowbound.db")
}

/// Explicit flag first, then the config file, then the default path
pub fn resolve_database_path(flag: Option<&Path>, config: Option<&RowboundConfig>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| config.and_then(|c| c.database.as_ref()).map(PathBuf::from))
        .unwrap_or_else(default_database_path)
}

/// Read the config at `path` (or `rowbound.toml`); `None` when the file is absent
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<RowboundConfig>> {
    let path = path.map_or_else(default_config_path, Path::to_path_buf);
    if !path.is_file() {
        return Ok(None);
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &RowboundConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (pass --force to replace it)", path.display());
    }
    std::fs::write(path, toml::to_string_pretty(config)?)
        .with_context(|| format!("writing {}", path.display()))
}

/// Create the directory a database file will live in
pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    match db_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display())),
        _ => Ok(()),
    }
}
