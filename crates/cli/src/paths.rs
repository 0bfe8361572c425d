//! Path resolution for agentlink's local files.
//!
//! Resolved once at startup from: `--data-dir` > `AGENTLINK_DATA_DIR` env > `~/.agentlink`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

pub const DATA_DIR_ENV: &str = "AGENTLINK_DATA_DIR";

/// Locations under the data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let root = resolve_root(
            explicit,
            std::env::var_os(DATA_DIR_ENV).map(PathBuf::from),
            dirs::home_dir(),
        )?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        let logs = self.log_dir();
        std::fs::create_dir_all(&logs)
            .with_context(|| format!("failed to create {}", logs.display()))
    }
}

fn resolve_root(
    explicit: Option<&Path>,
    env: Option<PathBuf>,
    home: Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    home.map(|h| h.join(".agentlink"))
        .ok_or_else(|| anyhow!("HOME directory not found; pass --data-dir"))
}
