use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::GddpConfig;
use crate::xdg;

/// File name looked for in the working directory and its ancestors
pub const PROJECT_CONFIG: &str = "gddp.toml";

/// Discovers GDDP configuration by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(PROJECT_CONFIG);
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    // Fallback to user config
    let user_config = xdg::user_config_file();
    if user_config.exists() {
        return Ok(Some(user_config));
    }

    Ok(None)
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path.
/// Otherwise, auto-discovers config by traversing up directory tree from cwd.
///
/// Returns the path it loaded from alongside the config, or Ok(None) if no
/// config is found.
pub fn load_config_with_discovery(
    explicit_path: Option<&str>,
) -> Result<Option<(PathBuf, GddpConfig)>> {
    if let Some(config_path) = explicit_path {
        let path = PathBuf::from(config_path);
        let config = GddpConfig::from_file(&path)?;
        return Ok(Some((path, config)));
    }

    let current_dir =
        std::env::current_dir().context("Failed to get current directory for config discovery")?;

    match discover_config(&current_dir)? {
        Some(path) => {
            let config = GddpConfig::from_file(&path)?;
            Ok(Some((path, config)))
        }
        None => Ok(None),
    }
}
