//! XDG Base Directory support
//!
//! - `$XDG_CACHE_HOME/gddp/` (default: `~/.cache/gddp/`) - downloaded sources and built artifacts
//! - `$XDG_CONFIG_HOME/gddp/` (default: `~/.config/gddp/`) - user configuration

use std::path::PathBuf;

/// Local artifact cache directory
///
/// Respects XDG_CACHE_HOME. Falls back to `_cache` in the working directory
/// when no home directory can be determined.
///
/// # Example
/// ```
/// let cache_dir = gddp::xdg::cache_dir();
/// // Unix: ~/.cache/gddp or $XDG_CACHE_HOME/gddp
/// ```
pub fn cache_dir() -> PathBuf {
    if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg_cache).join("gddp")
    } else if let Some(cache) = dirs::cache_dir() {
        cache.join("gddp")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".cache").join("gddp")
    } else {
        PathBuf::from("_cache")
    }
}

/// User configuration directory
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("gddp")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config").join("gddp")
    } else {
        PathBuf::from(".gddp")
    }
}

/// `config.toml` inside [`config_dir`]
pub fn user_config_file() -> PathBuf {
    config_dir().join("config.toml")
}
