//! Path resolution for kennel
//!
//! # Config file lookup
//!
//! 1. `--config` / `KENNEL_CONFIG`
//! 2. `./kennel.toml`
//! 3. `<config dir>/kennel/config.toml` (`~/.config` on Linux, `~/Library/Application Support` on macOS)
//!
//! A missing file is fine; every setting has a default.

use std::path::{Path, PathBuf};

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG: &str = "kennel.toml";

/// Find the config file to load, if any.
///
/// An explicit path is returned as-is even when it does not exist, so the
/// caller can report it.
pub fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        let path = expand(&path.to_string_lossy());
        log::debug!("Using config file from --config: {}", path.display());
        return Some(path);
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    if local.is_file() {
        log::debug!("Using config file {}", local.display());
        return Some(local);
    }

    let user = dirs::config_dir()?.join("kennel").join("config.toml");
    if user.is_file() {
        log::debug!("Using user config file {}", user.display());
        return Some(user);
    }

    log::debug!("No config file found, using defaults");
    None
}

/// Expand `~` and environment variables in a path string.
///
/// ```
/// let path = kennel::paths::expand("~/monitoring/projects");
/// assert!(!path.starts_with("~"));
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// `path` relative to `base` when it is inside it, for tracking markers and messages
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
