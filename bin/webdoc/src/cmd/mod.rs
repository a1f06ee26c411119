//! Command implementations.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use webdoc_core::Config;

pub mod clean;
pub mod render;

/// Load the configuration and resolve the project root.
///
/// The root is the directory holding the configuration file. A missing file
/// is not an error: the project then uses the default layout.
pub fn load_project(config_path: &Path) -> Result<(Config, PathBuf)> {
    let root = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let config = if config_path.exists() {
        Config::load_with_env(config_path).wrap_err_with(|| {
            format!("Failed to load configuration from {}", config_path.display())
        })?
    } else {
        tracing::warn!(
            config = %config_path.display(),
            "configuration file not found, using defaults"
        );
        Config::default()
    };

    tracing::debug!(?config, root = %root.display(), "Loaded configuration");
    Ok((config, root))
}
