mod config;
pub mod database;

pub use config::{Config, DisplayDefaults, RestrictionsConfig};
pub use database::{Database, FocusStats};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/focusfence[-dev]/` based on FOCUSFENCE_ENV.
///
/// `FOCUSFENCE_ENV=dev` switches to a separate directory so trying out a
/// development build (or hand-testing the simulator) never edits the presets
/// or statistics of the installed tool. The CLI tests go further and point
/// `HOME` at a scratch directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSFENCE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusfence-dev")
    } else {
        base_dir.join("focusfence")
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
