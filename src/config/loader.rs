// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HerdError, Result};
use crate::home::HomeDirs;

/// File name looked up during config discovery.
pub const CONFIG_FILE_NAME: &str = "herd.toml";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// The path is made absolute first, since it is recorded in running-state
/// records and handed to runner processes that may have another working
/// directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let absolute = fs::canonicalize(path).map_err(|e| {
        HerdError::ConfigError(format!("cannot read config file {:?}: {}", path, e))
    })?;
    let raw_config = load_from_path(&absolute)?;
    ConfigFile::from_raw(raw_config, absolute)
}

/// Find the configuration file to use when none was given explicitly.
///
/// Looks for `herd.toml` in `start_dir` and each of its ancestors, then falls
/// back to `<home>/herd.toml`.
pub fn discover_config_path(start_dir: &Path, home: &HomeDirs) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .chain(std::iter::once(home.config_file()))
        .find(|candidate| candidate.is_file())
}
