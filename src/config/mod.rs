// src/config/mod.rs

//! Configuration loading and validation for herd.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and discover its location (`loader.rs`).
//! - Validate names, commands and group nesting (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{discover_config_path, load_and_validate, load_from_path, CONFIG_FILE_NAME};
pub use model::{
    ConfigFile, GroupSpec, LaunchChecks, RawConfigFile, ServiceCommands, ServiceConfig,
};
pub use validate::validate_config;
