use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "cmdbot.toml";
pub const DATA_FILE_NAME: &str = "data.toml";

/// Per-user configuration directory, e.g. `~/.config/cmdbot` on Linux.
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "cmdbot")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(Error::NoConfigDir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

pub fn default_data_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(DATA_FILE_NAME))
}
