//! Configuration loading and parsing

use anyhow::{Context, Result};
use dbc_decoder::{DecoderConfig, ParseConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// DBC files loaded in addition to the ones given with `--dbc`
    #[serde(default)]
    pub dbc_files: Vec<PathBuf>,
    #[serde(default)]
    pub parser: ParseConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
}

impl AppConfig {
    /// Files from the config followed by the ones given on the command line
    pub fn all_dbc_files(&self, extra: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = self.dbc_files.clone();
        for path in extra {
            if !files.contains(path) {
                files.push(path.clone());
            }
        }
        files
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
