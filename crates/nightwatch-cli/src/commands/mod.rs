pub mod config;
pub mod convert;
pub mod info;
pub mod measure;
pub mod monitor;
pub mod night;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use chrono::Utc;
use nightwatch_core::config::NightwatchConfig;

/// Settings shared by every subcommand.
pub struct Context {
    pub config: NightwatchConfig,
    /// Forwarded to measurement subprocesses.
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
}

pub fn load_config(path: Option<&Path>) -> Result<NightwatchConfig> {
    let config: NightwatchConfig = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => NightwatchConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Night directory name for "now": the UTC date, `YYYY-MM-DD`.
pub fn tonight() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
