//! Configuration loading and validation
//!
//! All sections carry serde defaults, so a missing config file (or a partial
//! one) falls back to built-in values. CLI flags override the loaded config
//! per job.

mod types;
mod validation;

pub use types::{CheckerConfig, Config, DiscoveryConfig, JobSettings, OutputConfig};
pub use validation::validate_config;

use crate::ConfigResult;
use std::path::Path;

/// Loads and validates a configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}
