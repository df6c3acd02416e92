//! Configuration validation
//!
//! Catches values that would make a job misbehave (zero concurrency, empty
//! batches) before any work starts.

use crate::config::Config;
use crate::{ConfigError, ConfigResult};

/// Validates a loaded configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    if config.checker.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "checker.timeout-ms must be greater than 0".to_string(),
        ));
    }

    if config.checker.max_concurrent == 0 {
        return Err(ConfigError::Validation(
            "checker.max-concurrent must be at least 1".to_string(),
        ));
    }

    if config.checker.chunk_size == 0 {
        return Err(ConfigError::Validation(
            "checker.chunk-size must be at least 1".to_string(),
        ));
    }

    if config.discovery.page_batch_size == 0 {
        return Err(ConfigError::Validation(
            "discovery.page-batch-size must be at least 1".to_string(),
        ));
    }

    if config.discovery.flush_chunk_size == 0 {
        return Err(ConfigError::Validation(
            "discovery.flush-chunk-size must be at least 1".to_string(),
        ));
    }

    if config.discovery.max_links_per_page == 0 {
        return Err(ConfigError::Validation(
            "discovery.max-links-per-page must be at least 1".to_string(),
        ));
    }

    if config.discovery.max_pages == 0 {
        return Err(ConfigError::Validation(
            "discovery.max-pages must be at least 1".to_string(),
        ));
    }

    if config.output.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output.database-path must not be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.checker.max_concurrent = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.checker.timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let mut config = Config::default();
        config.output.database_path = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = Config::default();
        config.checker.chunk_size = 0;
        assert!(validate_config(&config).is_err());
    }
}
