use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let extraction = &config.extraction;

    if extraction.endpoint.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "extraction.endpoint must not be empty".to_string(),
        });
    }

    if extraction.model.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "extraction.model must not be empty".to_string(),
        });
    }

    if extraction.max_concurrent_requests == 0 {
        return Err(ConfigError::Validation {
            message: "extraction.max_concurrent_requests must be at least 1".to_string(),
        });
    }

    if extraction.request_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "extraction.request_timeout_secs must be at least 1".to_string(),
        });
    }

    if !(72..=600).contains(&extraction.render_dpi) {
        return Err(ConfigError::Validation {
            message: format!(
                "extraction.render_dpi must be between 72 and 600, got {}",
                extraction.render_dpi
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config.extraction.max_retries, 4);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"database_path": "/tmp/rollscan.db", "extraction": {"render_dpi": 150}}"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.database_path.as_deref(),
            Some(std::path::Path::new("/tmp/rollscan.db"))
        );
        assert_eq!(config.extraction.render_dpi, 150);
    }

    #[test]
    fn test_missing_file_error() {
        let result = load_config("/nonexistent/rollscan/config.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_invalid_json_error() {
        let result = load_config_from_str("not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result =
            load_config_from_str(r#"{"extraction": {"max_concurrent_requests": 0}}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_out_of_range_dpi_rejected() {
        let result = load_config_from_str(r#"{"extraction": {"render_dpi": 9000}}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = load_config_from_str(r#"{"extraction": {"endpoint": "  "}}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }
}
