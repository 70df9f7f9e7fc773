//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{ApiConfig, SowtrackConfig, StorageBackend};
use super::secret::secret_string;
use crate::domain::errors::SowtrackError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into SowtrackConfig
/// 4. Applies environment variable overrides (SOWTRACK_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `SowtrackError::Configuration` if the file cannot be read or parsed, a
/// referenced environment variable is unset, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use sowtrack::config::loader::load_config;
///
/// let config = load_config("sowtrack.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<SowtrackConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SowtrackError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SowtrackError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text
///
/// Same pipeline as [`load_config`] minus the file read.
pub fn parse_config(contents: &str) -> Result<SowtrackConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: SowtrackConfig = toml::from_str(&contents)
        .map_err(|e| SowtrackError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        SowtrackError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static pattern compiles")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = env_var_pattern();
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(SowtrackError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using SOWTRACK_* prefix
///
/// Environment variables follow the pattern: SOWTRACK_<SECTION>_<KEY>
/// For example: SOWTRACK_STORAGE_BACKEND, SOWTRACK_API_TOKEN
fn apply_env_overrides(config: &mut SowtrackConfig) -> Result<()> {
    if let Ok(val) = std::env::var("SOWTRACK_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Ok(val) = std::env::var("SOWTRACK_STORAGE_BACKEND") {
        config.storage.backend = match val.to_ascii_lowercase().as_str() {
            "memory" => StorageBackend::Memory,
            "postgresql" => StorageBackend::PostgreSQL,
            other => {
                return Err(SowtrackError::Configuration(format!(
                    "SOWTRACK_STORAGE_BACKEND must be 'memory' or 'postgresql', got '{other}'"
                )))
            }
        };
    }

    if let Some(ref mut pg_config) = config.postgresql {
        if let Ok(val) = std::env::var("SOWTRACK_POSTGRESQL_CONNECTION_STRING") {
            pg_config.connection_string = secret_string(val);
        }
        if let Ok(val) = std::env::var("SOWTRACK_POSTGRESQL_MAX_CONNECTIONS") {
            if let Ok(max) = val.parse() {
                pg_config.max_connections = max;
            }
        }
    }

    if let Ok(val) = std::env::var("SOWTRACK_PAGINATION_DEFAULT_LIMIT") {
        if let Ok(limit) = val.parse() {
            config.pagination.default_limit = limit;
        }
    }
    if let Ok(val) = std::env::var("SOWTRACK_PAGINATION_MAX_LIMIT") {
        if let Ok(limit) = val.parse() {
            config.pagination.max_limit = limit;
        }
    }

    if let Ok(val) = std::env::var("SOWTRACK_API_BASE_URL") {
        match config.api {
            Some(ref mut api) => api.base_url = val,
            None => {
                config.api = Some(ApiConfig {
                    base_url: val,
                    timeout_seconds: 30,
                    token: None,
                })
            }
        }
    }
    if let Some(ref mut api) = config.api {
        if let Ok(val) = std::env::var("SOWTRACK_API_TOKEN") {
            api.token = Some(secret_string(val));
        }
        if let Ok(val) = std::env::var("SOWTRACK_API_TIMEOUT_SECONDS") {
            if let Ok(timeout) = val.parse() {
                api.timeout_seconds = timeout;
            }
        }
    }

    if let Ok(val) = std::env::var("SOWTRACK_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("SOWTRACK_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("SOWTRACK_LOADER_TEST_VAR", "test_value");
        let input = "token = \"${SOWTRACK_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "token = \"test_value\"\n");
        std::env::remove_var("SOWTRACK_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("SOWTRACK_LOADER_MISSING_VAR");
        let input = "token = \"${SOWTRACK_LOADER_MISSING_VAR}\"";
        let result = substitute_env_vars(input);
        assert!(matches!(result, Err(SowtrackError::Configuration(_))));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# token = \"${SOWTRACK_LOADER_NEVER_SET}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[storage]
backend = "memory"

[pagination]
default_limit = 25
max_limit = 80

[api]
base_url = "https://api.example.com/v1"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.pagination.default_limit, 25);
        assert_eq!(config.pagination.max_limit, 80);
        assert_eq!(
            config.api.as_ref().map(|a| a.base_url.as_str()),
            Some("https://api.example.com/v1")
        );
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[pagination]\ndefault_limit = 500\nmax_limit = 100\n")
            .unwrap();
        temp_file.flush().unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("default_limit"));
    }
}
