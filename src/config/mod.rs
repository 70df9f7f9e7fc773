//! Configuration management for Sowtrack.
//!
//! # Overview
//!
//! Sowtrack uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SOWTRACK_<SECTION>_<KEY>` environment overrides
//! - Default values for every optional setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sowtrack::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sowtrack.toml")?;
//! println!("Backend: {:?}", config.storage.backend);
//! println!("Page size: {}", config.pagination.default_limit);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - log level
//! - [`StorageConfig`] - which backend holds the item table
//! - [`PostgreSQLConfig`] - pool and connection settings
//! - [`PaginationConfig`] - default and maximum page size
//! - [`ApiConfig`] - remote API used by the client transport
//! - [`LoggingConfig`] - optional JSON file logging
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [application]
//! log_level = "info"
//!
//! [storage]
//! backend = "postgresql"
//!
//! [postgresql]
//! connection_string = "${SOWTRACK_DATABASE_URL}"
//!
//! [pagination]
//! default_limit = 50
//! max_limit = 100
//!
//! [api]
//! base_url = "https://api.example.com/v1"
//! token = "${SOWTRACK_API_TOKEN}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApiConfig, ApplicationConfig, Environment, LoggingConfig, PaginationConfig, PostgreSQLConfig,
    SowtrackConfig, StorageBackend, StorageConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
