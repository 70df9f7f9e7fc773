//! CLI command implementations
//!
//! Commands print the JSON envelope of their operation on stdout and map the outcome
//! onto an exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | the operation returned `success = false` |
//! | 2 | configuration error |
//! | 4 | storage or API connection error |
//! | 5 | fatal error |

pub mod init;
pub mod list;
pub mod lookup;
pub mod repair;
pub mod transition;
pub mod update;
pub mod validate;

use crate::adapters::database::create_item_store;
use crate::client::{HttpStageClient, StageBackend, StaticSession};
use crate::config::{load_config, SowtrackConfig};
use crate::core::api::StageApi;
use serde::Serialize;
use std::sync::Arc;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

/// Loads the configuration, reporting failures on stderr
pub(crate) fn load(config_path: &str) -> Result<SowtrackConfig, i32> {
    load_config(config_path).map_err(|e| {
        eprintln!("❌ Failed to load configuration file: {e}");
        EXIT_CONFIG
    })
}

/// Opens the configured item store and wraps it in the operation facade
pub(crate) async fn open_api(config: &SowtrackConfig) -> Result<StageApi, i32> {
    let store = create_item_store(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to open item store");
        eprintln!("❌ Failed to connect to storage: {e}");
        EXIT_CONNECTION
    })?;
    Ok(StageApi::new(store, config.pagination.clone()))
}

/// The backend a read or transition command talks to
///
/// With `remote` the configured `[api]` is used over HTTP; otherwise the configured
/// store is opened in-process.
pub(crate) async fn open_backend(
    config: &SowtrackConfig,
    remote: bool,
) -> Result<Arc<dyn StageBackend>, i32> {
    if !remote {
        return Ok(Arc::new(open_api(config).await?));
    }

    let Some(ref api) = config.api else {
        eprintln!("❌ --remote requires an [api] section in the configuration");
        return Err(EXIT_CONFIG);
    };
    let session = Arc::new(StaticSession::from_config(api));
    let client = HttpStageClient::new(api, session).map_err(|e| {
        eprintln!("❌ {e}");
        EXIT_CONFIG
    })?;
    tracing::debug!(base_url = %client.base_url(), "Using remote stage API");
    Ok(Arc::new(client))
}

/// Prints an envelope and returns the matching exit code
pub(crate) fn emit<T: Serialize>(envelope: &T, success: bool) -> anyhow::Result<i32> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(if success { EXIT_OK } else { EXIT_FAILED })
}
