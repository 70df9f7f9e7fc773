//! Item store factory
//!
//! Builds the configured [`ItemStore`] backend.

use crate::adapters::database::traits::ItemStore;
use crate::adapters::memory::MemoryStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgresStore};
use crate::config::schema::{SowtrackConfig, StorageBackend};
use crate::domain::{Result, SowtrackError};
use std::sync::Arc;

/// Create an item store based on the configuration
///
/// For PostgreSQL the schema migration is applied before the store is returned.
///
/// # Errors
///
/// Returns `Configuration` if the selected backend has no configuration section, or
/// `StorageUnavailable` if the backend cannot be reached.
pub async fn create_item_store(config: &SowtrackConfig) -> Result<Arc<dyn ItemStore + Send + Sync>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Creating in-memory item store");
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn ItemStore + Send + Sync>)
        }
        StorageBackend::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                SowtrackError::Configuration(
                    "postgresql configuration is required when storage.backend = 'postgresql'"
                        .to_string(),
                )
            })?;

            let client = PostgreSQLClient::new(pg_config.clone())?;
            tracing::info!(
                database = %client.connection_string_safe(),
                "Creating PostgreSQL item store"
            );
            let store = PostgresStore::new(client);
            store.ensure_schema().await?;

            Ok(Arc::new(store) as Arc<dyn ItemStore + Send + Sync>)
        }
    }
}
