//! PostgreSQL implementation of [`ItemStore`]
//!
//! One `sowtrack_items` table (see `migrations/001_initial_schema.sql`). Conditional
//! writes are single statements whose `WHERE` clause carries the condition; zero
//! affected rows means the condition failed.

use crate::adapters::database::traits::{Condition, Item, ItemStore};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::core::keys::{IndexKey, StorageKey};
use crate::domain::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::Row;

const SELECT_COLUMNS: &str = "entity, item_type, index_pk, index_sk, data";

/// PostgreSQL-backed item store
pub struct PostgresStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgresStore {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Runs the schema migration
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.client.ensure_schema().await
    }

    async fn insert_if_absent(&self, item: &Item) -> Result<u64, StoreError> {
        let (index_pk, index_sk) = index_columns(item);
        self.client
            .execute(
                "INSERT INTO sowtrack_items (entity, item_type, index_pk, index_sk, data, updated_at)
                 VALUES ($1, $2, $3, $4, $5, now())
                 ON CONFLICT (entity, item_type) DO NOTHING",
                &[
                    &item.key.entity,
                    &item.key.item_type,
                    &index_pk,
                    &index_sk,
                    &item.data,
                ],
            )
            .await
    }

    async fn upsert(&self, item: &Item) -> Result<u64, StoreError> {
        let (index_pk, index_sk) = index_columns(item);
        self.client
            .execute(
                "INSERT INTO sowtrack_items (entity, item_type, index_pk, index_sk, data, updated_at)
                 VALUES ($1, $2, $3, $4, $5, now())
                 ON CONFLICT (entity, item_type) DO UPDATE SET
                     index_pk = EXCLUDED.index_pk,
                     index_sk = EXCLUDED.index_sk,
                     data = EXCLUDED.data,
                     updated_at = now()",
                &[
                    &item.key.entity,
                    &item.key.item_type,
                    &index_pk,
                    &index_sk,
                    &item.data,
                ],
            )
            .await
    }

    async fn update_existing(&self, item: &Item) -> Result<u64, StoreError> {
        let (index_pk, index_sk) = index_columns(item);
        self.client
            .execute(
                "UPDATE sowtrack_items
                 SET index_pk = $3, index_sk = $4, data = $5, updated_at = now()
                 WHERE entity = $1 AND item_type = $2",
                &[
                    &item.key.entity,
                    &item.key.item_type,
                    &index_pk,
                    &index_sk,
                    &item.data,
                ],
            )
            .await
    }

    async fn update_where_field(
        &self,
        item: &Item,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64, StoreError> {
        let (index_pk, index_sk) = index_columns(item);
        self.client
            .execute(
                "UPDATE sowtrack_items
                 SET index_pk = $3, index_sk = $4, data = $5, updated_at = now()
                 WHERE entity = $1 AND item_type = $2 AND data -> $6::text = $7::jsonb",
                &[
                    &item.key.entity,
                    &item.key.item_type,
                    &index_pk,
                    &index_sk,
                    &item.data,
                    &field,
                    value,
                ],
            )
            .await
    }

    async fn write(&self, item: &Item, condition: Option<&Condition>) -> Result<(), StoreError> {
        let affected = match condition {
            None => self.upsert(item).await?,
            Some(Condition::NotExists) => self.insert_if_absent(item).await?,
            Some(Condition::Exists) => self.update_existing(item).await?,
            Some(Condition::FieldEquals { field, value }) => {
                self.update_where_field(item, field, value).await?
            }
        };

        if affected == 0 {
            return Err(StoreError::ConditionFailed(format!(
                "{:?} does not hold for {}",
                condition, item.key
            )));
        }
        Ok(())
    }
}

fn index_columns(item: &Item) -> (Option<&str>, Option<&str>) {
    match item.index {
        Some(ref index) => (Some(index.partition.as_str()), Some(index.sort.as_str())),
        None => (None, None),
    }
}

/// Escapes `LIKE` metacharacters so the prefix matches literally
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn row_to_item(row: &Row) -> Result<Item, StoreError> {
    let read = |e: tokio_postgres::Error| StoreError::DeserializationFailed(e.to_string());

    let entity: String = row.try_get("entity").map_err(read)?;
    let item_type: String = row.try_get("item_type").map_err(read)?;
    let index_pk: Option<String> = row.try_get("index_pk").map_err(read)?;
    let index_sk: Option<String> = row.try_get("index_sk").map_err(read)?;
    let data: serde_json::Value = row.try_get("data").map_err(read)?;

    let index = match (index_pk, index_sk) {
        (Some(partition), Some(sort)) => Some(IndexKey { partition, sort }),
        _ => None,
    };

    Ok(Item {
        key: StorageKey::new(entity, item_type),
        index,
        data,
    })
}

#[async_trait]
impl ItemStore for PostgresStore {
    fn backend_name(&self) -> &str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<(), StoreError> {
        self.client.test_connection().await
    }

    async fn get_item(&self, key: &StorageKey) -> Result<Option<Item>, StoreError> {
        let query =
            format!("SELECT {SELECT_COLUMNS} FROM sowtrack_items WHERE entity = $1 AND item_type = $2");
        let rows = self
            .client
            .query(&query, &[&key.entity, &key.item_type])
            .await?;
        rows.first().map(row_to_item).transpose()
    }

    async fn query_prefix(
        &self,
        entity: &str,
        type_prefix: &str,
    ) -> Result<Vec<Item>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM sowtrack_items
             WHERE entity = $1 AND item_type LIKE $2
             ORDER BY item_type"
        );
        let pattern = like_prefix(type_prefix);
        let rows = self.client.query(&query, &[&entity, &pattern]).await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn query_index(
        &self,
        partition: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM sowtrack_items
             WHERE index_pk = $1 AND ($2::text IS NULL OR index_sk > $2::text)
             ORDER BY index_sk
             LIMIT $3"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .client
            .query(&query, &[&partition, &start_after, &limit])
            .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn put_item(&self, item: &Item, condition: Option<&Condition>) -> Result<(), StoreError> {
        self.write(item, condition).await
    }

    async fn update_if(
        &self,
        key: &StorageKey,
        condition: &Condition,
        item: &Item,
    ) -> Result<(), StoreError> {
        if &item.key != key {
            return Err(StoreError::WriteFailed(format!(
                "update of {key} carries item for {}",
                item.key
            )));
        }
        self.write(item, Some(condition)).await
    }

    async fn delete_if(&self, key: &StorageKey, condition: &Condition) -> Result<(), StoreError> {
        let affected = match condition {
            Condition::Exists => {
                self.client
                    .execute(
                        "DELETE FROM sowtrack_items WHERE entity = $1 AND item_type = $2",
                        &[&key.entity, &key.item_type],
                    )
                    .await?
            }
            Condition::FieldEquals { field, value } => {
                self.client
                    .execute(
                        "DELETE FROM sowtrack_items
                         WHERE entity = $1 AND item_type = $2 AND data -> $3::text = $4::jsonb",
                        &[&key.entity, &key.item_type, field, value],
                    )
                    .await?
            }
            // Nothing to remove when the item must be absent
            Condition::NotExists => {
                return match self.get_item(key).await? {
                    None => Ok(()),
                    Some(_) => Err(StoreError::ConditionFailed(format!(
                        "{condition:?} does not hold for {key}"
                    ))),
                };
            }
        };

        if affected == 0 {
            return Err(StoreError::ConditionFailed(format!(
                "{condition:?} does not hold for {key}"
            )));
        }
        Ok(())
    }
}
