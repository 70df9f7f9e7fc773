//! Storage abstraction traits
//!
//! The core only needs a handful of primitives from the physical store: point reads,
//! prefix queries within one entity, ordered reads of one index partition, and
//! conditional writes. Backends implement [`ItemStore`]; everything above it is
//! backend-agnostic.

use crate::core::keys::{IndexKey, StorageKey};
use crate::domain::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One row of the item table
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub key: StorageKey,

    /// Listing index entry; `None` for items that are never listed per farm
    pub index: Option<IndexKey>,

    /// Item attributes as a JSON object
    pub data: Value,
}

impl Item {
    /// Serializes `value` into a new item
    pub fn new<T: Serialize>(
        key: StorageKey,
        index: Option<IndexKey>,
        value: &T,
    ) -> Result<Self, StoreError> {
        let data = serde_json::to_value(value)
            .map_err(|e| StoreError::WriteFailed(format!("cannot serialize {key}: {e}")))?;
        Ok(Self { key, index, data })
    }

    /// Deserializes the item attributes
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            StoreError::DeserializationFailed(format!("item {}: {e}", self.key))
        })
    }

    /// Reads one top-level attribute
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Precondition for a conditional write
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// An item with the key must already exist
    Exists,
    /// No item with the key may exist
    NotExists,
    /// The stored item must exist and have `field == value`
    FieldEquals { field: String, value: Value },
}

impl Condition {
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluates the condition against the currently stored item
    pub fn holds(&self, current: Option<&Item>) -> bool {
        match (self, current) {
            (Condition::Exists, current) => current.is_some(),
            (Condition::NotExists, current) => current.is_none(),
            (Condition::FieldEquals { field, value }, Some(item)) => {
                item.field(field) == Some(value)
            }
            (Condition::FieldEquals { .. }, None) => false,
        }
    }
}

/// Item storage trait
///
/// All operations are single-item atomic; there are no multi-item transactions.
/// A failed precondition is reported as [`StoreError::ConditionFailed`] and leaves
/// the stored item untouched.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &str;

    /// Test the backend connection
    async fn test_connection(&self) -> Result<(), StoreError>;

    /// Point read
    async fn get_item(&self, key: &StorageKey) -> Result<Option<Item>, StoreError>;

    /// All items of `entity` whose type starts with `type_prefix`, in type order
    async fn query_prefix(&self, entity: &str, type_prefix: &str)
        -> Result<Vec<Item>, StoreError>;

    /// Up to `limit` items of an index partition in sort-key order
    ///
    /// When `start_after` is given only items with a strictly greater sort key are
    /// returned.
    async fn query_index(
        &self,
        partition: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError>;

    /// Insert or replace an item, optionally guarded by a condition
    async fn put_item(&self, item: &Item, condition: Option<&Condition>)
        -> Result<(), StoreError>;

    /// Compare-and-swap: replace the item at `key` only if `condition` holds
    ///
    /// `item.key` must equal `key`.
    async fn update_if(
        &self,
        key: &StorageKey,
        condition: &Condition,
        item: &Item,
    ) -> Result<(), StoreError>;

    /// Remove the item at `key` only if `condition` holds
    async fn delete_if(&self, key: &StorageKey, condition: &Condition) -> Result<(), StoreError>;
}
