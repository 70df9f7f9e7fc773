//! `ItemStore` over a `BTreeMap` guarded by a tokio `RwLock`

use crate::adapters::database::traits::{Condition, Item, ItemStore};
use crate::core::keys::StorageKey;
use crate::domain::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::RwLock;

/// In-memory item store
///
/// Items are ordered by `(entity, type)`, so prefix queries are range scans. Index
/// queries scan every item; the store is meant for tests and small local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<StorageKey, Item>>,
    unavailable: AtomicBool,
    failing_put_prefix: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with `ConnectionFailed` until switched back
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Fails the next `put_item` whose type starts with `type_prefix`
    ///
    /// Simulates a process dying between two writes.
    pub fn fail_next_put(&self, type_prefix: impl Into<String>) {
        if let Ok(mut guard) = self.failing_put_prefix.lock() {
            *guard = Some(type_prefix.into());
        }
    }

    /// Number of stored items
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Copy of every stored item, in key order
    pub async fn snapshot(&self) -> Vec<Item> {
        self.items.read().await.values().cloned().collect()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionFailed(
                "memory store is marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn take_injected_failure(&self, key: &StorageKey) -> Result<(), StoreError> {
        let mut guard = self
            .failing_put_prefix
            .lock()
            .map_err(|_| StoreError::WriteFailed("fault injection lock poisoned".to_string()))?;
        if guard
            .as_deref()
            .is_some_and(|prefix| key.item_type.starts_with(prefix))
        {
            *guard = None;
            return Err(StoreError::WriteFailed(format!(
                "injected failure writing {key}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn test_connection(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn get_item(&self, key: &StorageKey) -> Result<Option<Item>, StoreError> {
        self.check_available()?;
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn query_prefix(
        &self,
        entity: &str,
        type_prefix: &str,
    ) -> Result<Vec<Item>, StoreError> {
        self.check_available()?;
        let items = self.items.read().await;
        let start = StorageKey::new(entity, type_prefix);
        Ok(items
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(|(key, _)| key.entity == entity && key.item_type.starts_with(type_prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn query_index(
        &self,
        partition: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        self.check_available()?;
        let items = self.items.read().await;
        let mut matches: Vec<(&str, &Item)> = items
            .values()
            .filter_map(|item| {
                let index = item.index.as_ref()?;
                if index.partition != partition {
                    return None;
                }
                match start_after {
                    Some(after) if index.sort.as_str() <= after => None,
                    _ => Some((index.sort.as_str(), item)),
                }
            })
            .collect();
        matches.sort_by(|a, b| a.0.cmp(b.0));
        Ok(matches
            .into_iter()
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn put_item(&self, item: &Item, condition: Option<&Condition>) -> Result<(), StoreError> {
        self.check_available()?;
        self.take_injected_failure(&item.key)?;
        let mut items = self.items.write().await;
        if let Some(condition) = condition {
            if !condition.holds(items.get(&item.key)) {
                return Err(StoreError::ConditionFailed(format!(
                    "{condition:?} does not hold for {}",
                    item.key
                )));
            }
        }
        items.insert(item.key.clone(), item.clone());
        Ok(())
    }

    async fn update_if(
        &self,
        key: &StorageKey,
        condition: &Condition,
        item: &Item,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        if &item.key != key {
            return Err(StoreError::WriteFailed(format!(
                "update of {key} carries item for {}",
                item.key
            )));
        }
        let mut items = self.items.write().await;
        if !condition.holds(items.get(key)) {
            return Err(StoreError::ConditionFailed(format!(
                "{condition:?} does not hold for {key}"
            )));
        }
        items.insert(key.clone(), item.clone());
        Ok(())
    }

    async fn delete_if(&self, key: &StorageKey, condition: &Condition) -> Result<(), StoreError> {
        self.check_available()?;
        let mut items = self.items.write().await;
        if !condition.holds(items.get(key)) {
            return Err(StoreError::ConditionFailed(format!(
                "{condition:?} does not hold for {key}"
            )));
        }
        items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys::IndexKey;
    use serde_json::json;

    fn item(entity: &str, item_type: &str, index: Option<(&str, &str)>) -> Item {
        Item {
            key: StorageKey::new(entity, item_type),
            index: index.map(|(p, s)| IndexKey {
                partition: p.to_string(),
                sort: s.to_string(),
            }),
            data: json!({ "status": "active" }),
        }
    }

    #[tokio::test]
    async fn test_prefix_query_stays_within_entity() {
        let store = MemoryStore::new();
        for (entity, item_type) in [
            ("ANIMAL#P1", "MEDICAL#2024-01-01"),
            ("ANIMAL#P1", "MEDICAL#2024-02-01"),
            ("ANIMAL#P1", "PROFILE"),
            ("ANIMAL#P10", "MEDICAL#2024-01-01"),
        ] {
            store.put_item(&item(entity, item_type, None), None).await.unwrap();
        }

        let medical = store.query_prefix("ANIMAL#P1", "MEDICAL#").await.unwrap();
        assert_eq!(medical.len(), 2);
        assert_eq!(medical[0].key.item_type, "MEDICAL#2024-01-01");
    }

    #[tokio::test]
    async fn test_index_query_orders_and_resumes() {
        let store = MemoryStore::new();
        for (t, sort) in [("A", "3"), ("B", "1"), ("C", "2")] {
            store
                .put_item(&item("ANIMAL#X", t, Some(("PART", sort))), None)
                .await
                .unwrap();
        }
        store
            .put_item(&item("ANIMAL#Y", "Z", Some(("OTHER", "0"))), None)
            .await
            .unwrap();

        let first = store.query_index("PART", None, 2).await.unwrap();
        let types: Vec<_> = first.iter().map(|i| i.key.item_type.as_str()).collect();
        assert_eq!(types, vec!["B", "C"]);

        let rest = store.query_index("PART", Some("2"), 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].key.item_type, "A");
    }

    #[tokio::test]
    async fn test_conditional_writes() {
        let store = MemoryStore::new();
        let original = item("ANIMAL#P1", "STAGE#breeding#B1", None);
        store
            .put_item(&original, Some(&Condition::NotExists))
            .await
            .unwrap();

        let err = store
            .put_item(&original, Some(&Condition::NotExists))
            .await
            .unwrap_err();
        assert!(err.is_condition_failed());

        let mut closed = original.clone();
        closed.data = json!({ "status": "completed" });
        let active = Condition::field_equals("status", "active");
        store.update_if(&original.key, &active, &closed).await.unwrap();

        let err = store
            .update_if(&original.key, &active, &closed)
            .await
            .unwrap_err();
        assert!(err.is_condition_failed());
        assert_eq!(
            store.get_item(&original.key).await.unwrap().unwrap().data["status"],
            "completed"
        );
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let store = MemoryStore::new();
        let slot = item("ANIMAL#P1", "ACTIVE#breeding", None);
        store.put_item(&slot, None).await.unwrap();

        let err = store
            .delete_if(&slot.key, &Condition::field_equals("status", "completed"))
            .await
            .unwrap_err();
        assert!(err.is_condition_failed());
        assert_eq!(store.len().await, 1);

        store
            .delete_if(&slot.key, &Condition::field_equals("status", "active"))
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_with_connection_error() {
        let store = MemoryStore::new();
        store.set_available(false);
        let err = store.test_connection().await.unwrap_err();
        assert!(matches!(err, StoreError::ConnectionFailed(_)));
        store.set_available(true);
        assert!(store.test_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let store = MemoryStore::new();
        store.fail_next_put("STAGE#");
        let stage = item("ANIMAL#P1", "STAGE#gestation#G1", None);
        assert!(store.put_item(&stage, None).await.is_err());
        assert!(store.put_item(&stage, None).await.is_ok());
        assert_eq!(store.len().await, 1);
    }
}
