//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use sowtrack::adapters::database::{Condition, Item, ItemStore};
use sowtrack::adapters::memory::MemoryStore;
use sowtrack::core::keys::{record_index_key, StorageKey};
use sowtrack::domain::{RecordStatus, StageRecord, StageRecordPatch, StoreError};
use std::sync::{Arc, Mutex};

/// [`MemoryStore`] that yields to the scheduler before every operation
///
/// Futures joined on one task then interleave at each storage call, the way
/// concurrent requests against a remote store do.
#[derive(Default)]
pub struct YieldingStore {
    inner: Arc<MemoryStore>,
    edit_before_close: Mutex<Option<StageRecordPatch>>,
}

impl YieldingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store, for snapshots and injected failures
    pub fn memory(&self) -> Arc<MemoryStore> {
        self.inner.clone()
    }

    /// Makes another writer apply `patch` to a record right before the next write
    /// that closes it
    pub fn edit_before_next_close(&self, patch: StageRecordPatch) {
        *self.edit_before_close.lock().unwrap() = Some(patch);
    }

    async fn concurrent_edit(&self, key: &StorageKey, item: &Item) {
        if item.field("status").and_then(|v| v.as_str()) != Some(RecordStatus::Completed.as_str()) {
            return;
        }
        let Some(patch) = self.edit_before_close.lock().unwrap().take() else {
            return;
        };

        let current: StageRecord = self.inner.get_item(key).await.unwrap().unwrap().decode().unwrap();
        let edited = current.patched(&patch);
        let edited_item = Item::new(key.clone(), Some(record_index_key(&edited).unwrap()), &edited).unwrap();
        self.inner
            .update_if(
                key,
                &Condition::field_equals("version", current.version),
                &edited_item,
            )
            .await
            .unwrap();
    }
}

#[async_trait]
impl ItemStore for YieldingStore {
    fn backend_name(&self) -> &str {
        "yielding-memory"
    }

    async fn test_connection(&self) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.test_connection().await
    }

    async fn get_item(&self, key: &StorageKey) -> Result<Option<Item>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get_item(key).await
    }

    async fn query_prefix(&self, entity: &str, type_prefix: &str) -> Result<Vec<Item>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.query_prefix(entity, type_prefix).await
    }

    async fn query_index(
        &self,
        partition: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.query_index(partition, start_after, limit).await
    }

    async fn put_item(&self, item: &Item, condition: Option<&Condition>) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.put_item(item, condition).await
    }

    async fn update_if(
        &self,
        key: &StorageKey,
        condition: &Condition,
        item: &Item,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.concurrent_edit(key, item).await;
        self.inner.update_if(key, condition, item).await
    }

    async fn delete_if(&self, key: &StorageKey, condition: &Condition) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.delete_if(key, condition).await
    }
}
