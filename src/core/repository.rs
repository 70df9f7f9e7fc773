//! Paginated per-farm, per-stage listing of stage records
//!
//! Active records are read from the farm/stage `ACTIVE` index partition, completed
//! ones from the month partition they were closed in. Pages come back in index order
//! and are never re-sorted here.

use crate::adapters::database::{Item, ItemStore};
use crate::config::PaginationConfig;
use crate::core::cursor::{self, QueryScope};
use crate::core::keys;
use crate::domain::{FarmId, Result, SowtrackError, Stage, StageRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<StageRecord>,

    /// Present if and only if `has_more`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,

    pub has_more: bool,

    /// `YYYY-MM` of a history listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

/// Read access to the listing index
#[derive(Clone)]
pub struct StageRepository {
    store: Arc<dyn ItemStore + Send + Sync>,
    pagination: PaginationConfig,
}

impl StageRepository {
    pub fn new(store: Arc<dyn ItemStore + Send + Sync>, pagination: PaginationConfig) -> Self {
        Self { store, pagination }
    }

    /// Page size for a request: default when omitted, clamped to the maximum
    ///
    /// # Errors
    ///
    /// `Validation` for a limit of zero
    pub fn effective_limit(&self, limit: Option<usize>) -> Result<usize> {
        match limit {
            None => Ok(self.pagination.default_limit.min(self.pagination.max_limit)),
            Some(0) => Err(SowtrackError::Validation(
                "limit must be at least 1".to_string(),
            )),
            Some(n) => Ok(n.min(self.pagination.max_limit)),
        }
    }

    /// Lists the records currently active in `stage` on `farm_id`
    ///
    /// # Errors
    ///
    /// `InvalidKey` for an unusable farm id, `InvalidCursor` for a cursor not issued
    /// by this same listing, `Validation` for a zero limit, `StorageUnavailable` when
    /// the store cannot be read.
    pub async fn list_active(
        &self,
        farm_id: &FarmId,
        stage: Stage,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page> {
        let limit = self.effective_limit(limit)?;
        let partition = keys::active_partition(farm_id, stage)?;
        let scope = QueryScope::Active {
            farm_id: farm_id.clone(),
            stage,
        };
        self.read_page(&partition, &scope, cursor, limit, "active")
            .await
    }

    /// Lists the records of `stage` on `farm_id` that were closed in `year`-`month`
    ///
    /// # Errors
    ///
    /// As [`list_active`](Self::list_active), plus `Validation` for a month outside
    /// 1–12.
    pub async fn list_history(
        &self,
        farm_id: &FarmId,
        stage: Stage,
        year: i32,
        month: u32,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page> {
        let limit = self.effective_limit(limit)?;
        let partition = keys::history_partition(farm_id, stage, year, month)?;
        let scope = QueryScope::History {
            farm_id: farm_id.clone(),
            stage,
            year,
            month,
        };
        let mut page = self
            .read_page(&partition, &scope, cursor, limit, "history")
            .await?;
        page.month = Some(format!("{year:04}-{month:02}"));
        Ok(page)
    }

    async fn read_page(
        &self,
        partition: &str,
        scope: &QueryScope,
        token: Option<&str>,
        limit: usize,
        mode: &str,
    ) -> Result<Page> {
        let start_after = token.map(|t| cursor::decode(scope, t)).transpose()?;

        // One extra item tells whether another page exists
        let mut items = self
            .store
            .query_index(partition, start_after.as_deref(), limit + 1)
            .await?;

        let has_more = items.len() > limit;
        items.truncate(limit);

        let next_cursor = match (has_more, items.last()) {
            (true, Some(last)) => Some(cursor::encode(scope, last_sort_key(last)?)?),
            _ => None,
        };

        let records = items
            .iter()
            .map(Item::decode::<StageRecord>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        crate::log_page_served!(mode, partition, records.len(), has_more);

        Ok(Page {
            items: records,
            next_cursor,
            has_more,
            month: None,
        })
    }
}

fn last_sort_key(item: &Item) -> Result<&str> {
    item.index
        .as_ref()
        .map(|index| index.sort.as_str())
        .ok_or_else(|| {
            SowtrackError::InvalidKey(format!("listed item {} has no index key", item.key))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::core::keys::{record_index_key, stage_key};
    use crate::domain::{AnimalId, RecordId};
    use chrono::{Duration, TimeZone, Utc};

    async fn seed_active(store: &MemoryStore, farm: &str, stage: Stage, count: usize) {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for i in 0..count {
            let record = StageRecord::builder()
                .record_id(RecordId::new(format!("R{i}")).unwrap())
                .animal_id(AnimalId::new(format!("{farm}-P{i}")).unwrap())
                .farm_id(FarmId::new(farm).unwrap())
                .stage(stage)
                .entry_date(base + Duration::hours(i as i64))
                .build()
                .unwrap();
            let key = stage_key(&record.animal_id, stage, &record.record_id).unwrap();
            let index = record_index_key(&record).unwrap();
            let item = Item::new(key, Some(index), &record).unwrap();
            store.put_item(&item, None).await.unwrap();
        }
    }

    fn repository(store: Arc<MemoryStore>) -> StageRepository {
        StageRepository::new(store, PaginationConfig::default())
    }

    #[test]
    fn test_effective_limit() {
        let repo = repository(Arc::new(MemoryStore::new()));
        assert_eq!(repo.effective_limit(None).unwrap(), 50);
        assert_eq!(repo.effective_limit(Some(7)).unwrap(), 7);
        assert_eq!(repo.effective_limit(Some(5000)).unwrap(), 100);
        assert!(matches!(
            repo.effective_limit(Some(0)),
            Err(SowtrackError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_single_page_has_no_cursor() {
        let store = Arc::new(MemoryStore::new());
        seed_active(&store, "F1", Stage::Nursery, 3).await;
        let page = repository(store)
            .list_active(&FarmId::new("F1").unwrap(), Stage::Nursery, None, Some(3))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_listing_is_scoped_to_farm_and_stage() {
        let store = Arc::new(MemoryStore::new());
        seed_active(&store, "F1", Stage::Nursery, 2).await;
        seed_active(&store, "F2", Stage::Nursery, 4).await;
        let repo = repository(store);

        let page = repo
            .list_active(&FarmId::new("F1").unwrap(), Stage::Nursery, None, None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);

        let page = repo
            .list_active(&FarmId::new("F1").unwrap(), Stage::Fattening, None, None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_pages_follow_entry_order() {
        let store = Arc::new(MemoryStore::new());
        seed_active(&store, "F1", Stage::Gestation, 5).await;
        let repo = repository(store);
        let farm = FarmId::new("F1").unwrap();

        let first = repo
            .list_active(&farm, Stage::Gestation, None, Some(2))
            .await
            .unwrap();
        assert!(first.has_more);
        let second = repo
            .list_active(&farm, Stage::Gestation, first.next_cursor.as_deref(), Some(2))
            .await
            .unwrap();

        let ids: Vec<_> = first
            .items
            .iter()
            .chain(second.items.iter())
            .map(|r| r.record_id.to_string())
            .collect();
        assert_eq!(ids, vec!["R0", "R1", "R2", "R3"]);
    }

    #[tokio::test]
    async fn test_history_rejects_bad_month() {
        let repo = repository(Arc::new(MemoryStore::new()));
        let err = repo
            .list_history(&FarmId::new("F1").unwrap(), Stage::Dried, 2024, 13, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_history_reports_month() {
        let repo = repository(Arc::new(MemoryStore::new()));
        let page = repo
            .list_history(&FarmId::new("F1").unwrap(), Stage::Dried, 2024, 1, None, None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.month.as_deref(), Some("2024-01"));
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);
        let err = repository(store)
            .list_active(&FarmId::new("F1").unwrap(), Stage::Dried, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::StorageUnavailable(_)));
    }
}
