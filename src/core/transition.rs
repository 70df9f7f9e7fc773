//! Stage transition engine
//!
//! A transition closes the animal's record in one stage and opens its record in the
//! next. Every write is a single-item operation guarded by a storage-side condition:
//!
//! 1. the destination stage's active slot is claimed for the destination record
//!    with "not exists", so an animal never holds two open records in one stage;
//! 2. the source is closed with a compare-and-swap on its `version`, recording the
//!    destination stage in `nextStage`;
//! 3. the source stage's slot is released;
//! 4. the destination is created with "not exists", under an id derived from the
//!    source record and target stage.
//!
//! Because the destination key is a pure function of the request, replays and
//! concurrent duplicates converge on one destination record. A crash between the
//! writes leaves a completed source with `nextStage` set and no successor, or a slot
//! naming a record that was never written; [`TransitionEngine::repair`] finishes or
//! releases those.

use crate::adapters::database::{Condition, Item, ItemStore};
use crate::core::keys;
use crate::domain::{
    AnimalId, AnimalProfile, FarmId, MedicalEvent, RecordId, RecordStatus, Result, SowtrackError,
    Stage, StageFields, StageHistoryEntry, StageRecord, StageRecordPatch,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Compare-and-swap attempts before a write gives up on a record that keeps changing
const WRITE_ATTEMPTS: usize = 3;

/// Outcome of a repair pass over one animal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub animal_id: Option<AnimalId>,
    /// Stage records inspected
    pub examined: usize,
    /// Destinations created by this pass
    pub repaired: Vec<StageRecord>,
    /// Orphans that could not be repaired automatically
    pub anomalies: Vec<RepairAnomaly>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty() && self.anomalies.is_empty()
    }
}

/// A completed record without a successor that needs an operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairAnomaly {
    pub record_id: RecordId,
    pub stage: Stage,
    pub reason: String,
}

/// The record an animal holds open in one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveSlot {
    animal_id: AnimalId,
    stage: Stage,
    record_id: RecordId,
}

impl ActiveSlot {
    fn of(record: &StageRecord) -> Self {
        Self {
            animal_id: record.animal_id.clone(),
            stage: record.stage,
            record_id: record.record_id.clone(),
        }
    }

    fn key(&self) -> Result<keys::StorageKey> {
        keys::active_slot_key(&self.animal_id, self.stage)
    }

    fn held_by(&self) -> Condition {
        Condition::field_equals("recordId", self.record_id.as_str())
    }
}

/// How closing the source ended
enum Close {
    Closed,
    /// Someone else closed it first; carries the stored record
    AlreadyClosed(StageRecord),
}

/// Executes stage transitions and other stage record writes
#[derive(Clone)]
pub struct TransitionEngine {
    store: Arc<dyn ItemStore + Send + Sync>,
}

impl TransitionEngine {
    pub fn new(store: Arc<dyn ItemStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// Moves an animal from the stage of `source_record_id` to `target`
    ///
    /// Returns the destination record. Replaying a request that already succeeded
    /// returns the same destination.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the source does not exist or belongs to another farm
    /// - `IllegalTransition` if `target` does not follow the source stage
    /// - `StaleTransition` if the source was closed by another transition, or the
    ///   animal already holds a different record open in `target`
    /// - `StorageUnavailable` if the store fails; the repair pass recovers a
    ///   failure between closing the source and creating the destination
    pub async fn transition(
        &self,
        source_record_id: &RecordId,
        animal_id: &AnimalId,
        farm_id: &FarmId,
        target: Stage,
    ) -> Result<StageRecord> {
        let records = self.stage_records(animal_id).await?;

        let source = records
            .iter()
            .find(|r| &r.record_id == source_record_id)
            .filter(|r| &r.farm_id == farm_id)
            .ok_or_else(|| {
                SowtrackError::NotFound(format!(
                    "stage record {} for animal {} on farm {}",
                    source_record_id, animal_id, farm_id
                ))
            })?;

        if !source.stage.can_transition_to(target) {
            return Err(SowtrackError::IllegalTransition {
                from: source.stage.to_string(),
                to: target.to_string(),
            });
        }

        let now = Utc::now();
        let destination = source.successor(target, now);

        if !source.is_active() {
            return self.resolve_replay(source, &destination).await;
        }

        self.claim_slot(&destination).await?;

        match self.close_source(source, target, now).await {
            Ok(Close::Closed) => {}
            Ok(Close::AlreadyClosed(current)) => {
                // A duplicate of this request still needs the claim
                if current.next_stage != Some(target) {
                    self.release_slot(&destination).await;
                }
                return self.resolve_replay(&current, &destination).await;
            }
            Err(e) => {
                self.release_slot(&destination).await;
                return Err(e);
            }
        }

        self.release_slot(source).await;
        let created = self.create_destination(&destination).await?;
        self.append_history(&created, Some(source.stage), now).await;

        crate::log_transition!(
            animal_id,
            source.record_id,
            created.record_id,
            source.stage,
            target
        );
        Ok(created)
    }

    /// Updates stage-specific fields of an active record
    ///
    /// The write is conditioned on the version that was read. When another writer
    /// got in first the patch is applied again to the fresh record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the record does not exist, `RecordNotActive` if it is (or
    /// concurrently becomes) completed, `Validation` for an empty patch,
    /// `StaleTransition` if the record keeps changing underneath the update.
    pub async fn update_stage_record(
        &self,
        animal_id: &AnimalId,
        record_id: &RecordId,
        patch: &StageRecordPatch,
    ) -> Result<StageRecord> {
        if patch.is_empty() {
            return Err(SowtrackError::Validation(
                "patch does not change any field".to_string(),
            ));
        }

        let not_found = || {
            SowtrackError::NotFound(format!(
                "stage record {} for animal {}",
                record_id, animal_id
            ))
        };

        let mut current = self
            .stage_records(animal_id)
            .await?
            .into_iter()
            .find(|r| &r.record_id == record_id)
            .ok_or_else(not_found)?;

        for _ in 0..WRITE_ATTEMPTS {
            if !current.is_active() {
                return Err(SowtrackError::RecordNotActive(record_id.to_string()));
            }

            let updated = current.patched(patch);
            match self
                .store
                .update_if(&record_key(&current)?, &version_condition(&current), &record_item(&updated)?)
                .await
            {
                Ok(()) => return Ok(updated),
                Err(e) if e.is_condition_failed() => {
                    current = self.reload(&current).await?.ok_or_else(not_found)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(kept_changing(record_id))
    }

    /// Opens an animal's first record (intake) in `stage`
    ///
    /// # Errors
    ///
    /// `StaleTransition` if the animal already holds a record open in `stage`.
    pub async fn open_initial_record(
        &self,
        animal_id: &AnimalId,
        farm_id: &FarmId,
        stage: Stage,
        fields: StageFields,
    ) -> Result<StageRecord> {
        let record = StageRecord::builder()
            .animal_id(animal_id.clone())
            .farm_id(farm_id.clone())
            .stage(stage)
            .fields(fields)
            .build()
            .map_err(SowtrackError::Validation)?;

        self.claim_slot(&record).await?;
        if let Err(e) = self
            .store
            .put_item(&record_item(&record)?, Some(&Condition::NotExists))
            .await
        {
            self.release_slot(&record).await;
            return Err(e.into());
        }
        self.append_history(&record, None, record.entry_date).await;

        tracing::info!(
            animal_id = %animal_id,
            farm_id = %farm_id,
            stage = %stage,
            record_id = %record.record_id,
            "Opened initial stage record"
        );
        Ok(record)
    }

    /// Stores an animal profile; a profile is written once
    ///
    /// # Errors
    ///
    /// `Validation` if the animal is already registered.
    pub async fn register_profile(&self, profile: &AnimalProfile) -> Result<()> {
        let item = Item::new(keys::profile_key(&profile.animal_id)?, None, profile)?;
        match self.store.put_item(&item, Some(&Condition::NotExists)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_condition_failed() => Err(SowtrackError::Validation(format!(
                "animal {} is already registered",
                profile.animal_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends a medical event
    ///
    /// # Errors
    ///
    /// `Validation` if an event with the same timestamp already exists.
    pub async fn record_medical_event(&self, event: &MedicalEvent) -> Result<()> {
        let key = keys::medical_key(&event.animal_id, event.recorded_at)?;
        let item = Item::new(key, None, event)?;
        match self.store.put_item(&item, Some(&Condition::NotExists)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_condition_failed() => Err(SowtrackError::Validation(format!(
                "animal {} already has a medical event at {}",
                event.animal_id,
                keys::format_timestamp(event.recorded_at)
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Finishes transitions that closed their source but never created the
    /// destination
    ///
    /// For each completed record without a successor, the destination named by its
    /// `nextStage` is created. Orphans without `nextStage`, or whose destination
    /// stage is held by another record, are reported as anomalies. Afterwards, slots
    /// naming a record that was never written are released and reported; slots left
    /// behind by completed records are released quietly.
    pub async fn repair(&self, animal_id: &AnimalId) -> Result<RepairReport> {
        let records = self.stage_records(animal_id).await?;
        let mut report = RepairReport {
            animal_id: Some(animal_id.clone()),
            examined: records.len(),
            ..RepairReport::default()
        };

        for orphan in records.iter().filter(|r| {
            r.status == RecordStatus::Completed
                && !records
                    .iter()
                    .any(|s| s.source_record_id.as_ref() == Some(&r.record_id))
        }) {
            let Some(target) = orphan.next_stage else {
                report.anomalies.push(RepairAnomaly {
                    record_id: orphan.record_id.clone(),
                    stage: orphan.stage,
                    reason: "completed without a recorded destination stage".to_string(),
                });
                continue;
            };

            let entry = orphan.exit_date.unwrap_or_else(Utc::now);
            let destination = orphan.successor(target, entry);

            let created = match self.claim_slot(&destination).await {
                Ok(()) => self.create_destination(&destination).await,
                Err(e) => Err(e),
            };
            match created {
                Ok(created) => {
                    self.append_history(&created, Some(orphan.stage), entry).await;
                    tracing::warn!(
                        animal_id = %animal_id,
                        source_record_id = %orphan.record_id,
                        record_id = %created.record_id,
                        to_stage = %target,
                        "Repaired interrupted transition"
                    );
                    report.repaired.push(created);
                }
                Err(SowtrackError::StaleTransition(reason)) => {
                    report.anomalies.push(RepairAnomaly {
                        record_id: orphan.record_id.clone(),
                        stage: orphan.stage,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let entity = keys::animal_entity(animal_id)?;
        for item in self
            .store
            .query_prefix(&entity, &keys::active_slot_prefix())
            .await?
        {
            let slot: ActiveSlot = item.decode()?;
            let holder = self
                .load_record(animal_id, slot.stage, &slot.record_id)
                .await?;
            match holder {
                Some(record) if record.is_active() => {}
                Some(_) => self.release(&slot).await,
                None => {
                    self.release(&slot).await;
                    report.anomalies.push(RepairAnomaly {
                        record_id: slot.record_id.clone(),
                        stage: slot.stage,
                        reason: "released stage slot held by a record that was never written"
                            .to_string(),
                    });
                }
            }
        }

        for anomaly in &report.anomalies {
            tracing::warn!(
                animal_id = %animal_id,
                record_id = %anomaly.record_id,
                stage = %anomaly.stage,
                reason = %anomaly.reason,
                "Stage record needs operator attention"
            );
        }

        Ok(report)
    }

    /// Every stage record of an animal, in key order
    pub async fn stage_records(&self, animal_id: &AnimalId) -> Result<Vec<StageRecord>> {
        let entity = keys::animal_entity(animal_id)?;
        let items = self
            .store
            .query_prefix(&entity, &keys::stage_prefix())
            .await?;
        items
            .iter()
            .map(|item| item.decode::<StageRecord>().map_err(SowtrackError::from))
            .collect()
    }

    async fn load_record(
        &self,
        animal_id: &AnimalId,
        stage: Stage,
        record_id: &RecordId,
    ) -> Result<Option<StageRecord>> {
        let key = keys::stage_key(animal_id, stage, record_id)?;
        match self.store.get_item(&key).await? {
            Some(item) => Ok(Some(item.decode()?)),
            None => Ok(None),
        }
    }

    async fn reload(&self, record: &StageRecord) -> Result<Option<StageRecord>> {
        self.load_record(&record.animal_id, record.stage, &record.record_id)
            .await
    }

    /// Closes the source, retrying with the fresh version while it stays active
    async fn close_source(
        &self,
        source: &StageRecord,
        target: Stage,
        now: DateTime<Utc>,
    ) -> Result<Close> {
        let mut current = source.clone();
        for _ in 0..WRITE_ATTEMPTS {
            let closed = current.closed(now, Some(target));
            match self
                .store
                .update_if(&record_key(&current)?, &version_condition(&current), &record_item(&closed)?)
                .await
            {
                Ok(()) => return Ok(Close::Closed),
                Err(e) if e.is_condition_failed() => {
                    current = self
                        .reload(&current)
                        .await?
                        .ok_or_else(|| stale(source))?;
                    if !current.is_active() {
                        return Ok(Close::AlreadyClosed(current));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(kept_changing(&source.record_id))
    }

    /// Makes `record` the one open record of its animal and stage
    ///
    /// Succeeds when the slot is free, already names `record`, or names a record
    /// that has since been completed.
    async fn claim_slot(&self, record: &StageRecord) -> Result<()> {
        let wanted = ActiveSlot::of(record);
        let key = wanted.key()?;
        let item = Item::new(key.clone(), None, &wanted)?;

        for _ in 0..WRITE_ATTEMPTS {
            match self.store.put_item(&item, Some(&Condition::NotExists)).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_condition_failed() => {}
                Err(e) => return Err(e.into()),
            }

            // Released since the put; try again
            let Some(current) = self.store.get_item(&key).await? else {
                continue;
            };
            let holder: ActiveSlot = current.decode()?;
            if holder.record_id == wanted.record_id {
                return Ok(());
            }

            match self
                .load_record(&holder.animal_id, holder.stage, &holder.record_id)
                .await?
            {
                Some(occupant) if occupant.is_active() => {
                    return Err(SowtrackError::StaleTransition(format!(
                        "animal {} already has active record {} in {}",
                        record.animal_id, occupant.record_id, record.stage
                    )));
                }
                None => {
                    return Err(SowtrackError::StaleTransition(format!(
                        "animal {} is opening record {} in {}",
                        record.animal_id, holder.record_id, record.stage
                    )));
                }
                // Holder was closed without releasing its slot
                Some(_) => match self.store.update_if(&key, &holder.held_by(), &item).await {
                    Ok(()) => return Ok(()),
                    Err(e) if e.is_condition_failed() => {}
                    Err(e) => return Err(e.into()),
                },
            }
        }

        Err(SowtrackError::StaleTransition(format!(
            "active slot of animal {} in {} keeps changing",
            record.animal_id, record.stage
        )))
    }

    /// Frees the slot `record` holds, if it still holds it
    async fn release_slot(&self, record: &StageRecord) {
        self.release(&ActiveSlot::of(record)).await;
    }

    async fn release(&self, slot: &ActiveSlot) {
        let result: Result<()> = async {
            match self.store.delete_if(&slot.key()?, &slot.held_by()).await {
                Ok(()) => Ok(()),
                Err(e) if e.is_condition_failed() => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
        .await;

        if let Err(e) = result {
            crate::log_error_with_context!(&e, "Failed to release active stage slot");
        }
    }

    /// The source is no longer active: succeed only if it was closed by this very
    /// transition and the destination exists
    async fn resolve_replay(
        &self,
        source: &StageRecord,
        destination: &StageRecord,
    ) -> Result<StageRecord> {
        let existing = self.store.get_item(&record_key(destination)?).await?;
        match existing {
            Some(item) => {
                let record: StageRecord = item.decode()?;
                if record.source_record_id.as_ref() == Some(&source.record_id) {
                    tracing::debug!(
                        source_record_id = %source.record_id,
                        record_id = %record.record_id,
                        "Transition already applied"
                    );
                    Ok(record)
                } else {
                    Err(stale(source))
                }
            }
            None => Err(stale(source)),
        }
    }

    /// Creates the destination, treating an existing record from the same source as
    /// success
    async fn create_destination(&self, destination: &StageRecord) -> Result<StageRecord> {
        match self
            .store
            .put_item(&record_item(destination)?, Some(&Condition::NotExists))
            .await
        {
            Ok(()) => Ok(destination.clone()),
            Err(e) if e.is_condition_failed() => {
                let existing = self.reload(destination).await?.ok_or_else(|| {
                    SowtrackError::StaleTransition(format!(
                        "destination {} changed during creation",
                        destination.record_id
                    ))
                })?;
                if existing.source_record_id == destination.source_record_id {
                    Ok(existing)
                } else {
                    Err(SowtrackError::StaleTransition(format!(
                        "destination {} belongs to another source",
                        destination.record_id
                    )))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn append_history(&self, record: &StageRecord, from: Option<Stage>, at: DateTime<Utc>) {
        let entry = StageHistoryEntry {
            animal_id: record.animal_id.clone(),
            farm_id: record.farm_id.clone(),
            occurred_at: at,
            from_stage: from,
            to_stage: record.stage,
            source_record_id: record.source_record_id.clone(),
            record_id: record.record_id.clone(),
        };

        let result: Result<()> = async {
            let key = keys::history_key(&record.animal_id, at, &record.record_id)?;
            let item = Item::new(key, None, &entry)?;
            self.store
                .put_item(&item, Some(&Condition::NotExists))
                .await
                .map_err(SowtrackError::from)
        }
        .await;

        if let Err(e) = result {
            crate::log_error_with_context!(&e, "Failed to append stage history entry");
        }
    }
}

fn stale(source: &StageRecord) -> SowtrackError {
    SowtrackError::StaleTransition(format!(
        "record {} is no longer active",
        source.record_id
    ))
}

fn kept_changing(record_id: &RecordId) -> SowtrackError {
    SowtrackError::StaleTransition(format!(
        "record {} keeps changing; refresh and retry",
        record_id
    ))
}

fn version_condition(record: &StageRecord) -> Condition {
    Condition::field_equals("version", record.version)
}

fn record_key(record: &StageRecord) -> Result<keys::StorageKey> {
    keys::stage_key(&record.animal_id, record.stage, &record.record_id)
}

fn record_item(record: &StageRecord) -> Result<Item> {
    Ok(Item::new(
        record_key(record)?,
        Some(keys::record_index_key(record)?),
        record,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;

    fn ids() -> (AnimalId, FarmId) {
        (AnimalId::new("P1").unwrap(), FarmId::new("F1").unwrap())
    }

    async fn engine_with_breeding() -> (Arc<MemoryStore>, TransitionEngine, StageRecord) {
        let store = Arc::new(MemoryStore::new());
        let engine = TransitionEngine::new(store.clone());
        let (animal, farm) = ids();
        let record = engine
            .open_initial_record(
                &animal,
                &farm,
                Stage::Breeding,
                StageFields {
                    breed: Some("Landrace".to_string()),
                    weight: Some(150.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        (store, engine, record)
    }

    #[tokio::test]
    async fn test_transition_closes_source_and_opens_destination() {
        let (_store, engine, breeding) = engine_with_breeding().await;
        let (animal, farm) = ids();

        let gestation = engine
            .transition(&breeding.record_id, &animal, &farm, Stage::Gestation)
            .await
            .unwrap();
        assert_eq!(gestation.stage, Stage::Gestation);
        assert!(gestation.is_active());
        assert_eq!(gestation.source_record_id, Some(breeding.record_id.clone()));
        assert_eq!(gestation.fields.breed.as_deref(), Some("Landrace"));
        assert!(gestation.fields.weight.is_none());

        let records = engine.stage_records(&animal).await.unwrap();
        let source = records
            .iter()
            .find(|r| r.record_id == breeding.record_id)
            .unwrap();
        assert_eq!(source.status, RecordStatus::Completed);
        assert!(source.exit_date.is_some());
        assert_eq!(source.next_stage, Some(Stage::Gestation));
    }

    #[tokio::test]
    async fn test_replay_returns_same_destination() {
        let (store, engine, breeding) = engine_with_breeding().await;
        let (animal, farm) = ids();

        let first = engine
            .transition(&breeding.record_id, &animal, &farm, Stage::Gestation)
            .await
            .unwrap();
        let items_after_first = store.len().await;
        let second = engine
            .transition(&breeding.record_id, &animal, &farm, Stage::Gestation)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len().await, items_after_first);
    }

    #[tokio::test]
    async fn test_illegal_edge_mutates_nothing() {
        let (store, engine, breeding) = engine_with_breeding().await;
        let (animal, farm) = ids();
        let before = store.snapshot().await;

        let err = engine
            .transition(&breeding.record_id, &animal, &farm, Stage::Fattening)
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::IllegalTransition { .. }));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_wrong_farm_is_not_found() {
        let (_store, engine, breeding) = engine_with_breeding().await;
        let (animal, _) = ids();
        let err = engine
            .transition(
                &breeding.record_id,
                &animal,
                &FarmId::new("F2").unwrap(),
                Stage::Gestation,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_closed_source_to_other_target_is_stale() {
        let (_store, engine, _) = engine_with_breeding().await;
        let (animal, farm) = ids();

        // Walk to fattening, then leave towards dried
        let mut current = engine.stage_records(&animal).await.unwrap()[0].clone();
        for target in [Stage::Gestation, Stage::Farrowing, Stage::Nursery, Stage::Fattening] {
            current = engine
                .transition(&current.record_id, &animal, &farm, target)
                .await
                .unwrap();
        }
        engine
            .transition(&current.record_id, &animal, &farm, Stage::Dried)
            .await
            .unwrap();

        // A late request for the other legal edge must not open a second destination
        let err = engine
            .transition(&current.record_id, &animal, &farm, Stage::InHouse)
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::StaleTransition(_)));
    }

    #[tokio::test]
    async fn test_update_only_touches_active_records() {
        let (_store, engine, breeding) = engine_with_breeding().await;
        let (animal, farm) = ids();
        let patch = StageRecordPatch {
            weight: Some(162.5),
            ..Default::default()
        };

        let updated = engine
            .update_stage_record(&animal, &breeding.record_id, &patch)
            .await
            .unwrap();
        assert_eq!(updated.fields.weight, Some(162.5));

        engine
            .transition(&breeding.record_id, &animal, &farm, Stage::Gestation)
            .await
            .unwrap();
        let err = engine
            .update_stage_record(&animal, &breeding.record_id, &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::RecordNotActive(_)));

        let err = engine
            .update_stage_record(&animal, &RecordId::new("nope").unwrap(), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_second_intake_in_same_stage_is_rejected() {
        let (_store, engine, _) = engine_with_breeding().await;
        let (animal, farm) = ids();
        let err = engine
            .open_initial_record(&animal, &farm, Stage::Breeding, StageFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::StaleTransition(_)));
    }

    #[tokio::test]
    async fn test_repair_creates_missing_destination() {
        let (store, engine, breeding) = engine_with_breeding().await;
        let (animal, farm) = ids();

        store.fail_next_put("STAGE#gestation#");
        let err = engine
            .transition(&breeding.record_id, &animal, &farm, Stage::Gestation)
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::StorageUnavailable(_)));

        let report = engine.repair(&animal).await.unwrap();
        assert_eq!(report.repaired.len(), 1);
        assert!(report.anomalies.is_empty());
        let repaired = &report.repaired[0];
        assert_eq!(repaired.stage, Stage::Gestation);
        assert_eq!(repaired.source_record_id, Some(breeding.record_id.clone()));

        // The original request now resolves to the repaired destination
        let replay = engine
            .transition(&breeding.record_id, &animal, &farm, Stage::Gestation)
            .await
            .unwrap();
        assert_eq!(replay.record_id, repaired.record_id);

        assert!(engine.repair(&animal).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_repair_reports_orphan_without_destination_stage() {
        let (store, engine, breeding) = engine_with_breeding().await;
        let (animal, _) = ids();

        let closed = breeding.closed(Utc::now(), None);
        store
            .update_if(
                &record_key(&breeding).unwrap(),
                &version_condition(&breeding),
                &record_item(&closed).unwrap(),
            )
            .await
            .unwrap();

        let report = engine.repair(&animal).await.unwrap();
        assert!(report.repaired.is_empty());
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].record_id, breeding.record_id);
    }

    #[tokio::test]
    async fn test_held_target_stage_is_stale_without_mutation() {
        let store = Arc::new(MemoryStore::new());
        let engine = TransitionEngine::new(store.clone());
        let (animal, farm) = ids();
        let fattening = engine
            .open_initial_record(&animal, &farm, Stage::Fattening, StageFields::default())
            .await
            .unwrap();
        let dried = engine
            .open_initial_record(&animal, &farm, Stage::Dried, StageFields::default())
            .await
            .unwrap();

        engine
            .transition(&fattening.record_id, &animal, &farm, Stage::InHouse)
            .await
            .unwrap();
        let before = store.snapshot().await;

        let err = engine
            .transition(&dried.record_id, &animal, &farm, Stage::InHouse)
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::StaleTransition(_)));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_transition_moves_active_slot() {
        let (store, engine, breeding) = engine_with_breeding().await;
        let (animal, farm) = ids();
        let gestation = engine
            .transition(&breeding.record_id, &animal, &farm, Stage::Gestation)
            .await
            .unwrap();

        let breeding_slot = keys::active_slot_key(&animal, Stage::Breeding).unwrap();
        assert!(store.get_item(&breeding_slot).await.unwrap().is_none());

        let gestation_slot = keys::active_slot_key(&animal, Stage::Gestation).unwrap();
        let slot: ActiveSlot = store
            .get_item(&gestation_slot)
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(slot.record_id, gestation.record_id);
    }

    #[tokio::test]
    async fn test_slot_left_by_closed_record_is_taken_over() {
        let (store, engine, breeding) = engine_with_breeding().await;
        let (animal, farm) = ids();

        // Closed behind the engine's back; the breeding slot still names it
        let closed = breeding.closed(Utc::now(), None);
        store
            .update_if(
                &record_key(&breeding).unwrap(),
                &version_condition(&breeding),
                &record_item(&closed).unwrap(),
            )
            .await
            .unwrap();

        let reopened = engine
            .open_initial_record(&animal, &farm, Stage::Breeding, StageFields::default())
            .await
            .unwrap();
        assert_ne!(reopened.record_id, breeding.record_id);
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let (store, engine, breeding) = engine_with_breeding().await;
        let (animal, _) = ids();
        let patch = StageRecordPatch {
            notes: Some("first".to_string()),
            ..Default::default()
        };
        let updated = engine
            .update_stage_record(&animal, &breeding.record_id, &patch)
            .await
            .unwrap();
        assert_eq!(updated.version, breeding.version + 1);

        // A write based on the original read no longer applies
        let err = store
            .update_if(
                &record_key(&breeding).unwrap(),
                &version_condition(&breeding),
                &record_item(&breeding.closed(Utc::now(), None)).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(err.is_condition_failed());
    }

    #[tokio::test]
    async fn test_repair_releases_slot_of_unwritten_record() {
        let store = Arc::new(MemoryStore::new());
        let engine = TransitionEngine::new(store.clone());
        let (animal, farm) = ids();

        // An intake that claimed its slot and died before writing the record
        let ghost = ActiveSlot {
            animal_id: animal.clone(),
            stage: Stage::Nursery,
            record_id: RecordId::new("ghost").unwrap(),
        };
        store
            .put_item(&Item::new(ghost.key().unwrap(), None, &ghost).unwrap(), None)
            .await
            .unwrap();

        let err = engine
            .open_initial_record(&animal, &farm, Stage::Nursery, StageFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SowtrackError::StaleTransition(_)));

        let report = engine.repair(&animal).await.unwrap();
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].record_id, ghost.record_id);

        engine
            .open_initial_record(&animal, &farm, Stage::Nursery, StageFields::default())
            .await
            .unwrap();
        assert!(engine.repair(&animal).await.unwrap().is_clean());
    }
}
