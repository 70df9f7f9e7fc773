//! Client-side view of stage collections
//!
//! A [`ReconciliationStore`] belongs to one session and is mutated through `&mut self`.
//! Local writes go through [`advance`](ReconciliationStore::advance) (or the
//! begin/apply pair it is made of); fresh repository reads replace collections
//! wholesale, and the repository always wins.

use super::backend::StageBackend;
use crate::core::api::{ListActiveRequest, ListHistoryRequest, TransitionRequest};
use crate::domain::{RecordId, Result, SowtrackError, Stage, StageRecord};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
struct StageCollections {
    active: Vec<StageRecord>,
    history: Vec<StageRecord>,
}

/// Per-stage active and history collections plus the pending transition marker
#[derive(Debug, Default)]
pub struct ReconciliationStore {
    stages: HashMap<Stage, StageCollections>,
    in_flight: Option<RecordId>,
}

impl ReconciliationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self, stage: Stage) -> &[StageRecord] {
        self.stages
            .get(&stage)
            .map(|c| c.active.as_slice())
            .unwrap_or_default()
    }

    pub fn history(&self, stage: Stage) -> &[StageRecord] {
        self.stages
            .get(&stage)
            .map(|c| c.history.as_slice())
            .unwrap_or_default()
    }

    /// Source record of the pending transition, if any
    pub fn in_flight(&self) -> Option<&RecordId> {
        self.in_flight.as_ref()
    }

    /// Marks a transition of `source_record_id` as pending
    ///
    /// # Errors
    ///
    /// `TransitionInFlight` while another transition is pending
    pub fn begin_transition(&mut self, source_record_id: &RecordId) -> Result<()> {
        if let Some(ref pending) = self.in_flight {
            return Err(SowtrackError::TransitionInFlight(pending.to_string()));
        }
        self.in_flight = Some(source_record_id.clone());
        Ok(())
    }

    /// Folds a transition outcome into the collections and clears the marker
    ///
    /// On success the source leaves its stage's active collection and enters that
    /// stage's history, and the destination joins `target`'s active collection. On
    /// failure nothing but the marker changes. The outcome is handed back unchanged.
    ///
    /// # Errors
    ///
    /// `TransitionInFlight`, leaving everything untouched, when the pending
    /// transition is for a different record.
    pub fn apply_transition_result(
        &mut self,
        source_record_id: &RecordId,
        target: Stage,
        result: Result<StageRecord>,
    ) -> Result<StageRecord> {
        if let Some(ref pending) = self.in_flight {
            if pending != source_record_id {
                return Err(SowtrackError::TransitionInFlight(pending.to_string()));
            }
        }
        self.in_flight = None;
        let destination = result?;

        let closed_source = self.stages.values_mut().find_map(|collections| {
            let position = collections
                .active
                .iter()
                .position(|r| &r.record_id == source_record_id)?;
            Some(collections.active.remove(position))
        });

        if let Some(source) = closed_source {
            let closed = source.closed(destination.entry_date, Some(target));
            let history = &mut self.stages.entry(closed.stage).or_default().history;
            if !history.iter().any(|r| r.record_id == closed.record_id) {
                history.push(closed);
            }
        }

        let active = &mut self.stages.entry(target).or_default().active;
        // A replayed transition hands back a destination we may already hold
        if !active.iter().any(|r| r.record_id == destination.record_id) {
            active.push(destination.clone());
        }

        Ok(destination)
    }

    /// Replaces `stage`'s active collection with a repository read
    pub fn reconcile_active(&mut self, stage: Stage, records: Vec<StageRecord>) {
        self.stages.entry(stage).or_default().active = records;
    }

    /// Replaces `stage`'s history collection with a repository read
    pub fn reconcile_history(&mut self, stage: Stage, records: Vec<StageRecord>) {
        self.stages.entry(stage).or_default().history = records;
    }

    /// Submits a transition through `backend` and folds in its result
    ///
    /// # Errors
    ///
    /// `MissingIdentifier` for a blank source id, `TransitionInFlight` while another
    /// transition is pending, otherwise whatever the backend reports.
    pub async fn advance(
        &mut self,
        backend: &dyn StageBackend,
        request: &TransitionRequest,
    ) -> Result<StageRecord> {
        let source = RecordId::new(request.source_record_id.trim()).map_err(|_| {
            SowtrackError::MissingIdentifier("sourceRecordId is required".to_string())
        })?;
        self.begin_transition(&source)?;

        tracing::debug!(
            source_record_id = %source,
            target_stage = %request.target_stage,
            "Submitting transition"
        );
        let result = backend.submit_transition(request).await;
        self.apply_transition_result(&source, request.target_stage, result)
    }

    /// Reads every active page for `farm_id`/`stage` and reconciles with it
    pub async fn refresh_active(
        &mut self,
        backend: &dyn StageBackend,
        farm_id: &str,
        stage: Stage,
    ) -> Result<usize> {
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let page = backend
                .fetch_active(&ListActiveRequest {
                    farm_id: farm_id.to_string(),
                    stage,
                    cursor,
                    limit: None,
                })
                .await?;
            records.extend(page.items);
            cursor = page.next_cursor;
            if !page.has_more || cursor.is_none() {
                break;
            }
        }
        let count = records.len();
        self.reconcile_active(stage, records);
        Ok(count)
    }

    /// Reads every history page for one month and reconciles with it
    pub async fn refresh_history(
        &mut self,
        backend: &dyn StageBackend,
        farm_id: &str,
        stage: Stage,
        year: i32,
        month: u32,
    ) -> Result<usize> {
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let page = backend
                .fetch_history(&ListHistoryRequest {
                    farm_id: farm_id.to_string(),
                    stage,
                    year,
                    month,
                    cursor,
                    limit: None,
                })
                .await?;
            records.extend(page.items);
            cursor = page.next_cursor;
            if !page.has_more || cursor.is_none() {
                break;
            }
        }
        let count = records.len();
        self.reconcile_history(stage, records);
        Ok(count)
    }
}
