//! Stage record domain model
//!
//! A [`StageRecord`] is one visit of one animal to one stage. It is opened active,
//! closed exactly once, and never rewritten after it is completed.

use super::ids::{AnimalId, FarmId, RecordId};
use super::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a stage record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// The animal is currently in this stage
    Active,
    /// The animal has left this stage
    Completed,
}

impl RecordStatus {
    /// Wire spelling, also used in storage conditions
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Completed => "completed",
        }
    }
}

/// Stage-specific attributes of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,

    /// Weight in kilograms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Free-form per-stage attributes (e.g. litter size, pen number)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl StageFields {
    /// Fields carried into the next stage's record
    ///
    /// Breed is a property of the animal; weight and notes describe one visit and
    /// start empty in the new stage.
    pub fn carried_forward(&self) -> Self {
        Self {
            breed: self.breed.clone(),
            ..Self::default()
        }
    }

    /// Applies a patch in place
    pub fn apply(&mut self, patch: &StageRecordPatch) {
        if let Some(ref breed) = patch.breed {
            self.breed = Some(breed.clone());
        }
        if let Some(weight) = patch.weight {
            self.weight = Some(weight);
        }
        if let Some(ref notes) = patch.notes {
            self.notes = Some(notes.clone());
        }
        for (key, value) in &patch.attributes {
            if value.is_null() {
                self.attributes.remove(key);
            } else {
                self.attributes.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Partial update of a record's stage-specific fields
///
/// Only fields that are `Some` are written. A `null` attribute value removes the
/// attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecordPatch {
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl StageRecordPatch {
    /// True when the patch would not change anything
    pub fn is_empty(&self) -> bool {
        self.breed.is_none()
            && self.weight.is_none()
            && self.notes.is_none()
            && self.attributes.is_empty()
    }
}

/// One visit of one animal to one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub record_id: RecordId,
    pub animal_id: AnimalId,
    pub farm_id: FarmId,
    pub stage: Stage,
    pub entry_date: DateTime<Utc>,

    /// Set if and only if the record is completed
    #[serde(default)]
    pub exit_date: Option<DateTime<Utc>>,

    pub status: RecordStatus,

    #[serde(flatten)]
    pub fields: StageFields,

    /// Record this one was opened from; `None` for intake records
    #[serde(default)]
    pub source_record_id: Option<RecordId>,

    /// Destination stage chosen when this record was closed by a transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<Stage>,

    /// Bumped by every stored change; conditional writes compare it
    #[serde(default)]
    pub version: u64,
}

impl StageRecord {
    /// Creates a new builder for constructing a StageRecord
    pub fn builder() -> StageRecordBuilder {
        StageRecordBuilder::default()
    }

    /// Check if the animal is still in this stage
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// Returns a closed copy of this record
    ///
    /// Sets status, exit date and the destination stage together so the exit-date
    /// invariant holds on every stored version.
    pub fn closed(&self, exit_date: DateTime<Utc>, next_stage: Option<Stage>) -> Self {
        Self {
            exit_date: Some(exit_date),
            status: RecordStatus::Completed,
            next_stage,
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Returns a copy with `patch` applied to the stage-specific fields
    pub fn patched(&self, patch: &StageRecordPatch) -> Self {
        let mut updated = self.clone();
        updated.fields.apply(patch);
        updated.version = self.version + 1;
        updated
    }

    /// Builds the record a transition opens in `target`
    pub fn successor(&self, target: Stage, entry_date: DateTime<Utc>) -> Self {
        Self {
            record_id: RecordId::derived_from(&self.record_id, target.as_str()),
            animal_id: self.animal_id.clone(),
            farm_id: self.farm_id.clone(),
            stage: target,
            entry_date,
            exit_date: None,
            status: RecordStatus::Active,
            fields: self.fields.carried_forward(),
            source_record_id: Some(self.record_id.clone()),
            next_stage: None,
            version: 0,
        }
    }
}

/// Builder for constructing StageRecord instances
#[derive(Debug, Default)]
pub struct StageRecordBuilder {
    record_id: Option<RecordId>,
    animal_id: Option<AnimalId>,
    farm_id: Option<FarmId>,
    stage: Option<Stage>,
    entry_date: Option<DateTime<Utc>>,
    fields: StageFields,
    source_record_id: Option<RecordId>,
}

impl StageRecordBuilder {
    /// Creates a new StageRecordBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record ID (generated when omitted)
    pub fn record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// Sets the animal ID
    pub fn animal_id(mut self, animal_id: AnimalId) -> Self {
        self.animal_id = Some(animal_id);
        self
    }

    /// Sets the farm ID
    pub fn farm_id(mut self, farm_id: FarmId) -> Self {
        self.farm_id = Some(farm_id);
        self
    }

    /// Sets the stage
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Sets the entry date (now when omitted)
    pub fn entry_date(mut self, entry_date: DateTime<Utc>) -> Self {
        self.entry_date = Some(entry_date);
        self
    }

    /// Sets the stage-specific fields
    pub fn fields(mut self, fields: StageFields) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the source record
    pub fn source_record_id(mut self, source: RecordId) -> Self {
        self.source_record_id = Some(source);
        self
    }

    /// Builds an active StageRecord
    ///
    /// # Errors
    ///
    /// Returns an error if animal, farm or stage is missing
    pub fn build(self) -> Result<StageRecord, String> {
        Ok(StageRecord {
            record_id: self.record_id.unwrap_or_else(RecordId::generate),
            animal_id: self.animal_id.ok_or("animal_id is required")?,
            farm_id: self.farm_id.ok_or("farm_id is required")?,
            stage: self.stage.ok_or("stage is required")?,
            entry_date: self.entry_date.unwrap_or_else(Utc::now),
            exit_date: None,
            status: RecordStatus::Active,
            fields: self.fields,
            source_record_id: self.source_record_id,
            next_stage: None,
            version: 0,
        })
    }
}
