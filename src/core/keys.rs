//! Key codec for the single-table layout
//!
//! Every item lives under a composite `(Entity, Type)` key:
//!
//! | Item              | Entity             | Type                                 |
//! |-------------------|--------------------|--------------------------------------|
//! | Animal profile    | `ANIMAL#{animal}`  | `PROFILE`                            |
//! | Stage record      | `ANIMAL#{animal}`  | `STAGE#{stage}#{record}`             |
//! | Medical event     | `ANIMAL#{animal}`  | `MEDICAL#{timestamp}`                |
//! | Stage history     | `ANIMAL#{animal}`  | `HISTORY#{timestamp}#{record}`       |
//! | Active slot       | `ANIMAL#{animal}`  | `ACTIVE#{stage}`                     |
//!
//! The active slot names the one record an animal holds open in a stage. It is
//! claimed with a "not exists" write before a record is opened, which makes the
//! single-active-record rule a storage-side condition.
//!
//! Stage records additionally carry an [`IndexKey`] so they can be listed per farm and
//! stage: active records live in `FARM#{farm}#STAGE#{stage}#ACTIVE`, completed ones in
//! `FARM#{farm}#STAGE#{stage}#HISTORY#{yyyy}-{mm}` keyed by the month they were closed.
//!
//! Timestamps are rendered fixed-width (RFC 3339, microseconds, `Z`), so lexical
//! order of the keys is chronological order.

use crate::domain::{AnimalId, FarmId, RecordId, Result, SowtrackError, Stage, StageRecord};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key delimiter
pub const SEPARATOR: char = '#';

const ANIMAL_PREFIX: &str = "ANIMAL";
const FARM_PREFIX: &str = "FARM";
const PROFILE_TYPE: &str = "PROFILE";
const STAGE_TYPE: &str = "STAGE";
const MEDICAL_TYPE: &str = "MEDICAL";
const HISTORY_TYPE: &str = "HISTORY";
const ACTIVE_TYPE: &str = "ACTIVE";

/// Composite primary key of a stored item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey {
    /// Partition component (`Entity`)
    pub entity: String,
    /// Sort component (`Type`)
    pub item_type: String,
}

impl StorageKey {
    pub fn new(entity: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            item_type: item_type.into(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.entity, self.item_type)
    }
}

/// Secondary index key used for per-farm, per-stage listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexKey {
    pub partition: String,
    pub sort: String,
}

/// A parsed storage key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRef {
    Profile {
        animal_id: AnimalId,
    },
    Stage {
        animal_id: AnimalId,
        stage: Stage,
        record_id: RecordId,
    },
    Medical {
        animal_id: AnimalId,
        timestamp: String,
    },
    History {
        animal_id: AnimalId,
        timestamp: String,
        record_id: RecordId,
    },
    ActiveSlot {
        animal_id: AnimalId,
        stage: Stage,
    },
}

/// Rejects identifiers that would corrupt a composite key
fn checked<'a>(label: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(SowtrackError::InvalidKey(format!("{label} cannot be empty")));
    }
    if value.contains(SEPARATOR) {
        return Err(SowtrackError::InvalidKey(format!(
            "{label} '{value}' must not contain '{SEPARATOR}'"
        )));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(SowtrackError::InvalidKey(format!(
            "{label} '{value}' must not contain whitespace or control characters"
        )));
    }
    Ok(value)
}

/// Fixed-width, lexically sortable timestamp
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SowtrackError::InvalidKey(format!("invalid timestamp '{value}': {e}")))
}

/// Partition key shared by everything stored for one animal
pub fn animal_entity(animal_id: &AnimalId) -> Result<String> {
    Ok(format!(
        "{ANIMAL_PREFIX}{SEPARATOR}{}",
        checked("animal id", animal_id.as_str())?
    ))
}

/// `(ANIMAL#{animal}, PROFILE)`
pub fn profile_key(animal_id: &AnimalId) -> Result<StorageKey> {
    Ok(StorageKey::new(animal_entity(animal_id)?, PROFILE_TYPE))
}

/// `(ANIMAL#{animal}, STAGE#{stage}#{record})`
pub fn stage_key(animal_id: &AnimalId, stage: Stage, record_id: &RecordId) -> Result<StorageKey> {
    Ok(StorageKey::new(
        animal_entity(animal_id)?,
        format!(
            "{STAGE_TYPE}{SEPARATOR}{}{SEPARATOR}{}",
            stage.as_str(),
            checked("record id", record_id.as_str())?
        ),
    ))
}

/// `(ANIMAL#{animal}, MEDICAL#{timestamp})`
pub fn medical_key(animal_id: &AnimalId, timestamp: DateTime<Utc>) -> Result<StorageKey> {
    Ok(StorageKey::new(
        animal_entity(animal_id)?,
        format!("{MEDICAL_TYPE}{SEPARATOR}{}", format_timestamp(timestamp)),
    ))
}

/// `(ANIMAL#{animal}, HISTORY#{timestamp}#{record})`
pub fn history_key(
    animal_id: &AnimalId,
    timestamp: DateTime<Utc>,
    record_id: &RecordId,
) -> Result<StorageKey> {
    Ok(StorageKey::new(
        animal_entity(animal_id)?,
        format!(
            "{HISTORY_TYPE}{SEPARATOR}{}{SEPARATOR}{}",
            format_timestamp(timestamp),
            checked("record id", record_id.as_str())?
        ),
    ))
}

/// Type prefix selecting every stage record of an animal
pub fn stage_prefix() -> String {
    format!("{STAGE_TYPE}{SEPARATOR}")
}

/// `(ANIMAL#{animal}, ACTIVE#{stage})`
pub fn active_slot_key(animal_id: &AnimalId, stage: Stage) -> Result<StorageKey> {
    Ok(StorageKey::new(
        animal_entity(animal_id)?,
        format!("{ACTIVE_TYPE}{SEPARATOR}{}", stage.as_str()),
    ))
}

/// Type prefix selecting every active slot of an animal
pub fn active_slot_prefix() -> String {
    format!("{ACTIVE_TYPE}{SEPARATOR}")
}

/// Type prefix selecting medical events
pub fn medical_prefix() -> String {
    format!("{MEDICAL_TYPE}{SEPARATOR}")
}

/// Type prefix selecting stage history entries
pub fn history_prefix() -> String {
    format!("{HISTORY_TYPE}{SEPARATOR}")
}

/// Index partition holding the active records of a farm and stage
pub fn active_partition(farm_id: &FarmId, stage: Stage) -> Result<String> {
    Ok(format!(
        "{FARM_PREFIX}{SEPARATOR}{}{SEPARATOR}{STAGE_TYPE}{SEPARATOR}{}{SEPARATOR}ACTIVE",
        checked("farm id", farm_id.as_str())?,
        stage.as_str()
    ))
}

/// Index partition holding the records of a farm and stage closed in one month
pub fn history_partition(farm_id: &FarmId, stage: Stage, year: i32, month: u32) -> Result<String> {
    if !(1..=12).contains(&month) {
        return Err(SowtrackError::Validation(format!(
            "month must be between 1 and 12, got {month}"
        )));
    }
    Ok(format!(
        "{FARM_PREFIX}{SEPARATOR}{}{SEPARATOR}{STAGE_TYPE}{SEPARATOR}{}{SEPARATOR}HISTORY{SEPARATOR}{year:04}-{month:02}",
        checked("farm id", farm_id.as_str())?,
        stage.as_str()
    ))
}

/// Index key for a stage record in its current state
///
/// Active records sort by entry time, completed ones by exit time. The animal and
/// record ids make the sort key unique within a partition.
pub fn record_index_key(record: &StageRecord) -> Result<IndexKey> {
    let animal = checked("animal id", record.animal_id.as_str())?;
    let record_id = checked("record id", record.record_id.as_str())?;
    match record.exit_date {
        None => Ok(IndexKey {
            partition: active_partition(&record.farm_id, record.stage)?,
            sort: format!(
                "{}{SEPARATOR}{animal}{SEPARATOR}{record_id}",
                format_timestamp(record.entry_date)
            ),
        }),
        Some(exit) => Ok(IndexKey {
            partition: history_partition(&record.farm_id, record.stage, exit.year(), exit.month())?,
            sort: format!(
                "{}{SEPARATOR}{animal}{SEPARATOR}{record_id}",
                format_timestamp(exit)
            ),
        }),
    }
}

/// Parses a storage key back into a typed reference
///
/// # Errors
///
/// Returns `InvalidKey` for keys this codec could not have produced
pub fn parse_key(key: &StorageKey) -> Result<KeyRef> {
    let invalid = || SowtrackError::InvalidKey(format!("unrecognized key {key}"));

    let animal = key
        .entity
        .strip_prefix(ANIMAL_PREFIX)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .ok_or_else(invalid)?;
    let animal_id = AnimalId::new(checked("animal id", animal)?)
        .map_err(SowtrackError::InvalidKey)?;

    if key.item_type == PROFILE_TYPE {
        return Ok(KeyRef::Profile { animal_id });
    }

    let mut parts = key.item_type.splitn(2, SEPARATOR);
    let kind = parts.next().ok_or_else(invalid)?;
    let rest = parts.next().ok_or_else(invalid)?;

    match kind {
        STAGE_TYPE => {
            let (stage, record) = rest.split_once(SEPARATOR).ok_or_else(invalid)?;
            let stage: Stage = stage.parse().map_err(SowtrackError::InvalidKey)?;
            let record_id = RecordId::new(checked("record id", record)?)
                .map_err(SowtrackError::InvalidKey)?;
            Ok(KeyRef::Stage {
                animal_id,
                stage,
                record_id,
            })
        }
        MEDICAL_TYPE => {
            parse_timestamp(rest)?;
            Ok(KeyRef::Medical {
                animal_id,
                timestamp: rest.to_string(),
            })
        }
        HISTORY_TYPE => {
            let (timestamp, record) = rest.split_once(SEPARATOR).ok_or_else(invalid)?;
            parse_timestamp(timestamp)?;
            let record_id = RecordId::new(checked("record id", record)?)
                .map_err(SowtrackError::InvalidKey)?;
            Ok(KeyRef::History {
                animal_id,
                timestamp: timestamp.to_string(),
                record_id,
            })
        }
        ACTIVE_TYPE => {
            let stage: Stage = rest.parse().map_err(SowtrackError::InvalidKey)?;
            Ok(KeyRef::ActiveSlot { animal_id, stage })
        }
        _ => Err(invalid()),
    }
}
