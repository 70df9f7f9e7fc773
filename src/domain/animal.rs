//! Animal profile and append-only history models

use super::ids::{AnimalId, FarmId, RecordId};
use super::stage::Stage;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identity and static attributes of one animal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalProfile {
    pub animal_id: AnimalId,
    pub farm_id: FarmId,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// Sire (father) animal id
    #[serde(default)]
    pub sire_id: Option<AnimalId>,
    /// Dam (mother) animal id
    #[serde(default)]
    pub dam_id: Option<AnimalId>,
    pub registered_at: DateTime<Utc>,
}

/// A single medical event (vaccination, treatment, inspection)
///
/// Immutable once written; ordered by `recorded_at`, which is embedded in its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalEvent {
    pub animal_id: AnimalId,
    pub recorded_at: DateTime<Utc>,
    pub event_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub medication: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub veterinarian: Option<String>,
}

/// Append-only audit entry describing one stage move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageHistoryEntry {
    pub animal_id: AnimalId,
    pub farm_id: FarmId,
    pub occurred_at: DateTime<Utc>,
    /// Stage left; `None` for intake
    #[serde(default)]
    pub from_stage: Option<Stage>,
    pub to_stage: Stage,
    #[serde(default)]
    pub source_record_id: Option<RecordId>,
    pub record_id: RecordId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_wire_shape() {
        let profile = AnimalProfile {
            animal_id: AnimalId::new("P1").unwrap(),
            farm_id: FarmId::new("F1").unwrap(),
            breed: Some("Landrace".to_string()),
            birth_date: NaiveDate::from_ymd_opt(2023, 4, 2),
            sire_id: None,
            dam_id: Some(AnimalId::new("S9").unwrap()),
            registered_at: Utc::now(),
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["animalId"], "P1");
        assert_eq!(value["birthDate"], "2023-04-02");
        assert_eq!(value["damId"], "S9");
    }

    #[test]
    fn test_history_entry_for_intake_has_no_source() {
        let json = serde_json::json!({
            "animalId": "P1",
            "farmId": "F1",
            "occurredAt": "2024-01-05T08:00:00Z",
            "toStage": "breeding",
            "recordId": "B1"
        });
        let entry: StageHistoryEntry = serde_json::from_value(json).unwrap();
        assert!(entry.from_stage.is_none());
        assert!(entry.source_record_id.is_none());
        assert_eq!(entry.to_stage, Stage::Breeding);
    }
}
