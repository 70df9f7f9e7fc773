//! Read-only lookups by animal
//!
//! A blank identifier is a malformed request (`MissingIdentifier`); an animal with
//! no data of the requested kind is `NotFound`.

use crate::adapters::database::{Item, ItemStore};
use crate::core::keys;
use crate::domain::{
    AnimalId, AnimalProfile, MedicalEvent, Result, SowtrackError, StageHistoryEntry,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Profile, medical history and stage history reads
#[derive(Clone)]
pub struct LookupGateway {
    store: Arc<dyn ItemStore + Send + Sync>,
}

impl LookupGateway {
    pub fn new(store: Arc<dyn ItemStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// The animal's profile
    pub async fn get_profile(&self, animal_id: &str) -> Result<AnimalProfile> {
        let animal_id = require_animal_id(animal_id)?;
        let item = self
            .store
            .get_item(&keys::profile_key(&animal_id)?)
            .await?
            .ok_or_else(|| SowtrackError::NotFound(format!("profile for animal {animal_id}")))?;
        Ok(item.decode()?)
    }

    /// Every medical event of the animal, oldest first
    pub async fn get_medical_history(&self, animal_id: &str) -> Result<Vec<MedicalEvent>> {
        let animal_id = require_animal_id(animal_id)?;
        self.read_all(&animal_id, &keys::medical_prefix(), "medical history")
            .await
    }

    /// Every stage move of the animal, oldest first
    pub async fn get_stage_history(&self, animal_id: &str) -> Result<Vec<StageHistoryEntry>> {
        let animal_id = require_animal_id(animal_id)?;
        self.read_all(&animal_id, &keys::history_prefix(), "stage history")
            .await
    }

    async fn read_all<T: DeserializeOwned>(
        &self,
        animal_id: &AnimalId,
        prefix: &str,
        what: &str,
    ) -> Result<Vec<T>> {
        let entity = keys::animal_entity(animal_id)?;
        let items = self.store.query_prefix(&entity, prefix).await?;
        if items.is_empty() {
            return Err(SowtrackError::NotFound(format!(
                "{what} for animal {animal_id}"
            )));
        }
        Ok(items
            .iter()
            .map(Item::decode::<T>)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn require_animal_id(raw: &str) -> Result<AnimalId> {
    AnimalId::new(raw.trim())
        .map_err(|_| SowtrackError::MissingIdentifier("animalId is required".to_string()))
}
