//! Domain models and types for Sowtrack.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`AnimalId`], [`FarmId`], [`RecordId`])
//! - **The production pipeline** ([`Stage`] and its adjacency table)
//! - **Domain models** ([`StageRecord`], [`AnimalProfile`], [`MedicalEvent`], [`StageHistoryEntry`])
//! - **Error types** ([`SowtrackError`], [`StoreError`], [`ErrorKind`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers are newtypes so an animal id can never be passed where a record id is expected:
//!
//! ```rust
//! use sowtrack::domain::{AnimalId, RecordId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let animal = AnimalId::new("P1")?;
//! let record = RecordId::new("B1")?;
//!
//! // This won't compile
//! // let wrong: AnimalId = record;
//! # Ok(())
//! # }
//! ```
//!
//! # Stage transitions
//!
//! ```rust
//! use sowtrack::domain::Stage;
//!
//! assert!(Stage::Breeding.can_transition_to(Stage::Gestation));
//! assert!(!Stage::Breeding.can_transition_to(Stage::Fattening));
//! ```

pub mod animal;
pub mod errors;
pub mod ids;
pub mod record;
pub mod result;
pub mod stage;

// Re-export commonly used types for convenience
pub use animal::{AnimalProfile, MedicalEvent, StageHistoryEntry};
pub use errors::{ErrorKind, SowtrackError, StoreError};
pub use ids::{AnimalId, FarmId, RecordId};
pub use record::{RecordStatus, StageFields, StageRecord, StageRecordBuilder, StageRecordPatch};
pub use result::Result;
pub use stage::{Stage, LEGAL_TRANSITIONS};
