//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that address animals, farms and stage records.
//! Construction only rejects blank values; characters that would break the composite
//! storage keys are rejected by the key codec ([`crate::core::keys`]) with `InvalidKey`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", $label, ", rejecting blank values")]
            pub fn new(id: impl Into<String>) -> Result<Self, String> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(format!("{} cannot be empty", $label));
                }
                Ok(Self(id))
            }

            /// Returns the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Animal identifier (ear tag or registry number)
    ///
    /// # Examples
    ///
    /// ```
    /// use sowtrack::domain::ids::AnimalId;
    ///
    /// let id = AnimalId::new("P-0042").unwrap();
    /// assert_eq!(id.as_str(), "P-0042");
    /// ```
    AnimalId,
    "Animal ID"
);

string_id!(
    /// Farm identifier
    FarmId,
    "Farm ID"
);

string_id!(
    /// Stage record identifier, unique within its stage
    RecordId,
    "Record ID"
);

/// Namespace for deterministic destination record ids
const DESTINATION_NAMESPACE: Uuid = Uuid::from_u128(0x5f0e_7a1c_4d3b_4c8e_9a21_6b7d_0e3f_a512);

impl RecordId {
    /// Generates a fresh random record id for an initial (intake) record
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Derives the id of the record a transition creates
    ///
    /// The same source and target always yield the same id, which makes the
    /// destination write naturally idempotent under replays.
    pub fn derived_from(source: &RecordId, target_stage_segment: &str) -> Self {
        let name = format!("{}>{}", source.as_str(), target_stage_segment);
        Self(Uuid::new_v5(&DESTINATION_NAMESPACE, name.as_bytes()).to_string())
    }
}
