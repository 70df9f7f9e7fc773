//! Production stages and the legal transition table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One phase of the fixed production pipeline
///
/// The wire/key spelling is camelCase (`inHouse`), matching the stage path segment
/// used by the query endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Breeding,
    Gestation,
    Farrowing,
    Nursery,
    Fattening,
    Dried,
    InHouse,
}

/// Directed edges of the pipeline
///
/// Anything not listed here is rejected with `IllegalTransition`. Fattening has two
/// successors; choosing between them is left to the caller.
pub const LEGAL_TRANSITIONS: &[(Stage, Stage)] = &[
    (Stage::Breeding, Stage::Gestation),
    (Stage::Gestation, Stage::Farrowing),
    (Stage::Farrowing, Stage::Nursery),
    (Stage::Nursery, Stage::Fattening),
    (Stage::Fattening, Stage::Dried),
    (Stage::Fattening, Stage::InHouse),
    (Stage::Dried, Stage::InHouse),
];

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 7] = [
        Stage::Breeding,
        Stage::Gestation,
        Stage::Farrowing,
        Stage::Nursery,
        Stage::Fattening,
        Stage::Dried,
        Stage::InHouse,
    ];

    /// Key/path segment for this stage
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Breeding => "breeding",
            Stage::Gestation => "gestation",
            Stage::Farrowing => "farrowing",
            Stage::Nursery => "nursery",
            Stage::Fattening => "fattening",
            Stage::Dried => "dried",
            Stage::InHouse => "inHouse",
        }
    }

    /// Whether `self → target` is an edge of the pipeline
    pub fn can_transition_to(self, target: Stage) -> bool {
        LEGAL_TRANSITIONS
            .iter()
            .any(|&(from, to)| from == self && to == target)
    }

    /// Stages reachable in one step
    pub fn successors(self) -> impl Iterator<Item = Stage> {
        LEGAL_TRANSITIONS
            .iter()
            .filter(move |(from, _)| *from == self)
            .map(|&(_, to)| to)
    }

    /// Stages that can hand an animal over to this one
    pub fn predecessors(self) -> impl Iterator<Item = Stage> {
        LEGAL_TRANSITIONS
            .iter()
            .filter(move |(_, to)| *to == self)
            .map(|&(from, _)| from)
    }

    /// Terminal within this subsystem
    pub fn is_terminal(self) -> bool {
        self.successors().next().is_none()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "breeding" => Ok(Stage::Breeding),
            "gestation" => Ok(Stage::Gestation),
            "farrowing" => Ok(Stage::Farrowing),
            "nursery" => Ok(Stage::Nursery),
            "fattening" => Ok(Stage::Fattening),
            "dried" => Ok(Stage::Dried),
            "inhouse" => Ok(Stage::InHouse),
            _ => Err(format!(
                "Unknown stage '{s}'. Must be one of: {}",
                Stage::ALL.map(Stage::as_str).join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Stage::Breeding, Stage::Gestation, true ; "breeding to gestation")]
    #[test_case(Stage::Gestation, Stage::Farrowing, true ; "gestation to farrowing")]
    #[test_case(Stage::Fattening, Stage::Dried, true ; "fattening to dried")]
    #[test_case(Stage::Fattening, Stage::InHouse, true ; "fattening to in house")]
    #[test_case(Stage::Dried, Stage::InHouse, true ; "dried to in house")]
    #[test_case(Stage::Breeding, Stage::Fattening, false ; "skipping stages")]
    #[test_case(Stage::Gestation, Stage::Breeding, false ; "going backwards")]
    #[test_case(Stage::InHouse, Stage::Breeding, false ; "leaving terminal")]
    #[test_case(Stage::Nursery, Stage::Nursery, false ; "self loop")]
    fn test_can_transition_to(from: Stage, to: Stage, expected: bool) {
        assert_eq!(from.can_transition_to(to), expected);
    }

    #[test]
    fn test_in_house_is_terminal() {
        assert!(Stage::InHouse.is_terminal());
        assert!(!Stage::Dried.is_terminal());
    }

    #[test]
    fn test_fattening_has_two_successors() {
        let next: Vec<_> = Stage::Fattening.successors().collect();
        assert_eq!(next, vec![Stage::Dried, Stage::InHouse]);
    }

    #[test]
    fn test_in_house_predecessors() {
        let prev: Vec<_> = Stage::InHouse.predecessors().collect();
        assert_eq!(prev, vec![Stage::Fattening, Stage::Dried]);
        assert_eq!(Stage::Breeding.predecessors().count(), 0);
    }

    #[test]
    fn test_parse_accepts_path_spellings() {
        assert_eq!("inHouse".parse::<Stage>().unwrap(), Stage::InHouse);
        assert_eq!("in-house".parse::<Stage>().unwrap(), Stage::InHouse);
        assert_eq!("Gestation".parse::<Stage>().unwrap(), Stage::Gestation);
        assert!("weaning".parse::<Stage>().is_err());
    }

    #[test]
    fn test_serde_uses_segment_spelling() {
        assert_eq!(
            serde_json::to_string(&Stage::InHouse).unwrap(),
            "\"inHouse\""
        );
        for stage in Stage::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
    }
}
