//! Error taxonomy
//!
//! `BattleError` covers every way an action or query can be refused.
//! Game-condition failures leave the battlefield untouched; `Integrity`
//! failures mean the loaded data is broken and the operation is aborted.

use crate::item::{ItemId, PlacementError};
use crate::position::Position;
use crate::tile::PartRef;
use crate::unit::UnitId;

/// Why a target cannot be acted upon
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    Dead,
    Unconscious,
    AlreadyPrimed,
    NotPrimable,
    NoWeapon,
    NoAmmo,
    IncompatibleAmmo,
    NotAdjacent,
    OutOfRange,
    SameFaction,
    MissingTarget,
    WrongItem,
    Panicking,
}

/// Why a placement was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementReason {
    Occupied(UnitId),
    DiagonalWall,
    Inventory(PlacementError),
}

/// Broken data: fatal for the current operation
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("map part {0:?} is not defined in the ruleset")]
    MissingMapPart(PartRef),
    #[error("map part '{0}' is not defined in the ruleset")]
    MissingPartName(String),
    #[error("item type '{0}' is not defined in the ruleset")]
    MissingItemRules(String),
    #[error("unit type '{0}' is not defined in the ruleset")]
    MissingUnitType(String),
    #[error("unit {0:?} does not exist")]
    MissingUnit(UnitId),
    #[error("item {0:?} does not exist")]
    MissingItem(ItemId),
    #[error("tile array holds {found} tiles, expected {expected}")]
    TileCount { expected: usize, found: usize },
    #[error("tile at index {index} reports position {found:?}")]
    TileIndex { index: usize, found: Position },
    #[error("parts at {0:?} never come to rest")]
    UnsettledTile(Position),
    #[error("save data is corrupt: {0}")]
    CorruptSave(String),
}

/// Every failure the engine reports
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BattleError {
    #[error("no path to {destination:?}")]
    PathUnavailable { destination: Position },
    #[error("not enough time units: need {required}, have {available}")]
    InsufficientTimeUnits { required: u32, available: u32 },
    #[error("not enough energy: need {required}, have {available}")]
    InsufficientEnergy { required: u32, available: u32 },
    #[error("no line of fire")]
    NoLineOfFire,
    #[error("{0:?} is outside the battlefield")]
    OutOfBounds(Position),
    #[error("invalid target state: {0:?}")]
    InvalidTargetState(TargetState),
    #[error("illegal placement: {0:?}")]
    IllegalPlacement(PlacementReason),
    #[error("no valid arc")]
    NoValidArc,
    #[error("unit {0:?} cannot act in this phase")]
    NotActorsTurn(UnitId),
    #[error("another action is still resolving")]
    ActionInProgress,
    #[error("the battle is over")]
    BattleConcluded,
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

impl BattleError {
    /// Short result code for the presentation layer
    pub fn code(&self) -> &'static str {
        match self {
            BattleError::PathUnavailable { .. } => "path_unavailable",
            BattleError::InsufficientTimeUnits { .. } => "not_enough_time_units",
            BattleError::InsufficientEnergy { .. } => "not_enough_energy",
            BattleError::NoLineOfFire => "no_line_of_fire",
            BattleError::OutOfBounds(_) => "out_of_bounds",
            BattleError::InvalidTargetState(_) => "invalid_target",
            BattleError::IllegalPlacement(_) => "illegal_placement",
            BattleError::NoValidArc => "no_valid_arc",
            BattleError::NotActorsTurn(_) => "not_your_turn",
            BattleError::ActionInProgress => "action_in_progress",
            BattleError::BattleConcluded => "battle_concluded",
            BattleError::Integrity(_) => "integrity_failure",
        }
    }

    /// Whether this error indicates broken data rather than a game condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, BattleError::Integrity(_))
    }
}

impl From<PlacementError> for BattleError {
    fn from(err: PlacementError) -> Self {
        BattleError::IllegalPlacement(PlacementReason::Inventory(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = BattleError::InsufficientTimeUnits { required: 40, available: 28 };
        assert_eq!(err.code(), "not_enough_time_units");
        assert!(!err.is_fatal());

        let fatal: BattleError = IntegrityError::MissingItemRules("x".into()).into();
        assert_eq!(fatal.code(), "integrity_failure");
        assert!(fatal.is_fatal());
    }
}
