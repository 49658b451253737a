//! Battlescape Core - Tactical combat engine
//!
//! This crate provides the simulation behind a turn-based squad battle:
//! - Battlefield state (tiles, units, items) with arena indices
//! - Static rulesets for map parts, items and unit types
//! - Time-unit pathfinding over the tile graph
//! - Voxel ray and arc tracing with accuracy-driven deviation
//! - Explosions, fire and smoke
//! - Turn phases, morale and visibility bookkeeping
//! - A table-driven action dispatcher on an explicit battle context
//! - Save/restore and declarative scenarios

pub mod position;
pub mod tile;
pub mod ruleset;
pub mod unit;
pub mod item;
pub mod error;
pub mod config;
pub mod battlefield;
pub mod pathfinding;
pub mod voxel;
pub mod ballistics;
pub mod explosion;
pub mod visibility;
pub mod turn;
pub mod event;
pub mod action;
pub mod battle;
pub mod save;
pub mod scenario;

// Re-exports for convenient access
pub use position::{Position, Voxel, DIRECTIONS};
pub use tile::{PartRef, Section, Tile, TilePart};
pub use ruleset::{DamageType, ItemKind, MovementType, RuleSet};
pub use unit::{Faction, Unit, UnitId, UnitStatus};
pub use item::{Item, ItemId, ItemLocation, SlotId};
pub use error::{BattleError, IntegrityError, TargetState};
pub use config::BattleConfig;
pub use battlefield::{Battlefield, MissionInfo};
pub use pathfinding::{Path, PathRequest, Pathfinder};
pub use ballistics::{Ballistics, ShotParams, ThrowParams};
pub use turn::{BattleOutcome, Phase};
pub use event::BattleEvent;
pub use action::{ActionResult, ActionTarget, BattleAction, BattleActionType};
pub use battle::{Advance, Battle};
pub use save::{restore_battle, save_battle, BattleSave};
pub use scenario::Scenario;
