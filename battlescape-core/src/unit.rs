//! Units and their stat blocks

use crate::item::Inventory;
use crate::position::Position;
use crate::ruleset::{MovementType, UnitType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unit handle (index into the battlefield's unit arena)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Control group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Hostile,
    Neutral,
}

impl Faction {
    pub fn is_enemy_of(self, other: Faction) -> bool {
        match (self, other) {
            (Faction::Player, Faction::Hostile) | (Faction::Hostile, Faction::Player) => true,
            (Faction::Hostile, Faction::Neutral) | (Faction::Neutral, Faction::Hostile) => true,
            _ => false,
        }
    }
}

/// Body status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    Standing,
    Kneeling,
    Prone,
    Falling,
    Unconscious,
    Dead,
}

/// Morale breakdown state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanicState {
    #[default]
    Calm,
    Panicking,
    Berserk,
}

/// Base statistics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub time_units: i32,
    pub stamina: i32,
    pub health: i32,
    pub bravery: i32,
    pub reactions: i32,
    pub firing: i32,
    pub throwing: i32,
    pub strength: i32,
    pub melee: i32,
    pub psi_strength: i32,
    pub psi_skill: i32,
}

/// Maximum morale
pub const MAX_MORALE: i32 = 100;

/// A combatant on the battlefield
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub type_id: String,
    pub faction: Faction,
    pub original_faction: Faction,
    pub size: u8,
    pub position: Position,
    pub facing: u8,
    pub status: UnitStatus,
    pub movement: MovementType,
    pub base: UnitStats,
    pub time_units: i32,
    pub health: i32,
    pub energy: i32,
    pub morale: i32,
    pub stun: i32,
    pub panic: PanicState,
    /// Shots fired in auto mode this turn
    pub auto_shots_fired: u32,
    pub kills: u32,
    pub standing_height: i32,
    pub kneeling_height: i32,
    pub inventory: Inventory,
    pub visible_tiles: BTreeSet<Position>,
    pub visible_units: Vec<UnitId>,
}

impl Unit {
    /// Create a unit from its ruleset type
    pub fn from_type(
        id: UnitId,
        name: &str,
        unit_type: &UnitType,
        faction: Faction,
        position: Position,
        facing: u8,
    ) -> Self {
        let stats = unit_type.stats;
        Self {
            id,
            name: name.to_string(),
            type_id: unit_type.id.clone(),
            faction,
            original_faction: faction,
            size: unit_type.size.clamp(1, 2),
            position,
            facing: facing % 8,
            status: UnitStatus::Standing,
            movement: unit_type.movement,
            base: stats,
            time_units: stats.time_units,
            health: stats.health,
            energy: stats.stamina,
            morale: MAX_MORALE,
            stun: 0,
            panic: PanicState::Calm,
            auto_shots_fired: 0,
            kills: 0,
            standing_height: unit_type.standing_height,
            kneeling_height: unit_type.kneeling_height,
            inventory: Inventory::default(),
            visible_tiles: BTreeSet::new(),
            visible_units: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status != UnitStatus::Dead
    }

    /// Alive and awake
    pub fn is_active(&self) -> bool {
        !matches!(self.status, UnitStatus::Dead | UnitStatus::Unconscious)
    }

    /// Whether this unit physically blocks its tiles
    pub fn occupies_tiles(&self) -> bool {
        self.is_active()
    }

    /// Tiles covered by the unit's footprint when anchored at `pos`
    pub fn footprint_at(&self, pos: Position) -> Vec<Position> {
        footprint(pos, self.size)
    }

    pub fn footprint(&self) -> Vec<Position> {
        footprint(self.position, self.size)
    }

    /// Current body height in voxels
    pub fn height(&self) -> i32 {
        match self.status {
            UnitStatus::Kneeling => self.kneeling_height,
            UnitStatus::Prone => 4,
            UnitStatus::Unconscious | UnitStatus::Dead => 0,
            _ => self.standing_height,
        }
    }

    /// Eye level in voxels above the floor
    pub fn eye_height(&self) -> i32 {
        (self.height() - 2).max(1)
    }

    pub fn spend_time_units(&mut self, tu: u32) -> bool {
        spend(&mut self.time_units, tu)
    }

    pub fn spend_energy(&mut self, energy: u32) -> bool {
        spend(&mut self.energy, energy)
    }

    /// Restore pools at the start of this unit's faction turn
    pub fn prepare_new_turn(&mut self) {
        self.auto_shots_fired = 0;
        if !self.is_active() {
            return;
        }
        self.energy = (self.energy + self.base.stamina / 3).min(self.base.stamina);
        self.time_units = match self.panic {
            PanicState::Calm => self.base.time_units,
            // Broken units spend the turn recovering
            _ => 0,
        };
        self.panic = PanicState::Calm;
    }

    pub fn change_morale(&mut self, delta: i32) {
        self.morale = (self.morale + delta).clamp(0, MAX_MORALE);
    }

    pub fn can_see_tile(&self, pos: Position) -> bool {
        self.visible_tiles.contains(&pos)
    }
}

/// Deduct `amount` from a pool if it covers it; amounts past `i32::MAX` never fit
fn spend(pool: &mut i32, amount: u32) -> bool {
    match i32::try_from(amount) {
        Ok(amount) if *pool >= amount => {
            *pool -= amount;
            true
        }
        _ => false,
    }
}

/// Footprint of a unit of `size` anchored at its north-west tile
pub fn footprint(pos: Position, size: u8) -> Vec<Position> {
    let size = size.max(1) as i32;
    let mut tiles = Vec::with_capacity((size * size) as usize);
    for dy in 0..size {
        for dx in 0..size {
            tiles.push(pos.offset(dx, dy, 0));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::RuleSet;

    fn soldier() -> Unit {
        let rules = RuleSet::standard();
        Unit::from_type(
            UnitId(0),
            "Rookie",
            rules.unit_type("soldier").unwrap(),
            Faction::Player,
            Position::new(2, 2, 0),
            2,
        )
    }

    #[test]
    fn test_unit_creation() {
        let unit = soldier();
        assert_eq!(unit.time_units, 60);
        assert_eq!(unit.morale, MAX_MORALE);
        assert!(unit.is_active());
        assert_eq!(unit.footprint(), vec![Position::new(2, 2, 0)]);
    }

    #[test]
    fn test_large_footprint() {
        let tiles = footprint(Position::new(4, 4, 1), 2);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&Position::new(5, 5, 1)));
    }

    #[test]
    fn test_spend_time_units() {
        let mut unit = soldier();
        assert!(unit.spend_time_units(20));
        assert_eq!(unit.time_units, 40);
        assert!(!unit.spend_time_units(41));
        assert_eq!(unit.time_units, 40);
        // Huge costs are refused instead of wrapping into a refund
        assert!(!unit.spend_time_units(u32::MAX));
        assert!(!unit.spend_energy(u32::MAX));
        assert_eq!(unit.time_units, 40);
    }

    #[test]
    fn test_panicked_unit_gets_no_time_units() {
        let mut unit = soldier();
        unit.time_units = 5;
        unit.panic = PanicState::Panicking;
        unit.prepare_new_turn();
        assert_eq!(unit.time_units, 0);
        assert_eq!(unit.panic, PanicState::Calm);
        unit.prepare_new_turn();
        assert_eq!(unit.time_units, 60);
    }

    #[test]
    fn test_factions() {
        assert!(Faction::Player.is_enemy_of(Faction::Hostile));
        assert!(!Faction::Player.is_enemy_of(Faction::Neutral));
        assert!(Faction::Neutral.is_enemy_of(Faction::Hostile));
    }
}
