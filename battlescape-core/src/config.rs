//! Battle configuration

use crate::unit::Faction;
use serde::{Deserialize, Serialize};

/// Tunables for one battle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Seed for the battle RNG
    pub seed: u64,
    /// Faction that acts first each turn
    pub first_faction: Faction,
    /// Global darkness, 0 (day) to 15 (night)
    pub shade: u8,
    /// Turn after which the hostile AI may see everything
    pub ai_cheat_turn: u32,
    /// Vision range in tiles
    pub max_view_distance: i32,
    /// Vision range in tiles for dark tiles
    pub dark_view_distance: i32,
    /// Scatter resamples before a throw gives up
    pub throw_retry_limit: u32,
    /// Highest arc curvature tried for throws
    pub max_arc_curvature: f64,
    /// Morale below which units may panic
    pub panic_threshold: i32,
    /// Fire damage to occupants (min, max)
    pub fire_damage: (i32, i32),
    /// Stop a move when a new enemy comes into view
    pub interrupt_on_spot: bool,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            first_faction: Faction::Player,
            shade: 0,
            ai_cheat_turn: 20,
            max_view_distance: 20,
            dark_view_distance: 9,
            throw_retry_limit: 64,
            max_arc_curvature: 5.0,
            panic_threshold: 50,
            fire_damage: (5, 10),
            interrupt_on_spot: true,
        }
    }
}

impl BattleConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shade(mut self, shade: u8) -> Self {
        self.shade = shade.min(15);
        self
    }

    pub fn with_first_faction(mut self, faction: Faction) -> Self {
        self.first_faction = faction;
        self
    }

    pub fn with_ai_cheat_turn(mut self, turn: u32) -> Self {
        self.ai_cheat_turn = turn;
        self
    }

    pub fn with_throw_retry_limit(mut self, limit: u32) -> Self {
        self.throw_retry_limit = limit;
        self
    }
}
