//! Declarative battle setup
//!
//! A scenario names a map size, a floor, individual terrain parts, units
//! with their loadouts and loose items. Parts are referenced by dataset and
//! name so scenario files survive ruleset reordering.

use crate::battle::Battle;
use crate::battlefield::{Battlefield, MissionInfo};
use crate::config::BattleConfig;
use crate::error::{BattleError, IntegrityError, PlacementReason};
use crate::item::{ItemLocation, PlacementError, SlotId};
use crate::position::Position;
use crate::ruleset::RuleSet;
use crate::tile::{PartRef, TilePart};
use crate::unit::{Faction, Unit, UnitId};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_DATASET: &str = "common";

/// Slots tried for items that do not name one
const STOWAGE: [SlotId; 6] = [
    SlotId::Belt,
    SlotId::Backpack,
    SlotId::RightShoulder,
    SlotId::LeftShoulder,
    SlotId::RightLeg,
    SlotId::LeftLeg,
];

fn default_dataset() -> String {
    DEFAULT_DATASET.to_string()
}

/// One map part placed on a tile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainSpec {
    pub pos: Position,
    pub slot: TilePart,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    pub part: String,
}

/// An item a unit starts with
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadoutSpec {
    pub item: String,
    /// First free stowage slot when absent
    #[serde(default)]
    pub slot: Option<SlotId>,
    /// Clip loaded into the item
    #[serde(default)]
    pub ammo: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub unit_type: String,
    pub faction: Faction,
    pub pos: Position,
    #[serde(default)]
    pub facing: u8,
    #[serde(default)]
    pub loadout: Vec<LoadoutSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundItemSpec {
    pub item: String,
    pub pos: Position,
}

/// Complete battle setup
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub width: i32,
    pub length: i32,
    pub height: i32,
    /// Part laid on every ground-level tile
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub terrain: Vec<TerrainSpec>,
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub ground_items: Vec<GroundItemSpec>,
    #[serde(default)]
    pub config: BattleConfig,
}

impl Scenario {
    pub fn new(name: &str, width: i32, length: i32, height: i32) -> Self {
        Self {
            name: name.to_string(),
            width,
            length,
            height,
            floor: None,
            terrain: Vec::new(),
            units: Vec::new(),
            ground_items: Vec::new(),
            config: BattleConfig::default(),
        }
    }

    pub fn with_floor(mut self, part: &str) -> Self {
        self.floor = Some(part.to_string());
        self
    }

    pub fn with_part(mut self, pos: Position, slot: TilePart, part: &str) -> Self {
        self.terrain.push(TerrainSpec {
            pos,
            slot,
            dataset: default_dataset(),
            part: part.to_string(),
        });
        self
    }

    pub fn with_unit(
        mut self,
        name: &str,
        unit_type: &str,
        faction: Faction,
        pos: Position,
        facing: u8,
    ) -> Self {
        self.units.push(UnitSpec {
            name: name.to_string(),
            unit_type: unit_type.to_string(),
            faction,
            pos,
            facing,
            loadout: Vec::new(),
        });
        self
    }

    /// Give the most recently added unit an item
    pub fn with_loadout(mut self, item: &str, slot: Option<SlotId>, ammo: Option<&str>) -> Self {
        if let Some(unit) = self.units.last_mut() {
            unit.loadout.push(LoadoutSpec {
                item: item.to_string(),
                slot,
                ammo: ammo.map(str::to_string),
            });
        }
        self
    }

    pub fn with_ground_item(mut self, item: &str, pos: Position) -> Self {
        self.ground_items.push(GroundItemSpec { item: item.to_string(), pos });
        self
    }

    pub fn with_config(mut self, config: BattleConfig) -> Self {
        self.config = config;
        self
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let scenario: Scenario =
            serde_json::from_str(&content).context("Failed to parse scenario")?;
        Ok(scenario)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize scenario")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write scenario {}", path.display()))?;
        Ok(())
    }

    fn resolve_part(rules: &RuleSet, dataset: &str, name: &str) -> Result<PartRef, IntegrityError> {
        rules
            .find_part(dataset, name)
            .ok_or_else(|| IntegrityError::MissingPartName(format!("{}/{}", dataset, name)))
    }

    /// Lay out the battlefield described by this scenario
    pub fn build_field(&self, rules: &RuleSet) -> Result<Battlefield, BattleError> {
        let mut field = Battlefield::new(self.width, self.length, self.height);
        if let Some(floor) = &self.floor {
            let part = Self::resolve_part(rules, DEFAULT_DATASET, floor)?;
            for y in 0..self.length {
                for x in 0..self.width {
                    field.set_part(Position::new(x, y, 0), TilePart::Floor, Some(part))?;
                }
            }
        }
        for spec in &self.terrain {
            let part = Self::resolve_part(rules, &spec.dataset, &spec.part)?;
            field.set_part(spec.pos, spec.slot, Some(part))?;
        }

        let mut objectives = 0;
        for tile in field.tiles() {
            for (_, part) in tile.parts() {
                if rules.part(part)?.objective {
                    objectives += 1;
                }
            }
        }
        field.mission = MissionInfo {
            name: self.name.clone(),
            objectives_total: objectives,
            objectives_destroyed: 0,
        };

        for spec in &self.units {
            let unit_type = rules.unit_type(&spec.unit_type)?;
            let unit = Unit::from_type(
                UnitId(0),
                &spec.name,
                unit_type,
                spec.faction,
                spec.pos,
                spec.facing,
            );
            let id = field.add_unit(unit)?;
            for gear in &spec.loadout {
                Self::equip(&mut field, rules, id, gear)?;
            }
        }
        for spec in &self.ground_items {
            field.add_item(&spec.item, ItemLocation::Ground(spec.pos), rules)?;
        }
        field.validate(rules)?;
        Ok(field)
    }

    fn equip(
        field: &mut Battlefield,
        rules: &RuleSet,
        unit: UnitId,
        gear: &LoadoutSpec,
    ) -> Result<(), BattleError> {
        let size = rules.item(&gear.item)?.size;
        let slots = match gear.slot {
            Some(slot) => vec![slot],
            None => STOWAGE.to_vec(),
        };
        let (slot, x, y) = field
            .unit(unit)?
            .inventory
            .first_fit(&slots, size)
            .ok_or(BattleError::IllegalPlacement(PlacementReason::Inventory(
                PlacementError::SlotFull,
            )))?;
        let item = field.add_item(&gear.item, ItemLocation::Carried { unit, slot, x, y }, rules)?;
        if let Some(ammo) = &gear.ammo {
            let clip = field.add_item(ammo, ItemLocation::Loaded { weapon: item }, rules)?;
            tracing::trace!("Loaded {:?} into {:?}", clip, item);
        }
        Ok(())
    }

    /// Build the field and start the battle
    pub fn start(&self, rules: Arc<RuleSet>) -> Result<Battle, BattleError> {
        let field = self.build_field(&rules)?;
        tracing::info!("Scenario '{}': {}x{}x{}", self.name, self.width, self.length, self.height);
        Battle::new(field, rules, self.config.clone())
    }

    /// Small outdoor skirmish: a four-soldier squad against three sectoids
    /// on a farm with hedges, crates, a barn and a fuel barrel
    pub fn skirmish() -> Self {
        let mut scenario = Scenario::new("Farmland skirmish", 20, 20, 2).with_floor("grass");

        for x in 12..17 {
            scenario = scenario
                .with_part(Position::new(x, 12, 0), TilePart::NorthWall, "wall north")
                .with_part(Position::new(x, 17, 0), TilePart::NorthWall, "wall north");
        }
        for y in 12..17 {
            let entrance = if y == 14 { "door west" } else { "wall west" };
            scenario = scenario
                .with_part(Position::new(12, y, 0), TilePart::WestWall, entrance)
                .with_part(Position::new(17, y, 0), TilePart::WestWall, "wall west");
        }
        for x in 4..9 {
            scenario = scenario.with_part(Position::new(x, 9, 0), TilePart::Object, "hedge");
        }
        scenario = scenario
            .with_part(Position::new(10, 5, 0), TilePart::Object, "crate")
            .with_part(Position::new(11, 5, 0), TilePart::Object, "crate")
            .with_part(Position::new(9, 13, 0), TilePart::Object, "fuel barrel")
            .with_part(Position::new(15, 15, 0), TilePart::Object, "lamp");

        let squad = [("Hartmann", 2, 2), ("Okafor", 3, 2), ("Lindqvist", 2, 3), ("Moreau", 3, 3)];
        for (name, x, y) in squad {
            scenario = scenario
                .with_unit(name, "soldier", Faction::Player, Position::new(x, y, 0), 3)
                .with_loadout("rifle", Some(SlotId::RightHand), Some("rifle-clip"))
                .with_loadout("rifle-clip", None, None)
                .with_loadout("grenade", None, None);
        }
        scenario = scenario
            .with_unit("Sectoid leader", "sectoid", Faction::Hostile, Position::new(14, 14, 0), 7)
            .with_loadout("pistol", Some(SlotId::RightHand), Some("pistol-clip"))
            .with_loadout("psi-amp", None, None)
            .with_unit("Sectoid", "sectoid", Faction::Hostile, Position::new(15, 6, 0), 6)
            .with_loadout("pistol", Some(SlotId::RightHand), Some("pistol-clip"))
            .with_unit("Sectoid", "sectoid", Faction::Hostile, Position::new(6, 15, 0), 0)
            .with_loadout("pistol", Some(SlotId::RightHand), Some("pistol-clip"))
            .with_unit("Farmer", "civilian", Faction::Neutral, Position::new(8, 3, 0), 4);

        scenario
            .with_ground_item("medikit", Position::new(4, 4, 0))
            .with_config(BattleConfig::default().with_seed(1994).with_shade(4))
    }
}
