//! RuleSet - static lookup tables for map parts, items and unit types

use anyhow::Context;
use crate::error::IntegrityError;
use crate::tile::{PartRef, TilePart};
use crate::unit::UnitStats;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Movement cost value that blocks passage
pub const IMPASSABLE: u8 = 255;

/// Armor value for parts that cannot be destroyed
pub const INDESTRUCTIBLE: u16 = u16::MAX;

/// How a unit moves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    Walk,
    Fly,
    Swim,
}

/// Damage categories
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Kinetic,
    Explosive,
    Incendiary,
    Stun,
    Smoke,
    Melee,
}

/// Object parts that behave like walls
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BigWall {
    #[default]
    None,
    Block,
    DiagonalNwSe,
    DiagonalNeSw,
}

impl BigWall {
    pub fn is_diagonal(self) -> bool {
        matches!(self, BigWall::DiagonalNwSe | BigWall::DiagonalNeSw)
    }
}

/// Voxel occupancy of a part within its tile (local coords 16x16x24)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoxelShape {
    #[default]
    Empty,
    Floor,
    WestWall,
    NorthWall,
    Block,
    Column { half_width: u8, height: u8 },
    Low { height: u8 },
    DiagonalNwSe,
    DiagonalNeSw,
}

/// Thickness of floors and walls in voxels
const SHELL: i32 = 2;

impl VoxelShape {
    pub fn contains(self, lx: i32, ly: i32, lz: i32) -> bool {
        match self {
            VoxelShape::Empty => false,
            VoxelShape::Floor => lz < SHELL,
            VoxelShape::WestWall => lx < SHELL,
            VoxelShape::NorthWall => ly < SHELL,
            VoxelShape::Block => true,
            VoxelShape::Column { half_width, height } => {
                let hw = half_width as i32;
                (lx - 8).abs() < hw && (ly - 8).abs() < hw && lz < height as i32
            }
            VoxelShape::Low { height } => lz < height as i32,
            VoxelShape::DiagonalNwSe => (lx - ly).abs() <= 1,
            VoxelShape::DiagonalNeSw => (lx + ly - 15).abs() <= 1,
        }
    }
}

/// Per movement type TU costs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCosts {
    pub walk: u8,
    pub fly: u8,
    pub swim: u8,
}

impl MoveCosts {
    pub const fn uniform(cost: u8) -> Self {
        Self { walk: cost, fly: cost, swim: cost }
    }

    pub const fn new(walk: u8, fly: u8, swim: u8) -> Self {
        Self { walk, fly, swim }
    }

    pub fn get(&self, movement: MovementType) -> u8 {
        match movement {
            MovementType::Walk => self.walk,
            MovementType::Fly => self.fly,
            MovementType::Swim => self.swim,
        }
    }
}

/// Static definition of a map part
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapPartDef {
    pub name: String,
    pub slot: TilePart,
    #[serde(default)]
    pub shape: VoxelShape,
    pub tu_cost: MoveCosts,
    pub armor: u16,
    /// Percent chance per turn to catch fire from a burning neighbor
    #[serde(default)]
    pub flammability: u8,
    /// Turns a fire burns on this part
    #[serde(default)]
    pub fuel: u8,
    /// Blast power released when destroyed
    #[serde(default)]
    pub explosive: u16,
    #[serde(default)]
    pub blocks_sight: bool,
    #[serde(default)]
    pub is_door: bool,
    #[serde(default)]
    pub big_wall: BigWall,
    /// Raised floor height in voxels (negative = higher)
    #[serde(default)]
    pub terrain_level: i32,
    /// Part that replaces this one when destroyed
    #[serde(default)]
    pub destroyed: Option<PartRef>,
    /// Collapses when this slot loses its structural part
    #[serde(default)]
    pub depends_on: Option<TilePart>,
    #[serde(default)]
    pub structural: bool,
    #[serde(default)]
    pub objective: bool,
    #[serde(default)]
    pub light_source: u8,
}

impl MapPartDef {
    fn new(name: &str, slot: TilePart, shape: VoxelShape, tu_cost: MoveCosts, armor: u16) -> Self {
        Self {
            name: name.to_string(),
            slot,
            shape,
            tu_cost,
            armor,
            flammability: 0,
            fuel: 0,
            explosive: 0,
            blocks_sight: false,
            is_door: false,
            big_wall: BigWall::None,
            terrain_level: 0,
            destroyed: None,
            depends_on: None,
            structural: false,
            objective: false,
            light_source: 0,
        }
    }

    fn sight_blocking(mut self) -> Self {
        self.blocks_sight = true;
        self
    }

    fn structural(mut self) -> Self {
        self.structural = true;
        self
    }

    fn leaves(mut self, part: PartRef) -> Self {
        self.destroyed = Some(part);
        self
    }

    fn resting_on(mut self, slot: TilePart) -> Self {
        self.depends_on = Some(slot);
        self
    }

    fn burns(mut self, flammability: u8, fuel: u8) -> Self {
        self.flammability = flammability;
        self.fuel = fuel;
        self
    }

    pub fn is_destructible(&self) -> bool {
        self.armor != INDESTRUCTIBLE
    }
}

/// A named group of map parts (one terrain tileset)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapDataSet {
    pub name: String,
    pub parts: Vec<MapPartDef>,
}

/// Item categories
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Firearm,
    Ammo,
    Grenade,
    Melee,
    Medikit,
    PsiAmp,
    Corpse,
}

/// One firing mode of a weapon
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FireMode {
    /// Accuracy percent (may exceed 100)
    pub accuracy: u16,
    /// TU cost as percent of the shooter's base TU
    pub tu_percent: u8,
    /// Effective range in tiles
    pub range: i32,
}

/// Ballistic parameters of a weapon
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponProfile {
    #[serde(default)]
    pub aimed: Option<FireMode>,
    #[serde(default)]
    pub snap: Option<FireMode>,
    #[serde(default)]
    pub auto: Option<FireMode>,
    #[serde(default)]
    pub melee: Option<FireMode>,
    #[serde(default = "default_auto_shots")]
    pub auto_shots: u8,
    #[serde(default)]
    pub min_range: i32,
    /// Accuracy percent lost per tile outside the range band
    #[serde(default = "default_drop_off")]
    pub drop_off: u8,
    /// Voxels per tick
    #[serde(default = "default_bullet_speed")]
    pub bullet_speed: u8,
}

fn default_auto_shots() -> u8 {
    3
}

fn default_drop_off() -> u8 {
    2
}

fn default_bullet_speed() -> u8 {
    24
}

impl Default for WeaponProfile {
    fn default() -> Self {
        Self {
            aimed: None,
            snap: None,
            auto: None,
            melee: None,
            auto_shots: default_auto_shots(),
            min_range: 0,
            drop_off: default_drop_off(),
            bullet_speed: default_bullet_speed(),
        }
    }
}

/// Static definition of an item type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemRules {
    pub id: String,
    pub kind: ItemKind,
    /// Inventory footprint (width, height)
    pub size: (u8, u8),
    #[serde(default)]
    pub power: u16,
    #[serde(default = "default_damage_type")]
    pub damage_type: DamageType,
    /// Blast radius in tiles, 0 for direct-hit only
    #[serde(default)]
    pub blast_radius: i32,
    #[serde(default)]
    pub weapon: Option<WeaponProfile>,
    #[serde(default)]
    pub compatible_ammo: Vec<String>,
    #[serde(default)]
    pub clip_size: u16,
    /// TU cost (percent of base TU) for use/prime actions
    #[serde(default)]
    pub tu_use: u8,
    #[serde(default)]
    pub heal: u8,
    #[serde(default)]
    pub stun_recovery: u8,
}

fn default_damage_type() -> DamageType {
    DamageType::Kinetic
}

impl ItemRules {
    fn new(id: &str, kind: ItemKind, size: (u8, u8)) -> Self {
        Self {
            id: id.to_string(),
            kind,
            size,
            power: 0,
            damage_type: DamageType::Kinetic,
            blast_radius: 0,
            weapon: None,
            compatible_ammo: Vec::new(),
            clip_size: 0,
            tu_use: 0,
            heal: 0,
            stun_recovery: 0,
        }
    }

    fn damage(mut self, power: u16, damage_type: DamageType) -> Self {
        self.power = power;
        self.damage_type = damage_type;
        self
    }

    pub fn is_explosive(&self) -> bool {
        self.blast_radius > 0
    }
}

/// Static definition of a unit type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitType {
    pub id: String,
    pub stats: UnitStats,
    #[serde(default = "default_size")]
    pub size: u8,
    pub movement: MovementType,
    pub standing_height: i32,
    pub kneeling_height: i32,
    #[serde(default)]
    pub corpse_item: Option<String>,
}

fn default_size() -> u8 {
    1
}

/// Complete ruleset
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub datasets: Vec<MapDataSet>,
    pub items: Vec<ItemRules>,
    pub unit_types: Vec<UnitType>,
    /// Replaces destroyed ground-level floors
    #[serde(default)]
    pub scorched_earth: Option<PartRef>,
}

impl RuleSet {
    /// Look up a map part
    pub fn part(&self, part: PartRef) -> Result<&MapPartDef, IntegrityError> {
        self.datasets
            .get(part.dataset as usize)
            .and_then(|ds| ds.parts.get(part.entry as usize))
            .ok_or(IntegrityError::MissingMapPart(part))
    }

    /// Look up an item type
    pub fn item(&self, id: &str) -> Result<&ItemRules, IntegrityError> {
        self.items
            .iter()
            .find(|it| it.id == id)
            .ok_or_else(|| IntegrityError::MissingItemRules(id.to_string()))
    }

    /// Look up a unit type
    pub fn unit_type(&self, id: &str) -> Result<&UnitType, IntegrityError> {
        self.unit_types
            .iter()
            .find(|ut| ut.id == id)
            .ok_or_else(|| IntegrityError::MissingUnitType(id.to_string()))
    }

    /// Find a part by dataset and part name
    pub fn find_part(&self, dataset: &str, name: &str) -> Option<PartRef> {
        self.datasets.iter().enumerate().find_map(|(ds_idx, ds)| {
            if ds.name != dataset {
                return None;
            }
            ds.parts
                .iter()
                .position(|p| p.name == name)
                .map(|entry| PartRef::new(ds_idx as u8, entry as u16))
        })
    }

    /// Check that every cross-reference inside the ruleset resolves
    pub fn validate(&self) -> Result<(), IntegrityError> {
        for ds in &self.datasets {
            for def in &ds.parts {
                if let Some(dead) = def.destroyed {
                    self.part(dead)?;
                }
            }
        }
        if let Some(scorched) = self.scorched_earth {
            self.part(scorched)?;
        }
        for item in &self.items {
            for ammo in &item.compatible_ammo {
                self.item(ammo)?;
            }
        }
        for ut in &self.unit_types {
            if let Some(corpse) = &ut.corpse_item {
                self.item(corpse)?;
            }
        }
        Ok(())
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ruleset {}", path.display()))?;
        let rules: RuleSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ruleset {}", path.display()))?;
        rules.validate().context("Ruleset references undefined entries")?;
        Ok(rules)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize ruleset")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write ruleset {}", path.display()))?;
        Ok(())
    }

    /// Built-in ruleset used by scenarios and tests
    pub fn standard() -> Self {
        use parts::*;
        use TilePart::*;

        let open = MoveCosts::new(4, 4, IMPASSABLE);
        let blocked = MoveCosts::uniform(IMPASSABLE);
        let free = MoveCosts::uniform(0);
        let rough = MoveCosts::new(2, 0, 2);
        let wet = MoveCosts::new(IMPASSABLE, 4, 4);
        let brush = MoveCosts::new(8, 0, IMPASSABLE);

        let mut common = vec![
            MapPartDef::new("grass", Floor, VoxelShape::Floor, open, 10)
                .structural()
                .burns(30, 1)
                .leaves(SCORCHED_EARTH),
            MapPartDef::new("scorched earth", Floor, VoxelShape::Floor, open, INDESTRUCTIBLE)
                .structural(),
            MapPartDef::new("concrete", Floor, VoxelShape::Floor, open, 40).structural(),
            MapPartDef::new("wall west", WestWall, VoxelShape::WestWall, blocked, 50)
                .sight_blocking(),
            MapPartDef::new("wall north", NorthWall, VoxelShape::NorthWall, blocked, 50)
                .sight_blocking(),
            MapPartDef::new("door west", WestWall, VoxelShape::WestWall, free, 30)
                .sight_blocking(),
            MapPartDef::new("door north", NorthWall, VoxelShape::NorthWall, free, 30)
                .sight_blocking(),
            MapPartDef::new("window west", WestWall, VoxelShape::WestWall, blocked, 10),
            MapPartDef::new("crate", Object, VoxelShape::Low { height: 12 }, blocked, 20)
                .burns(20, 2)
                .resting_on(Floor)
                .leaves(RUBBLE),
            MapPartDef::new("rubble", Object, VoxelShape::Low { height: 4 }, rough, 30)
                .resting_on(Floor),
            MapPartDef::new("diagonal wall nw-se", Object, VoxelShape::DiagonalNwSe, blocked, 40)
                .sight_blocking()
                .structural()
                .leaves(RUBBLE),
            MapPartDef::new("diagonal wall ne-sw", Object, VoxelShape::DiagonalNeSw, blocked, 40)
                .sight_blocking()
                .structural()
                .leaves(RUBBLE),
            MapPartDef::new("pillar", Object, VoxelShape::Block, blocked, 60)
                .sight_blocking()
                .structural()
                .leaves(RUBBLE),
            MapPartDef::new("stairs high", Object, VoxelShape::Low { height: 16 }, free, 60),
            MapPartDef::new("stairs low", Object, VoxelShape::Low { height: 8 }, free, 60),
            MapPartDef::new("water", Floor, VoxelShape::Empty, wet, INDESTRUCTIBLE)
                .structural(),
            MapPartDef::new("hedge", Object, VoxelShape::Low { height: 20 }, brush, 10)
                .sight_blocking()
                .burns(60, 3)
                .resting_on(Floor),
            MapPartDef::new(
                "fuel barrel",
                Object,
                VoxelShape::Column { half_width: 4, height: 14 },
                blocked,
                15,
            )
            .resting_on(Floor),
            MapPartDef::new("power source", Object, VoxelShape::Block, blocked, 80)
                .sight_blocking()
                .structural()
                .leaves(RUBBLE),
            MapPartDef::new("braced wall west", WestWall, VoxelShape::WestWall, blocked, 30)
                .sight_blocking()
                .resting_on(Object),
            MapPartDef::new("braced wall north", NorthWall, VoxelShape::NorthWall, blocked, 30)
                .sight_blocking()
                .resting_on(Object),
            MapPartDef::new(
                "lamp",
                Object,
                VoxelShape::Column { half_width: 2, height: 20 },
                blocked,
                10,
            )
            .resting_on(Floor),
        ];
        common[STAIRS_HIGH.entry as usize].terrain_level = -16;
        common[STAIRS_LOW.entry as usize].terrain_level = -8;
        common[DOOR_WEST.entry as usize].is_door = true;
        common[DOOR_NORTH.entry as usize].is_door = true;
        common[FUEL_BARREL.entry as usize].explosive = 60;
        common[POWER_SOURCE.entry as usize].objective = true;
        common[POWER_SOURCE.entry as usize].big_wall = BigWall::Block;
        common[PILLAR.entry as usize].big_wall = BigWall::Block;
        common[DIAGONAL_NWSE.entry as usize].big_wall = BigWall::DiagonalNwSe;
        common[DIAGONAL_NESW.entry as usize].big_wall = BigWall::DiagonalNeSw;
        common[LAMP.entry as usize].light_source = 15;

        let rifle = WeaponProfile {
            aimed: Some(FireMode { accuracy: 110, tu_percent: 80, range: 30 }),
            snap: Some(FireMode { accuracy: 60, tu_percent: 25, range: 15 }),
            auto: Some(FireMode { accuracy: 35, tu_percent: 35, range: 10 }),
            ..Default::default()
        };
        let pistol = WeaponProfile {
            aimed: Some(FireMode { accuracy: 78, tu_percent: 30, range: 20 }),
            snap: Some(FireMode { accuracy: 60, tu_percent: 18, range: 12 }),
            ..Default::default()
        };
        let launcher = WeaponProfile {
            aimed: Some(FireMode { accuracy: 115, tu_percent: 75, range: 40 }),
            snap: Some(FireMode { accuracy: 55, tu_percent: 45, range: 20 }),
            min_range: 3,
            drop_off: 1,
            bullet_speed: 16,
            ..Default::default()
        };
        let stun_rod = WeaponProfile {
            melee: Some(FireMode { accuracy: 100, tu_percent: 30, range: 1 }),
            ..Default::default()
        };
        let claws = WeaponProfile {
            melee: Some(FireMode { accuracy: 100, tu_percent: 25, range: 1 }),
            ..Default::default()
        };

        let items = vec![
            ItemRules {
                weapon: Some(rifle),
                compatible_ammo: vec!["rifle-clip".into()],
                ..ItemRules::new("rifle", ItemKind::Firearm, (1, 3))
            },
            ItemRules {
                clip_size: 20,
                ..ItemRules::new("rifle-clip", ItemKind::Ammo, (1, 1))
                    .damage(30, DamageType::Kinetic)
            },
            ItemRules {
                weapon: Some(pistol),
                compatible_ammo: vec!["pistol-clip".into()],
                ..ItemRules::new("pistol", ItemKind::Firearm, (1, 2))
            },
            ItemRules {
                clip_size: 12,
                ..ItemRules::new("pistol-clip", ItemKind::Ammo, (1, 1))
                    .damage(26, DamageType::Kinetic)
            },
            ItemRules {
                weapon: Some(launcher),
                compatible_ammo: vec!["small-rocket".into()],
                ..ItemRules::new("rocket-launcher", ItemKind::Firearm, (2, 3))
            },
            ItemRules {
                clip_size: 1,
                blast_radius: 3,
                ..ItemRules::new("small-rocket", ItemKind::Ammo, (1, 2))
                    .damage(75, DamageType::Explosive)
            },
            ItemRules {
                blast_radius: 3,
                tu_use: 50,
                ..ItemRules::new("grenade", ItemKind::Grenade, (1, 1))
                    .damage(50, DamageType::Explosive)
            },
            ItemRules {
                blast_radius: 3,
                tu_use: 50,
                ..ItemRules::new("smoke-grenade", ItemKind::Grenade, (1, 1))
                    .damage(60, DamageType::Smoke)
            },
            ItemRules {
                blast_radius: 2,
                tu_use: 50,
                ..ItemRules::new("incendiary-grenade", ItemKind::Grenade, (1, 1))
                    .damage(40, DamageType::Incendiary)
            },
            ItemRules {
                weapon: Some(stun_rod),
                ..ItemRules::new("stun-rod", ItemKind::Melee, (1, 3)).damage(65, DamageType::Stun)
            },
            ItemRules {
                weapon: Some(claws),
                ..ItemRules::new("claws", ItemKind::Melee, (1, 1)).damage(45, DamageType::Melee)
            },
            ItemRules {
                heal: 10,
                stun_recovery: 15,
                tu_use: 15,
                ..ItemRules::new("medikit", ItemKind::Medikit, (2, 2))
            },
            ItemRules { tu_use: 25, ..ItemRules::new("psi-amp", ItemKind::PsiAmp, (2, 2)) },
            ItemRules::new("corpse", ItemKind::Corpse, (2, 3)),
        ];

        let unit_types = vec![
            UnitType {
                id: "soldier".into(),
                stats: UnitStats {
                    time_units: 60,
                    stamina: 60,
                    health: 35,
                    bravery: 40,
                    reactions: 50,
                    firing: 60,
                    throwing: 60,
                    strength: 30,
                    melee: 50,
                    psi_strength: 40,
                    psi_skill: 0,
                },
                size: 1,
                movement: MovementType::Walk,
                standing_height: 22,
                kneeling_height: 14,
                corpse_item: Some("corpse".into()),
            },
            UnitType {
                id: "sectoid".into(),
                stats: UnitStats {
                    time_units: 54,
                    stamina: 90,
                    health: 30,
                    bravery: 80,
                    reactions: 63,
                    firing: 52,
                    throwing: 58,
                    strength: 30,
                    melee: 76,
                    psi_strength: 40,
                    psi_skill: 50,
                },
                size: 1,
                movement: MovementType::Walk,
                standing_height: 16,
                kneeling_height: 12,
                corpse_item: Some("corpse".into()),
            },
            UnitType {
                id: "floater".into(),
                stats: UnitStats {
                    time_units: 55,
                    stamina: 90,
                    health: 40,
                    bravery: 70,
                    reactions: 50,
                    firing: 50,
                    throwing: 58,
                    strength: 40,
                    melee: 60,
                    psi_strength: 30,
                    psi_skill: 0,
                },
                size: 1,
                movement: MovementType::Fly,
                standing_height: 21,
                kneeling_height: 21,
                corpse_item: Some("corpse".into()),
            },
            UnitType {
                id: "reaper".into(),
                stats: UnitStats {
                    time_units: 46,
                    stamina: 110,
                    health: 80,
                    bravery: 60,
                    reactions: 45,
                    firing: 0,
                    throwing: 0,
                    strength: 100,
                    melee: 100,
                    psi_strength: 20,
                    psi_skill: 0,
                },
                size: 2,
                movement: MovementType::Walk,
                standing_height: 18,
                kneeling_height: 18,
                corpse_item: Some("corpse".into()),
            },
            UnitType {
                id: "civilian".into(),
                stats: UnitStats {
                    time_units: 50,
                    stamina: 40,
                    health: 10,
                    bravery: 10,
                    reactions: 20,
                    firing: 10,
                    throwing: 20,
                    strength: 20,
                    melee: 20,
                    psi_strength: 10,
                    psi_skill: 0,
                },
                size: 1,
                movement: MovementType::Walk,
                standing_height: 22,
                kneeling_height: 14,
                corpse_item: Some("corpse".into()),
            },
        ];

        Self {
            name: "standard".to_string(),
            datasets: vec![MapDataSet { name: "common".to_string(), parts: common }],
            items,
            unit_types,
            scorched_earth: Some(SCORCHED_EARTH),
        }
    }
}

/// Part references into the built-in "common" dataset
pub mod parts {
    use crate::tile::PartRef;

    pub const GRASS: PartRef = PartRef::new(0, 0);
    pub const SCORCHED_EARTH: PartRef = PartRef::new(0, 1);
    pub const CONCRETE: PartRef = PartRef::new(0, 2);
    pub const WALL_WEST: PartRef = PartRef::new(0, 3);
    pub const WALL_NORTH: PartRef = PartRef::new(0, 4);
    pub const DOOR_WEST: PartRef = PartRef::new(0, 5);
    pub const DOOR_NORTH: PartRef = PartRef::new(0, 6);
    pub const WINDOW_WEST: PartRef = PartRef::new(0, 7);
    pub const CRATE: PartRef = PartRef::new(0, 8);
    pub const RUBBLE: PartRef = PartRef::new(0, 9);
    pub const DIAGONAL_NWSE: PartRef = PartRef::new(0, 10);
    pub const DIAGONAL_NESW: PartRef = PartRef::new(0, 11);
    pub const PILLAR: PartRef = PartRef::new(0, 12);
    pub const STAIRS_HIGH: PartRef = PartRef::new(0, 13);
    pub const STAIRS_LOW: PartRef = PartRef::new(0, 14);
    pub const WATER: PartRef = PartRef::new(0, 15);
    pub const HEDGE: PartRef = PartRef::new(0, 16);
    pub const FUEL_BARREL: PartRef = PartRef::new(0, 17);
    pub const POWER_SOURCE: PartRef = PartRef::new(0, 18);
    pub const BRACED_WALL_WEST: PartRef = PartRef::new(0, 19);
    pub const BRACED_WALL_NORTH: PartRef = PartRef::new(0, 20);
    pub const LAMP: PartRef = PartRef::new(0, 21);
}
