//! Battlefield tiles

use crate::item::ItemId;
use crate::position::Position;
use crate::ruleset::DamageType;
use crate::unit::UnitId;
use serde::{Deserialize, Serialize};

/// Part slot within a tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TilePart {
    Floor = 0,
    WestWall = 1,
    NorthWall = 2,
    Object = 3,
}

impl TilePart {
    pub const ALL: [TilePart; 4] = [
        TilePart::Floor,
        TilePart::WestWall,
        TilePart::NorthWall,
        TilePart::Object,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Reference to a static map-data definition: (dataset, entry)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartRef {
    pub dataset: u8,
    pub entry: u16,
}

impl PartRef {
    pub const fn new(dataset: u8, entry: u16) -> Self {
        Self { dataset, entry }
    }
}

/// Vertical section of a tile tracked by fog of war
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    WestWall = 0,
    NorthWall = 1,
    Content = 2,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::WestWall, Section::NorthWall, Section::Content];
}

/// Light layers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightLayer {
    Ambient = 0,
    Static = 1,
    Dynamic = 2,
}

/// Maximum light level
pub const MAX_LIGHT: u8 = 15;

/// Tiles lit below this level count as dark
pub const DARK_THRESHOLD: u8 = 9;

/// An explosive waiting to go off at the next turn transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingExplosive {
    pub power: u16,
    pub damage_type: DamageType,
    /// Blast radius in tiles
    pub radius: i32,
    pub source: Option<UnitId>,
}

impl PendingExplosive {
    /// Marker left by an exploding map part
    pub fn terrain(power: u16) -> Self {
        Self {
            power,
            damage_type: DamageType::Explosive,
            radius: (power as i32 / 20).max(1),
            source: None,
        }
    }

    /// Keep whichever of two markers on the same tile is stronger
    pub fn stronger(self, other: Option<PendingExplosive>) -> Self {
        match other {
            Some(existing) if existing.power >= self.power => existing,
            _ => self,
        }
    }
}

/// One grid cell
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pos: Position,
    parts: [Option<PartRef>; 4],
    pub fire: u8,
    pub smoke: u8,
    light: [u8; 3],
    discovered: [bool; 3],
    pub explosive: Option<PendingExplosive>,
    pub inventory: Vec<ItemId>,
    pub(crate) unit: Option<UnitId>,
}

impl Tile {
    pub fn new(pos: Position) -> Self {
        Self {
            pos,
            parts: [None; 4],
            fire: 0,
            smoke: 0,
            light: [0; 3],
            discovered: [false; 3],
            explosive: None,
            inventory: Vec::new(),
            unit: None,
        }
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn part(&self, slot: TilePart) -> Option<PartRef> {
        self.parts[slot.index()]
    }

    pub fn parts(&self) -> impl Iterator<Item = (TilePart, PartRef)> + '_ {
        TilePart::ALL
            .iter()
            .filter_map(move |&slot| self.part(slot).map(|r| (slot, r)))
    }

    pub fn set_part(&mut self, slot: TilePart, part: Option<PartRef>) {
        self.parts[slot.index()] = part;
    }

    /// Occupying unit (non-owning)
    pub fn unit(&self) -> Option<UnitId> {
        self.unit
    }

    pub fn is_discovered(&self, section: Section) -> bool {
        self.discovered[section as usize]
    }

    /// Mark a section discovered. Returns true if it was newly discovered.
    /// There is no way to undiscover a section.
    pub fn discover(&mut self, section: Section) -> bool {
        let flag = &mut self.discovered[section as usize];
        let newly = !*flag;
        *flag = true;
        newly
    }

    pub fn light(&self, layer: LightLayer) -> u8 {
        self.light[layer as usize]
    }

    pub fn set_light(&mut self, layer: LightLayer, level: u8) {
        self.light[layer as usize] = level.min(MAX_LIGHT);
    }

    /// Brightest layer, fire counts as full light
    pub fn brightness(&self) -> u8 {
        if self.fire > 0 {
            return MAX_LIGHT;
        }
        self.light.iter().copied().max().unwrap_or(0)
    }

    /// Light level under global darkness `shade`
    pub fn light_level(&self, shade: u8) -> u8 {
        MAX_LIGHT.saturating_sub(shade).max(self.brightness())
    }

    pub fn is_dark(&self, shade: u8) -> bool {
        self.light_level(shade) < DARK_THRESHOLD
    }

    // Raw access for the binary tile encoding
    pub(crate) fn raw_parts(&self) -> [Option<PartRef>; 4] {
        self.parts
    }

    pub(crate) fn raw_light(&self) -> [u8; 3] {
        self.light
    }

    pub(crate) fn discovered_bits(&self) -> u8 {
        self.discovered
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &d)| if d { acc | (1 << i) } else { acc })
    }

    pub(crate) fn from_raw(
        pos: Position,
        parts: [Option<PartRef>; 4],
        fire: u8,
        smoke: u8,
        light: [u8; 3],
        discovered_bits: u8,
    ) -> Self {
        let mut tile = Tile::new(pos);
        tile.parts = parts;
        tile.fire = fire;
        tile.smoke = smoke;
        tile.light = light;
        for i in 0..3 {
            tile.discovered[i] = discovered_bits & (1 << i) != 0;
        }
        tile
    }
}
