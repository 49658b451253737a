//! Battlefield state: tile array plus unit and item arenas

use crate::error::{BattleError, IntegrityError, PlacementReason, TargetState};
use crate::item::{Item, ItemId, ItemLocation, SlotId};
use crate::position::{Position, Voxel, VOXELS_X, VOXELS_Y, VOXELS_Z};
use crate::ruleset::{DamageType, ItemKind, MapPartDef, MovementType, RuleSet};
use crate::tile::{LightLayer, PartRef, PendingExplosive, Tile, TilePart};
use crate::unit::{footprint, Unit, UnitId, UnitStatus};
use serde::{Deserialize, Serialize};

/// Terrain level at or above which an object leads to the level above
pub const STAIRS_TOP: i32 = -16;

/// Damage per level fallen
const FALL_DAMAGE_PER_LEVEL: i32 = 8;

/// Light a burning tile casts on its surroundings
const FIRE_LIGHT: u8 = 12;

/// Collapses resolved on one tile before its replacement chain is declared broken
const MAX_SETTLE_PASSES: usize = 64;

// ============================================================================
// SUPPORTING TYPES
// ============================================================================

/// Mission metadata carried with the battle
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionInfo {
    pub name: String,
    /// Objective parts that must be destroyed (0 = none)
    pub objectives_total: u32,
    pub objectives_destroyed: u32,
}

/// A part removed from a tile by damage or collapse
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestroyedPart {
    pub pos: Position,
    pub slot: TilePart,
    pub part: PartRef,
}

/// Effect of damage on one unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitHarm {
    pub unit: UnitId,
    pub damage: i32,
    pub stun: i32,
    pub killed: bool,
    pub knocked_out: bool,
}

/// A unit that dropped to a lower level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fall {
    pub unit: UnitId,
    pub from: Position,
    pub to: Position,
    pub damage: i32,
}

// ============================================================================
// BATTLEFIELD
// ============================================================================

/// Owns every tile, unit and item of one battle
#[derive(Clone, Debug, PartialEq)]
pub struct Battlefield {
    width: i32,
    length: i32,
    height: i32,
    tiles: Vec<Tile>,
    units: Vec<Unit>,
    items: Vec<Option<Item>>,
    pub mission: MissionInfo,
}

impl Battlefield {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Empty battlefield of width x length x height tiles
    pub fn new(width: i32, length: i32, height: i32) -> Self {
        let (width, length, height) = (width.max(1), length.max(1), height.max(1));
        let mut tiles = Vec::with_capacity((width * length * height) as usize);
        for z in 0..height {
            for y in 0..length {
                for x in 0..width {
                    tiles.push(Tile::new(Position::new(x, y, z)));
                }
            }
        }
        Self {
            width,
            length,
            height,
            tiles,
            units: Vec::new(),
            items: Vec::new(),
            mission: MissionInfo::default(),
        }
    }

    /// Rebuild from persisted parts; occupancy and tile inventories are derived
    pub(crate) fn from_parts(
        dimensions: (i32, i32, i32),
        tiles: Vec<Tile>,
        units: Vec<Unit>,
        items: Vec<Option<Item>>,
        mission: MissionInfo,
    ) -> Result<Self, IntegrityError> {
        let (width, length, height) = dimensions;
        let expected = (width.max(0) * length.max(0) * height.max(0)) as usize;
        if tiles.len() != expected {
            return Err(IntegrityError::TileCount { expected, found: tiles.len() });
        }
        let mut field = Self { width, length, height, tiles, units, items, mission };
        field.rebuild_links()?;
        Ok(field)
    }

    // ========================================================================
    // TILE ACCESS
    // ========================================================================

    pub fn dimensions(&self) -> (i32, i32, i32) {
        (self.width, self.length, self.height)
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.z >= 0
            && pos.x < self.width
            && pos.y < self.length
            && pos.z < self.height
    }

    /// Linear index over (x, y, z)
    pub fn tile_index(&self, pos: Position) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some((pos.z * self.width * self.length + pos.y * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: Position) -> Option<&Tile> {
        self.tile_index(pos).map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        self.tile_index(pos).map(move |i| &mut self.tiles[i])
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub(crate) fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    /// Place a part directly (map generation)
    pub fn set_part(
        &mut self,
        pos: Position,
        slot: TilePart,
        part: Option<PartRef>,
    ) -> Result<(), BattleError> {
        let tile = self.tile_mut(pos).ok_or(BattleError::OutOfBounds(pos))?;
        tile.set_part(slot, part);
        Ok(())
    }

    /// Definition of the part in `slot` at `pos`, if any
    pub fn part_def<'r>(
        &self,
        pos: Position,
        slot: TilePart,
        rules: &'r RuleSet,
    ) -> Result<Option<&'r MapPartDef>, IntegrityError> {
        match self.tile(pos).and_then(|t| t.part(slot)) {
            Some(part) => rules.part(part).map(Some),
            None => Ok(None),
        }
    }

    /// Raised floor height of the tile in voxels (negative = higher)
    pub fn terrain_level(&self, pos: Position, rules: &RuleSet) -> Result<i32, IntegrityError> {
        Ok(self
            .part_def(pos, TilePart::Object, rules)?
            .map(|def| def.terrain_level)
            .unwrap_or(0))
    }

    /// Whether something can stand on this tile
    pub fn has_floor_support(
        &self,
        pos: Position,
        rules: &RuleSet,
    ) -> Result<bool, IntegrityError> {
        if !self.in_bounds(pos) {
            return Ok(false);
        }
        if self.tile(pos).and_then(|t| t.part(TilePart::Floor)).is_some() {
            return Ok(true);
        }
        // The top of a staircase below serves as floor
        let below = pos.offset(0, 0, -1);
        if self.in_bounds(below) && self.terrain_level(below, rules)? <= STAIRS_TOP {
            return Ok(true);
        }
        Ok(false)
    }

    // ========================================================================
    // UNITS
    // ========================================================================

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit, IntegrityError> {
        self.units.get(id.0 as usize).ok_or(IntegrityError::MissingUnit(id))
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit, IntegrityError> {
        self.units.get_mut(id.0 as usize).ok_or(IntegrityError::MissingUnit(id))
    }

    /// Register a unit; its id is reassigned to its arena index
    pub fn add_unit(&mut self, mut unit: Unit) -> Result<UnitId, BattleError> {
        let id = UnitId(self.units.len() as u32);
        unit.id = id;
        let pos = unit.position;
        let active = unit.occupies_tiles();
        if active {
            self.check_footprint(id, pos, unit.size)?;
        }
        self.units.push(unit);
        if active {
            self.claim_footprint(id, pos);
        }
        Ok(id)
    }

    /// Occupying unit at a tile
    pub fn unit_at(&self, pos: Position) -> Option<UnitId> {
        self.tile(pos).and_then(|t| t.unit())
    }

    /// Move a unit's occupancy to `pos`, enforcing exclusive footprint occupancy
    pub fn set_unit_occupancy(&mut self, id: UnitId, pos: Position) -> Result<(), BattleError> {
        let size = self.unit(id)?.size;
        self.check_footprint(id, pos, size)?;
        self.clear_occupancy(id)?;
        self.claim_footprint(id, pos);
        self.unit_mut(id)?.position = pos;
        Ok(())
    }

    /// Check that every footprint tile is in bounds and free of other units
    pub fn check_footprint(&self, id: UnitId, pos: Position, size: u8) -> Result<(), BattleError> {
        for tile_pos in footprint(pos, size) {
            let tile = self.tile(tile_pos).ok_or(BattleError::OutOfBounds(tile_pos))?;
            if let Some(other) = tile.unit() {
                if other != id {
                    return Err(BattleError::IllegalPlacement(PlacementReason::Occupied(other)));
                }
            }
        }
        Ok(())
    }

    fn claim_footprint(&mut self, id: UnitId, pos: Position) {
        let size = self.units[id.0 as usize].size;
        for tile_pos in footprint(pos, size) {
            if let Some(tile) = self.tile_mut(tile_pos) {
                tile.unit = Some(id);
            }
        }
    }

    /// Release every tile this unit occupies
    pub fn clear_occupancy(&mut self, id: UnitId) -> Result<(), IntegrityError> {
        let unit = self.unit(id)?;
        for tile_pos in unit.footprint() {
            if let Some(tile) = self.tile_mut(tile_pos) {
                if tile.unit == Some(id) {
                    tile.unit = None;
                }
            }
        }
        Ok(())
    }

    /// Convert a unit to a corpse: drops its gear and spawns the corpse item
    pub fn kill_unit(
        &mut self,
        id: UnitId,
        rules: &RuleSet,
    ) -> Result<Option<ItemId>, BattleError> {
        if !self.unit(id)?.is_alive() {
            return Ok(None);
        }
        self.clear_occupancy(id)?;
        self.drop_inventory(id)?;
        let (pos, type_id, faction) = {
            let unit = self.unit_mut(id)?;
            unit.status = UnitStatus::Dead;
            unit.health = 0;
            unit.time_units = 0;
            unit.visible_tiles.clear();
            unit.visible_units.clear();
            (unit.position, unit.type_id.clone(), unit.faction)
        };
        for ally in self.units.iter_mut().filter(|u| u.faction == faction && u.is_active()) {
            ally.change_morale(-(110 - ally.base.bravery).max(0) / 5);
        }
        let corpse = rules.unit_type(&type_id)?.corpse_item.clone();
        match corpse {
            Some(corpse) => {
                let item = self.add_item(&corpse, ItemLocation::Ground(pos), rules)?;
                self.item_mut(item)?.corpse_of = Some(id);
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Voxel a unit looks and shoots from
    pub fn eye_voxel(&self, id: UnitId, rules: &RuleSet) -> Result<Voxel, IntegrityError> {
        let unit = self.unit(id)?;
        self.body_voxel(unit, unit.eye_height(), rules)
    }

    /// Middle of a unit's body, the point shots at it aim for
    pub fn center_voxel(&self, id: UnitId, rules: &RuleSet) -> Result<Voxel, IntegrityError> {
        let unit = self.unit(id)?;
        self.body_voxel(unit, (unit.height() / 2).max(1), rules)
    }

    fn body_voxel(
        &self,
        unit: &Unit,
        height: i32,
        rules: &RuleSet,
    ) -> Result<Voxel, IntegrityError> {
        let (origin, size) = (unit.position, unit.size as i32);
        Ok(Voxel::new(
            origin.x * VOXELS_X + VOXELS_X / 2 * size,
            origin.y * VOXELS_Y + VOXELS_Y / 2 * size,
            origin.z * VOXELS_Z - self.terrain_level(origin, rules)? + height,
        ))
    }

    /// Living units (conscious or not) whose footprint covers `pos`
    pub fn units_on(&self, pos: Position) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|u| u.is_alive() && u.footprint().contains(&pos))
            .map(|u| u.id)
            .collect()
    }

    /// Apply `amount` of `damage_type` to a unit, killing or knocking it out as needed
    pub fn apply_unit_damage(
        &mut self,
        id: UnitId,
        amount: i32,
        damage_type: DamageType,
        rules: &RuleSet,
    ) -> Result<UnitHarm, BattleError> {
        let amount = amount.max(0);
        let (damage, stun) = match damage_type {
            DamageType::Stun => (0, amount),
            DamageType::Smoke => (0, 0),
            _ => (amount, amount / 4),
        };
        let mut harm = UnitHarm { unit: id, damage, stun, killed: false, knocked_out: false };

        let unit = self.unit_mut(id)?;
        if !unit.is_alive() {
            return Ok(UnitHarm { damage: 0, stun: 0, ..harm });
        }
        unit.health -= damage;
        unit.stun += stun;
        if damage > 0 {
            unit.change_morale(-(damage / 2));
        }
        let dying = unit.health <= 0;
        let fainting = unit.stun >= unit.health && unit.is_active();

        if dying {
            self.kill_unit(id, rules)?;
            harm.killed = true;
            tracing::info!("Unit {:?} killed", id);
        } else if fainting {
            self.knock_out(id)?;
            harm.knocked_out = true;
            tracing::info!("Unit {:?} knocked out", id);
        }
        Ok(harm)
    }

    /// Knock a unit out: it leaves its tiles and drops its gear
    pub fn knock_out(&mut self, id: UnitId) -> Result<(), BattleError> {
        if !self.unit(id)?.is_active() {
            return Ok(());
        }
        self.clear_occupancy(id)?;
        self.drop_inventory(id)?;
        let unit = self.unit_mut(id)?;
        unit.status = UnitStatus::Unconscious;
        unit.time_units = 0;
        unit.visible_tiles.clear();
        unit.visible_units.clear();
        Ok(())
    }

    /// Bring an unconscious unit back if its tiles are free
    pub fn revive_unit(&mut self, id: UnitId) -> Result<bool, BattleError> {
        let unit = self.unit(id)?;
        if unit.status != UnitStatus::Unconscious {
            return Ok(false);
        }
        let (pos, size) = (unit.position, unit.size);
        if self.check_footprint(id, pos, size).is_err() {
            return Ok(false);
        }
        self.claim_footprint(id, pos);
        self.unit_mut(id)?.status = UnitStatus::Standing;
        Ok(true)
    }

    fn drop_inventory(&mut self, id: UnitId) -> Result<(), BattleError> {
        let pos = self.unit(id)?.position;
        let carried: Vec<ItemId> = self.unit(id)?.inventory.items().collect();
        for item in carried {
            self.place_on_ground(item, pos)?;
        }
        Ok(())
    }

    /// Drop walkers standing over missing floors to the first supported level
    pub fn settle_units(&mut self, rules: &RuleSet) -> Result<Vec<Fall>, BattleError> {
        let mut falls = Vec::new();
        for idx in 0..self.units.len() {
            let id = UnitId(idx as u32);
            let unit = &self.units[idx];
            if !unit.is_active() || unit.movement == MovementType::Fly || unit.position.z == 0 {
                continue;
            }
            let (from, size) = (unit.position, unit.size);
            if self.footprint_supported(from, size, rules)? {
                continue;
            }

            let mut to = from;
            while to.z > 0 && !self.footprint_supported(to, size, rules)? {
                to = to.offset(0, 0, -1);
            }
            if self.check_footprint(id, to, size).is_err() {
                continue;
            }
            self.units[idx].status = UnitStatus::Falling;
            self.set_unit_occupancy(id, to)?;
            let damage = (from.z - to.z) * FALL_DAMAGE_PER_LEVEL;
            let unit = &mut self.units[idx];
            unit.health -= damage;
            unit.status = UnitStatus::Standing;
            if unit.health <= 0 {
                self.kill_unit(id, rules)?;
            }
            falls.push(Fall { unit: id, from, to, damage });
        }
        Ok(falls)
    }

    fn footprint_supported(
        &self,
        pos: Position,
        size: u8,
        rules: &RuleSet,
    ) -> Result<bool, IntegrityError> {
        for tile_pos in footprint(pos, size) {
            if self.has_floor_support(tile_pos, rules)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ========================================================================
    // ITEMS
    // ========================================================================

    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter().flatten()
    }

    pub fn item(&self, id: ItemId) -> Result<&Item, IntegrityError> {
        self.items
            .get(id.0 as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(IntegrityError::MissingItem(id))
    }

    pub fn item_mut(&mut self, id: ItemId) -> Result<&mut Item, IntegrityError> {
        self.items
            .get_mut(id.0 as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(IntegrityError::MissingItem(id))
    }

    pub(crate) fn raw_items(&self) -> &[Option<Item>] {
        &self.items
    }

    /// Create an item of `type_id` at `location`
    pub fn add_item(
        &mut self,
        type_id: &str,
        location: ItemLocation,
        rules: &RuleSet,
    ) -> Result<ItemId, BattleError> {
        let item_rules = rules.item(type_id)?;
        let id = ItemId(self.items.len() as u32);
        self.check_location(id, location, item_rules.size)?;

        let mut item = Item::new(id, type_id, location);
        if item_rules.kind == ItemKind::Ammo {
            item.rounds = item_rules.clip_size;
        }
        self.items.push(Some(item));
        self.attach(id, location, item_rules.size)?;
        Ok(id)
    }

    /// Delete an item (and any clip loaded into it)
    pub fn remove_item(&mut self, id: ItemId) -> Result<Item, BattleError> {
        self.detach(id)?;
        if let Some(ammo) = self.item(id)?.ammo {
            self.detach(ammo)?;
            self.items[ammo.0 as usize] = None;
        }
        let item = self.items[id.0 as usize].take().ok_or(IntegrityError::MissingItem(id))?;
        Ok(item)
    }

    /// Put an item on the ground at `pos`
    pub fn place_on_ground(&mut self, id: ItemId, pos: Position) -> Result<(), BattleError> {
        if !self.in_bounds(pos) {
            return Err(BattleError::OutOfBounds(pos));
        }
        self.detach(id)?;
        let location = ItemLocation::Ground(pos);
        self.attach(id, location, (1, 1))?;
        Ok(())
    }

    /// Move an item into a unit's inventory slot
    pub fn move_item_to_unit(
        &mut self,
        id: ItemId,
        unit: UnitId,
        slot: SlotId,
        x: u8,
        y: u8,
        rules: &RuleSet,
    ) -> Result<(), BattleError> {
        let size = rules.item(&self.item(id)?.type_id)?.size;
        let location = ItemLocation::Carried { unit, slot, x, y };
        self.check_location(id, location, size)?;
        self.detach(id)?;
        self.attach(id, location, size)
    }

    /// Load a clip into a firearm
    pub fn load_ammo(
        &mut self,
        weapon: ItemId,
        ammo: ItemId,
        rules: &RuleSet,
    ) -> Result<(), BattleError> {
        let weapon_rules = rules.item(&self.item(weapon)?.type_id)?;
        let ammo_type = self.item(ammo)?.type_id.clone();
        if !weapon_rules.compatible_ammo.iter().any(|a| *a == ammo_type) {
            return Err(BattleError::InvalidTargetState(TargetState::IncompatibleAmmo));
        }
        if let Some(old) = self.item(weapon)?.ammo {
            // Spent or partial clips are discarded
            self.remove_item(old)?;
        }
        self.detach(ammo)?;
        self.attach(ammo, ItemLocation::Loaded { weapon }, (1, 1))
    }

    fn check_location(
        &self,
        id: ItemId,
        location: ItemLocation,
        size: (u8, u8),
    ) -> Result<(), BattleError> {
        match location {
            ItemLocation::Ground(pos) => {
                if !self.in_bounds(pos) {
                    return Err(BattleError::OutOfBounds(pos));
                }
            }
            ItemLocation::Carried { unit, slot, x, y } => {
                let inventory = &self.unit(unit)?.inventory;
                if inventory.find(id).is_none() {
                    inventory.check_placement(slot, x, y, size)?;
                }
            }
            ItemLocation::Loaded { weapon } => {
                if self.item(weapon)?.ammo.is_some_and(|a| a != id) {
                    return Err(BattleError::InvalidTargetState(TargetState::WrongItem));
                }
            }
        }
        Ok(())
    }

    fn attach(
        &mut self,
        id: ItemId,
        location: ItemLocation,
        size: (u8, u8),
    ) -> Result<(), BattleError> {
        match location {
            ItemLocation::Ground(pos) => {
                let tile = self.tile_mut(pos).ok_or(BattleError::OutOfBounds(pos))?;
                tile.inventory.push(id);
            }
            ItemLocation::Carried { unit, slot, x, y } => {
                self.unit_mut(unit)?.inventory.insert(slot, x, y, id, size)?;
            }
            ItemLocation::Loaded { weapon } => {
                self.item_mut(weapon)?.ammo = Some(id);
            }
        }
        self.item_mut(id)?.location = location;
        Ok(())
    }

    fn detach(&mut self, id: ItemId) -> Result<(), BattleError> {
        match self.item(id)?.location {
            ItemLocation::Ground(pos) => {
                if let Some(tile) = self.tile_mut(pos) {
                    tile.inventory.retain(|&i| i != id);
                }
            }
            ItemLocation::Carried { unit, .. } => {
                self.unit_mut(unit)?.inventory.remove(id);
            }
            ItemLocation::Loaded { weapon } => {
                let weapon = self.item_mut(weapon)?;
                if weapon.ammo == Some(id) {
                    weapon.ammo = None;
                }
            }
        }
        Ok(())
    }

    /// Position of an item in the world (carrier's tile for carried items)
    pub fn item_position(&self, id: ItemId) -> Result<Position, IntegrityError> {
        match self.item(id)?.location {
            ItemLocation::Ground(pos) => Ok(pos),
            ItemLocation::Carried { unit, .. } => Ok(self.unit(unit)?.position),
            ItemLocation::Loaded { weapon } => self.item_position(weapon),
        }
    }

    // ========================================================================
    // TERRAIN DAMAGE
    // ========================================================================

    /// Damage one part; true if it was destroyed
    pub fn apply_terrain_damage(
        &mut self,
        pos: Position,
        slot: TilePart,
        power: u16,
        rules: &RuleSet,
    ) -> Result<bool, BattleError> {
        Ok(!self.damage_part(pos, slot, power, rules)?.is_empty())
    }

    /// Damage one part and return everything destroyed, cascade included
    pub fn damage_part(
        &mut self,
        pos: Position,
        slot: TilePart,
        power: u16,
        rules: &RuleSet,
    ) -> Result<Vec<DestroyedPart>, BattleError> {
        let def = match self.part_def(pos, slot, rules)? {
            Some(def) => def,
            None => return Ok(Vec::new()),
        };
        if !def.is_destructible() || power < def.armor {
            return Ok(Vec::new());
        }
        let mut destroyed = Vec::new();
        self.destroy_part(pos, slot, rules, &mut destroyed)?;
        self.settle_tile(pos, rules, &mut destroyed)?;
        Ok(destroyed)
    }

    /// Remove a part outright (fire burn-out, cascades)
    pub fn destroy_part(
        &mut self,
        pos: Position,
        slot: TilePart,
        rules: &RuleSet,
        destroyed: &mut Vec<DestroyedPart>,
    ) -> Result<(), BattleError> {
        let tile = self.tile_mut(pos).ok_or(BattleError::OutOfBounds(pos))?;
        let part = match tile.part(slot) {
            Some(part) => part,
            None => return Ok(()),
        };
        let def = rules.part(part)?;
        tile.set_part(slot, None);

        if let Some(dead) = def.destroyed {
            let dead_slot = rules.part(dead)?.slot;
            if tile.part(dead_slot).is_none() {
                tile.set_part(dead_slot, Some(dead));
            }
        }
        if slot == TilePart::Floor && pos.z == 0 && tile.part(TilePart::Floor).is_none() {
            if let Some(scorched) = rules.scorched_earth {
                tile.set_part(TilePart::Floor, Some(scorched));
            }
        }
        if def.explosive > 0 {
            let charge = PendingExplosive::terrain(def.explosive).stronger(tile.explosive);
            tile.explosive = Some(charge);
        }
        if def.objective {
            self.mission.objectives_destroyed += 1;
        }
        tracing::debug!("Destroyed {} at {:?}", def.name, pos);
        destroyed.push(DestroyedPart { pos, slot, part });
        Ok(())
    }

    /// Collapse parts whose supporting slot no longer holds a structural part
    fn settle_tile(
        &mut self,
        pos: Position,
        rules: &RuleSet,
        destroyed: &mut Vec<DestroyedPart>,
    ) -> Result<(), BattleError> {
        for _ in 0..MAX_SETTLE_PASSES {
            match self.first_unsupported(pos, rules)? {
                Some(slot) => self.destroy_part(pos, slot, rules, destroyed)?,
                None => return Ok(()),
            }
        }
        Err(IntegrityError::UnsettledTile(pos).into())
    }

    fn first_unsupported(
        &self,
        pos: Position,
        rules: &RuleSet,
    ) -> Result<Option<TilePart>, IntegrityError> {
        let tile = match self.tile(pos) {
            Some(tile) => tile,
            None => return Ok(None),
        };
        for (slot, part) in tile.parts() {
            let def = rules.part(part)?;
            if let Some(support) = def.depends_on {
                let supported = match tile.part(support) {
                    Some(p) => rules.part(p)?.structural,
                    None => false,
                };
                if !supported {
                    return Ok(Some(slot));
                }
            }
        }
        Ok(None)
    }

    // ========================================================================
    // LIGHTING
    // ========================================================================

    /// Recompute static light from light-emitting parts and dynamic light from fires
    pub fn calculate_lighting(&mut self, rules: &RuleSet) -> Result<(), IntegrityError> {
        let mut lamps = Vec::new();
        let mut fires = Vec::new();
        for tile in &self.tiles {
            let mut power = 0;
            for (_, part) in tile.parts() {
                power = power.max(rules.part(part)?.light_source);
            }
            if power > 0 {
                lamps.push((tile.position(), power));
            }
            if tile.fire > 0 {
                fires.push((tile.position(), FIRE_LIGHT));
            }
        }
        for tile in self.tiles.iter_mut() {
            tile.set_light(LightLayer::Static, 0);
            tile.set_light(LightLayer::Dynamic, 0);
        }
        self.spread_light(&lamps, LightLayer::Static);
        self.spread_light(&fires, LightLayer::Dynamic);
        Ok(())
    }

    /// Light falls off by one level per tile on the source's own level
    fn spread_light(&mut self, sources: &[(Position, u8)], layer: LightLayer) {
        for &(origin, power) in sources {
            let reach = power as i32;
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let pos = origin.offset(dx, dy, 0);
                    let level = reach - origin.distance_to(pos).round() as i32;
                    if level <= 0 {
                        continue;
                    }
                    if let Some(tile) = self.tile_mut(pos) {
                        if tile.light(layer) < level as u8 {
                            tile.set_light(layer, level as u8);
                        }
                    }
                }
            }
        }
    }

    // ========================================================================
    // INTEGRITY
    // ========================================================================

    /// Verify structural invariants against the ruleset
    pub fn validate(&self, rules: &RuleSet) -> Result<(), IntegrityError> {
        let expected = (self.width * self.length * self.height) as usize;
        if self.tiles.len() != expected {
            return Err(IntegrityError::TileCount { expected, found: self.tiles.len() });
        }
        for (index, tile) in self.tiles.iter().enumerate() {
            if self.tile_index(tile.position()) != Some(index) {
                return Err(IntegrityError::TileIndex { index, found: tile.position() });
            }
            for (_, part) in tile.parts() {
                rules.part(part)?;
            }
            if self.first_unsupported(tile.position(), rules)?.is_some() {
                return Err(IntegrityError::CorruptSave(format!(
                    "unsupported part at {:?}",
                    tile.position()
                )));
            }
        }
        for unit in &self.units {
            rules.unit_type(&unit.type_id)?;
        }
        for item in self.items() {
            rules.item(&item.type_id)?;
        }
        Ok(())
    }

    /// Recompute occupancy and tile inventories from units and items
    fn rebuild_links(&mut self) -> Result<(), IntegrityError> {
        for tile in self.tiles.iter_mut() {
            tile.unit = None;
            tile.inventory.clear();
        }
        for idx in 0..self.units.len() {
            if self.units[idx].id.0 as usize != idx {
                return Err(IntegrityError::MissingUnit(self.units[idx].id));
            }
            if self.units[idx].occupies_tiles() {
                let pos = self.units[idx].position;
                self.claim_footprint(UnitId(idx as u32), pos);
            }
        }
        for idx in 0..self.items.len() {
            let (id, location) = match &self.items[idx] {
                Some(item) => (item.id, item.location),
                None => continue,
            };
            if id.0 as usize != idx {
                return Err(IntegrityError::MissingItem(id));
            }
            if let ItemLocation::Ground(pos) = location {
                let tile_idx = self
                    .tile_index(pos)
                    .ok_or_else(|| {
                        IntegrityError::CorruptSave(format!("item {:?} off the map", id))
                    })?;
                self.tiles[tile_idx].inventory.push(id);
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::parts;
    use crate::unit::Faction;

    fn in_right_hand(unit: UnitId) -> ItemLocation {
        ItemLocation::Carried { unit, slot: SlotId::RightHand, x: 0, y: 0 }
    }

    fn flat_field(rules: &RuleSet) -> Battlefield {
        let mut field = Battlefield::new(10, 10, 2);
        for y in 0..10 {
            for x in 0..10 {
                field
                    .set_part(Position::new(x, y, 0), TilePart::Floor, Some(parts::GRASS))
                    .unwrap();
            }
        }
        field.validate(rules).unwrap();
        field
    }

    fn spawn(
        field: &mut Battlefield,
        rules: &RuleSet,
        kind: &str,
        faction: Faction,
        pos: Position,
    ) -> UnitId {
        let unit_type = rules.unit_type(kind).unwrap();
        let unit = Unit::from_type(UnitId(0), kind, unit_type, faction, pos, 0);
        field.add_unit(unit).unwrap()
    }

    #[test]
    fn test_linear_index() {
        let field = Battlefield::new(4, 3, 2);
        assert_eq!(field.tiles().len(), 24);
        assert_eq!(field.tile_index(Position::new(0, 0, 0)), Some(0));
        assert_eq!(field.tile_index(Position::new(3, 2, 1)), Some(23));
        assert_eq!(field.tile_index(Position::new(4, 0, 0)), None);
        assert_eq!(field.tile(Position::new(1, 2, 1)).unwrap().position(), Position::new(1, 2, 1));
        assert!(field.tile(Position::new(-1, 0, 0)).is_none());
    }

    #[test]
    fn test_exclusive_occupancy() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let a = spawn(&mut field, &rules, "soldier", Faction::Player, Position::new(2, 2, 0));
        let b = spawn(&mut field, &rules, "soldier", Faction::Player, Position::new(3, 2, 0));

        let err = field.set_unit_occupancy(b, Position::new(2, 2, 0)).unwrap_err();
        assert_eq!(err, BattleError::IllegalPlacement(PlacementReason::Occupied(a)));
        assert_eq!(field.unit(b).unwrap().position, Position::new(3, 2, 0));
        assert_eq!(field.unit_at(Position::new(3, 2, 0)), Some(b));

        field.set_unit_occupancy(b, Position::new(4, 2, 0)).unwrap();
        assert_eq!(field.unit_at(Position::new(3, 2, 0)), None);
        assert_eq!(field.unit_at(Position::new(4, 2, 0)), Some(b));

        let err = field.set_unit_occupancy(b, Position::new(10, 2, 0)).unwrap_err();
        assert!(matches!(err, BattleError::OutOfBounds(_)));
    }

    #[test]
    fn test_large_unit_footprint() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let reaper = spawn(&mut field, &rules, "reaper", Faction::Hostile, Position::new(5, 5, 0));
        let covered = [
            Position::new(5, 5, 0),
            Position::new(6, 5, 0),
            Position::new(5, 6, 0),
            Position::new(6, 6, 0),
        ];
        for pos in covered {
            assert_eq!(field.unit_at(pos), Some(reaper));
        }
        // Footprint would hang off the east edge
        assert!(matches!(
            field.set_unit_occupancy(reaper, Position::new(9, 5, 0)),
            Err(BattleError::OutOfBounds(_))
        ));
        let blocker = spawn(&mut field, &rules, "soldier", Faction::Player, Position::new(2, 3, 0));
        assert!(matches!(
            field.set_unit_occupancy(reaper, Position::new(1, 2, 0)),
            Err(BattleError::IllegalPlacement(PlacementReason::Occupied(id))) if id == blocker
        ));
    }

    #[test]
    fn test_destroy_crate_leaves_rubble() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let pos = Position::new(4, 4, 0);
        field.set_part(pos, TilePart::Object, Some(parts::CRATE)).unwrap();

        assert!(!field.apply_terrain_damage(pos, TilePart::Object, 5, &rules).unwrap());
        assert!(field.apply_terrain_damage(pos, TilePart::Object, 25, &rules).unwrap());
        assert_eq!(field.tile(pos).unwrap().part(TilePart::Object), Some(parts::RUBBLE));
    }

    #[test]
    fn test_diagonal_wall_collapse_takes_braced_walls() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let pos = Position::new(3, 3, 0);
        field.set_part(pos, TilePart::Object, Some(parts::DIAGONAL_NWSE)).unwrap();
        field.set_part(pos, TilePart::WestWall, Some(parts::BRACED_WALL_WEST)).unwrap();
        field.set_part(pos, TilePart::NorthWall, Some(parts::BRACED_WALL_NORTH)).unwrap();
        field.validate(&rules).unwrap();

        let destroyed = field.damage_part(pos, TilePart::Object, 100, &rules).unwrap();
        assert_eq!(destroyed.len(), 3);
        let tile = field.tile(pos).unwrap();
        assert_eq!(tile.part(TilePart::Object), Some(parts::RUBBLE));
        assert_eq!(tile.part(TilePart::WestWall), None);
        assert_eq!(tile.part(TilePart::NorthWall), None);
        field.validate(&rules).unwrap();
    }

    #[test]
    fn test_upper_floor_collapse_drops_objects_and_units() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let upper = Position::new(6, 6, 1);
        field.set_part(upper, TilePart::Floor, Some(parts::CONCRETE)).unwrap();
        field.set_part(upper, TilePart::Object, Some(parts::CRATE)).unwrap();
        let unit = spawn(&mut field, &rules, "soldier", Faction::Player, Position::new(6, 7, 1));
        field.set_part(Position::new(6, 7, 1), TilePart::Floor, Some(parts::CONCRETE)).unwrap();

        // Floor, crate, then the crate's rubble
        let destroyed = field.damage_part(upper, TilePart::Floor, 50, &rules).unwrap();
        assert_eq!(destroyed.len(), 3);
        assert_eq!(field.tile(upper).unwrap().part(TilePart::Object), None);

        field.damage_part(Position::new(6, 7, 1), TilePart::Floor, 50, &rules).unwrap();
        let falls = field.settle_units(&rules).unwrap();
        assert_eq!(falls.len(), 1);
        assert_eq!(field.unit(unit).unwrap().position, Position::new(6, 7, 0));
        assert_eq!(field.unit_at(Position::new(6, 7, 0)), Some(unit));
        assert_eq!(field.unit_at(Position::new(6, 7, 1)), None);
    }

    /// Appends a chain of loose debris parts, each leaving the next when destroyed
    fn with_debris_chain(rules: &mut RuleSet, links: usize, closed: bool) -> PartRef {
        let template = rules.part(parts::RUBBLE).unwrap().clone();
        let parts = &mut rules.datasets[0].parts;
        let first = parts.len();
        for i in 0..links {
            let mut def = template.clone();
            def.name = format!("debris {}", i);
            def.destroyed = if i + 1 < links {
                Some(PartRef::new(0, (first + i + 1) as u16))
            } else if closed {
                Some(PartRef::new(0, first as u16))
            } else {
                None
            };
            parts.push(def);
        }
        PartRef::new(0, first as u16)
    }

    #[test]
    fn test_collapse_follows_long_replacement_chains() {
        let mut rules = RuleSet::standard();
        let head = with_debris_chain(&mut rules, 6, false);
        let mut field = flat_field(&rules);
        let upper = Position::new(2, 2, 1);
        field.set_part(upper, TilePart::Floor, Some(parts::CONCRETE)).unwrap();
        field.set_part(upper, TilePart::Object, Some(head)).unwrap();

        // Floor plus every link in the chain
        let destroyed = field.damage_part(upper, TilePart::Floor, 50, &rules).unwrap();
        assert_eq!(destroyed.len(), 7);
        assert_eq!(field.tile(upper).unwrap().part(TilePart::Object), None);
        field.validate(&rules).unwrap();
    }

    #[test]
    fn test_cyclic_replacement_chain_is_an_integrity_error() {
        let mut rules = RuleSet::standard();
        let head = with_debris_chain(&mut rules, 3, true);
        let mut field = flat_field(&rules);
        let upper = Position::new(2, 2, 1);
        field.set_part(upper, TilePart::Floor, Some(parts::CONCRETE)).unwrap();
        field.set_part(upper, TilePart::Object, Some(head)).unwrap();

        let err = field.damage_part(upper, TilePart::Floor, 50, &rules).unwrap_err();
        assert_eq!(err, BattleError::Integrity(IntegrityError::UnsettledTile(upper)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_ground_floor_becomes_scorched_earth() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let pos = Position::new(1, 1, 0);
        field.set_part(pos, TilePart::Floor, Some(parts::CONCRETE)).unwrap();
        assert!(field.apply_terrain_damage(pos, TilePart::Floor, 45, &rules).unwrap());
        assert_eq!(field.tile(pos).unwrap().part(TilePart::Floor), Some(parts::SCORCHED_EARTH));
        // Scorched earth cannot be destroyed
        assert!(!field.apply_terrain_damage(pos, TilePart::Floor, 60000, &rules).unwrap());
    }

    #[test]
    fn test_explosive_part_arms_tile() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let pos = Position::new(7, 2, 0);
        field.set_part(pos, TilePart::Object, Some(parts::FUEL_BARREL)).unwrap();
        assert!(field.apply_terrain_damage(pos, TilePart::Object, 20, &rules).unwrap());
        let marker = field.tile(pos).unwrap().explosive.unwrap();
        assert_eq!(marker.power, 60);
    }

    #[test]
    fn test_item_lifecycle() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let unit = spawn(&mut field, &rules, "soldier", Faction::Player, Position::new(2, 2, 0));
        let rifle = field
            .add_item("rifle", in_right_hand(unit), &rules)
            .unwrap();
        let ground = ItemLocation::Ground(Position::new(2, 2, 0));
        let clip = field.add_item("rifle-clip", ground, &rules).unwrap();
        assert_eq!(field.item(clip).unwrap().rounds, 20);
        assert_eq!(field.tile(Position::new(2, 2, 0)).unwrap().inventory, vec![clip]);

        field.load_ammo(rifle, clip, &rules).unwrap();
        assert_eq!(field.item(rifle).unwrap().ammo, Some(clip));
        assert!(field.tile(Position::new(2, 2, 0)).unwrap().inventory.is_empty());

        let grenade = field.add_item("grenade", ground, &rules).unwrap();
        assert!(field.load_ammo(rifle, grenade, &rules).is_err());

        let removed = field.remove_item(rifle).unwrap();
        assert_eq!(removed.id, rifle);
        assert!(field.item(clip).is_err());
        assert!(field.unit(unit).unwrap().inventory.is_empty());
    }

    #[test]
    fn test_kill_unit_spawns_corpse() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let pos = Position::new(5, 1, 0);
        let unit = spawn(&mut field, &rules, "sectoid", Faction::Hostile, pos);
        let ally = spawn(&mut field, &rules, "sectoid", Faction::Hostile, Position::new(8, 8, 0));
        field
            .add_item("pistol", in_right_hand(unit), &rules)
            .unwrap();
        let corpse = field.kill_unit(unit, &rules).unwrap().unwrap();
        assert_eq!(field.unit_at(pos), None);
        assert_eq!(field.item(corpse).unwrap().corpse_of, Some(unit));
        assert_eq!(field.tile(pos).unwrap().inventory.len(), 2);
        assert!(field.kill_unit(unit, &rules).unwrap().is_none());
        // Bravery 80 allies lose (110 - 80) / 5 morale
        assert_eq!(field.unit(ally).unwrap().morale, 94);
    }

    #[test]
    fn test_unit_damage_and_stun() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        let pos = Position::new(3, 3, 0);
        let unit = spawn(&mut field, &rules, "soldier", Faction::Player, pos);

        let harm = field.apply_unit_damage(unit, 20, DamageType::Stun, &rules).unwrap();
        assert_eq!((harm.damage, harm.stun), (0, 20));
        assert!(!harm.knocked_out);

        let harm = field.apply_unit_damage(unit, 16, DamageType::Stun, &rules).unwrap();
        assert!(harm.knocked_out);
        assert_eq!(field.unit(unit).unwrap().status, UnitStatus::Unconscious);
        assert_eq!(field.unit_at(pos), None);
        assert_eq!(field.units_on(pos), vec![unit]);

        let harm = field.apply_unit_damage(unit, 100, DamageType::Kinetic, &rules).unwrap();
        assert!(harm.killed);
        assert!(field.units_on(pos).is_empty());
        let harm = field.apply_unit_damage(unit, 100, DamageType::Kinetic, &rules).unwrap();
        assert_eq!(harm.damage, 0);
    }

    #[test]
    fn test_lamps_and_fires_light_the_night() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        field.set_part(Position::new(1, 1, 0), TilePart::Object, Some(parts::LAMP)).unwrap();
        field.tile_mut(Position::new(8, 8, 0)).unwrap().fire = 2;
        field.calculate_lighting(&rules).unwrap();

        let light =
            |f: &Battlefield, x, y, layer| f.tile(Position::new(x, y, 0)).unwrap().light(layer);
        assert_eq!(light(&field, 1, 1, LightLayer::Static), 15);
        assert_eq!(light(&field, 4, 1, LightLayer::Static), 12);
        assert_eq!(light(&field, 8, 7, LightLayer::Dynamic), 11);
        // Fire light falls off one level per tile: 12 - round(9.9) at the far corner
        assert_eq!(light(&field, 1, 1, LightLayer::Dynamic), 2);
        // Upper level stays dark
        assert_eq!(field.tile(Position::new(1, 1, 1)).unwrap().light(LightLayer::Static), 0);

        field.tile_mut(Position::new(8, 8, 0)).unwrap().fire = 0;
        field.calculate_lighting(&rules).unwrap();
        assert_eq!(light(&field, 8, 7, LightLayer::Dynamic), 0);
        let lamp_lit = field.tile(Position::new(2, 2, 0)).unwrap().light_level(15);
        assert!(lamp_lit >= crate::tile::DARK_THRESHOLD);
    }

    #[test]
    fn test_validate_detects_missing_part() {
        let rules = RuleSet::standard();
        let mut field = flat_field(&rules);
        field.set_part(Position::new(0, 0, 1), TilePart::Object, Some(PartRef::new(3, 0))).unwrap();
        assert!(matches!(field.validate(&rules), Err(IntegrityError::MissingMapPart(_))));
    }
}
