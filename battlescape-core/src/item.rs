//! Items and unit inventories

use crate::position::Position;
use crate::unit::UnitId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Item handle (index into the battlefield's item arena)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Inventory slot on a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotId {
    RightHand,
    LeftHand,
    Belt,
    Backpack,
    RightShoulder,
    LeftShoulder,
    RightLeg,
    LeftLeg,
}

impl SlotId {
    pub fn is_hand(self) -> bool {
        matches!(self, SlotId::RightHand | SlotId::LeftHand)
    }
}

/// Grid dimensions of a slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    pub width: u8,
    pub height: u8,
    /// Hands hold exactly one item of any size
    pub single_item: bool,
}

const fn grid(width: u8, height: u8) -> SlotLayout {
    SlotLayout { width, height, single_item: false }
}

pub fn slot_layout(slot: SlotId) -> SlotLayout {
    match slot {
        SlotId::RightHand | SlotId::LeftHand => {
            SlotLayout { width: 2, height: 3, single_item: true }
        }
        SlotId::Belt => grid(4, 2),
        SlotId::Backpack => grid(3, 3),
        SlotId::RightShoulder | SlotId::LeftShoulder => grid(2, 1),
        SlotId::RightLeg | SlotId::LeftLeg => grid(2, 1),
    }
}

/// Where an item currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemLocation {
    Ground(Position),
    Carried { unit: UnitId, slot: SlotId, x: u8, y: u8 },
    Loaded { weapon: ItemId },
}

/// An item instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub type_id: String,
    pub location: ItemLocation,
    /// Loaded clip for firearms
    pub ammo: Option<ItemId>,
    pub rounds: u16,
    /// Turns left before a primed grenade goes off
    pub fuse: Option<u8>,
    pub corpse_of: Option<UnitId>,
}

impl Item {
    pub fn new(id: ItemId, type_id: &str, location: ItemLocation) -> Self {
        Self {
            id,
            type_id: type_id.to_string(),
            location,
            ammo: None,
            rounds: 0,
            fuse: None,
            corpse_of: None,
        }
    }

    pub fn is_primed(&self) -> bool {
        self.fuse.is_some()
    }
}

/// Why an item cannot go where asked
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("item does not fit inside the slot")]
    OutsideSlot,
    #[error("slot cell already holds {0:?}")]
    Overlap(ItemId),
    #[error("slot already holds an item")]
    SlotFull,
}

/// An item anchored at a slot cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub slot: SlotId,
    pub x: u8,
    pub y: u8,
    pub item: ItemId,
    pub size: (u8, u8),
}

/// Unit inventory keyed by (slot, x, y) of each item's top-left cell
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Placement>", into = "Vec<Placement>")]
pub struct Inventory {
    cells: BTreeMap<(SlotId, u8, u8), (ItemId, (u8, u8))>,
}

impl From<Vec<Placement>> for Inventory {
    fn from(placements: Vec<Placement>) -> Self {
        let cells = placements
            .into_iter()
            .map(|p| ((p.slot, p.x, p.y), (p.item, p.size)))
            .collect();
        Self { cells }
    }
}

impl From<Inventory> for Vec<Placement> {
    fn from(inv: Inventory) -> Self {
        inv.placements().collect()
    }
}

impl Inventory {
    pub fn placements(&self) -> impl Iterator<Item = Placement> + '_ {
        self.cells.iter().map(|(&(slot, x, y), &(item, size))| Placement { slot, x, y, item, size })
    }

    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.cells.values().map(|&(item, _)| item)
    }

    pub fn in_slot(&self, slot: SlotId) -> impl Iterator<Item = ItemId> + '_ {
        self.cells
            .iter()
            .filter(move |(key, _)| key.0 == slot)
            .map(|(_, value)| value.0)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn find(&self, item: ItemId) -> Option<Placement> {
        self.placements().find(|p| p.item == item)
    }

    /// Pure check: can an item of `size` be anchored at (slot, x, y)?
    pub fn check_placement(
        &self,
        slot: SlotId,
        x: u8,
        y: u8,
        size: (u8, u8),
    ) -> Result<(), PlacementError> {
        check_placement(self, slot, x, y, size)
    }

    pub fn insert(
        &mut self,
        slot: SlotId,
        x: u8,
        y: u8,
        item: ItemId,
        size: (u8, u8),
    ) -> Result<(), PlacementError> {
        self.check_placement(slot, x, y, size)?;
        self.cells.insert((slot, x, y), (item, size));
        Ok(())
    }

    pub fn remove(&mut self, item: ItemId) -> Option<Placement> {
        let placement = self.find(item)?;
        self.cells.remove(&(placement.slot, placement.x, placement.y));
        Some(placement)
    }

    /// First free anchor for `size`, searching slots in the given order
    pub fn first_fit(&self, slots: &[SlotId], size: (u8, u8)) -> Option<(SlotId, u8, u8)> {
        for &slot in slots {
            let layout = slot_layout(slot);
            for y in 0..layout.height {
                for x in 0..layout.width {
                    if self.check_placement(slot, x, y, size).is_ok() {
                        return Some((slot, x, y));
                    }
                }
            }
        }
        None
    }
}

/// Capacity and overlap rules for a slot
pub fn check_placement(
    inv: &Inventory,
    slot: SlotId,
    x: u8,
    y: u8,
    size: (u8, u8),
) -> Result<(), PlacementError> {
    let layout = slot_layout(slot);
    if layout.single_item {
        if x != 0 || y != 0 {
            return Err(PlacementError::OutsideSlot);
        }
        return match inv.in_slot(slot).next() {
            Some(_) => Err(PlacementError::SlotFull),
            None => Ok(()),
        };
    }

    let (w, h) = size;
    if x as u16 + w as u16 > layout.width as u16 || y as u16 + h as u16 > layout.height as u16 {
        return Err(PlacementError::OutsideSlot);
    }

    for p in inv.placements().filter(|p| p.slot == slot) {
        if rects_overlap((x, y, w, h), (p.x, p.y, p.size.0, p.size.1)) {
            return Err(PlacementError::Overlap(p.item));
        }
    }
    Ok(())
}

fn rects_overlap(a: (u8, u8, u8, u8), b: (u8, u8, u8, u8)) -> bool {
    let (ax, ay, aw, ah) = a;
    let (bx, by, bw, bh) = b;
    ax < bx + bw && bx < ax + aw && ay < by + bh && by < ay + ah
}
