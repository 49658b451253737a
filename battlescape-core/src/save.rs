//! Save and restore
//!
//! A save has two halves: a JSON document with everything that is not a
//! tile (units, items, turn state, the RNG, mission data) and a bincode
//! blob with the tile array in index order.

use crate::battle::Battle;
use crate::battlefield::{Battlefield, MissionInfo};
use crate::config::BattleConfig;
use crate::error::{BattleError, IntegrityError};
use crate::item::{Item, ItemId};
use crate::position::Position;
use crate::ruleset::RuleSet;
use crate::tile::{PartRef, PendingExplosive, Tile};
use crate::turn::TurnController;
use crate::unit::Unit;
use anyhow::Context;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const SAVE_VERSION: u32 = 1;

const DOCUMENT_FILE: &str = "battle.json";
const TILES_FILE: &str = "tiles.bin";

/// Serialized battle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleSave {
    pub document: String,
    pub tiles: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct BattleDocument {
    version: u32,
    dimensions: (i32, i32, i32),
    config: BattleConfig,
    mission: MissionInfo,
    turn: TurnController,
    rng: ChaCha8Rng,
    units: Vec<Unit>,
    items: Vec<Option<Item>>,
}

/// Per-tile record in the binary half
#[derive(Serialize, Deserialize)]
struct TileRecord {
    parts: [Option<PartRef>; 4],
    fire: u8,
    smoke: u8,
    light: [u8; 3],
    discovered: u8,
    explosive: Option<PendingExplosive>,
    inventory: Vec<ItemId>,
}

impl TileRecord {
    fn from_tile(tile: &Tile) -> Self {
        Self {
            parts: tile.raw_parts(),
            fire: tile.fire,
            smoke: tile.smoke,
            light: tile.raw_light(),
            discovered: tile.discovered_bits(),
            explosive: tile.explosive,
            inventory: tile.inventory.clone(),
        }
    }

    fn to_tile(&self, pos: Position) -> Tile {
        let mut tile =
            Tile::from_raw(pos, self.parts, self.fire, self.smoke, self.light, self.discovered);
        tile.explosive = self.explosive;
        tile
    }
}

fn corrupt(err: impl std::fmt::Display) -> BattleError {
    IntegrityError::CorruptSave(err.to_string()).into()
}

/// Serialize a battle between actions
pub fn save_battle(battle: &Battle) -> Result<BattleSave, BattleError> {
    if battle.is_busy() {
        return Err(BattleError::ActionInProgress);
    }
    let field = battle.field();
    let document = BattleDocument {
        version: SAVE_VERSION,
        dimensions: field.dimensions(),
        config: battle.config().clone(),
        mission: field.mission.clone(),
        turn: battle.turn_controller().clone(),
        rng: battle.rng().clone(),
        units: field.units().to_vec(),
        items: field.raw_items().to_vec(),
    };
    let records: Vec<TileRecord> = field.tiles().iter().map(TileRecord::from_tile).collect();

    let save = BattleSave {
        document: serde_json::to_string_pretty(&document).map_err(corrupt)?,
        tiles: bincode::serialize(&records).map_err(corrupt)?,
    };
    tracing::debug!(
        "Saved battle: {} byte document, {} byte tile blob",
        save.document.len(),
        save.tiles.len()
    );
    Ok(save)
}

/// Rebuild a battle from a save against the given ruleset
pub fn restore_battle(save: &BattleSave, rules: Arc<RuleSet>) -> Result<Battle, BattleError> {
    let document: BattleDocument = serde_json::from_str(&save.document).map_err(corrupt)?;
    if document.version != SAVE_VERSION {
        return Err(corrupt(format!("unsupported save version {}", document.version)));
    }
    let records: Vec<TileRecord> = bincode::deserialize(&save.tiles).map_err(corrupt)?;

    let (width, length, height) = document.dimensions;
    let expected = (width.max(0) * length.max(0) * height.max(0)) as usize;
    if records.len() != expected {
        return Err(IntegrityError::TileCount { expected, found: records.len() }.into());
    }
    let mut tiles = Vec::with_capacity(records.len());
    for z in 0..height {
        for y in 0..length {
            for x in 0..width {
                let record = &records[tiles.len()];
                tiles.push(record.to_tile(Position::new(x, y, z)));
            }
        }
    }

    let mut field = Battlefield::from_parts(
        document.dimensions,
        tiles,
        document.units,
        document.items,
        document.mission,
    )?;
    // Keep the saved drop order on each tile
    for (tile, record) in field.tiles_mut().iter_mut().zip(&records) {
        tile.inventory.clone_from(&record.inventory);
    }
    let battle = Battle::from_parts(field, rules, document.config, document.turn, document.rng)?;
    tracing::info!("Restored battle at turn {} ({:?})", battle.turn_number(), battle.phase());
    Ok(battle)
}

/// Write `battle.json` and `tiles.bin` into `dir`
pub fn save_to_dir(battle: &Battle, dir: &Path) -> anyhow::Result<()> {
    let save = save_battle(battle)?;
    std::fs::create_dir_all(dir).context("Failed to create save directory")?;
    std::fs::write(dir.join(DOCUMENT_FILE), &save.document)
        .context("Failed to write battle document")?;
    std::fs::write(dir.join(TILES_FILE), &save.tiles).context("Failed to write tile data")?;
    Ok(())
}

/// Read a save written by [`save_to_dir`]
pub fn load_from_dir(dir: &Path, rules: Arc<RuleSet>) -> anyhow::Result<Battle> {
    let document = std::fs::read_to_string(dir.join(DOCUMENT_FILE))
        .context("Failed to read battle document")?;
    let tiles = std::fs::read(dir.join(TILES_FILE)).context("Failed to read tile data")?;
    Ok(restore_battle(&BattleSave { document, tiles }, rules)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionTarget, BattleAction, BattleActionType};
    use crate::item::{ItemLocation, SlotId};
    use crate::ruleset::{parts, DamageType};
    use crate::tile::{Section, TilePart};
    use crate::unit::{Faction, UnitId};

    fn skirmish() -> Battle {
        let rules = Arc::new(RuleSet::standard());
        let mut field = Battlefield::new(10, 10, 2);
        for y in 0..10 {
            for x in 0..10 {
                field
                    .set_part(Position::new(x, y, 0), TilePart::Floor, Some(parts::GRASS))
                    .unwrap();
            }
        }
        field.set_part(Position::new(4, 4, 0), TilePart::Object, Some(parts::CRATE)).unwrap();
        field.mission = MissionInfo {
            name: "Farm".into(),
            objectives_total: 2,
            objectives_destroyed: 1,
        };
        let soldier = rules.unit_type("soldier").unwrap();
        let sectoid = rules.unit_type("sectoid").unwrap();
        let rookie = field
            .add_unit(Unit::from_type(
                UnitId(0),
                "Rookie",
                soldier,
                Faction::Player,
                Position::new(1, 1, 0),
                3,
            ))
            .unwrap();
        field
            .add_unit(Unit::from_type(
                UnitId(0),
                "Grey",
                sectoid,
                Faction::Hostile,
                Position::new(8, 8, 0),
                7,
            ))
            .unwrap();
        let rifle = field
            .add_item(
                "rifle",
                ItemLocation::Carried { unit: rookie, slot: SlotId::RightHand, x: 0, y: 0 },
                &rules,
            )
            .unwrap();
        field.add_item("rifle-clip", ItemLocation::Loaded { weapon: rifle }, &rules).unwrap();
        field.add_item("grenade", ItemLocation::Ground(Position::new(2, 2, 0)), &rules).unwrap();
        field.add_item("medikit", ItemLocation::Ground(Position::new(2, 2, 0)), &rules).unwrap();
        {
            let tile = field.tile_mut(Position::new(6, 6, 0)).unwrap();
            tile.fire = 3;
            tile.smoke = 2;
            tile.explosive = Some(PendingExplosive {
                power: 50,
                damage_type: DamageType::Explosive,
                radius: 3,
                source: Some(rookie),
            });
        }
        Battle::new(field, rules, BattleConfig::default().with_seed(99)).unwrap()
    }

    #[test]
    fn test_round_trip_is_exact() {
        let mut battle = skirmish();
        let mut action = BattleAction::move_to(UnitId(0), Position::new(3, 2, 0));
        battle.execute(&mut action).unwrap();
        battle.end_turn().unwrap();

        let save = save_battle(&battle).unwrap();
        let restored = restore_battle(&save, battle.rules_handle()).unwrap();
        assert_eq!(restored.field(), battle.field());
        assert_eq!(restored.turn_controller(), battle.turn_controller());
        assert_eq!(restored.config(), battle.config());
        assert_eq!(restored.rng(), battle.rng());
        let tile_at = |pos: Position| restored.field().tile(pos).unwrap();
        assert!(tile_at(Position::new(3, 3, 0)).is_discovered(Section::Content));
        assert_eq!(tile_at(Position::new(6, 6, 0)).explosive.map(|e| e.power), Some(50));

        // Same state, same future
        let again = save_battle(&restored).unwrap();
        assert_eq!(again, save);
    }

    #[test]
    fn test_cannot_save_mid_flight() {
        let mut battle = skirmish();
        let mut shot = BattleAction::new(UnitId(0), BattleActionType::SnapShot)
            .with_target(ActionTarget::Tile(Position::new(9, 1, 0)));
        battle.execute(&mut shot).unwrap();
        assert_eq!(save_battle(&battle).unwrap_err(), BattleError::ActionInProgress);
        battle.skip_projectile().unwrap();
        assert!(save_battle(&battle).is_ok());
    }

    #[test]
    fn test_corrupt_tiles_rejected() {
        let battle = skirmish();
        let mut save = save_battle(&battle).unwrap();
        save.tiles.truncate(save.tiles.len() / 2);
        let err = restore_battle(&save, battle.rules_handle()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_directory_round_trip() {
        let battle = skirmish();
        let dir = std::env::temp_dir().join(format!("battlescape-save-{}", std::process::id()));
        save_to_dir(&battle, &dir).unwrap();
        let restored = load_from_dir(&dir, battle.rules_handle()).unwrap();
        assert_eq!(restored.field(), battle.field());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
