//! Line of sight and fog of war

use crate::battlefield::Battlefield;
use crate::config::BattleConfig;
use crate::error::BattleError;
use crate::position::{Position, Voxel, DIRECTIONS};
use crate::ruleset::RuleSet;
use crate::tile::Section;
use crate::unit::{Faction, UnitId};
use crate::voxel::{CheckMode, Raycaster, VoxelType};
use std::collections::BTreeSet;

/// Smoke turns along a sight line that hide whatever is behind
pub const SMOKE_SIGHT_LIMIT: u32 = 6;

/// Height inside a tile that sight lines aim at
const SIGHT_TARGET_HEIGHT: i32 = 12;

/// Changes produced by one visibility pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibilityDelta {
    pub newly_visible: Vec<Position>,
    pub newly_discovered: Vec<(Position, Section)>,
    /// Enemy units that were not visible before this pass
    pub spotted_units: Vec<UnitId>,
}

impl VisibilityDelta {
    pub fn is_empty(&self) -> bool {
        self.newly_visible.is_empty()
            && self.newly_discovered.is_empty()
            && self.spotted_units.is_empty()
    }

    pub fn merge(&mut self, other: VisibilityDelta) {
        self.newly_visible.extend(other.newly_visible);
        self.newly_discovered.extend(other.newly_discovered);
        for unit in other.spotted_units {
            if !self.spotted_units.contains(&unit) {
                self.spotted_units.push(unit);
            }
        }
    }
}

/// Recompute one unit's visible tiles and units
pub fn compute_visibility(
    field: &mut Battlefield,
    rules: &RuleSet,
    unit_id: UnitId,
    config: &BattleConfig,
) -> Result<VisibilityDelta, BattleError> {
    if !field.unit(unit_id)?.is_active() {
        let unit = field.unit_mut(unit_id)?;
        unit.visible_tiles.clear();
        unit.visible_units.clear();
        return Ok(VisibilityDelta::default());
    }

    let unit = field.unit(unit_id)?;
    let origin = unit.position;
    let faction = unit.faction;
    let facing = DIRECTIONS[unit.facing as usize % 8];
    let own_tiles = unit.footprint();
    let eye = field.eye_voxel(unit_id, rules)?;
    let previous_units = unit.visible_units.clone();

    let mut visible: BTreeSet<Position> = own_tiles.iter().copied().collect();
    {
        let ray = Raycaster::new(field, rules);
        let (_, _, height) = field.dimensions();
        let range = config.max_view_distance;
        for z in 0..height {
            for y in (origin.y - range)..=(origin.y + range) {
                for x in (origin.x - range)..=(origin.x + range) {
                    let target = Position::new(x, y, z);
                    if visible.contains(&target) || !field.in_bounds(target) {
                        continue;
                    }
                    let distance = origin.distance_to(target);
                    if distance > range as f64 || !in_cone(origin, facing, target) {
                        continue;
                    }
                    let dark = field.tile(target).is_some_and(|t| t.is_dark(config.shade));
                    if dark && distance > config.dark_view_distance as f64 {
                        continue;
                    }
                    if line_of_sight(field, &ray, eye, target)? {
                        visible.insert(target);
                    }
                }
            }
        }
    }

    let mut visible_units = Vec::new();
    for other in field.units() {
        if other.id == unit_id || !other.is_active() {
            continue;
        }
        if other.footprint().iter().any(|p| visible.contains(p)) {
            visible_units.push(other.id);
        }
    }
    let spotted_units: Vec<UnitId> = visible_units
        .iter()
        .copied()
        .filter(|id| !previous_units.contains(id))
        .filter(|&id| field.unit(id).is_ok_and(|u| u.faction.is_enemy_of(faction)))
        .collect();

    let mut delta = VisibilityDelta { spotted_units, ..Default::default() };
    {
        let unit = field.unit(unit_id)?;
        delta.newly_visible =
            visible.iter().copied().filter(|p| !unit.visible_tiles.contains(p)).collect();
    }

    if faction == Faction::Player {
        for &pos in &visible {
            delta.newly_discovered.extend(discover_around(field, pos));
        }
    }

    let unit = field.unit_mut(unit_id)?;
    unit.visible_tiles = visible;
    unit.visible_units = visible_units;
    Ok(delta)
}

/// Whether `target` lies inside the 90 degree cone around `facing`
fn in_cone(origin: Position, facing: (i32, i32), target: Position) -> bool {
    let (tx, ty) = (target.x - origin.x, target.y - origin.y);
    if tx == 0 && ty == 0 {
        return true;
    }
    let (fx, fy) = facing;
    let dot = (fx * tx + fy * ty) as f64;
    let norms = (((fx * fx + fy * fy) * (tx * tx + ty * ty)) as f64).sqrt();
    dot >= norms * std::f64::consts::FRAC_1_SQRT_2 - 1e-9
}

/// Sight-mode trace to the middle of `target`, with smoke accumulated on the way
fn line_of_sight(
    field: &Battlefield,
    ray: &Raycaster<'_>,
    eye: Voxel,
    target: Position,
) -> Result<bool, BattleError> {
    let trace =
        ray.calculate_line(eye, target.to_voxel(SIGHT_TARGET_HEIGHT), None, CheckMode::Sight)?;
    if trace.hit != VoxelType::Empty && trace.impact.to_tile() != target {
        return Ok(false);
    }

    let eye_tile = eye.to_tile();
    let mut smoke = 0u32;
    let mut last = eye_tile;
    for voxel in &trace.trajectory {
        let tile = voxel.to_tile();
        if tile == last {
            continue;
        }
        last = tile;
        if tile == target {
            break;
        }
        smoke += field.tile(tile).map_or(0, |t| t.smoke as u32);
    }
    Ok(smoke < SMOKE_SIGHT_LIMIT)
}

/// Discover a visible tile plus the wall sections bordering it from the east and south
fn discover_around(field: &mut Battlefield, pos: Position) -> Vec<(Position, Section)> {
    let mut discovered = Vec::new();
    let targets = [
        (pos, Section::Content),
        (pos, Section::WestWall),
        (pos, Section::NorthWall),
        (pos.offset(1, 0, 0), Section::WestWall),
        (pos.offset(0, 1, 0), Section::NorthWall),
    ];
    for (tile_pos, section) in targets {
        if let Some(tile) = field.tile_mut(tile_pos) {
            if tile.discover(section) {
                discovered.push((tile_pos, section));
            }
        }
    }
    discovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::parts;
    use crate::tile::TilePart;
    use crate::unit::Unit;

    fn arena() -> (Battlefield, RuleSet) {
        let rules = RuleSet::standard();
        let mut field = Battlefield::new(16, 16, 1);
        for y in 0..16 {
            for x in 0..16 {
                field
                    .set_part(Position::new(x, y, 0), TilePart::Floor, Some(parts::GRASS))
                    .unwrap();
            }
        }
        (field, rules)
    }

    fn place(
        field: &mut Battlefield,
        rules: &RuleSet,
        kind: &str,
        faction: Faction,
        pos: Position,
        facing: u8,
    ) -> UnitId {
        let unit_type = rules.unit_type(kind).unwrap();
        let unit = Unit::from_type(UnitId(0), kind, unit_type, faction, pos, facing);
        field.add_unit(unit).unwrap()
    }

    #[test]
    fn test_facing_cone() {
        let (mut field, rules) = arena();
        // Facing east
        let scout =
            place(&mut field, &rules, "soldier", Faction::Player, Position::new(2, 8, 0), 2);
        let delta =
            compute_visibility(&mut field, &rules, scout, &BattleConfig::default()).unwrap();
        let unit = field.unit(scout).unwrap();
        assert!(unit.can_see_tile(Position::new(2, 8, 0)));
        assert!(unit.can_see_tile(Position::new(10, 8, 0)));
        assert!(unit.can_see_tile(Position::new(6, 5, 0)));
        assert!(!unit.can_see_tile(Position::new(1, 8, 0)));
        assert!(!unit.can_see_tile(Position::new(3, 12, 0)));
        assert!(delta.newly_visible.contains(&Position::new(10, 8, 0)));
    }

    #[test]
    fn test_walls_and_smoke_block_sight() {
        let (mut field, rules) = arena();
        field.set_part(Position::new(6, 8, 0), TilePart::WestWall, Some(parts::WALL_WEST)).unwrap();
        field.tile_mut(Position::new(4, 4, 0)).unwrap().smoke = 8;
        let scout =
            place(&mut field, &rules, "soldier", Faction::Player, Position::new(2, 8, 0), 2);
        compute_visibility(&mut field, &rules, scout, &BattleConfig::default()).unwrap();
        let unit = field.unit(scout).unwrap();
        // The wall's own tile is seen, the tiles right behind it are not
        assert!(
            unit.can_see_tile(Position::new(6, 8, 0)) || unit.can_see_tile(Position::new(5, 8, 0))
        );
        assert!(!unit.can_see_tile(Position::new(8, 8, 0)));

        // Looking into the smoke works, looking through it does not
        field.unit_mut(scout).unwrap().facing = 1;
        compute_visibility(&mut field, &rules, scout, &BattleConfig::default()).unwrap();
        let unit = field.unit(scout).unwrap();
        assert!(unit.can_see_tile(Position::new(4, 4, 0)));
        assert!(!unit.can_see_tile(Position::new(6, 0, 0)));
    }

    #[test]
    fn test_darkness_limits_range() {
        let (mut field, rules) = arena();
        let scout =
            place(&mut field, &rules, "soldier", Faction::Player, Position::new(1, 8, 0), 2);
        let night = BattleConfig::default().with_shade(15);
        compute_visibility(&mut field, &rules, scout, &night).unwrap();
        let unit = field.unit(scout).unwrap();
        assert!(unit.can_see_tile(Position::new(9, 8, 0)));
        assert!(!unit.can_see_tile(Position::new(12, 8, 0)));
    }

    #[test]
    fn test_discovery_is_monotonic_and_includes_neighbor_walls() {
        let (mut field, rules) = arena();
        let scout =
            place(&mut field, &rules, "soldier", Faction::Player, Position::new(2, 8, 0), 2);
        let delta =
            compute_visibility(&mut field, &rules, scout, &BattleConfig::default()).unwrap();
        assert!(delta.newly_discovered.contains(&(Position::new(5, 8, 0), Section::Content)));
        // South neighbor's north wall of a visible tile
        let tile = field.tile(Position::new(2, 9, 0)).unwrap();
        assert!(tile.is_discovered(Section::NorthWall));

        // Turn around: nothing is forgotten
        field.unit_mut(scout).unwrap().facing = 6;
        let delta =
            compute_visibility(&mut field, &rules, scout, &BattleConfig::default()).unwrap();
        assert!(!delta.newly_discovered.contains(&(Position::new(5, 8, 0), Section::Content)));
        assert!(field.tile(Position::new(5, 8, 0)).unwrap().is_discovered(Section::Content));
    }

    #[test]
    fn test_spotting_enemies() {
        let (mut field, rules) = arena();
        let scout =
            place(&mut field, &rules, "soldier", Faction::Player, Position::new(2, 8, 0), 2);
        let enemy =
            place(&mut field, &rules, "sectoid", Faction::Hostile, Position::new(9, 8, 0), 6);
        let civilian =
            place(&mut field, &rules, "civilian", Faction::Neutral, Position::new(9, 9, 0), 6);

        let delta =
            compute_visibility(&mut field, &rules, scout, &BattleConfig::default()).unwrap();
        assert_eq!(delta.spotted_units, vec![enemy]);
        let seen = &field.unit(scout).unwrap().visible_units;
        assert!(seen.contains(&enemy) && seen.contains(&civilian));

        let again =
            compute_visibility(&mut field, &rules, scout, &BattleConfig::default()).unwrap();
        assert!(again.spotted_units.is_empty());

        // Hostiles do not touch the player's fog of war
        let before = field.tile(Position::new(3, 3, 0)).unwrap().is_discovered(Section::Content);
        let delta =
            compute_visibility(&mut field, &rules, enemy, &BattleConfig::default()).unwrap();
        assert!(delta.newly_discovered.is_empty());
        let content = field.tile(Position::new(3, 3, 0)).unwrap().is_discovered(Section::Content);
        assert_eq!(content, before);
        assert!(delta.spotted_units.contains(&scout));
    }
}
