//! Movement-cost pathfinding over the tile graph
//!
//! Dijkstra search with a binary heap. Ties between equal-cost frontier
//! entries break on insertion order, and neighbors are expanded in
//! direction order 0..9, so results are reproducible.
//!
//! The pathfinder only ever borrows the battlefield immutably: a preview
//! search cannot move or re-occupy anything.

use crate::battlefield::{Battlefield, STAIRS_TOP};
use crate::error::{BattleError, IntegrityError, PlacementReason};
use crate::position::{is_diagonal, Position, DIRECTIONS, DIR_DOWN, DIR_UP};
use crate::ruleset::{BigWall, MapPartDef, MovementType, RuleSet, IMPASSABLE};
use crate::tile::TilePart;
use crate::unit::{footprint, UnitId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Extra TU for opening a door on the way through
pub const DOOR_SURCHARGE: u32 = 4;
/// Extra TU for any step up
pub const ELEVATION_SURCHARGE: u32 = 2;
/// TU for moving one level up or down
pub const VERTICAL_COST: u32 = 8;
/// Highest climb in voxels a single step may take
pub const MAX_CLIMB: i32 = 8;
/// Base cost of crossing a tile with no floor (fliers)
const AIR_COST: u32 = 4;

/// Energy spent for a step of `tu` time units
pub fn energy_for(tu: u32) -> u32 {
    (tu / 2).max(1)
}

// ============================================================================
// REQUEST / RESULT TYPES
// ============================================================================

/// A path query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathRequest {
    pub unit: UnitId,
    pub origin: Position,
    pub destination: Position,
    pub tu_budget: u32,
    pub movement: MovementType,
    /// Produce an overlay instead of failing on an unaffordable path
    pub preview_only: bool,
}

/// One step of a path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub direction: u8,
    /// Tile reached by this step
    pub position: Position,
    pub tu_cost: u32,
    pub energy_cost: u32,
}

/// Overlay marker for one step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewMarker {
    pub position: Position,
    pub direction: u8,
    pub running_tu: u32,
    pub affordable: bool,
}

/// Path overlay for the presentation layer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathPreview {
    pub markers: Vec<PreviewMarker>,
}

impl PathPreview {
    /// Index of the last step the budget covers
    pub fn affordable_steps(&self) -> usize {
        self.markers.iter().take_while(|m| m.affordable).count()
    }
}

/// A found path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    pub origin: Position,
    pub steps: Vec<PathStep>,
    pub total_tu: u32,
    pub total_energy: u32,
    pub preview: Option<PathPreview>,
}

impl Path {
    pub fn destination(&self) -> Position {
        self.steps.last().map(|s| s.position).unwrap_or(self.origin)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ============================================================================
// FRONTIER ORDERING
// ============================================================================

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    cost: u32,
    seq: u64,
    pos: Position,
}

// Min-heap on cost, then on insertion sequence
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// PATHFINDER
// ============================================================================

/// Settled cost per tile and the step that reached it
type SearchMaps = (FxHashMap<Position, u32>, FxHashMap<Position, (Position, u8, u32)>);

/// Read-only search context
pub struct Pathfinder<'a> {
    field: &'a Battlefield,
    rules: &'a RuleSet,
}

impl<'a> Pathfinder<'a> {
    pub fn new(field: &'a Battlefield, rules: &'a RuleSet) -> Self {
        Self { field, rules }
    }

    /// Cheapest path for the request
    pub fn find_path(&self, request: &PathRequest) -> Result<Path, BattleError> {
        let destination = request.destination;
        let size = self.field.unit(request.unit)?.size;
        for tile_pos in footprint(destination, size) {
            if !self.field.in_bounds(tile_pos) {
                return Err(BattleError::OutOfBounds(destination));
            }
        }
        for tile_pos in footprint(destination, size) {
            if let Some(other) = self.field.unit_at(tile_pos) {
                if other != request.unit {
                    return Err(BattleError::IllegalPlacement(PlacementReason::Occupied(other)));
                }
            }
        }

        let (costs, came_from) =
            self.search(request.unit, request.origin, request.movement, Some(destination), None)?;
        let total_tu = match costs.get(&destination) {
            Some(&cost) => cost,
            None => {
                tracing::debug!("No path from {:?} to {:?}", request.origin, destination);
                return Err(BattleError::PathUnavailable { destination });
            }
        };

        let mut steps = Vec::new();
        let mut cursor = destination;
        while cursor != request.origin {
            let (prev, direction, tu_cost) = match came_from.get(&cursor) {
                Some(&link) => link,
                None => return Err(BattleError::PathUnavailable { destination }),
            };
            steps.push(PathStep {
                direction,
                position: cursor,
                tu_cost,
                energy_cost: energy_for(tu_cost),
            });
            cursor = prev;
        }
        steps.reverse();
        let total_energy = steps.iter().map(|s| s.energy_cost).sum();

        tracing::debug!(
            "Path {:?} -> {:?}: {} steps, {} TU (budget {})",
            request.origin,
            destination,
            steps.len(),
            total_tu,
            request.tu_budget
        );

        if request.preview_only {
            let mut running = 0;
            let markers = steps
                .iter()
                .map(|step| {
                    running += step.tu_cost;
                    PreviewMarker {
                        position: step.position,
                        direction: step.direction,
                        running_tu: running,
                        affordable: running <= request.tu_budget,
                    }
                })
                .collect();
            return Ok(Path {
                origin: request.origin,
                steps,
                total_tu,
                total_energy,
                preview: Some(PathPreview { markers }),
            });
        }

        if total_tu > request.tu_budget {
            return Err(BattleError::InsufficientTimeUnits {
                required: total_tu,
                available: request.tu_budget,
            });
        }
        Ok(Path { origin: request.origin, steps, total_tu, total_energy, preview: None })
    }

    /// Every tile reachable within `budget`, with its cheapest cost
    pub fn reachable(
        &self,
        unit: UnitId,
        origin: Position,
        budget: u32,
        movement: MovementType,
    ) -> Result<FxHashMap<Position, u32>, IntegrityError> {
        let (costs, _) = self.search(unit, origin, movement, None, Some(budget))?;
        Ok(costs)
    }

    fn search(
        &self,
        unit: UnitId,
        origin: Position,
        movement: MovementType,
        goal: Option<Position>,
        limit: Option<u32>,
    ) -> Result<SearchMaps, IntegrityError> {
        let mut costs: FxHashMap<Position, u32> = FxHashMap::default();
        let mut came_from: FxHashMap<Position, (Position, u8, u32)> = FxHashMap::default();
        let mut settled: FxHashSet<Position> = FxHashSet::default();
        let mut open = BinaryHeap::new();
        let mut seq = 0u64;

        costs.insert(origin, 0);
        open.push(State { cost: 0, seq, pos: origin });

        while let Some(State { cost, pos, .. }) = open.pop() {
            if !settled.insert(pos) {
                continue;
            }
            if Some(pos) == goal {
                break;
            }
            for direction in 0..10u8 {
                let step = match self.step_cost(unit, pos, direction, movement)? {
                    Some(step) => step,
                    None => continue,
                };
                let next = pos.neighbor(direction);
                let next_cost = cost + step;
                if limit.is_some_and(|l| next_cost > l) {
                    continue;
                }
                if next_cost < *costs.get(&next).unwrap_or(&u32::MAX) {
                    costs.insert(next, next_cost);
                    came_from.insert(next, (pos, direction, step));
                    seq += 1;
                    open.push(State { cost: next_cost, seq, pos: next });
                }
            }
        }
        Ok((costs, came_from))
    }

    // ========================================================================
    // STEP COSTS
    // ========================================================================

    /// TU cost of one step of `unit` from `from` in `direction`, None if blocked
    pub fn step_cost(
        &self,
        unit: UnitId,
        from: Position,
        direction: u8,
        movement: MovementType,
    ) -> Result<Option<u32>, IntegrityError> {
        let size = self.field.unit(unit)?.size;
        let mut worst = 0;
        for tile_from in footprint(from, size) {
            match self.tile_step_cost(unit, tile_from, direction, movement)? {
                Some(cost) => worst = worst.max(cost),
                None => return Ok(None),
            }
        }
        Ok(Some(worst))
    }

    fn tile_step_cost(
        &self,
        unit: UnitId,
        from: Position,
        direction: u8,
        movement: MovementType,
    ) -> Result<Option<u32>, IntegrityError> {
        let to = from.neighbor(direction);
        if !self.field.in_bounds(to) || self.blocked_by_unit(unit, to) {
            return Ok(None);
        }
        match direction {
            DIR_UP | DIR_DOWN => self.vertical_cost(from, to, direction, movement),
            _ => self.planar_cost(from, to, direction, movement),
        }
    }

    fn blocked_by_unit(&self, unit: UnitId, pos: Position) -> bool {
        matches!(self.field.unit_at(pos), Some(other) if other != unit)
    }

    fn vertical_cost(
        &self,
        from: Position,
        to: Position,
        direction: u8,
        movement: MovementType,
    ) -> Result<Option<u32>, IntegrityError> {
        let field = self.field;
        let has_floor =
            |pos: Position| field.tile(pos).and_then(|t| t.part(TilePart::Floor)).is_some();
        let allowed = match (movement, direction) {
            (MovementType::Fly, DIR_UP) => !has_floor(to),
            (MovementType::Fly, _) => !has_floor(from),
            (_, DIR_UP) => field.terrain_level(from, self.rules)? <= STAIRS_TOP,
            (_, _) => !has_floor(from) && field.terrain_level(to, self.rules)? <= STAIRS_TOP,
        };
        if !allowed || self.object_blocks(to, movement)? {
            return Ok(None);
        }
        Ok(Some(VERTICAL_COST))
    }

    fn planar_cost(
        &self,
        from: Position,
        to: Position,
        direction: u8,
        movement: MovementType,
    ) -> Result<Option<u32>, IntegrityError> {
        let mut cost = 0u32;

        if is_diagonal(direction) {
            if !self.diagonal_clear(from, direction)? {
                return Ok(None);
            }
        } else {
            if let Some(wall) = self.edge_wall(from, to)? {
                let wall_cost = wall.tu_cost.get(movement);
                if wall_cost == IMPASSABLE {
                    return Ok(None);
                }
                cost += wall_cost as u32;
                if wall.is_door {
                    cost += DOOR_SURCHARGE;
                }
            }
        }

        match self.terrain_cost(to, movement)? {
            Some(terrain) => cost += terrain,
            None => return Ok(None),
        }

        let climb = self.field.terrain_level(from, self.rules)?
            - self.field.terrain_level(to, self.rules)?;
        if climb > MAX_CLIMB {
            return Ok(None);
        }
        if climb > 0 {
            cost += ELEVATION_SURCHARGE;
        }

        if is_diagonal(direction) {
            cost = cost * 3 / 2;
        }
        Ok(Some(cost))
    }

    /// Floor plus object cost of entering `pos`
    fn terrain_cost(
        &self,
        pos: Position,
        movement: MovementType,
    ) -> Result<Option<u32>, IntegrityError> {
        let floor = self.field.part_def(pos, TilePart::Floor, self.rules)?;
        let mut cost = match floor {
            Some(def) => {
                let c = def.tu_cost.get(movement);
                if c == IMPASSABLE {
                    return Ok(None);
                }
                c as u32
            }
            None => match movement {
                MovementType::Fly => AIR_COST,
                MovementType::Swim => return Ok(None),
                MovementType::Walk => {
                    if !self.field.has_floor_support(pos, self.rules)? {
                        return Ok(None);
                    }
                    AIR_COST
                }
            },
        };
        if let Some(object) = self.field.part_def(pos, TilePart::Object, self.rules)? {
            let c = object.tu_cost.get(movement);
            if c == IMPASSABLE {
                return Ok(None);
            }
            cost += c as u32;
        }
        Ok(Some(cost))
    }

    fn object_blocks(&self, pos: Position, movement: MovementType) -> Result<bool, IntegrityError> {
        let object = self.field.part_def(pos, TilePart::Object, self.rules)?;
        Ok(object.is_some_and(|def| def.tu_cost.get(movement) == IMPASSABLE))
    }

    /// Wall part separating two orthogonally adjacent tiles
    fn edge_wall(
        &self,
        a: Position,
        b: Position,
    ) -> Result<Option<&'a MapPartDef>, IntegrityError> {
        let (owner, slot) = match (b.x - a.x, b.y - a.y) {
            (1, 0) => (b, TilePart::WestWall),
            (-1, 0) => (a, TilePart::WestWall),
            (0, 1) => (b, TilePart::NorthWall),
            (0, -1) => (a, TilePart::NorthWall),
            _ => return Ok(None),
        };
        self.field.part_def(owner, slot, self.rules)
    }

    /// A diagonal may not cut a wall corner, pass a door or squeeze past a big wall
    fn diagonal_clear(&self, from: Position, direction: u8) -> Result<bool, IntegrityError> {
        let (dx, dy) = DIRECTIONS[direction as usize];
        let to = from.offset(dx, dy, 0);
        let side_x = from.offset(dx, 0, 0);
        let side_y = from.offset(0, dy, 0);
        for (a, b) in [(from, side_x), (side_x, to), (from, side_y), (side_y, to)] {
            if self.edge_wall(a, b)?.is_some() {
                return Ok(false);
            }
        }
        for side in [side_x, side_y] {
            if let Some(object) = self.field.part_def(side, TilePart::Object, self.rules)? {
                if object.big_wall != BigWall::None {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::parts;
    use crate::ruleset::MovementType::{Fly, Swim, Walk};
    use crate::unit::{Faction, Unit};

    fn open_field(width: i32, height: i32) -> Battlefield {
        let mut field = Battlefield::new(width, width, height);
        for y in 0..width {
            for x in 0..width {
                field
                    .set_part(Position::new(x, y, 0), TilePart::Floor, Some(parts::GRASS))
                    .unwrap();
            }
        }
        field
    }

    fn spawn(field: &mut Battlefield, rules: &RuleSet, kind: &str, pos: Position) -> UnitId {
        let unit_type = rules.unit_type(kind).unwrap();
        let unit = Unit::from_type(UnitId(0), kind, unit_type, Faction::Player, pos, 2);
        field.add_unit(unit).unwrap()
    }

    fn request(unit: UnitId, origin: Position, destination: Position, budget: u32) -> PathRequest {
        PathRequest {
            unit,
            origin,
            destination,
            tu_budget: budget,
            movement: MovementType::Walk,
            preview_only: false,
        }
    }

    #[test]
    fn test_straight_path_cost() {
        let rules = RuleSet::standard();
        let mut field = open_field(12, 1);
        let unit = spawn(&mut field, &rules, "soldier", Position::new(2, 2, 0));
        let finder = Pathfinder::new(&field, &rules);
        let path = finder
            .find_path(&request(unit, Position::new(2, 2, 0), Position::new(5, 2, 0), 60))
            .unwrap();
        assert_eq!(path.total_tu, 12);
        assert_eq!(path.steps.len(), 3);
        assert!(path.steps.iter().all(|s| s.direction == 2));
        assert_eq!(path.total_energy, 6);
    }

    #[test]
    fn test_diagonal_cost_rounds_down() {
        let rules = RuleSet::standard();
        let mut field = open_field(8, 1);
        let unit = spawn(&mut field, &rules, "soldier", Position::new(1, 1, 0));
        let finder = Pathfinder::new(&field, &rules);
        assert_eq!(finder.step_cost(unit, Position::new(1, 1, 0), 3, Walk).unwrap(), Some(6));
        let path = finder
            .find_path(&request(unit, Position::new(1, 1, 0), Position::new(3, 3, 0), 60))
            .unwrap();
        assert_eq!(path.total_tu, 12);
    }

    #[test]
    fn test_walls_and_doors() {
        let rules = RuleSet::standard();
        let mut field = open_field(8, 1);
        let unit = spawn(&mut field, &rules, "soldier", Position::new(1, 1, 0));
        field.set_part(Position::new(2, 1, 0), TilePart::WestWall, Some(parts::WALL_WEST)).unwrap();
        field
            .set_part(Position::new(1, 2, 0), TilePart::NorthWall, Some(parts::DOOR_NORTH))
            .unwrap();
        let finder = Pathfinder::new(&field, &rules);

        assert_eq!(finder.step_cost(unit, Position::new(1, 1, 0), 2, Walk).unwrap(), None);
        // Door: floor 4 + surcharge 4
        assert_eq!(finder.step_cost(unit, Position::new(1, 1, 0), 4, Walk).unwrap(), Some(8));
        // Diagonals cannot cut the wall corner or pass the door
        assert_eq!(finder.step_cost(unit, Position::new(1, 1, 0), 3, Walk).unwrap(), None);
        assert_eq!(finder.step_cost(unit, Position::new(1, 1, 0), 1, Walk).unwrap(), None);
        assert_eq!(finder.step_cost(unit, Position::new(1, 1, 0), 5, Walk).unwrap(), None);
        assert_eq!(finder.step_cost(unit, Position::new(1, 1, 0), 7, Walk).unwrap(), Some(6));
    }

    #[test]
    fn test_occupied_and_unreachable() {
        let rules = RuleSet::standard();
        let mut field = open_field(6, 1);
        let unit = spawn(&mut field, &rules, "soldier", Position::new(0, 0, 0));
        let other = spawn(&mut field, &rules, "soldier", Position::new(3, 3, 0));
        field.set_part(Position::new(5, 5, 0), TilePart::Object, Some(parts::CRATE)).unwrap();
        let finder = Pathfinder::new(&field, &rules);

        let err = finder
            .find_path(&request(unit, Position::new(0, 0, 0), Position::new(3, 3, 0), 100))
            .unwrap_err();
        assert_eq!(err, BattleError::IllegalPlacement(PlacementReason::Occupied(other)));

        let err = finder
            .find_path(&request(unit, Position::new(0, 0, 0), Position::new(5, 5, 0), 100))
            .unwrap_err();
        assert_eq!(err, BattleError::PathUnavailable { destination: Position::new(5, 5, 0) });

        let err = finder
            .find_path(&request(unit, Position::new(0, 0, 0), Position::new(6, 0, 0), 100))
            .unwrap_err();
        assert_eq!(err, BattleError::OutOfBounds(Position::new(6, 0, 0)));
    }

    #[test]
    fn test_stairs_and_cliffs() {
        let rules = RuleSet::standard();
        let mut field = open_field(6, 2);
        let unit = spawn(&mut field, &rules, "soldier", Position::new(0, 0, 0));
        field.set_part(Position::new(1, 0, 0), TilePart::Object, Some(parts::STAIRS_LOW)).unwrap();
        field.set_part(Position::new(2, 0, 0), TilePart::Object, Some(parts::STAIRS_HIGH)).unwrap();
        field.set_part(Position::new(3, 0, 1), TilePart::Floor, Some(parts::CONCRETE)).unwrap();
        let finder = Pathfinder::new(&field, &rules);

        // Straight onto the high stairs is a cliff
        assert_eq!(finder.step_cost(unit, Position::new(1, 1, 0), 1, Walk).unwrap(), None);
        // Up the low stairs: floor 4 + climb surcharge
        assert_eq!(finder.step_cost(unit, Position::new(0, 0, 0), 2, Walk).unwrap(), Some(6));

        let path = finder
            .find_path(&request(unit, Position::new(0, 0, 0), Position::new(3, 0, 1), 100))
            .unwrap();
        // low stairs 6, high stairs 6, up 8, across 4
        assert_eq!(path.total_tu, 24);
        assert!(path.steps.iter().any(|s| s.direction == DIR_UP));
    }

    #[test]
    fn test_flier_and_swimmer_terrain() {
        let rules = RuleSet::standard();
        let mut field = open_field(6, 2);
        field.set_part(Position::new(2, 2, 0), TilePart::Floor, Some(parts::WATER)).unwrap();
        let unit = spawn(&mut field, &rules, "floater", Position::new(1, 2, 0));
        let finder = Pathfinder::new(&field, &rules);

        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 0), 2, Walk).unwrap(), None);
        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 0), 2, Fly).unwrap(), Some(4));
        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 0), 2, Swim).unwrap(), Some(4));
        // Open sky above: fliers may rise, walkers may not
        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 0), DIR_UP, Fly).unwrap(), Some(8));
        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 0), DIR_UP, Walk).unwrap(), None);
        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 1), DIR_DOWN, Fly).unwrap(), Some(8));

        // A ceiling blocks rising into it and sinking through it
        field.set_part(Position::new(1, 2, 1), TilePart::Floor, Some(parts::CONCRETE)).unwrap();
        let finder = Pathfinder::new(&field, &rules);
        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 0), DIR_UP, Fly).unwrap(), None);
        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 1), DIR_DOWN, Fly).unwrap(), None);
    }

    #[test]
    fn test_vertical_moves_respect_impassable_objects() {
        let rules = RuleSet::standard();
        let mut field = open_field(6, 2);
        let unit = spawn(&mut field, &rules, "floater", Position::new(1, 2, 0));
        let up = Position::new(1, 2, 1);
        field.set_part(up, TilePart::Object, Some(parts::PILLAR)).unwrap();
        let finder = Pathfinder::new(&field, &rules);
        assert_eq!(finder.step_cost(unit, Position::new(1, 2, 0), DIR_UP, Fly).unwrap(), None);

        // Sinking onto a crate is refused as well
        field.set_part(up, TilePart::Object, None).unwrap();
        field.set_part(Position::new(1, 2, 0), TilePart::Object, Some(parts::CRATE)).unwrap();
        let finder = Pathfinder::new(&field, &rules);
        assert_eq!(finder.step_cost(unit, up, DIR_DOWN, Fly).unwrap(), None);

        // Passable objects still allow the move
        field.set_part(Position::new(1, 2, 0), TilePart::Object, Some(parts::RUBBLE)).unwrap();
        let finder = Pathfinder::new(&field, &rules);
        assert_eq!(finder.step_cost(unit, up, DIR_DOWN, Fly).unwrap(), Some(8));
    }

    #[test]
    fn test_large_unit_takes_worst_footprint_cost() {
        let rules = RuleSet::standard();
        let mut field = open_field(8, 1);
        let reaper = spawn(&mut field, &rules, "reaper", Position::new(1, 1, 0));
        field.set_part(Position::new(3, 2, 0), TilePart::Object, Some(parts::HEDGE)).unwrap();
        let finder = Pathfinder::new(&field, &rules);
        // Lower half steps into the hedge: 4 + 8
        assert_eq!(finder.step_cost(reaper, Position::new(1, 1, 0), 2, Walk).unwrap(), Some(12));
        field.set_part(Position::new(3, 2, 0), TilePart::Object, Some(parts::CRATE)).unwrap();
        let finder = Pathfinder::new(&field, &rules);
        assert_eq!(finder.step_cost(reaper, Position::new(1, 1, 0), 2, Walk).unwrap(), None);
    }

    #[test]
    fn test_preview_marks_affordability() {
        let rules = RuleSet::standard();
        let mut field = open_field(12, 1);
        let unit = spawn(&mut field, &rules, "soldier", Position::new(0, 0, 0));
        let before = field.clone();
        let finder = Pathfinder::new(&field, &rules);
        let mut req = request(unit, Position::new(0, 0, 0), Position::new(6, 0, 0), 10);
        req.preview_only = true;
        let path = finder.find_path(&req).unwrap();
        let preview = path.preview.unwrap();
        assert_eq!(preview.markers.len(), 6);
        assert_eq!(preview.affordable_steps(), 2);
        assert_eq!(preview.markers[5].running_tu, 24);
        assert_eq!(field, before);

        req.preview_only = false;
        assert_eq!(
            finder.find_path(&req).unwrap_err(),
            BattleError::InsufficientTimeUnits { required: 24, available: 10 }
        );
    }

    #[test]
    fn test_reachable_respects_budget() {
        let rules = RuleSet::standard();
        let mut field = open_field(10, 1);
        let unit = spawn(&mut field, &rules, "soldier", Position::new(5, 5, 0));
        let finder = Pathfinder::new(&field, &rules);
        let reach = finder.reachable(unit, Position::new(5, 5, 0), 8, MovementType::Walk).unwrap();
        assert_eq!(reach.get(&Position::new(5, 5, 0)), Some(&0));
        assert_eq!(reach.get(&Position::new(7, 5, 0)), Some(&8));
        assert_eq!(reach.get(&Position::new(6, 6, 0)), Some(&6));
        assert!(reach.get(&Position::new(8, 5, 0)).is_none());
        assert!(reach.values().all(|&c| c <= 8));
    }
}
