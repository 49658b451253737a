//! Voxel-level line and arc tracing
//!
//! Each tile is 16x16x24 voxels. Parts occupy voxels according to their
//! `VoxelShape`; units are upright cylinders standing on the tile's
//! (possibly raised) floor.

use crate::battlefield::Battlefield;
use crate::error::IntegrityError;
use crate::position::{Voxel, VOXELS_X, VOXELS_Y, VOXELS_Z};
use crate::ruleset::RuleSet;
use crate::tile::TilePart;
use crate::unit::UnitId;

/// Cylinder radius of a one-tile unit, in voxels
const UNIT_RADIUS: i32 = 5;

/// What occupies a voxel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoxelType {
    Empty,
    Floor,
    WestWall,
    NorthWall,
    Object,
    Unit(UnitId),
    OutOfBounds,
}

impl VoxelType {
    pub fn is_terrain(self) -> bool {
        matches!(
            self,
            VoxelType::Floor | VoxelType::WestWall | VoxelType::NorthWall | VoxelType::Object
        )
    }

    /// Tile part slot for terrain hits
    pub fn part(self) -> Option<TilePart> {
        match self {
            VoxelType::Floor => Some(TilePart::Floor),
            VoxelType::WestWall => Some(TilePart::WestWall),
            VoxelType::NorthWall => Some(TilePart::NorthWall),
            VoxelType::Object => Some(TilePart::Object),
            _ => None,
        }
    }
}

/// Which obstacles count
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckMode {
    /// Opaque parts only; units never block sight
    Sight,
    /// Every solid part and every unit
    Fire,
}

/// Outcome of tracing a line or arc
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceResult {
    /// First obstruction, `Empty` if the path reached its end
    pub hit: VoxelType,
    /// Voxel of the obstruction (or the end point)
    pub impact: Voxel,
    /// Last unobstructed voxel before the impact
    pub last_free: Voxel,
    /// Every voxel visited, impact included
    pub trajectory: Vec<Voxel>,
}

/// Read-only voxel queries against one battlefield
pub struct Raycaster<'a> {
    field: &'a Battlefield,
    rules: &'a RuleSet,
}

impl<'a> Raycaster<'a> {
    pub fn new(field: &'a Battlefield, rules: &'a RuleSet) -> Self {
        Self { field, rules }
    }

    /// Classify a single voxel
    pub fn voxel_check(
        &self,
        voxel: Voxel,
        exclude: Option<UnitId>,
        mode: CheckMode,
    ) -> Result<VoxelType, IntegrityError> {
        let pos = voxel.to_tile();
        let tile = match self.field.tile(pos) {
            Some(tile) => tile,
            None => return Ok(VoxelType::OutOfBounds),
        };
        let (lx, ly, lz) = voxel.local();

        for (slot, part) in tile.parts() {
            let def = self.rules.part(part)?;
            // Floors are always opaque
            if mode == CheckMode::Sight && slot != TilePart::Floor && !def.blocks_sight {
                continue;
            }
            if def.shape.contains(lx, ly, lz) {
                return Ok(match slot {
                    TilePart::Floor => VoxelType::Floor,
                    TilePart::WestWall => VoxelType::WestWall,
                    TilePart::NorthWall => VoxelType::NorthWall,
                    TilePart::Object => VoxelType::Object,
                });
            }
        }

        if mode == CheckMode::Fire {
            if let Some(id) = tile.unit() {
                if Some(id) != exclude && self.unit_contains(id, voxel)? {
                    return Ok(VoxelType::Unit(id));
                }
            }
        }
        Ok(VoxelType::Empty)
    }

    fn unit_contains(&self, id: UnitId, voxel: Voxel) -> Result<bool, IntegrityError> {
        let unit = self.field.unit(id)?;
        let size = unit.size as i32;
        let center_x = unit.position.x * VOXELS_X + VOXELS_X / 2 * size;
        let center_y = unit.position.y * VOXELS_Y + VOXELS_Y / 2 * size;
        let radius = UNIT_RADIUS + (size - 1) * VOXELS_X / 2;
        let (dx, dy) = (voxel.x - center_x, voxel.y - center_y);
        if dx * dx + dy * dy > radius * radius {
            return Ok(false);
        }
        let base =
            unit.position.z * VOXELS_Z - self.field.terrain_level(unit.position, self.rules)?;
        Ok(voxel.z >= base && voxel.z < base + unit.height())
    }

    /// Straight 3-D line from `origin` to `target`, stopping at the first obstruction
    pub fn calculate_line(
        &self,
        origin: Voxel,
        target: Voxel,
        exclude: Option<UnitId>,
        mode: CheckMode,
    ) -> Result<TraceResult, IntegrityError> {
        self.trace(origin, line_voxels(origin, target), exclude, mode)
    }

    /// Arc from `origin` to `target` whose apex rises with `curvature`
    pub fn calculate_parabola(
        &self,
        origin: Voxel,
        target: Voxel,
        curvature: f64,
        exclude: Option<UnitId>,
    ) -> Result<TraceResult, IntegrityError> {
        self.trace(origin, arc_voxels(origin, target, curvature), exclude, CheckMode::Fire)
    }

    fn trace(
        &self,
        origin: Voxel,
        voxels: Vec<Voxel>,
        exclude: Option<UnitId>,
        mode: CheckMode,
    ) -> Result<TraceResult, IntegrityError> {
        let mut trajectory = Vec::with_capacity(voxels.len());
        let mut last_free = origin;
        for voxel in voxels {
            trajectory.push(voxel);
            // The origin voxel sits inside the shooter
            if voxel == origin {
                continue;
            }
            let hit = self.voxel_check(voxel, exclude, mode)?;
            if hit != VoxelType::Empty {
                return Ok(TraceResult { hit, impact: voxel, last_free, trajectory });
            }
            last_free = voxel;
        }
        Ok(TraceResult { hit: VoxelType::Empty, impact: last_free, last_free, trajectory })
    }
}

/// 3-D Bresenham walk, both end points included
pub fn line_voxels(origin: Voxel, target: Voxel) -> Vec<Voxel> {
    let start = [origin.x, origin.y, origin.z];
    let delta = [target.x - origin.x, target.y - origin.y, target.z - origin.z];
    let abs = delta.map(i32::abs);
    let step = delta.map(i32::signum);

    let mut major = 0;
    for axis in 1..3 {
        if abs[axis] > abs[major] {
            major = axis;
        }
    }
    let length = abs[major];

    let mut cur = start;
    let mut err = [0i32; 3];
    for axis in 0..3 {
        if axis != major {
            err[axis] = 2 * abs[axis] - length;
        }
    }

    let mut voxels = Vec::with_capacity(length as usize + 1);
    voxels.push(origin);
    for _ in 0..length {
        for axis in 0..3 {
            if axis == major {
                continue;
            }
            if err[axis] > 0 {
                cur[axis] += step[axis];
                err[axis] -= 2 * length;
            }
            err[axis] += 2 * abs[axis];
        }
        cur[major] += step[major];
        voxels.push(Voxel::new(cur[0], cur[1], cur[2]));
    }
    voxels
}

/// Sampled parabola joined by straight segments
pub fn arc_voxels(origin: Voxel, target: Voxel, curvature: f64) -> Vec<Voxel> {
    let dx = (target.x - origin.x) as f64;
    let dy = (target.y - origin.y) as f64;
    let horizontal = (dx * dx + dy * dy).sqrt();
    let apex = curvature * horizontal / 4.0;
    let samples = horizontal.ceil().max(1.0) as i32;

    let mut voxels = vec![origin];
    let mut prev = origin;
    for i in 1..=samples {
        let t = i as f64 / samples as f64;
        let z = origin.z as f64 + (target.z - origin.z) as f64 * t + 4.0 * apex * t * (1.0 - t);
        let point = Voxel::new(
            (origin.x as f64 + dx * t).round() as i32,
            (origin.y as f64 + dy * t).round() as i32,
            z.round() as i32,
        );
        if point != prev {
            voxels.extend(line_voxels(prev, point).into_iter().skip(1));
            prev = point;
        }
    }
    voxels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use crate::ruleset::parts;
    use crate::unit::{Faction, Unit};

    fn field_with_floor() -> Battlefield {
        let mut field = Battlefield::new(8, 8, 2);
        for y in 0..8 {
            for x in 0..8 {
                field
                    .set_part(Position::new(x, y, 0), TilePart::Floor, Some(parts::GRASS))
                    .unwrap();
            }
        }
        field
    }

    #[test]
    fn test_line_endpoints() {
        let a = Voxel::new(0, 0, 0);
        let b = Voxel::new(10, 4, -3);
        let line = line_voxels(a, b);
        assert_eq!(line.first(), Some(&a));
        assert_eq!(line.last(), Some(&b));
        assert_eq!(line.len(), 11);
        assert_eq!(line_voxels(a, a), vec![a]);
    }

    #[test]
    fn test_arc_rises_above_straight_line() {
        let a = Voxel::new(8, 8, 10);
        let b = Voxel::new(88, 8, 10);
        let arc = arc_voxels(a, b, 2.0);
        assert_eq!(arc.last(), Some(&b));
        let peak = arc.iter().map(|v| v.z).max().unwrap();
        assert!(peak >= 10 + 35, "peak {}", peak);
    }

    #[test]
    fn test_voxel_check_parts() {
        let rules = RuleSet::standard();
        let mut field = field_with_floor();
        field
            .set_part(Position::new(2, 0, 0), TilePart::WestWall, Some(parts::WALL_WEST))
            .unwrap();
        field
            .set_part(Position::new(3, 0, 0), TilePart::WestWall, Some(parts::WINDOW_WEST))
            .unwrap();
        let ray = Raycaster::new(&field, &rules);
        let check = |x, y, z, mode| ray.voxel_check(Voxel::new(x, y, z), None, mode).unwrap();

        assert_eq!(check(5, 5, 0, CheckMode::Fire), VoxelType::Floor);
        assert_eq!(check(5, 5, 10, CheckMode::Fire), VoxelType::Empty);
        assert_eq!(check(32, 5, 10, CheckMode::Sight), VoxelType::WestWall);
        // Windows stop bullets but not sight
        assert_eq!(check(48, 5, 10, CheckMode::Fire), VoxelType::WestWall);
        assert_eq!(check(48, 5, 10, CheckMode::Sight), VoxelType::Empty);
        assert_eq!(check(-1, 5, 10, CheckMode::Fire), VoxelType::OutOfBounds);
    }

    #[test]
    fn test_units_block_fire_not_sight() {
        let rules = RuleSet::standard();
        let mut field = field_with_floor();
        let unit = Unit::from_type(
            UnitId(0),
            "target",
            rules.unit_type("soldier").unwrap(),
            Faction::Hostile,
            Position::new(4, 1, 0),
            0,
        );
        let id = field.add_unit(unit).unwrap();
        let ray = Raycaster::new(&field, &rules);
        let center = Position::new(4, 1, 0).to_voxel(12);
        assert_eq!(ray.voxel_check(center, None, CheckMode::Fire).unwrap(), VoxelType::Unit(id));
        assert_eq!(ray.voxel_check(center, Some(id), CheckMode::Fire).unwrap(), VoxelType::Empty);
        assert_eq!(ray.voxel_check(center, None, CheckMode::Sight).unwrap(), VoxelType::Empty);
        // Above the head
        let overhead = Position::new(4, 1, 0).to_voxel(23);
        assert_eq!(ray.voxel_check(overhead, None, CheckMode::Fire).unwrap(), VoxelType::Empty);

        let origin = Position::new(0, 1, 0).to_voxel(12);
        let result = ray.calculate_line(origin, center, None, CheckMode::Fire).unwrap();
        assert_eq!(result.hit, VoxelType::Unit(id));
        assert_eq!(result.impact.to_tile(), Position::new(4, 1, 0));
    }

    #[test]
    fn test_arc_clears_low_cover() {
        let rules = RuleSet::standard();
        let mut field = field_with_floor();
        field.set_part(Position::new(3, 3, 0), TilePart::Object, Some(parts::CRATE)).unwrap();
        let ray = Raycaster::new(&field, &rules);
        let origin = Position::new(1, 3, 0).to_voxel(20);
        let target = Position::new(5, 3, 0).to_voxel(0);

        let flat = ray.calculate_line(origin, target, None, CheckMode::Fire).unwrap();
        assert_eq!(flat.hit, VoxelType::Object);

        let arc = ray.calculate_parabola(origin, target, 1.0, None).unwrap();
        assert_eq!(arc.hit, VoxelType::Floor);
        assert_eq!(arc.impact.to_tile(), Position::new(5, 3, 0));
    }
}
