//! Tile and voxel coordinates

use serde::{Deserialize, Serialize};

/// Voxels per tile along x
pub const VOXELS_X: i32 = 16;
/// Voxels per tile along y
pub const VOXELS_Y: i32 = 16;
/// Voxels per tile along z
pub const VOXELS_Z: i32 = 24;

/// Tile coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Position {
        Position::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Neighbor in direction (0-7 planar, 8 up, 9 down)
    pub fn neighbor(&self, direction: u8) -> Position {
        let (dx, dy, dz) = direction_vector(direction);
        self.offset(dx, dy, dz)
    }

    /// Voxel at the center of this tile, `height` voxels above its base
    pub fn to_voxel(&self, height: i32) -> Voxel {
        Voxel::new(
            self.x * VOXELS_X + VOXELS_X / 2,
            self.y * VOXELS_Y + VOXELS_Y / 2,
            self.z * VOXELS_Z + height,
        )
    }

    /// Straight-line distance in tiles
    pub fn distance_to(&self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Planar squared distance, ignoring z
    pub fn planar_distance_sq(&self, other: Position) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Chebyshev distance in tiles
    pub fn chebyshev_to(&self, other: Position) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }
}

/// Sub-tile coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voxel {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Voxel {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Tile containing this voxel
    pub fn to_tile(&self) -> Position {
        Position::new(
            self.x.div_euclid(VOXELS_X),
            self.y.div_euclid(VOXELS_Y),
            self.z.div_euclid(VOXELS_Z),
        )
    }

    /// Coordinates inside the containing tile
    pub fn local(&self) -> (i32, i32, i32) {
        (
            self.x.rem_euclid(VOXELS_X),
            self.y.rem_euclid(VOXELS_Y),
            self.z.rem_euclid(VOXELS_Z),
        )
    }

    pub fn distance_to(&self, other: Voxel) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Planar direction vectors (dx, dy)
/// Index: 0=N, 1=NE, 2=E, 3=SE, 4=S, 5=SW, 6=W, 7=NW
pub const DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),  // N
    (1, -1),  // NE
    (1, 0),   // E
    (1, 1),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
    (-1, 0),  // W
    (-1, -1), // NW
];

pub const DIR_UP: u8 = 8;
pub const DIR_DOWN: u8 = 9;

/// Get direction vector for any direction (0-9)
pub fn direction_vector(direction: u8) -> (i32, i32, i32) {
    match direction {
        DIR_UP => (0, 0, 1),
        DIR_DOWN => (0, 0, -1),
        d => {
            let (dx, dy) = DIRECTIONS[d as usize % 8];
            (dx, dy, 0)
        }
    }
}

pub fn is_diagonal(direction: u8) -> bool {
    direction < 8 && direction % 2 == 1
}

/// Facing (0-7) that points from `from` toward `to`
pub fn direction_to(from: Position, to: Position) -> u8 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx == 0 && dy == 0 {
        return 0;
    }
    // atan2 with y pointing south; 0 = north, clockwise
    let angle = (dx as f64).atan2(-(dy as f64)).to_degrees();
    let angle = if angle < 0.0 { angle + 360.0 } else { angle };
    (((angle + 22.5) / 45.0).floor() as u8) % 8
}

/// Number of 45 degree steps between two facings
pub fn facing_steps(from: u8, to: u8) -> u8 {
    let diff = (to as i32 - from as i32).rem_euclid(8) as u8;
    diff.min(8 - diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voxel_tile_round_trip() {
        let pos = Position::new(3, 4, 1);
        let v = pos.to_voxel(2);
        assert_eq!(v, Voxel::new(56, 72, 26));
        assert_eq!(v.to_tile(), pos);
        assert_eq!(v.local(), (8, 8, 2));
        assert_eq!(Voxel::new(-1, 0, 0).to_tile(), Position::new(-1, 0, 0));
    }

    #[test]
    fn test_direction_to() {
        let o = Position::new(5, 5, 0);
        assert_eq!(direction_to(o, Position::new(5, 2, 0)), 0);
        assert_eq!(direction_to(o, Position::new(8, 2, 0)), 1);
        assert_eq!(direction_to(o, Position::new(9, 5, 0)), 2);
        assert_eq!(direction_to(o, Position::new(5, 9, 0)), 4);
        assert_eq!(direction_to(o, Position::new(1, 5, 0)), 6);
        assert_eq!(direction_to(o, Position::new(4, 4, 0)), 7);
    }

    #[test]
    fn test_facing_steps() {
        assert_eq!(facing_steps(0, 0), 0);
        assert_eq!(facing_steps(0, 7), 1);
        assert_eq!(facing_steps(2, 6), 4);
        assert_eq!(facing_steps(1, 4), 3);
    }

    #[test]
    fn test_neighbors() {
        let p = Position::new(1, 1, 1);
        assert_eq!(p.neighbor(2), Position::new(2, 1, 1));
        assert!(is_diagonal(3));
        assert!(!is_diagonal(DIR_UP));
        assert_eq!(p.neighbor(DIR_DOWN), Position::new(1, 1, 0));
    }
}
