//! Shot and throw resolution, projectile progression
//!
//! Shots trace a straight voxel line whose direction is perturbed by
//! normally distributed angular deviation; throws search for an arc that
//! lands on the target tile and then scatter it uniformly.

use crate::battlefield::Battlefield;
use crate::error::{BattleError, IntegrityError, PlacementReason};
use crate::item::ItemId;
use crate::position::{Position, Voxel, VOXELS_X, VOXELS_Y, VOXELS_Z};
use crate::ruleset::RuleSet;
use crate::tile::TilePart;
use crate::unit::{UnitId, UnitStatus};
use crate::voxel::{CheckMode, Raycaster, TraceResult, VoxelType};
use rand::Rng;
use rand_distr::StandardNormal;

/// Angular sigma (radians) of a shot at accuracy 1.0
pub const DEVIATION_BASE: f64 = 0.03;
/// Lowest accuracy used when scaling deviation
const MIN_DEVIATION_ACCURACY: f64 = 0.02;
/// Throw accuracy with no scatter at all
pub const PERFECT_TOSS: f64 = 1.0;
/// Scatter per voxel of throw distance at zero accuracy
pub const THROW_SCATTER: f64 = 0.5;

const KNEELING_TARGET_PENALTY: f64 = 0.1;
const SMOKE_PENALTY_PER_TURN: f64 = 0.03;
const DARKNESS_PENALTY: f64 = 0.1;
const AUTO_FATIGUE_PER_SHOT: f64 = 0.05;
const LOW_MORALE: i32 = 50;

// ============================================================================
// PARAMETERS AND RESULTS
// ============================================================================

/// Everything needed to resolve one bullet
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShotParams {
    pub shooter: UnitId,
    pub origin: Voxel,
    pub target: Voxel,
    /// Base accuracy as a fraction (1.0 = 100 %)
    pub accuracy: f64,
    /// Effective range of the firing mode in tiles
    pub range: i32,
    pub min_range: i32,
    /// Accuracy percent lost per tile outside the range band
    pub drop_off: u8,
    /// Shots already fired in the current auto burst
    pub burst_index: u32,
    /// Refuse the shot when the undeviated line is blocked
    pub check_line_of_fire: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShotResult {
    pub hit: VoxelType,
    pub impact: Voxel,
    pub trajectory: Vec<Voxel>,
    pub bulls_eye: bool,
    /// Accuracy after every modifier
    pub accuracy: f64,
    /// Point the bullet was actually aimed at after deviation
    pub aimed_at: Voxel,
}

/// Everything needed to resolve one throw
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThrowParams {
    pub thrower: UnitId,
    pub origin: Voxel,
    pub target: Position,
    /// Throwing accuracy as a fraction
    pub accuracy: f64,
    pub max_curvature: f64,
    pub retry_limit: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThrowResult {
    pub landing: Position,
    pub curvature: f64,
    pub trajectory: Vec<Voxel>,
    /// Scatter samples drawn before one was accepted
    pub attempts: u32,
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Shot and throw resolver bound to one battlefield state
pub struct Ballistics<'a> {
    field: &'a Battlefield,
    rules: &'a RuleSet,
    shade: u8,
}

impl<'a> Ballistics<'a> {
    pub fn new(field: &'a Battlefield, rules: &'a RuleSet, shade: u8) -> Self {
        Self { field, rules, shade }
    }

    fn raycaster(&self) -> Raycaster<'a> {
        Raycaster::new(self.field, self.rules)
    }

    /// Base accuracy adjusted for range, visibility, posture, fatigue and morale
    pub fn effective_accuracy(&self, params: &ShotParams) -> Result<f64, IntegrityError> {
        let mut accuracy = params.accuracy;
        let target_tile = params.target.to_tile();
        let origin_tile = params.origin.to_tile();

        let distance = origin_tile.distance_to(target_tile).round() as i32;
        let drop_off = params.drop_off as f64 / 100.0;
        if distance < params.min_range {
            accuracy -= (params.min_range - distance) as f64 * drop_off;
        } else if distance > params.range {
            accuracy -= (distance - params.range) as f64 * drop_off;
        }

        if let Some(tile) = self.field.tile(target_tile) {
            accuracy -= tile.smoke as f64 * SMOKE_PENALTY_PER_TURN;
            if tile.is_dark(self.shade) {
                accuracy -= DARKNESS_PENALTY;
            }
            if let Some(target) = tile.unit() {
                if self.field.unit(target)?.status == UnitStatus::Kneeling {
                    accuracy -= KNEELING_TARGET_PENALTY;
                }
            }
        }

        accuracy -= params.burst_index as f64 * AUTO_FATIGUE_PER_SHOT;

        let morale = self.field.unit(params.shooter)?.morale;
        if morale < LOW_MORALE {
            accuracy *= (LOW_MORALE + morale) as f64 / (2 * LOW_MORALE) as f64;
        }
        Ok(accuracy.max(0.0))
    }

    /// Resolve a straight shot
    pub fn resolve_shot<R: Rng + ?Sized>(
        &self,
        params: &ShotParams,
        rng: &mut R,
    ) -> Result<ShotResult, BattleError> {
        let ray = self.raycaster();

        if params.check_line_of_fire {
            let line = ray.calculate_line(
                params.origin,
                params.target,
                Some(params.shooter),
                CheckMode::Fire,
            )?;
            if line.hit != VoxelType::Empty && line.impact.to_tile() != params.target.to_tile() {
                return Err(BattleError::NoLineOfFire);
            }
        }

        let accuracy = self.effective_accuracy(params)?;
        let bulls_eye_chance = (accuracy * 20.0).ceil().clamp(0.0, 100.0) as u32;
        let bulls_eye = rng.gen_range(0..100) < bulls_eye_chance;

        let aimed_at = if bulls_eye {
            self.extend_to_edge(params.origin, params.target)
        } else {
            let sigma = DEVIATION_BASE / accuracy.max(MIN_DEVIATION_ACCURACY);
            let horizontal: f64 = rng.sample::<f64, _>(StandardNormal) * sigma;
            let vertical: f64 = rng.sample::<f64, _>(StandardNormal) * sigma / 2.0;
            self.deviate(params.origin, params.target, horizontal, vertical)
        };

        let TraceResult { hit, impact, trajectory, .. } =
            ray.calculate_line(params.origin, aimed_at, Some(params.shooter), CheckMode::Fire)?;

        tracing::debug!(
            "Shot by {:?}: accuracy {:.2}, bulls-eye {}, hit {:?} at {:?}",
            params.shooter,
            accuracy,
            bulls_eye,
            hit,
            impact.to_tile()
        );
        Ok(ShotResult { hit, impact, trajectory, bulls_eye, accuracy, aimed_at })
    }

    /// Point on the ray origin -> target just outside the battlefield
    pub fn extend_to_edge(&self, origin: Voxel, target: Voxel) -> Voxel {
        let dx = (target.x - origin.x) as f64;
        let dy = (target.y - origin.y) as f64;
        let dz = (target.z - origin.z) as f64;
        let length = (dx * dx + dy * dy + dz * dz).sqrt();
        if length == 0.0 {
            return target;
        }
        self.project(origin, dx / length, dy / length, dz / length)
    }

    fn deviate(&self, origin: Voxel, target: Voxel, yaw_offset: f64, pitch_offset: f64) -> Voxel {
        let dx = (target.x - origin.x) as f64;
        let dy = (target.y - origin.y) as f64;
        let dz = (target.z - origin.z) as f64;
        let horizontal = (dx * dx + dy * dy).sqrt();
        let yaw = dy.atan2(dx) + yaw_offset;
        let pitch = dz.atan2(horizontal) + pitch_offset;
        self.project(origin, yaw.cos() * pitch.cos(), yaw.sin() * pitch.cos(), pitch.sin())
    }

    fn project(&self, origin: Voxel, ux: f64, uy: f64, uz: f64) -> Voxel {
        let (width, length, height) = self.field.dimensions();
        let span_x = (width * VOXELS_X) as f64;
        let span_y = (length * VOXELS_Y) as f64;
        let span_z = (height * VOXELS_Z) as f64;
        let reach = (span_x * span_x + span_y * span_y + span_z * span_z).sqrt() + 1.0;
        Voxel::new(
            origin.x + (ux * reach).round() as i32,
            origin.y + (uy * reach).round() as i32,
            origin.z + (uz * reach).round() as i32,
        )
    }

    /// Resolve a throw to a target tile
    pub fn resolve_throw<R: Rng + ?Sized>(
        &self,
        params: &ThrowParams,
        rng: &mut R,
    ) -> Result<ThrowResult, BattleError> {
        let target = params.target;
        if !self.field.in_bounds(target) {
            return Err(BattleError::OutOfBounds(target));
        }
        if self.has_diagonal_wall(target)? {
            return Err(BattleError::IllegalPlacement(PlacementReason::DiagonalWall));
        }

        let ray = self.raycaster();
        let target_voxel = self.landing_voxel(target)?;

        let mut curvature = 1.0;
        let mut chosen = None;
        while curvature <= params.max_curvature {
            let arc = ray.calculate_parabola(
                params.origin,
                target_voxel,
                curvature,
                Some(params.thrower),
            )?;
            if self.landing_tile(&arc)? == target {
                chosen = Some(curvature);
                break;
            }
            curvature += 0.5;
        }
        let curvature = match chosen {
            Some(c) => c,
            None => {
                tracing::debug!("No arc from {:?} to {:?}", params.origin.to_tile(), target);
                return Err(BattleError::NoValidArc);
            }
        };

        let dx = (target_voxel.x - params.origin.x) as f64;
        let dy = (target_voxel.y - params.origin.y) as f64;
        let distance = (dx * dx + dy * dy).sqrt();
        let spread = (PERFECT_TOSS - params.accuracy).max(0.0) * distance * THROW_SCATTER / 2.0;

        for attempt in 1..=params.retry_limit.max(1) {
            let offset_x = rng.gen_range(-spread..=spread).round() as i32;
            let offset_y = rng.gen_range(-spread..=spread).round() as i32;
            let aimed =
                Voxel::new(target_voxel.x + offset_x, target_voxel.y + offset_y, target_voxel.z);
            if !self.field.in_bounds(aimed.to_tile()) {
                continue;
            }
            let arc =
                ray.calculate_parabola(params.origin, aimed, curvature, Some(params.thrower))?;
            let landing = self.landing_tile(&arc)?;
            if !self.field.in_bounds(landing) || self.has_diagonal_wall(landing)? {
                continue;
            }
            tracing::debug!(
                "Throw by {:?}: curvature {}, lands at {:?} after {} samples",
                params.thrower,
                curvature,
                landing,
                attempt
            );
            return Ok(ThrowResult {
                landing,
                curvature,
                trajectory: arc.trajectory,
                attempts: attempt,
            });
        }

        tracing::warn!(
            "Throw by {:?} to {:?} exhausted {} scatter samples",
            params.thrower,
            target,
            params.retry_limit
        );
        Err(BattleError::NoValidArc)
    }

    /// Voxel just inside the resting surface of a tile
    fn landing_voxel(&self, pos: Position) -> Result<Voxel, IntegrityError> {
        let raised = -self.field.terrain_level(pos, self.rules)?;
        Ok(pos.to_voxel((raised - 1).max(0)))
    }

    /// Tile a thrown object comes to rest on after its arc ends
    fn landing_tile(&self, arc: &TraceResult) -> Result<Position, IntegrityError> {
        let mut pos = match arc.hit {
            VoxelType::Unit(_) => arc.impact.to_tile(),
            _ => arc.last_free.to_tile(),
        };
        while pos.z > 0 && !self.field.has_floor_support(pos, self.rules)? {
            pos = pos.offset(0, 0, -1);
        }
        Ok(pos)
    }

    fn has_diagonal_wall(&self, pos: Position) -> Result<bool, IntegrityError> {
        Ok(self
            .field
            .part_def(pos, TilePart::Object, self.rules)?
            .is_some_and(|def| def.big_wall.is_diagonal()))
    }
}

// ============================================================================
// PROJECTILE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectileKind {
    Bullet,
    Thrown,
}

/// Result of advancing a projectile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectileStep {
    Moving(Voxel),
    Arrived(Voxel),
}

/// A projectile in flight along a resolved trajectory
#[derive(Clone, Debug, PartialEq)]
pub struct Projectile {
    pub kind: ProjectileKind,
    pub item: Option<ItemId>,
    pub shooter: UnitId,
    pub origin: Voxel,
    /// Aim point, deviated for bullets
    pub target: Voxel,
    pub trajectory: Vec<Voxel>,
    pub impact: VoxelType,
    position: usize,
    speed: usize,
}

impl Projectile {
    pub fn new(
        kind: ProjectileKind,
        item: Option<ItemId>,
        shooter: UnitId,
        target: Voxel,
        trajectory: Vec<Voxel>,
        impact: VoxelType,
        speed: u8,
    ) -> Self {
        let origin = trajectory.first().copied().unwrap_or(target);
        Self {
            kind,
            item,
            shooter,
            origin,
            target,
            trajectory,
            impact,
            position: 0,
            speed: speed.max(1) as usize,
        }
    }

    /// Voxel the projectile is currently at
    pub fn current(&self) -> Voxel {
        self.trajectory.get(self.position).copied().unwrap_or(self.origin)
    }

    pub fn is_finished(&self) -> bool {
        self.position + 1 >= self.trajectory.len()
    }

    /// Advance by one tick
    pub fn step(&mut self) -> ProjectileStep {
        let last = self.trajectory.len().saturating_sub(1);
        self.position = (self.position + self.speed).min(last);
        if self.is_finished() {
            ProjectileStep::Arrived(self.current())
        } else {
            ProjectileStep::Moving(self.current())
        }
    }

    /// Jump to the end of the trajectory
    pub fn skip(&mut self) -> Voxel {
        self.position = self.trajectory.len().saturating_sub(1);
        self.current()
    }

    /// Ticks left before arrival
    pub fn remaining_ticks(&self) -> usize {
        let last = self.trajectory.len().saturating_sub(1);
        (last - self.position.min(last)).div_ceil(self.speed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
