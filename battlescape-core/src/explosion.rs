//! Blast propagation
//!
//! A blast floods outward from its center through the six face-adjacent
//! neighbors, losing a fixed share of its power per tile. Walls and floors
//! on the way take the blast and absorb their armor from what passes.

use crate::battlefield::{Battlefield, DestroyedPart, UnitHarm};
use crate::error::BattleError;
use crate::position::{Position, DIR_DOWN, DIR_UP};
use crate::ruleset::{DamageType, RuleSet};
use crate::tile::TilePart;
use crate::unit::UnitId;
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};

/// Directions a blast spreads in: the four cardinals, then up and down
const BLAST_DIRECTIONS: [u8; 6] = [0, 2, 4, 6, DIR_UP, DIR_DOWN];

/// Most smoke or fire turns a single tile can hold
const MAX_TURNS: u8 = 15;

/// A blast to resolve
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Blast {
    pub center: Position,
    pub power: u16,
    pub damage_type: DamageType,
    /// Radius in tiles
    pub radius: i32,
    pub source: Option<UnitId>,
}

/// Everything a blast touched
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExplosionReport {
    /// Reached tiles with the power that arrived there
    pub tiles: Vec<(Position, i32)>,
    pub harmed: Vec<UnitHarm>,
    pub destroyed: Vec<DestroyedPart>,
}

/// Part on the boundary a blast crosses from `from` to `to`
fn barrier(from: Position, to: Position) -> Option<(Position, TilePart)> {
    match (to.x - from.x, to.y - from.y, to.z - from.z) {
        (1, 0, 0) => Some((to, TilePart::WestWall)),
        (-1, 0, 0) => Some((from, TilePart::WestWall)),
        (0, 1, 0) => Some((to, TilePart::NorthWall)),
        (0, -1, 0) => Some((from, TilePart::NorthWall)),
        (0, 0, 1) => Some((to, TilePart::Floor)),
        (0, 0, -1) => Some((from, TilePart::Floor)),
        _ => None,
    }
}

/// Resolve a blast against the battlefield
pub fn detonate<R: Rng + ?Sized>(
    field: &mut Battlefield,
    rules: &RuleSet,
    blast: &Blast,
    rng: &mut R,
) -> Result<ExplosionReport, BattleError> {
    if !field.in_bounds(blast.center) {
        return Err(BattleError::OutOfBounds(blast.center));
    }
    let radius = blast.radius.max(0);
    let falloff = (blast.power as i32 / (radius + 1)).max(1);

    // Flood fill over a snapshot; terrain only changes once the reach is known
    let mut reach: BTreeMap<Position, i32> = BTreeMap::new();
    let mut barrier_hits: BTreeMap<(Position, TilePart), i32> = BTreeMap::new();
    let mut queue = VecDeque::new();
    reach.insert(blast.center, blast.power as i32);
    queue.push_back(blast.center);

    while let Some(pos) = queue.pop_front() {
        let carried = reach.get(&pos).copied().unwrap_or(0) - falloff;
        if carried <= 0 {
            continue;
        }
        for direction in BLAST_DIRECTIONS {
            let next = pos.neighbor(direction);
            if !field.in_bounds(next) || blast.center.distance_to(next) > radius as f64 {
                continue;
            }
            let mut arriving = carried;
            if let Some((owner, slot)) = barrier(pos, next) {
                if let Some(def) = field.part_def(owner, slot, rules)? {
                    let hit = barrier_hits.entry((owner, slot)).or_insert(0);
                    *hit = (*hit).max(carried);
                    arriving -= def.armor as i32;
                }
            }
            if arriving <= 0 || reach.get(&next).is_some_and(|&p| p >= arriving) {
                continue;
            }
            reach.insert(next, arriving);
            queue.push_back(next);
        }
    }

    let mut report = ExplosionReport {
        tiles: reach.iter().map(|(&p, &v)| (p, v)).collect(),
        ..Default::default()
    };

    if matches!(
        blast.damage_type,
        DamageType::Explosive | DamageType::Kinetic | DamageType::Melee
    ) {
        for (&(owner, slot), &power) in &barrier_hits {
            let power = power.clamp(0, u16::MAX as i32) as u16;
            report.destroyed.extend(field.damage_part(owner, slot, power, rules)?);
        }
    }

    for (&pos, &power) in &reach {
        apply_to_tile(field, rules, blast, pos, power, rng, &mut report)?;
    }

    let falls = field.settle_units(rules)?;
    if !falls.is_empty() {
        tracing::debug!("{} units fell after the blast", falls.len());
    }

    tracing::info!(
        "Explosion at {:?}: {:?} power {}, {} tiles, {} units hit, {} parts destroyed",
        blast.center,
        blast.damage_type,
        blast.power,
        report.tiles.len(),
        report.harmed.len(),
        report.destroyed.len()
    );
    Ok(report)
}

fn apply_to_tile<R: Rng + ?Sized>(
    field: &mut Battlefield,
    rules: &RuleSet,
    blast: &Blast,
    pos: Position,
    power: i32,
    rng: &mut R,
    report: &mut ExplosionReport,
) -> Result<(), BattleError> {
    match blast.damage_type {
        DamageType::Smoke => {
            if let Some(tile) = field.tile_mut(pos) {
                let turns = (power / 10).clamp(1, MAX_TURNS as i32) as u8;
                tile.smoke = tile.smoke.max(turns);
            }
            return Ok(());
        }
        DamageType::Incendiary => {
            let mut fuel = 0;
            if let Some(tile) = field.tile(pos) {
                for (_, part) in tile.parts() {
                    fuel = fuel.max(rules.part(part)?.fuel);
                }
            }
            let turns = (rng.gen_range(1..=3) + fuel).min(MAX_TURNS);
            if let Some(tile) = field.tile_mut(pos) {
                tile.fire = tile.fire.max(turns);
            }
        }
        DamageType::Stun => {}
        _ => {
            let power = power.clamp(0, u16::MAX as i32) as u16;
            for slot in [TilePart::Object, TilePart::Floor] {
                report.destroyed.extend(field.damage_part(pos, slot, power, rules)?);
            }
        }
    }

    for unit in field.units_on(pos) {
        // Large units are hit once, on their anchor tile or the first tile reached
        if report.harmed.iter().any(|h| h.unit == unit) {
            continue;
        }
        let amount = power * rng.gen_range(50..=150) / 100;
        let harm = field.apply_unit_damage(unit, amount, blast.damage_type, rules)?;
        if let (true, Some(source)) = (harm.killed, blast.source) {
            field.unit_mut(source)?.kills += 1;
        }
        report.harmed.push(harm);
    }
    Ok(())
}
