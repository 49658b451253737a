//! Battle context
//!
//! `Battle` owns everything one engagement needs: the battlefield, a shared
//! handle to the ruleset, the configuration, the seeded RNG, the queue of
//! pending actions, the projectile currently in flight and the event log
//! the presentation layer drains. There is no global state; every operation
//! goes through this object.

use crate::action::{self, firing_accuracy, ActionResult, BattleAction};
use crate::ballistics::{Ballistics, Projectile, ProjectileKind, ProjectileStep, ShotParams};
use crate::battlefield::Battlefield;
use crate::config::BattleConfig;
use crate::error::{BattleError, TargetState};
use crate::event::BattleEvent;
use crate::explosion::{detonate, Blast};
use crate::item::ItemId;
use crate::pathfinding::{Path, PathRequest, Pathfinder};
use crate::position::{Position, Voxel};
use crate::ruleset::{DamageType, FireMode, RuleSet};
use crate::turn::{check_outcome, BattleOutcome, Phase, TurnController};
use crate::unit::{Faction, PanicState, UnitId, UnitStatus};
use crate::visibility::{compute_visibility, VisibilityDelta};
use crate::voxel::VoxelType;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::sync::Arc;

/// Voxels a thrown item travels per tick
pub const THROW_SPEED: u8 = 8;

// ============================================================================
// IN-FLIGHT STATE
// ============================================================================

/// What happens when a projectile arrives
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Bullet { power: u16, damage_type: DamageType, blast_radius: i32 },
    Thrown { item: ItemId, landing: Position },
}

/// A projectile together with its payload
#[derive(Clone, Debug, PartialEq)]
pub struct Flight {
    pub projectile: Projectile,
    pub payload: Payload,
}

/// Everything needed to fire one round
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShotOrder {
    pub shooter: UnitId,
    pub weapon: ItemId,
    pub mode: FireMode,
    pub min_range: i32,
    pub drop_off: u8,
    pub speed: u8,
    pub target: Voxel,
    pub burst_index: u32,
    pub auto: bool,
    pub check_line_of_fire: bool,
}

/// Rounds of an auto shot still to fire
#[derive(Clone, Copy, Debug, PartialEq)]
struct Burst {
    order: ShotOrder,
    remaining: u32,
}

/// What one call to [`Battle::advance`] did
#[derive(Clone, Debug, PartialEq)]
pub enum Advance {
    Ticked(ProjectileStep),
    Resolved(BattleAction),
    PhaseChanged(Phase),
}

// ============================================================================
// BATTLE
// ============================================================================

#[derive(Clone, Debug)]
pub struct Battle {
    pub(crate) field: Battlefield,
    pub(crate) rules: Arc<RuleSet>,
    pub(crate) config: BattleConfig,
    pub(crate) turn: TurnController,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) queue: VecDeque<BattleAction>,
    pub(crate) flight: Option<Flight>,
    burst: Option<Burst>,
    pub(crate) events: Vec<BattleEvent>,
}

impl Battle {
    /// Start a battle; the RNG is seeded from the config
    pub fn new(
        field: Battlefield,
        rules: Arc<RuleSet>,
        config: BattleConfig,
    ) -> Result<Self, BattleError> {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let turn = TurnController::new(config.first_faction);
        let mut battle = Self::from_parts(field, rules, config, turn, rng)?;
        battle.field.calculate_lighting(&battle.rules)?;
        battle.refresh_all_visibility()?;
        tracing::info!(
            "Battle started: {} units, first faction {:?}, seed {}",
            battle.field.units().len(),
            battle.config.first_faction,
            battle.config.seed
        );
        Ok(battle)
    }

    /// Assemble a battle from restored state without touching it
    pub(crate) fn from_parts(
        field: Battlefield,
        rules: Arc<RuleSet>,
        config: BattleConfig,
        turn: TurnController,
        rng: ChaCha8Rng,
    ) -> Result<Self, BattleError> {
        rules.validate()?;
        field.validate(&rules)?;
        Ok(Self {
            field,
            rules,
            config,
            turn,
            rng,
            queue: VecDeque::new(),
            flight: None,
            burst: None,
            events: Vec::new(),
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn field(&self) -> &Battlefield {
        &self.field
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Shared handle to the ruleset
    pub fn rules_handle(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules)
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn turn_controller(&self) -> &TurnController {
        &self.turn
    }

    pub fn phase(&self) -> Phase {
        self.turn.phase()
    }

    pub fn turn_number(&self) -> u32 {
        self.turn.turn()
    }

    pub fn ai_cheating(&self) -> bool {
        self.turn.ai_cheating()
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.turn.outcome()
    }

    pub fn rng(&self) -> &ChaCha8Rng {
        &self.rng
    }

    pub fn projectile(&self) -> Option<&Projectile> {
        self.flight.as_ref().map(|f| &f.projectile)
    }

    /// Whether a projectile or the rest of a burst is still pending
    pub fn is_busy(&self) -> bool {
        self.flight.is_some() || self.burst.is_some()
    }

    pub fn queued_actions(&self) -> usize {
        self.queue.len()
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    /// Take every event logged since the last drain
    pub fn drain_events(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn action_cost(&self, action: &BattleAction) -> Result<u32, BattleError> {
        action::action_cost(&self.field, &self.rules, action)
    }

    /// Cheapest path for `unit` to `destination`, marked with what it can afford
    pub fn preview_path(&self, unit: UnitId, destination: Position) -> Result<Path, BattleError> {
        let mover = self.field.unit(unit)?;
        let request = PathRequest {
            unit,
            origin: mover.position,
            destination,
            tu_budget: mover.time_units.max(0) as u32,
            movement: mover.movement,
            preview_only: true,
        };
        Pathfinder::new(&self.field, &self.rules).find_path(&request)
    }

    /// Units `unit` knows about; past the cheat turn hostiles know everyone
    pub fn visible_units(&self, unit: UnitId) -> Result<Vec<UnitId>, BattleError> {
        let observer = self.field.unit(unit)?;
        if observer.faction == Faction::Hostile && self.turn.ai_cheating() {
            return Ok(self
                .field
                .units()
                .iter()
                .filter(|u| u.is_active() && u.faction != Faction::Hostile)
                .map(|u| u.id)
                .collect());
        }
        Ok(observer.visible_units.clone())
    }

    // ========================================================================
    // ACTIONS
    // ========================================================================

    /// Validate and run one action, recording its result on the action
    pub fn execute(&mut self, action: &mut BattleAction) -> Result<(), BattleError> {
        let outcome = self.try_execute(action);
        action.result = match &outcome {
            Ok(()) => ActionResult::Succeeded,
            Err(err) => ActionResult::Failed(err.code()),
        };
        match &outcome {
            Err(err) if err.is_fatal() => {
                tracing::error!("{:?} by {:?} aborted: {}", action.action_type, action.actor, err);
            }
            Err(err) => {
                tracing::debug!("{:?} by {:?} rejected: {}", action.action_type, action.actor, err)
            }
            Ok(()) => {}
        }
        self.events.push(BattleEvent::ActionResolved {
            actor: action.actor,
            action: action.action_type,
            code: outcome.as_ref().err().map(BattleError::code),
        });
        outcome
    }

    fn try_execute(&mut self, action: &mut BattleAction) -> Result<(), BattleError> {
        self.validate_actor(action.actor)?;
        let cost = self.action_cost(action)?;
        let available = self.field.unit(action.actor)?.time_units.max(0) as u32;
        if cost > available {
            return Err(BattleError::InsufficientTimeUnits { required: cost, available });
        }
        action.tu_cost = cost;
        action::handler_for(action.action_type)(self, action)?;
        self.check_conclusion();
        Ok(())
    }

    fn validate_actor(&self, actor: UnitId) -> Result<(), BattleError> {
        if self.turn.phase().is_concluded() {
            return Err(BattleError::BattleConcluded);
        }
        if self.is_busy() {
            return Err(BattleError::ActionInProgress);
        }
        let unit = self
            .field
            .unit(actor)
            .map_err(|_| BattleError::InvalidTargetState(TargetState::MissingTarget))?;
        match unit.status {
            UnitStatus::Dead => return Err(BattleError::InvalidTargetState(TargetState::Dead)),
            UnitStatus::Unconscious => {
                return Err(BattleError::InvalidTargetState(TargetState::Unconscious))
            }
            _ => {}
        }
        if unit.panic != PanicState::Calm {
            return Err(BattleError::InvalidTargetState(TargetState::Panicking));
        }
        if self.turn.acting_faction() != Some(unit.faction) {
            return Err(BattleError::NotActorsTurn(actor));
        }
        Ok(())
    }

    pub fn queue_action(&mut self, action: BattleAction) {
        self.queue.push_back(action);
    }

    /// Run every queued action to completion, projectiles included
    pub fn resolve_queue(&mut self) -> Result<Vec<BattleAction>, BattleError> {
        let mut resolved = Vec::with_capacity(self.queue.len());
        self.skip_projectile()?;
        while let Some(mut action) = self.queue.pop_front() {
            if let Err(err) = self.execute(&mut action) {
                if err.is_fatal() {
                    return Err(err);
                }
            }
            self.skip_projectile()?;
            resolved.push(action);
        }
        Ok(resolved)
    }

    /// One step of the battle loop: a projectile tick, a queued action, or
    /// the end of the faction turn once nothing is left to do
    pub fn advance(&mut self) -> Result<Advance, BattleError> {
        if self.turn.phase().is_concluded() {
            return Err(BattleError::BattleConcluded);
        }
        if self.flight.is_some() {
            if let Some(step) = self.tick()? {
                return Ok(Advance::Ticked(step));
            }
        }
        if let Some(mut action) = self.queue.pop_front() {
            match self.execute(&mut action) {
                Err(err) if err.is_fatal() => return Err(err),
                _ => return Ok(Advance::Resolved(action)),
            }
        }
        Ok(Advance::PhaseChanged(self.end_turn()?))
    }

    /// End the acting faction's turn
    pub fn end_turn(&mut self) -> Result<Phase, BattleError> {
        if self.turn.phase().is_concluded() {
            return Err(BattleError::BattleConcluded);
        }
        if self.is_busy() {
            return Err(BattleError::ActionInProgress);
        }
        self.queue.clear();
        let phase = self
            .turn
            .end_faction_turn(
                &mut self.field,
                &self.rules,
                &self.config,
                &mut self.rng,
                &mut self.events,
            )?;
        if !phase.is_concluded() {
            self.field.calculate_lighting(&self.rules)?;
            self.refresh_all_visibility()?;
        }
        Ok(phase)
    }

    /// Give up the battle
    pub fn abort(&mut self) {
        self.queue.clear();
        self.flight = None;
        self.burst = None;
        self.turn.conclude(BattleOutcome::Aborted, &mut self.events);
    }

    pub(crate) fn check_conclusion(&mut self) {
        if let Some(outcome) = check_outcome(&self.field) {
            self.turn.conclude(outcome, &mut self.events);
        }
    }

    // ========================================================================
    // VISIBILITY
    // ========================================================================

    /// Recompute one unit's sight and log what it found
    pub fn refresh_visibility(&mut self, unit: UnitId) -> Result<VisibilityDelta, BattleError> {
        let delta = compute_visibility(&mut self.field, &self.rules, unit, &self.config)?;
        if !delta.newly_discovered.is_empty() {
            self.events.push(BattleEvent::TilesDiscovered { count: delta.newly_discovered.len() });
        }
        for &target in &delta.spotted_units {
            self.events.push(BattleEvent::UnitSpotted { spotter: unit, target });
        }
        Ok(delta)
    }

    pub fn refresh_all_visibility(&mut self) -> Result<VisibilityDelta, BattleError> {
        let mut delta = VisibilityDelta::default();
        for idx in 0..self.field.units().len() {
            delta.merge(self.refresh_visibility(UnitId(idx as u32))?);
        }
        Ok(delta)
    }

    // ========================================================================
    // PROJECTILES
    // ========================================================================

    pub(crate) fn launch(&mut self, flight: Flight) {
        let projectile = &flight.projectile;
        self.events.push(BattleEvent::ProjectileSpawned {
            kind: projectile.kind,
            origin: projectile.origin,
            target: projectile.target,
        });
        self.flight = Some(flight);
    }

    pub(crate) fn queue_burst(&mut self, order: ShotOrder, remaining: u32) {
        if remaining > 0 {
            self.burst = Some(Burst { order, remaining });
        }
    }

    /// Resolve and launch one round; nothing changes unless the shot can be taken
    pub(crate) fn fire_shot(&mut self, order: &ShotOrder) -> Result<(), BattleError> {
        let no_ammo = BattleError::InvalidTargetState(TargetState::NoAmmo);
        let clip = self.field.item(order.weapon)?.ammo.ok_or(no_ammo.clone())?;
        let clip_item = self.field.item(clip)?;
        if clip_item.rounds == 0 {
            return Err(no_ammo);
        }
        let ammo = self.rules.item(&clip_item.type_id)?;
        let payload = Payload::Bullet {
            power: ammo.power,
            damage_type: ammo.damage_type,
            blast_radius: ammo.blast_radius,
        };

        let shooter = self.field.unit(order.shooter)?;
        let params = ShotParams {
            shooter: order.shooter,
            origin: self.field.eye_voxel(order.shooter, &self.rules)?,
            target: order.target,
            accuracy: firing_accuracy(shooter, &order.mode),
            range: order.mode.range,
            min_range: order.min_range,
            drop_off: order.drop_off,
            burst_index: order.burst_index,
            check_line_of_fire: order.check_line_of_fire,
        };
        let shot = Ballistics::new(&self.field, &self.rules, self.config.shade)
            .resolve_shot(&params, &mut self.rng)?;

        let rounds = {
            let clip_item = self.field.item_mut(clip)?;
            clip_item.rounds -= 1;
            clip_item.rounds
        };
        if rounds == 0 {
            self.field.remove_item(clip)?;
        }
        if order.auto {
            self.field.unit_mut(order.shooter)?.auto_shots_fired += 1;
        }

        let projectile = Projectile::new(
            ProjectileKind::Bullet,
            None,
            order.shooter,
            shot.aimed_at,
            shot.trajectory,
            shot.hit,
            order.speed,
        );
        self.launch(Flight { projectile, payload });
        Ok(())
    }

    /// Advance the projectile by one tick; returns `None` when nothing is in flight
    pub fn tick(&mut self) -> Result<Option<ProjectileStep>, BattleError> {
        let step = match self.flight.as_mut() {
            Some(flight) => flight.projectile.step(),
            None => return Ok(None),
        };
        match step {
            ProjectileStep::Moving(voxel) => self.events.push(BattleEvent::ProjectileMoved(voxel)),
            ProjectileStep::Arrived(_) => {
                if let Some(flight) = self.flight.take() {
                    self.land(flight)?;
                }
            }
        }
        Ok(Some(step))
    }

    /// Finish the current projectile and any remaining burst at once
    pub fn skip_projectile(&mut self) -> Result<(), BattleError> {
        while let Some(mut flight) = self.flight.take() {
            flight.projectile.skip();
            self.land(flight)?;
        }
        Ok(())
    }

    fn land(&mut self, flight: Flight) -> Result<(), BattleError> {
        let Flight { projectile, payload } = flight;
        let impact = projectile.current();
        self.events.push(BattleEvent::ProjectileImpacted { voxel: impact, hit: projectile.impact });

        match payload {
            Payload::Bullet { power, damage_type, blast_radius } if blast_radius > 0 => {
                // Blasts go off in front of whatever stopped the round
                let before = match projectile.impact {
                    VoxelType::Empty => impact,
                    _ => projectile.trajectory.iter().rev().nth(1).copied().unwrap_or(impact),
                };
                let center = before.to_tile();
                if self.field.in_bounds(center) {
                    let blast = Blast {
                        center,
                        power,
                        damage_type,
                        radius: blast_radius,
                        source: Some(projectile.shooter),
                    };
                    let report = detonate(&mut self.field, &self.rules, &blast, &mut self.rng)?;
                    self.events.extend(BattleEvent::from_explosion(&blast, &report));
                }
            }
            Payload::Bullet { power, damage_type, .. } => match projectile.impact {
                VoxelType::Unit(target) => {
                    let amount = power as i32 * self.rng.gen_range(50..=150) / 100;
                    let harm =
                        self.field.apply_unit_damage(target, amount, damage_type, &self.rules)?;
                    if harm.killed {
                        self.field.unit_mut(projectile.shooter)?.kills += 1;
                    }
                    self.events.extend(BattleEvent::from_harm(&harm));
                }
                hit => {
                    if let Some(slot) = hit.part() {
                        let destroyed =
                            self.field.damage_part(impact.to_tile(), slot, power, &self.rules)?;
                        self.events
                            .extend(destroyed.into_iter().map(BattleEvent::TerrainDestroyed));
                    }
                }
            },
            Payload::Thrown { item, landing } => {
                self.field.place_on_ground(item, landing)?;
                self.events.push(BattleEvent::ItemLanded { item, pos: landing });
            }
        }

        let falls = self.field.settle_units(&self.rules)?;
        self.events.extend(falls.into_iter().map(BattleEvent::UnitFell));
        self.field.calculate_lighting(&self.rules)?;
        self.refresh_all_visibility()?;
        self.check_conclusion();
        self.continue_burst()
    }

    fn continue_burst(&mut self) -> Result<(), BattleError> {
        let Some(burst) = self.burst.take() else {
            return Ok(());
        };
        let shooter_ready = self.field.unit(burst.order.shooter)?.is_active();
        if self.turn.phase().is_concluded() || !shooter_ready {
            return Ok(());
        }
        let order = ShotOrder { burst_index: burst.order.burst_index + 1, ..burst.order };
        match self.fire_shot(&order) {
            Ok(()) => {
                self.queue_burst(order, burst.remaining - 1);
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                tracing::debug!("Burst by {:?} stopped: {}", order.shooter, err);
                Ok(())
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionTarget, BattleActionType};
    use crate::item::{ItemLocation, SlotId};
    use crate::ruleset::parts;
    use crate::tile::TilePart;
    use crate::unit::Unit;

    fn in_right_hand(unit: UnitId) -> ItemLocation {
        ItemLocation::Carried { unit, slot: SlotId::RightHand, x: 0, y: 0 }
    }

    fn open_battle(units: &[(&str, Faction, Position, u8)]) -> Battle {
        let rules = Arc::new(RuleSet::standard());
        let mut field = Battlefield::new(20, 20, 2);
        for y in 0..20 {
            for x in 0..20 {
                field
                    .set_part(Position::new(x, y, 0), TilePart::Floor, Some(parts::GRASS))
                    .unwrap();
            }
        }
        for &(kind, faction, pos, facing) in units {
            let unit_type = rules.unit_type(kind).unwrap();
            let unit = Unit::from_type(UnitId(0), kind, unit_type, faction, pos, facing);
            field.add_unit(unit).unwrap();
        }
        Battle::new(field, rules, BattleConfig::default().with_seed(5)).unwrap()
    }

    fn standoff() -> Battle {
        open_battle(&[
            ("soldier", Faction::Player, Position::new(5, 5, 0), 2),
            ("sectoid", Faction::Hostile, Position::new(0, 19, 0), 4),
        ])
    }

    #[test]
    fn test_move_spends_time_units() {
        let mut battle = standoff();
        let mut action = BattleAction::move_to(UnitId(0), Position::new(8, 5, 0));
        battle.execute(&mut action).unwrap();
        let unit = battle.field().unit(UnitId(0)).unwrap();
        assert_eq!(unit.position, Position::new(8, 5, 0));
        assert_eq!(unit.time_units, 60 - 12);
        assert_eq!(battle.field().unit_at(Position::new(5, 5, 0)), None);
        assert_eq!(battle.field().unit_at(Position::new(8, 5, 0)), Some(UnitId(0)));
        let moves =
            battle.events().iter().filter(|e| matches!(e, BattleEvent::UnitMoved { .. })).count();
        assert_eq!(moves, 3);
    }

    #[test]
    fn test_move_stops_when_enemy_spotted() {
        let mut battle = open_battle(&[
            ("soldier", Faction::Player, Position::new(2, 2, 0), 2),
            ("sectoid", Faction::Hostile, Position::new(14, 2, 0), 4),
        ]);
        // At night the sectoid only shows up within nine tiles
        battle.config.shade = 15;
        battle.refresh_all_visibility().unwrap();
        assert!(battle.field().unit(UnitId(0)).unwrap().visible_units.is_empty());

        let mut action = BattleAction::move_to(UnitId(0), Position::new(12, 2, 0));
        battle.execute(&mut action).unwrap();
        let unit = battle.field().unit(UnitId(0)).unwrap();
        assert_eq!(unit.position, Position::new(5, 2, 0));
        assert_eq!(unit.time_units, 60 - 12);
        assert_eq!(action.tu_cost, 12);
        assert_eq!(action.result, ActionResult::Succeeded);
        assert!(battle
            .events()
            .contains(&BattleEvent::UnitSpotted { spotter: UnitId(0), target: UnitId(1) }));
    }

    #[test]
    fn test_rejected_move_changes_nothing() {
        let mut battle = standoff();
        battle.field.unit_mut(UnitId(0)).unwrap().time_units = 10;
        let before = battle.field().clone();
        let mut action = BattleAction::move_to(UnitId(0), Position::new(15, 5, 0));
        let err = battle.execute(&mut action).unwrap_err();
        assert!(matches!(err, BattleError::InsufficientTimeUnits { required: 40, available: 10 }));
        assert_eq!(battle.field(), &before);
    }

    #[test]
    fn test_panicking_unit_cannot_act() {
        let mut battle = standoff();
        battle.field.unit_mut(UnitId(0)).unwrap().panic = PanicState::Panicking;
        let err = battle
            .execute(&mut BattleAction::new(UnitId(0), BattleActionType::Kneel))
            .unwrap_err();
        assert_eq!(err, BattleError::InvalidTargetState(TargetState::Panicking));
    }

    #[test]
    fn test_advance_ends_turn_when_queue_empty() {
        let mut battle = standoff();
        battle.queue_action(BattleAction::new(UnitId(0), BattleActionType::Kneel));
        match battle.advance().unwrap() {
            Advance::Resolved(action) => assert_eq!(action.result, ActionResult::Succeeded),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(battle.advance().unwrap(), Advance::PhaseChanged(Phase::HostileTurn));
        assert_eq!(battle.advance().unwrap(), Advance::PhaseChanged(Phase::PlayerTurn));
        assert_eq!(battle.turn_number(), 2);
    }

    #[test]
    fn test_knockout_concludes_battle() {
        let mut battle = open_battle(&[
            ("soldier", Faction::Player, Position::new(5, 5, 0), 2),
            ("sectoid", Faction::Hostile, Position::new(6, 5, 0), 6),
        ]);
        let rules = battle.rules_handle();
        let rod = battle
            .field
            .add_item("stun-rod", in_right_hand(UnitId(0)), &rules)
            .unwrap();
        battle.field.unit_mut(UnitId(0)).unwrap().base.melee = 100;
        battle.field.unit_mut(UnitId(1)).unwrap().health = 1;

        let mut action = BattleAction::new(UnitId(0), BattleActionType::Melee)
            .with_item(rod)
            .with_target(ActionTarget::Unit(UnitId(1)));
        battle.execute(&mut action).unwrap();
        assert_eq!(battle.outcome(), Some(BattleOutcome::PlayerVictory));
        assert!(battle
            .events()
            .contains(&BattleEvent::BattleConcluded(BattleOutcome::PlayerVictory)));

        let err = battle
            .execute(&mut BattleAction::new(UnitId(0), BattleActionType::Kneel))
            .unwrap_err();
        assert_eq!(err, BattleError::BattleConcluded);
        assert_eq!(battle.advance().unwrap_err(), BattleError::BattleConcluded);
    }

    #[test]
    fn test_ai_cheat_reveals_everyone() {
        let mut battle = standoff();
        assert!(battle.visible_units(UnitId(1)).unwrap().is_empty());
        battle.config.ai_cheat_turn = 1;
        battle.end_turn().unwrap();
        battle.end_turn().unwrap();
        assert!(battle.ai_cheating());
        assert_eq!(battle.visible_units(UnitId(1)).unwrap(), vec![UnitId(0)]);
    }

    #[test]
    fn test_tick_walks_projectile() {
        let mut battle = standoff();
        let rules = battle.rules_handle();
        let rifle = battle
            .field
            .add_item("rifle", in_right_hand(UnitId(0)), &rules)
            .unwrap();
        battle
            .field
            .add_item("rifle-clip", ItemLocation::Loaded { weapon: rifle }, &rules)
            .unwrap();

        let mut action = BattleAction::new(UnitId(0), BattleActionType::SnapShot)
            .with_target(ActionTarget::Tile(Position::new(15, 5, 0)));
        battle.execute(&mut action).unwrap();
        let mut ticks = 0;
        while battle.projectile().is_some() {
            battle.tick().unwrap();
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert!(ticks > 1);
        assert!(battle
            .events()
            .iter()
            .any(|e| matches!(e, BattleEvent::ProjectileImpacted { .. })));
        assert_eq!(battle.tick().unwrap(), None);
    }
}
