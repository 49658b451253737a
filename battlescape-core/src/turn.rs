//! Turn and phase control
//!
//! Factions act one after another. When the last faction is done the turn
//! transition resolves everything that happens between turns, always in
//! this order:
//!
//! 1. fire damages occupants, spreads and burns out
//! 2. smoke thins
//! 3. primed fuses tick, expired ones arm their tile
//! 4. every armed tile detonates (chain reactions included)
//! 5. stunned units recover, unconscious ones may wake up
//! 6. morale checks, possibly panicking units
//! 7. turn counter, AI cheat flag, victory checks

use crate::battlefield::Battlefield;
use crate::config::BattleConfig;
use crate::error::BattleError;
use crate::event::BattleEvent;
use crate::explosion::{detonate, Blast};
use crate::item::ItemId;
use crate::position::Position;
use crate::ruleset::{DamageType, RuleSet};
use crate::tile::{PendingExplosive, TilePart};
use crate::unit::{Faction, PanicState, UnitId, UnitStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Fire only spreads along the four cardinal directions
const FIRE_SPREAD_DIRECTIONS: [u8; 4] = [0, 2, 4, 6];

/// Stun points shed per turn transition
pub const STUN_RECOVERY: i32 = 2;

/// Morale regained after breaking
const PANIC_RELIEF: i32 = 15;

/// Upper bound on detonation passes in one transition
const MAX_CHAIN_PASSES: usize = 32;

// ============================================================================
// PHASES
// ============================================================================

/// How a battle ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleOutcome {
    Aborted,
    ObjectivesDestroyed,
    PlayerVictory,
    PlayerDefeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    PlayerTurn,
    HostileTurn,
    NeutralTurn,
    TurnTransition,
    BattleConcluded(BattleOutcome),
}

impl Phase {
    pub fn for_faction(faction: Faction) -> Phase {
        match faction {
            Faction::Player => Phase::PlayerTurn,
            Faction::Hostile => Phase::HostileTurn,
            Faction::Neutral => Phase::NeutralTurn,
        }
    }

    /// Faction allowed to act in this phase
    pub fn faction(self) -> Option<Faction> {
        match self {
            Phase::PlayerTurn => Some(Faction::Player),
            Phase::HostileTurn => Some(Faction::Hostile),
            Phase::NeutralTurn => Some(Faction::Neutral),
            _ => None,
        }
    }

    pub fn is_concluded(self) -> bool {
        matches!(self, Phase::BattleConcluded(_))
    }
}

/// Decide whether the battle is over
pub fn check_outcome(field: &Battlefield) -> Option<BattleOutcome> {
    let mission = &field.mission;
    if mission.objectives_total > 0 && mission.objectives_destroyed >= mission.objectives_total {
        return Some(BattleOutcome::ObjectivesDestroyed);
    }
    let standing =
        |faction: Faction| field.units().iter().any(|u| u.faction == faction && u.is_active());
    if !standing(Faction::Player) {
        return Some(BattleOutcome::PlayerDefeat);
    }
    if !standing(Faction::Hostile) {
        return Some(BattleOutcome::PlayerVictory);
    }
    None
}

/// Restore the pools of every unit of `faction`
pub fn start_faction_turn(field: &mut Battlefield, faction: Faction) -> Result<(), BattleError> {
    let ids: Vec<UnitId> =
        field.units().iter().filter(|u| u.faction == faction).map(|u| u.id).collect();
    for id in ids {
        field.unit_mut(id)?.prepare_new_turn();
    }
    Ok(())
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Phase state machine plus the turn counter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnController {
    phase: Phase,
    turn: u32,
    ai_cheat: bool,
    first_faction: Faction,
}

impl TurnController {
    /// Neutrals never open a turn; a neutral first faction falls back to the player
    pub fn new(first_faction: Faction) -> Self {
        let first_faction = match first_faction {
            Faction::Neutral => Faction::Player,
            faction => faction,
        };
        Self {
            phase: Phase::for_faction(first_faction),
            turn: 1,
            ai_cheat: false,
            first_faction,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Whether the hostile AI may see every unit
    pub fn ai_cheating(&self) -> bool {
        self.ai_cheat
    }

    pub fn acting_faction(&self) -> Option<Faction> {
        self.phase.faction()
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        match self.phase {
            Phase::BattleConcluded(outcome) => Some(outcome),
            _ => None,
        }
    }

    fn faction_order(&self) -> [Faction; 3] {
        match self.first_faction {
            Faction::Hostile => [Faction::Hostile, Faction::Player, Faction::Neutral],
            _ => [Faction::Player, Faction::Hostile, Faction::Neutral],
        }
    }

    /// Faction acting after `current` within this turn, if any
    fn next_faction(&self, field: &Battlefield, current: Faction) -> Option<Faction> {
        let order = self.faction_order();
        let index = order.iter().position(|&f| f == current)?;
        let neutrals_alive =
            field.units().iter().any(|u| u.faction == Faction::Neutral && u.is_alive());
        order[index + 1..]
            .iter()
            .copied()
            .find(|&f| f != Faction::Neutral || neutrals_alive)
    }

    fn enter(&mut self, phase: Phase, events: &mut Vec<BattleEvent>) {
        self.phase = phase;
        tracing::info!("Turn {}: {:?}", self.turn, phase);
        events.push(BattleEvent::PhaseChanged { phase, turn: self.turn });
    }

    /// End the battle; later calls keep the first outcome
    pub fn conclude(&mut self, outcome: BattleOutcome, events: &mut Vec<BattleEvent>) {
        if self.phase.is_concluded() {
            return;
        }
        self.phase = Phase::BattleConcluded(outcome);
        tracing::info!("Battle concluded on turn {}: {:?}", self.turn, outcome);
        events.push(BattleEvent::BattleConcluded(outcome));
    }

    /// Finish the current faction turn and move to the next phase.
    /// Ending the last faction turn runs the full turn transition.
    pub fn end_faction_turn<R: Rng + ?Sized>(
        &mut self,
        field: &mut Battlefield,
        rules: &RuleSet,
        config: &BattleConfig,
        rng: &mut R,
        events: &mut Vec<BattleEvent>,
    ) -> Result<Phase, BattleError> {
        if self.phase.is_concluded() {
            return Err(BattleError::BattleConcluded);
        }
        let next = self.phase.faction().and_then(|f| self.next_faction(field, f));
        if let Some(faction) = next {
            self.enter(Phase::for_faction(faction), events);
            start_faction_turn(field, faction)?;
            return Ok(self.phase);
        }

        self.enter(Phase::TurnTransition, events);
        self.run_transition(field, rules, config, rng, events)?;
        if let Some(outcome) = check_outcome(field) {
            self.conclude(outcome, events);
            return Ok(self.phase);
        }
        let first = self.faction_order()[0];
        self.enter(Phase::for_faction(first), events);
        start_faction_turn(field, first)?;
        Ok(self.phase)
    }

    fn run_transition<R: Rng + ?Sized>(
        &mut self,
        field: &mut Battlefield,
        rules: &RuleSet,
        config: &BattleConfig,
        rng: &mut R,
        events: &mut Vec<BattleEvent>,
    ) -> Result<(), BattleError> {
        burn_fires(field, rules, config, rng, events)?;
        thin_smoke(field);
        tick_fuses(field, rules)?;
        detonate_pending(field, rules, rng, events)?;
        recover_stun(field, events)?;
        check_morale(field, config, rng, events)?;

        self.turn += 1;
        if !self.ai_cheat && self.turn > config.ai_cheat_turn {
            self.ai_cheat = true;
            tracing::info!("AI sees all units from turn {}", self.turn);
            events.push(BattleEvent::AiCheatEnabled { turn: self.turn });
        }
        Ok(())
    }
}

// ============================================================================
// TRANSITION STEPS
// ============================================================================

fn burn_fires<R: Rng + ?Sized>(
    field: &mut Battlefield,
    rules: &RuleSet,
    config: &BattleConfig,
    rng: &mut R,
    events: &mut Vec<BattleEvent>,
) -> Result<(), BattleError> {
    let burning: Vec<Position> =
        field.tiles().iter().filter(|t| t.fire > 0).map(|t| t.position()).collect();
    let (low, high) = config.fire_damage;
    let (low, high) = (low.min(high), high.max(low));
    let mut ignitions: Vec<(Position, u8)> = Vec::new();

    for &pos in &burning {
        for unit in field.units_on(pos) {
            let amount = rng.gen_range(low..=high);
            let harm = field.apply_unit_damage(unit, amount, DamageType::Incendiary, rules)?;
            events.extend(BattleEvent::from_harm(&harm));
        }

        for direction in FIRE_SPREAD_DIRECTIONS {
            let next = pos.neighbor(direction);
            let tile = match field.tile(next) {
                Some(tile) => tile,
                None => continue,
            };
            if tile.fire > 0 || ignitions.iter().any(|(p, _)| *p == next) {
                continue;
            }
            let (mut flammability, mut fuel) = (0u8, 0u8);
            for (_, part) in tile.parts() {
                let def = rules.part(part)?;
                flammability = flammability.max(def.flammability);
                fuel = fuel.max(def.fuel);
            }
            if flammability > 0 && rng.gen_range(0..100u32) < flammability as u32 {
                ignitions.push((next, fuel.max(1)));
            }
        }

        let tile = field.tile_mut(pos).ok_or(BattleError::OutOfBounds(pos))?;
        tile.fire -= 1;
        if tile.fire > 0 {
            continue;
        }
        let parts: Vec<(TilePart, _)> = tile.parts().collect();
        for (slot, part) in parts {
            if rules.part(part)?.flammability == 0 {
                continue;
            }
            for destroyed in field.damage_part(pos, slot, u16::MAX, rules)? {
                events.push(BattleEvent::TerrainDestroyed(destroyed));
            }
        }
    }

    for (pos, turns) in ignitions {
        if let Some(tile) = field.tile_mut(pos) {
            tile.fire = tile.fire.max(turns);
            tracing::debug!("Fire spreads to {:?}", pos);
        }
    }
    Ok(())
}

fn thin_smoke(field: &mut Battlefield) {
    for tile in field.tiles_mut() {
        tile.smoke = tile.smoke.saturating_sub(1);
    }
}

fn tick_fuses(field: &mut Battlefield, rules: &RuleSet) -> Result<(), BattleError> {
    let primed: Vec<(ItemId, u8)> =
        field.items().filter_map(|i| i.fuse.map(|f| (i.id, f))).collect();
    for (id, fuse) in primed {
        if fuse > 0 {
            field.item_mut(id)?.fuse = Some(fuse - 1);
            continue;
        }
        let pos = field.item_position(id)?;
        let item = field.remove_item(id)?;
        let def = rules.item(&item.type_id)?;
        let marker = PendingExplosive {
            power: def.power,
            damage_type: def.damage_type,
            radius: def.blast_radius.max(1),
            source: None,
        };
        if let Some(tile) = field.tile_mut(pos) {
            tile.explosive = Some(marker.stronger(tile.explosive));
        }
        tracing::debug!("Fuse of {} expired at {:?}", item.type_id, pos);
    }
    Ok(())
}

/// Detonate armed tiles in tile index order until no marker is left
fn detonate_pending<R: Rng + ?Sized>(
    field: &mut Battlefield,
    rules: &RuleSet,
    rng: &mut R,
    events: &mut Vec<BattleEvent>,
) -> Result<(), BattleError> {
    for _ in 0..MAX_CHAIN_PASSES {
        let armed: Vec<Position> = field
            .tiles()
            .iter()
            .filter(|t| t.explosive.is_some())
            .map(|t| t.position())
            .collect();
        if armed.is_empty() {
            return Ok(());
        }
        for pos in armed {
            let marker = match field.tile_mut(pos).and_then(|t| t.explosive.take()) {
                Some(marker) => marker,
                None => continue,
            };
            let blast = Blast {
                center: pos,
                power: marker.power,
                damage_type: marker.damage_type,
                radius: marker.radius,
                source: marker.source,
            };
            let report = detonate(field, rules, &blast, rng)?;
            events.extend(BattleEvent::from_explosion(&blast, &report));
        }
    }
    tracing::warn!("Explosives still armed after {} detonation passes", MAX_CHAIN_PASSES);
    Ok(())
}

fn recover_stun(field: &mut Battlefield, events: &mut Vec<BattleEvent>) -> Result<(), BattleError> {
    let stunned: Vec<UnitId> = field
        .units()
        .iter()
        .filter(|u| u.is_alive() && u.stun > 0)
        .map(|u| u.id)
        .collect();
    for id in stunned {
        let unit = field.unit_mut(id)?;
        unit.stun = (unit.stun - STUN_RECOVERY).max(0);
        let wakes = unit.status == UnitStatus::Unconscious && unit.stun < unit.health;
        if wakes && field.revive_unit(id)? {
            tracing::info!("Unit {:?} regains consciousness", id);
            events.push(BattleEvent::UnitRevived(id));
        }
    }
    Ok(())
}

fn check_morale<R: Rng + ?Sized>(
    field: &mut Battlefield,
    config: &BattleConfig,
    rng: &mut R,
    events: &mut Vec<BattleEvent>,
) -> Result<(), BattleError> {
    let active: Vec<UnitId> =
        field.units().iter().filter(|u| u.is_active()).map(|u| u.id).collect();
    for id in active {
        let morale = field.unit(id)?.morale;
        if morale >= config.panic_threshold {
            continue;
        }
        let chance = (100 - 2 * morale).clamp(0, 100);
        if rng.gen_range(0..100) >= chance {
            continue;
        }
        let state = if rng.gen_range(0..3) == 0 {
            PanicState::Berserk
        } else {
            PanicState::Panicking
        };

        match state {
            PanicState::Panicking => {
                let unit = field.unit(id)?;
                let pos = unit.position;
                let held: Vec<ItemId> = unit
                    .inventory
                    .placements()
                    .filter(|p| p.slot.is_hand())
                    .map(|p| p.item)
                    .collect();
                for item in held {
                    field.place_on_ground(item, pos)?;
                }
            }
            _ => field.unit_mut(id)?.facing = rng.gen_range(0..8),
        }

        let unit = field.unit_mut(id)?;
        unit.panic = state;
        unit.change_morale(PANIC_RELIEF);
        tracing::info!("Unit {:?} breaks: {:?}", id, state);
        events.push(BattleEvent::Panic { unit: id, state });
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemLocation, SlotId};
    use crate::ruleset::parts;
    use crate::unit::Unit;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn arena(rules: &RuleSet) -> Battlefield {
        let mut field = Battlefield::new(16, 16, 1);
        for y in 0..16 {
            for x in 0..16 {
                field
                    .set_part(Position::new(x, y, 0), TilePart::Floor, Some(parts::CONCRETE))
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

    /// One soldier against one sectoid, far apart
    fn carried(unit: UnitId, slot: SlotId) -> ItemLocation {
        ItemLocation::Carried { unit, slot, x: 0, y: 0 }
    }

    fn skirmish(rules: &RuleSet) -> (Battlefield, UnitId, UnitId) {
        let mut field = arena(rules);
        let soldier = spawn(&mut field, rules, "soldier", Faction::Player, Position::new(1, 1, 0));
        let sectoid =
            spawn(&mut field, rules, "sectoid", Faction::Hostile, Position::new(14, 14, 0));
        (field, soldier, sectoid)
    }

    fn end_turn(
        turn: &mut TurnController,
        field: &mut Battlefield,
        rules: &RuleSet,
        config: &BattleConfig,
        rng: &mut ChaCha8Rng,
    ) -> (Phase, Vec<BattleEvent>) {
        let mut events = Vec::new();
        let phase = turn.end_faction_turn(field, rules, config, rng, &mut events).unwrap();
        (phase, events)
    }

    #[test]
    fn test_phase_cycle() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, soldier, _) = skirmish(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut turn = TurnController::new(Faction::Player);
        assert_eq!(turn.phase(), Phase::PlayerTurn);

        field.unit_mut(soldier).unwrap().time_units = 3;
        let (phase, _) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        assert_eq!(phase, Phase::HostileTurn);
        assert_eq!(turn.turn(), 1);

        // No neutrals on the field: straight through the transition
        let (phase, events) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        assert_eq!(phase, Phase::PlayerTurn);
        assert_eq!(turn.turn(), 2);
        assert!(events.contains(&BattleEvent::PhaseChanged {
            phase: Phase::TurnTransition,
            turn: 1
        }));
        assert_eq!(field.unit(soldier).unwrap().time_units, 60);
    }

    #[test]
    fn test_neutral_turn_only_with_neutrals() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, _, _) = skirmish(&rules);
        let civilian =
            spawn(&mut field, &rules, "civilian", Faction::Neutral, Position::new(7, 7, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut turn = TurnController::new(Faction::Hostile);
        assert_eq!(turn.phase(), Phase::HostileTurn);

        assert_eq!(end_turn(&mut turn, &mut field, &rules, &config, &mut rng).0, Phase::PlayerTurn);
        assert_eq!(
            end_turn(&mut turn, &mut field, &rules, &config, &mut rng).0,
            Phase::NeutralTurn
        );
        assert_eq!(
            end_turn(&mut turn, &mut field, &rules, &config, &mut rng).0,
            Phase::HostileTurn
        );

        field.kill_unit(civilian, &rules).unwrap();
        assert_eq!(end_turn(&mut turn, &mut field, &rules, &config, &mut rng).0, Phase::PlayerTurn);
        assert_eq!(
            end_turn(&mut turn, &mut field, &rules, &config, &mut rng).0,
            Phase::HostileTurn
        );
    }

    #[test]
    fn test_fire_and_smoke() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, soldier, _) = skirmish(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut turn = TurnController::new(Faction::Player);

        field.tile_mut(Position::new(1, 1, 0)).unwrap().fire = 2;
        field.tile_mut(Position::new(5, 5, 0)).unwrap().smoke = 3;
        field.set_part(Position::new(9, 9, 0), TilePart::Object, Some(parts::CRATE)).unwrap();
        field.tile_mut(Position::new(9, 9, 0)).unwrap().fire = 1;

        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        let (_, events) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);

        let health = field.unit(soldier).unwrap().health;
        assert!((25..=30).contains(&health), "health {}", health);
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::UnitDamaged { unit, .. } if *unit == soldier)));
        assert_eq!(field.tile(Position::new(1, 1, 0)).unwrap().fire, 1);
        assert_eq!(field.tile(Position::new(5, 5, 0)).unwrap().smoke, 2);

        // The crate burned out and left rubble; concrete never catches
        let crate_tile = field.tile(Position::new(9, 9, 0)).unwrap();
        assert_eq!(crate_tile.fire, 0);
        assert_eq!(crate_tile.part(TilePart::Object), Some(parts::RUBBLE));
        assert_eq!(field.tile(Position::new(10, 9, 0)).unwrap().fire, 0);
    }

    #[test]
    fn test_fuse_countdown_and_detonation() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, _, sectoid) = skirmish(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut turn = TurnController::new(Faction::Player);

        let grenade = field
            .add_item("grenade", ItemLocation::Ground(Position::new(14, 14, 0)), &rules)
            .unwrap();
        field.item_mut(grenade).unwrap().fuse = Some(1);

        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        assert_eq!(field.item(grenade).unwrap().fuse, Some(0));
        assert_eq!(field.unit(sectoid).unwrap().health, 30);

        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        let (_, events) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        assert!(field.item(grenade).is_err());
        let blast_at = Position::new(14, 14, 0);
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::Explosion { center, .. } if *center == blast_at)));
        assert!(field.unit(sectoid).unwrap().health < 30);
        assert!(field.tile(Position::new(14, 14, 0)).unwrap().explosive.is_none());
    }

    #[test]
    fn test_chain_reaction_in_one_transition() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, _, _) = skirmish(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut turn = TurnController::new(Faction::Player);

        field.set_part(Position::new(6, 5, 0), TilePart::Object, Some(parts::FUEL_BARREL)).unwrap();
        field.tile_mut(Position::new(5, 5, 0)).unwrap().explosive =
            Some(PendingExplosive::terrain(60));

        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        let (_, events) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        let blasts: Vec<Position> = events
            .iter()
            .filter_map(|e| match e {
                BattleEvent::Explosion { center, .. } => Some(*center),
                _ => None,
            })
            .collect();
        assert_eq!(blasts, vec![Position::new(5, 5, 0), Position::new(6, 5, 0)]);
        assert!(field.tiles().iter().all(|t| t.explosive.is_none()));
    }

    #[test]
    fn test_detonation_precedes_morale() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, survivor, _) = skirmish(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut turn = TurnController::new(Faction::Player);

        // Four soldiers packed around a big charge; the survivor is far away
        let center = Position::new(8, 8, 0);
        let cluster = [
            center,
            center.offset(1, 0, 0),
            center.offset(-1, 0, 0),
            center.offset(0, 1, 0),
        ];
        for pos in cluster {
            spawn(&mut field, &rules, "soldier", Faction::Player, pos);
        }
        field.unit_mut(survivor).unwrap().morale = 50;
        field.tile_mut(center).unwrap().explosive = Some(PendingExplosive {
            power: 200,
            damage_type: DamageType::Explosive,
            radius: 1,
            source: None,
        });

        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        let (_, events) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);

        let explosion = events
            .iter()
            .position(|e| matches!(e, BattleEvent::Explosion { .. }))
            .unwrap();
        let panic = events
            .iter()
            .position(|e| matches!(e, BattleEvent::Panic { unit, .. } if *unit == survivor))
            .unwrap();
        assert!(explosion < panic);
        // Four deaths at 14 morale each broke a unit that started at the threshold
        let unit = field.unit(survivor).unwrap();
        assert_eq!(unit.morale, PANIC_RELIEF);
        assert_eq!(unit.time_units, 0);
    }

    #[test]
    fn test_panicking_unit_drops_weapon() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, soldier, _) = skirmish(&rules);
        let rifle = field
            .add_item("rifle", carried(soldier, SlotId::RightHand), &rules)
            .unwrap();
        field.unit_mut(soldier).unwrap().morale = 0;

        let mut events = Vec::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        check_morale(&mut field, &config, &mut rng, &mut events).unwrap();
        let unit = field.unit(soldier).unwrap();
        match unit.panic {
            PanicState::Panicking => {
                let dropped = ItemLocation::Ground(Position::new(1, 1, 0));
                assert_eq!(field.item(rifle).unwrap().location, dropped);
            }
            PanicState::Berserk => assert!(unit.inventory.find(rifle).is_some()),
            PanicState::Calm => panic!("morale 0 always breaks"),
        }
    }

    #[test]
    fn test_stun_recovery_revives() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, soldier, _) = skirmish(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut turn = TurnController::new(Faction::Player);

        field.apply_unit_damage(soldier, 36, DamageType::Stun, &rules).unwrap();
        assert_eq!(field.unit(soldier).unwrap().status, UnitStatus::Unconscious);
        // Stun 36 against health 35: one transition brings it to 34
        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        let (_, events) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        assert!(events.contains(&BattleEvent::UnitRevived(soldier)));
        assert_eq!(field.unit(soldier).unwrap().status, UnitStatus::Standing);
        assert_eq!(field.unit_at(Position::new(1, 1, 0)), Some(soldier));
    }

    #[test]
    fn test_ai_cheat_after_configured_turn() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default().with_ai_cheat_turn(2);
        let (mut field, _, _) = skirmish(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut turn = TurnController::new(Faction::Player);

        for _ in 0..2 {
            end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        }
        assert_eq!(turn.turn(), 2);
        assert!(!turn.ai_cheating());
        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        let (_, events) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        assert!(turn.ai_cheating());
        assert!(events.contains(&BattleEvent::AiCheatEnabled { turn: 3 }));
    }

    #[test]
    fn test_outcomes() {
        let rules = RuleSet::standard();
        let (mut field, soldier, sectoid) = skirmish(&rules);
        assert_eq!(check_outcome(&field), None);

        field.mission.objectives_total = 1;
        field.mission.objectives_destroyed = 1;
        assert_eq!(check_outcome(&field), Some(BattleOutcome::ObjectivesDestroyed));
        field.mission.objectives_total = 0;

        field.knock_out(sectoid).unwrap();
        assert_eq!(check_outcome(&field), Some(BattleOutcome::PlayerVictory));
        field.kill_unit(soldier, &rules).unwrap();
        assert_eq!(check_outcome(&field), Some(BattleOutcome::PlayerDefeat));
    }

    #[test]
    fn test_transition_concludes_battle() {
        let rules = RuleSet::standard();
        let config = BattleConfig::default();
        let (mut field, _, sectoid) = skirmish(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let mut turn = TurnController::new(Faction::Player);

        field.tile_mut(Position::new(14, 14, 0)).unwrap().explosive = Some(PendingExplosive {
            power: 150,
            damage_type: DamageType::Explosive,
            radius: 1,
            source: None,
        });
        end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        let (phase, events) = end_turn(&mut turn, &mut field, &rules, &config, &mut rng);
        assert!(!field.unit(sectoid).unwrap().is_alive());
        assert_eq!(phase, Phase::BattleConcluded(BattleOutcome::PlayerVictory));
        assert_eq!(
            events.last(),
            Some(&BattleEvent::BattleConcluded(BattleOutcome::PlayerVictory))
        );

        let mut events = Vec::new();
        let err = turn
            .end_faction_turn(&mut field, &rules, &config, &mut rng, &mut events)
            .unwrap_err();
        assert_eq!(err, BattleError::BattleConcluded);
        turn.conclude(BattleOutcome::Aborted, &mut events);
        assert_eq!(turn.outcome(), Some(BattleOutcome::PlayerVictory));
    }
}
