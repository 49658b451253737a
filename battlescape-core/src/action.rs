//! Battle actions and the table-driven dispatcher
//!
//! Every action carries a closed `BattleActionType` tag. The battle checks
//! the common preconditions (phase, actor state, time units) and then hands
//! the action to the handler registered for its tag. Handlers work out
//! everything they need first and only then commit, so a rejected action
//! leaves the battle untouched.

use crate::ballistics::{Ballistics, Projectile, ProjectileKind, ThrowParams};
use crate::battle::{Battle, Flight, Payload, ShotOrder, THROW_SPEED};
use crate::battlefield::Battlefield;
use crate::error::{BattleError, TargetState};
use crate::event::BattleEvent;
use crate::item::{ItemId, ItemLocation, SlotId};
use crate::pathfinding::{PathRequest, Pathfinder};
use crate::position::{direction_to, facing_steps, Position, Voxel};
use crate::ruleset::{FireMode, ItemKind, ItemRules, MovementType, RuleSet, WeaponProfile};
use crate::unit::{footprint, Unit, UnitId, UnitStatus};
use crate::voxel::VoxelType;
use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// TU per 45 degree turn
pub const TURN_COST: u32 = 1;
pub const KNEEL_COST: u32 = 4;
pub const STAND_COST: u32 = 8;
pub const RELOAD_COST: u32 = 15;
/// Throwing costs this percent of base TU
pub const THROW_TU_PERCENT: u8 = 25;
/// Accuracy bonus for kneeling shooters
const KNEEL_ACCURACY_BONUS: f64 = 1.15;
/// Height above the floor that shots at an empty tile aim for
const TILE_AIM_HEIGHT: i32 = 2;

// ============================================================================
// ACTION TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleActionType {
    Move = 0,
    Turn = 1,
    Kneel = 2,
    Stand = 3,
    AimedShot = 4,
    SnapShot = 5,
    AutoShot = 6,
    Throw = 7,
    Melee = 8,
    UseItem = 9,
    Prime = 10,
    Reload = 11,
    MindControl = 12,
}

impl BattleActionType {
    pub const ALL: [BattleActionType; 13] = [
        BattleActionType::Move,
        BattleActionType::Turn,
        BattleActionType::Kneel,
        BattleActionType::Stand,
        BattleActionType::AimedShot,
        BattleActionType::SnapShot,
        BattleActionType::AutoShot,
        BattleActionType::Throw,
        BattleActionType::Melee,
        BattleActionType::UseItem,
        BattleActionType::Prime,
        BattleActionType::Reload,
        BattleActionType::MindControl,
    ];

    pub fn is_shot(self) -> bool {
        matches!(
            self,
            BattleActionType::AimedShot | BattleActionType::SnapShot | BattleActionType::AutoShot
        )
    }
}

/// What an action is aimed at
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionTarget {
    #[default]
    None,
    Unit(UnitId),
    Tile(Position),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionResult {
    #[default]
    Pending,
    Succeeded,
    Failed(&'static str),
}

/// One requested action and, once executed, its outcome
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleAction {
    pub actor: UnitId,
    pub action_type: BattleActionType,
    pub target: ActionTarget,
    pub item: Option<ItemId>,
    /// Movement type override for this move
    pub movement: Option<MovementType>,
    /// Filled in by the battle before the handler runs
    pub tu_cost: u32,
    pub result: ActionResult,
}

impl BattleAction {
    pub fn new(actor: UnitId, action_type: BattleActionType) -> Self {
        Self {
            actor,
            action_type,
            target: ActionTarget::None,
            item: None,
            movement: None,
            tu_cost: 0,
            result: ActionResult::Pending,
        }
    }

    pub fn move_to(actor: UnitId, destination: Position) -> Self {
        Self::new(actor, BattleActionType::Move).with_target(ActionTarget::Tile(destination))
    }

    pub fn with_target(mut self, target: ActionTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_item(mut self, item: ItemId) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_movement(mut self, movement: MovementType) -> Self {
        self.movement = Some(movement);
        self
    }
}

// ============================================================================
// DISPATCH TABLE
// ============================================================================

pub type ActionHandler = fn(&mut Battle, &mut BattleAction) -> Result<(), BattleError>;

/// Handlers indexed by `BattleActionType as usize`
const HANDLERS: [ActionHandler; 13] = [
    handle_move,
    handle_turn,
    handle_kneel,
    handle_stand,
    handle_shot,
    handle_shot,
    handle_shot,
    handle_throw,
    handle_melee,
    handle_use_item,
    handle_prime,
    handle_reload,
    handle_mind_control,
];

pub fn handler_for(action_type: BattleActionType) -> ActionHandler {
    HANDLERS[action_type as usize]
}

// ============================================================================
// COSTS
// ============================================================================

fn percent_of(base: i32, percent: u8) -> u32 {
    base.max(0) as u32 * percent as u32 / 100
}

/// TU an action will cost, without performing it
pub fn action_cost(
    field: &Battlefield,
    rules: &RuleSet,
    action: &BattleAction,
) -> Result<u32, BattleError> {
    let unit = field.unit(action.actor)?;
    let cost = match action.action_type {
        BattleActionType::Move => {
            let request = PathRequest {
                unit: unit.id,
                origin: unit.position,
                destination: target_tile(field, action)?,
                tu_budget: unit.time_units.max(0) as u32,
                movement: action.movement.unwrap_or(unit.movement),
                preview_only: true,
            };
            Pathfinder::new(field, rules).find_path(&request)?.total_tu
        }
        BattleActionType::Turn => {
            let direction = direction_to(unit.position, target_tile(field, action)?);
            facing_steps(unit.facing, direction) as u32 * TURN_COST
        }
        BattleActionType::Kneel => match unit.status {
            UnitStatus::Standing => KNEEL_COST,
            _ => 0,
        },
        BattleActionType::Stand => match unit.status {
            UnitStatus::Kneeling => STAND_COST,
            _ => 0,
        },
        BattleActionType::AimedShot | BattleActionType::SnapShot | BattleActionType::AutoShot => {
            let (_, _, mode) = firearm(field, rules, unit, action.item, action.action_type)?;
            percent_of(unit.base.time_units, mode.tu_percent)
        }
        BattleActionType::Throw => percent_of(unit.base.time_units, THROW_TU_PERCENT),
        BattleActionType::Melee => {
            let (_, _, mode) = melee_weapon(field, rules, unit, action.item)?;
            percent_of(unit.base.time_units, mode.tu_percent)
        }
        BattleActionType::UseItem | BattleActionType::Prime | BattleActionType::MindControl => {
            let item = action.item.ok_or(BattleError::InvalidTargetState(TargetState::WrongItem))?;
            let item_rules = rules.item(&field.item(item)?.type_id)?;
            percent_of(unit.base.time_units, item_rules.tu_use)
        }
        BattleActionType::Reload => RELOAD_COST,
    };
    Ok(cost)
}

// ============================================================================
// TARGET AND ITEM LOOKUPS
// ============================================================================

fn target_tile(field: &Battlefield, action: &BattleAction) -> Result<Position, BattleError> {
    match action.target {
        ActionTarget::Tile(pos) => Ok(pos),
        ActionTarget::Unit(id) => Ok(field
            .unit(id)
            .map_err(|_| BattleError::InvalidTargetState(TargetState::MissingTarget))?
            .position),
        ActionTarget::None => Err(BattleError::InvalidTargetState(TargetState::MissingTarget)),
    }
}

fn target_unit(field: &Battlefield, action: &BattleAction) -> Result<UnitId, BattleError> {
    let missing = BattleError::InvalidTargetState(TargetState::MissingTarget);
    let id = match action.target {
        ActionTarget::Unit(id) => id,
        ActionTarget::Tile(pos) => field
            .units()
            .iter()
            .find(|u| u.is_alive() && u.footprint().contains(&pos))
            .map(|u| u.id)
            .ok_or(missing.clone())?,
        ActionTarget::None => return Err(missing),
    };
    field.unit(id).map_err(|_| missing)?;
    Ok(id)
}

/// Fail unless the target can still be acted upon
fn require_conscious(unit: &Unit) -> Result<(), BattleError> {
    match unit.status {
        UnitStatus::Dead => Err(BattleError::InvalidTargetState(TargetState::Dead)),
        UnitStatus::Unconscious => Err(BattleError::InvalidTargetState(TargetState::Unconscious)),
        _ => Ok(()),
    }
}

/// Whether two units stand next to each other on the same level
fn adjacent(a: &Unit, b: &Unit) -> bool {
    footprint(a.position, a.size)
        .iter()
        .any(|p| b.footprint().iter().any(|q| p.z == q.z && p.chebyshev_to(*q) <= 1))
}

/// An item the actor carries, optionally restricted to the hands
fn carried_by(
    field: &Battlefield,
    actor: UnitId,
    item: ItemId,
    hands_only: bool,
) -> Result<(), BattleError> {
    let wrong = BattleError::InvalidTargetState(TargetState::WrongItem);
    match field.item(item).map_err(|_| wrong.clone())?.location {
        ItemLocation::Carried { unit, slot, .. }
            if unit == actor && (!hands_only || slot.is_hand()) =>
        {
            Ok(())
        }
        _ => Err(wrong),
    }
}

/// Items in the unit's hands, right hand first
fn hand_items(unit: &Unit) -> Vec<ItemId> {
    [SlotId::RightHand, SlotId::LeftHand]
        .iter()
        .flat_map(|&slot| unit.inventory.in_slot(slot).collect::<Vec<_>>())
        .collect()
}

/// First item in hand (or the requested one) whose profile satisfies `pick`
fn weapon_in_hand<'r, T>(
    field: &Battlefield,
    rules: &'r RuleSet,
    unit: &Unit,
    requested: Option<ItemId>,
    pick: impl Fn(&'r ItemRules) -> Option<T>,
) -> Result<(ItemId, &'r ItemRules, T), BattleError> {
    let candidates = match requested {
        Some(item) => {
            carried_by(field, unit.id, item, true)?;
            vec![item]
        }
        None => hand_items(unit),
    };
    for item in candidates {
        let item_rules = rules.item(&field.item(item)?.type_id)?;
        if let Some(found) = pick(item_rules) {
            return Ok((item, item_rules, found));
        }
    }
    Err(BattleError::InvalidTargetState(TargetState::NoWeapon))
}

fn firearm<'r>(
    field: &Battlefield,
    rules: &'r RuleSet,
    unit: &Unit,
    requested: Option<ItemId>,
    action_type: BattleActionType,
) -> Result<(ItemId, &'r WeaponProfile, FireMode), BattleError> {
    let (item, _, (profile, mode)) = weapon_in_hand(field, rules, unit, requested, |r| {
        if r.kind != ItemKind::Firearm {
            return None;
        }
        let profile = r.weapon.as_ref()?;
        let mode = match action_type {
            BattleActionType::AimedShot => profile.aimed,
            BattleActionType::SnapShot => profile.snap,
            _ => profile.auto,
        }?;
        Some((profile, mode))
    })?;
    Ok((item, profile, mode))
}

fn melee_weapon<'r>(
    field: &Battlefield,
    rules: &'r RuleSet,
    unit: &Unit,
    requested: Option<ItemId>,
) -> Result<(ItemId, &'r ItemRules, FireMode), BattleError> {
    weapon_in_hand(field, rules, unit, requested, |r| r.weapon.as_ref().and_then(|w| w.melee))
}

/// Item the action names, carried anywhere by the actor, of the given kind
fn carried_of_kind<'r>(
    field: &Battlefield,
    rules: &'r RuleSet,
    action: &BattleAction,
    kind: ItemKind,
    mismatch: TargetState,
) -> Result<(ItemId, &'r ItemRules), BattleError> {
    let item = action.item.ok_or(BattleError::InvalidTargetState(TargetState::WrongItem))?;
    carried_by(field, action.actor, item, false)?;
    let item_rules = rules.item(&field.item(item)?.type_id)?;
    if item_rules.kind != kind {
        return Err(BattleError::InvalidTargetState(mismatch));
    }
    Ok((item, item_rules))
}

/// Base firing accuracy from the shooter's stats, as a fraction
pub fn firing_accuracy(unit: &Unit, mode: &FireMode) -> f64 {
    let accuracy = unit.base.firing as f64 / 100.0 * mode.accuracy as f64 / 100.0;
    match unit.status {
        UnitStatus::Kneeling => accuracy * KNEEL_ACCURACY_BONUS,
        _ => accuracy,
    }
}

/// Tiles a unit can throw
pub fn throw_range(unit: &Unit) -> f64 {
    (unit.base.strength as f64 / 2.0).clamp(4.0, 20.0)
}

/// Percent chance for `actor` to take over `target`
pub fn mind_control_chance(actor: &Unit, target: &Unit) -> i32 {
    let distance = actor.position.distance_to(target.position).round() as i32;
    actor.base.psi_skill * actor.base.psi_strength / 50
        - (target.base.psi_strength + target.base.psi_skill / 5)
        + 55
        - distance
}

// ============================================================================
// HANDLERS
// ============================================================================

fn face(battle: &mut Battle, actor: UnitId, target: Position) -> Result<(), BattleError> {
    let unit = battle.field.unit_mut(actor)?;
    if unit.position != target {
        unit.facing = direction_to(unit.position, target);
    }
    Ok(())
}

fn spend(battle: &mut Battle, action: &BattleAction) -> Result<(), BattleError> {
    let unit = battle.field.unit_mut(action.actor)?;
    if !unit.spend_time_units(action.tu_cost) {
        return Err(BattleError::InsufficientTimeUnits {
            required: action.tu_cost,
            available: unit.time_units.max(0) as u32,
        });
    }
    Ok(())
}

fn handle_move(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    let actor = action.actor;
    let destination = target_tile(&battle.field, action)?;
    let unit = battle.field.unit(actor)?;
    let request = PathRequest {
        unit: actor,
        origin: unit.position,
        destination,
        tu_budget: unit.time_units.max(0) as u32,
        movement: action.movement.unwrap_or(unit.movement),
        preview_only: false,
    };
    let path = Pathfinder::new(&battle.field, &battle.rules).find_path(&request)?;
    let available = unit.energy.max(0) as u32;
    if path.total_energy > available {
        return Err(BattleError::InsufficientEnergy { required: path.total_energy, available });
    }

    let mut spent = 0;
    for step in &path.steps {
        let from = battle.field.unit(actor)?.position;
        battle.field.set_unit_occupancy(actor, step.position)?;
        let unit = battle.field.unit_mut(actor)?;
        unit.spend_time_units(step.tu_cost);
        unit.spend_energy(step.energy_cost);
        if step.direction < 8 {
            unit.facing = step.direction;
        }
        spent += step.tu_cost;
        battle.events.push(BattleEvent::UnitMoved { unit: actor, from, to: step.position });

        let delta = battle.refresh_visibility(actor)?;
        if battle.config.interrupt_on_spot && !delta.spotted_units.is_empty() {
            tracing::debug!("Move of {:?} interrupted at {:?}", actor, step.position);
            break;
        }
    }
    action.tu_cost = spent;
    battle.refresh_all_visibility()?;
    Ok(())
}

fn handle_turn(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    let target = target_tile(&battle.field, action)?;
    spend(battle, action)?;
    face(battle, action.actor, target)?;
    let facing = battle.field.unit(action.actor)?.facing;
    battle.events.push(BattleEvent::UnitTurned { unit: action.actor, facing });
    battle.refresh_visibility(action.actor)?;
    Ok(())
}

fn handle_kneel(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    spend(battle, action)?;
    let unit = battle.field.unit_mut(action.actor)?;
    if unit.status == UnitStatus::Standing {
        unit.status = UnitStatus::Kneeling;
    }
    battle.refresh_visibility(action.actor)?;
    Ok(())
}

fn handle_stand(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    spend(battle, action)?;
    let unit = battle.field.unit_mut(action.actor)?;
    if unit.status == UnitStatus::Kneeling {
        unit.status = UnitStatus::Standing;
    }
    battle.refresh_visibility(action.actor)?;
    Ok(())
}

/// Voxel a shot at the action's target aims for
fn shot_target(battle: &Battle, action: &BattleAction) -> Result<Voxel, BattleError> {
    let field = &battle.field;
    let rules = &battle.rules;
    let occupant = match action.target {
        ActionTarget::Unit(id) => {
            let target = field
                .unit(id)
                .map_err(|_| BattleError::InvalidTargetState(TargetState::MissingTarget))?;
            if !target.is_alive() {
                return Err(BattleError::InvalidTargetState(TargetState::Dead));
            }
            Some(id)
        }
        ActionTarget::Tile(pos) => {
            if !field.in_bounds(pos) {
                return Err(BattleError::OutOfBounds(pos));
            }
            field.unit_at(pos)
        }
        ActionTarget::None => {
            return Err(BattleError::InvalidTargetState(TargetState::MissingTarget))
        }
    };
    match (occupant, action.target) {
        (Some(id), _) => Ok(field.center_voxel(id, rules)?),
        (None, ActionTarget::Tile(pos)) => {
            Ok(pos.to_voxel(TILE_AIM_HEIGHT - field.terrain_level(pos, rules)?))
        }
        (None, _) => Err(BattleError::InvalidTargetState(TargetState::MissingTarget)),
    }
}

fn handle_shot(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    let unit = battle.field.unit(action.actor)?;
    let (weapon, profile, mode) =
        firearm(&battle.field, &battle.rules, unit, action.item, action.action_type)?;
    let shots = match action.action_type {
        BattleActionType::AutoShot => profile.auto_shots.max(1) as u32,
        _ => 1,
    };
    let order = ShotOrder {
        shooter: action.actor,
        weapon,
        mode,
        min_range: profile.min_range,
        drop_off: profile.drop_off,
        speed: profile.bullet_speed,
        target: shot_target(battle, action)?,
        burst_index: 0,
        auto: action.action_type == BattleActionType::AutoShot,
        check_line_of_fire: unit.faction == crate::unit::Faction::Player,
    };

    battle.fire_shot(&order)?;
    spend(battle, action)?;
    face(battle, action.actor, order.target.to_tile())?;
    if shots > 1 {
        battle.queue_burst(order, shots - 1);
    }
    Ok(())
}

fn handle_throw(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    let actor = action.actor;
    let item = action.item.ok_or(BattleError::InvalidTargetState(TargetState::WrongItem))?;
    carried_by(&battle.field, actor, item, true)?;
    let target = target_tile(&battle.field, action)?;
    let unit = battle.field.unit(actor)?;
    if unit.position.distance_to(target) > throw_range(unit) {
        return Err(BattleError::InvalidTargetState(TargetState::OutOfRange));
    }
    let params = ThrowParams {
        thrower: actor,
        origin: battle.field.eye_voxel(actor, &battle.rules)?,
        target,
        accuracy: unit.base.throwing as f64 / 100.0,
        max_curvature: battle.config.max_arc_curvature,
        retry_limit: battle.config.throw_retry_limit,
    };

    // Draw from a copy so a failed throw leaves the battle RNG untouched
    let mut rng = battle.rng.clone();
    let result = Ballistics::new(&battle.field, &battle.rules, battle.config.shade)
        .resolve_throw(&params, &mut rng)?;
    battle.rng = rng;

    spend(battle, action)?;
    face(battle, actor, target)?;
    let projectile = Projectile::new(
        ProjectileKind::Thrown,
        Some(item),
        actor,
        result.landing.to_voxel(0),
        result.trajectory,
        VoxelType::Floor,
        THROW_SPEED,
    );
    battle.launch(Flight {
        projectile,
        payload: Payload::Thrown { item, landing: result.landing },
    });
    Ok(())
}

fn handle_melee(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    let actor = action.actor;
    let target = target_unit(&battle.field, action)?;
    let attacker = battle.field.unit(actor)?;
    let victim = battle.field.unit(target)?;
    if target == actor {
        return Err(BattleError::InvalidTargetState(TargetState::MissingTarget));
    }
    require_conscious(victim)?;
    if !adjacent(attacker, victim) {
        return Err(BattleError::InvalidTargetState(TargetState::NotAdjacent));
    }
    let (_, item_rules, mode) = melee_weapon(&battle.field, &battle.rules, attacker, action.item)?;
    let chance = (attacker.base.melee * mode.accuracy as i32 / 100).clamp(0, 100);
    let (power, damage_type) = (item_rules.power as i32, item_rules.damage_type);
    let target_pos = victim.position;

    let hit = battle.rng.gen_range(0..100) < chance;
    spend(battle, action)?;
    face(battle, actor, target_pos)?;
    if hit {
        let amount = power * battle.rng.gen_range(50..=150) / 100;
        let harm = battle.field.apply_unit_damage(target, amount, damage_type, &battle.rules)?;
        if harm.killed {
            battle.field.unit_mut(actor)?.kills += 1;
        }
        battle.events.extend(BattleEvent::from_harm(&harm));
        battle.refresh_all_visibility()?;
    }
    tracing::debug!("Melee {:?} -> {:?}: chance {}%, hit {}", actor, target, chance, hit);
    Ok(())
}

fn handle_use_item(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    let (_, item_rules) = carried_of_kind(
        &battle.field,
        &battle.rules,
        action,
        ItemKind::Medikit,
        TargetState::WrongItem,
    )?;
    let patient = match action.target {
        ActionTarget::None => action.actor,
        _ => target_unit(&battle.field, action)?,
    };
    let (heal, recovery) = (item_rules.heal as i32, item_rules.stun_recovery as i32);
    let healer = battle.field.unit(action.actor)?;
    let treated = battle.field.unit(patient)?;
    if !treated.is_alive() {
        return Err(BattleError::InvalidTargetState(TargetState::Dead));
    }
    // Unconscious patients lie on their last tile
    if patient != action.actor && !adjacent(healer, treated) {
        return Err(BattleError::InvalidTargetState(TargetState::NotAdjacent));
    }

    spend(battle, action)?;
    let unit = battle.field.unit_mut(patient)?;
    unit.health = (unit.health + heal).min(unit.base.health);
    unit.stun = (unit.stun - recovery).max(0);
    let wakes = unit.status == UnitStatus::Unconscious && unit.stun < unit.health;
    if wakes && battle.field.revive_unit(patient)? {
        battle.events.push(BattleEvent::UnitRevived(patient));
        battle.refresh_all_visibility()?;
    }
    Ok(())
}

fn handle_prime(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    let (item, _) = carried_of_kind(
        &battle.field,
        &battle.rules,
        action,
        ItemKind::Grenade,
        TargetState::NotPrimable,
    )?;
    if battle.field.item(item)?.is_primed() {
        return Err(BattleError::InvalidTargetState(TargetState::AlreadyPrimed));
    }
    spend(battle, action)?;
    battle.field.item_mut(item)?.fuse = Some(0);
    Ok(())
}

fn handle_reload(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    let (ammo, _) = carried_of_kind(
        &battle.field,
        &battle.rules,
        action,
        ItemKind::Ammo,
        TargetState::WrongItem,
    )?;
    let unit = battle.field.unit(action.actor)?;
    let ammo_type = battle.field.item(ammo)?.type_id.clone();
    let mut firearms = Vec::new();
    for item in hand_items(unit) {
        let item_rules = battle.rules.item(&battle.field.item(item)?.type_id)?;
        if item_rules.kind == ItemKind::Firearm {
            firearms.push((item, item_rules.compatible_ammo.contains(&ammo_type)));
        }
    }
    let weapon = match firearms.iter().find(|(_, fits)| *fits) {
        Some(&(weapon, _)) => weapon,
        None if firearms.is_empty() => {
            return Err(BattleError::InvalidTargetState(TargetState::NoWeapon))
        }
        None => return Err(BattleError::InvalidTargetState(TargetState::IncompatibleAmmo)),
    };

    spend(battle, action)?;
    battle.field.load_ammo(weapon, ammo, &battle.rules)?;
    Ok(())
}

fn handle_mind_control(battle: &mut Battle, action: &mut BattleAction) -> Result<(), BattleError> {
    carried_of_kind(
        &battle.field,
        &battle.rules,
        action,
        ItemKind::PsiAmp,
        TargetState::WrongItem,
    )?;
    let target = target_unit(&battle.field, action)?;
    let actor = battle.field.unit(action.actor)?;
    let victim = battle.field.unit(target)?;
    require_conscious(victim)?;
    if !actor.faction.is_enemy_of(victim.faction) {
        return Err(BattleError::InvalidTargetState(TargetState::SameFaction));
    }
    let chance = mind_control_chance(actor, victim);
    let faction = actor.faction;

    let success = battle.rng.gen_range(0..100) < chance;
    spend(battle, action)?;
    tracing::debug!(
        "Mind control {:?} -> {:?}: chance {}%, success {}",
        action.actor,
        target,
        chance,
        success
    );
    if success {
        let unit = battle.field.unit_mut(target)?;
        unit.faction = faction;
        unit.prepare_new_turn();
        battle.events.push(BattleEvent::MindControlled { unit: target, faction });
        battle.refresh_all_visibility()?;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
