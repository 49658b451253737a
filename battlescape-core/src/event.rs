//! Presentation events
//!
//! Everything the battle changes is also reported as a `BattleEvent`, so a
//! front end can animate the outcome without diffing state.

use crate::action::BattleActionType;
use crate::ballistics::ProjectileKind;
use crate::battlefield::{DestroyedPart, Fall, UnitHarm};
use crate::explosion::{Blast, ExplosionReport};
use crate::item::ItemId;
use crate::position::{Position, Voxel};
use crate::ruleset::DamageType;
use crate::turn::{BattleOutcome, Phase};
use crate::unit::{Faction, PanicState, UnitId};
use crate::voxel::VoxelType;

#[derive(Clone, Debug, PartialEq)]
pub enum BattleEvent {
    ActionResolved {
        actor: UnitId,
        action: BattleActionType,
        /// `None` on success, otherwise the error code
        code: Option<&'static str>,
    },
    UnitMoved {
        unit: UnitId,
        from: Position,
        to: Position,
    },
    UnitTurned {
        unit: UnitId,
        facing: u8,
    },
    ProjectileSpawned {
        kind: ProjectileKind,
        origin: Voxel,
        target: Voxel,
    },
    ProjectileMoved(Voxel),
    ProjectileImpacted {
        voxel: Voxel,
        hit: VoxelType,
    },
    ItemLanded {
        item: ItemId,
        pos: Position,
    },
    UnitDamaged {
        unit: UnitId,
        damage: i32,
        stun: i32,
    },
    UnitKnockedOut(UnitId),
    UnitKilled(UnitId),
    UnitFell(Fall),
    UnitRevived(UnitId),
    TerrainDestroyed(DestroyedPart),
    Explosion {
        center: Position,
        power: u16,
        damage_type: DamageType,
    },
    TilesDiscovered {
        count: usize,
    },
    UnitSpotted {
        spotter: UnitId,
        target: UnitId,
    },
    Panic {
        unit: UnitId,
        state: PanicState,
    },
    MindControlled {
        unit: UnitId,
        faction: Faction,
    },
    PhaseChanged {
        phase: Phase,
        turn: u32,
    },
    AiCheatEnabled {
        turn: u32,
    },
    BattleConcluded(BattleOutcome),
}

impl BattleEvent {
    /// Events describing one unit's harm, in the order a viewer should see them
    pub fn from_harm(harm: &UnitHarm) -> Vec<BattleEvent> {
        let mut events = Vec::with_capacity(2);
        if harm.damage > 0 || harm.stun > 0 {
            events.push(BattleEvent::UnitDamaged {
                unit: harm.unit,
                damage: harm.damage,
                stun: harm.stun,
            });
        }
        if harm.killed {
            events.push(BattleEvent::UnitKilled(harm.unit));
        } else if harm.knocked_out {
            events.push(BattleEvent::UnitKnockedOut(harm.unit));
        }
        events
    }

    /// Explosion followed by everything it harmed and destroyed
    pub fn from_explosion(blast: &Blast, report: &ExplosionReport) -> Vec<BattleEvent> {
        let mut events = vec![BattleEvent::Explosion {
            center: blast.center,
            power: blast.power,
            damage_type: blast.damage_type,
        }];
        events.extend(report.harmed.iter().flat_map(BattleEvent::from_harm));
        events.extend(report.destroyed.iter().copied().map(BattleEvent::TerrainDestroyed));
        events
    }
}
