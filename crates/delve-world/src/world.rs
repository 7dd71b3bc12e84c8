//! The `World` trait: the single seam between Delve and its host.
//!
//! Everything the dungeon core needs from the surrounding environment is
//! expressed here: cell materials, region residency, actor and unit
//! queries, and presentation effects. The core never holds a live handle
//! to a host object; it calls through this trait with plain ids and lets
//! the host resolve them.
//!
//! Methods fall into two groups:
//!
//! - **Required**: state the simulation depends on (materials, positions,
//!   liveness, spawning). A host must implement these.
//! - **Presentation defaults**: titles, messages, status effects, boss
//!   bars, capture UI. These default to no-ops so a headless host (or a
//!   test) can ignore them.

use serde::{Deserialize, Serialize};

use crate::{ActorId, CellPos, EntityId, InstanceId, MaterialId, SessionKey, Volume};

// ---------------------------------------------------------------------------
// Support types
// ---------------------------------------------------------------------------

/// The tracking tag a spawned unit carries.
///
/// The encounter engine finds its own units by tag when polling for wave
/// completion, so host-spawned ambient creatures are never miscounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitTag {
    /// A raid-wave add.
    Raid,
    /// The boss unit itself.
    Boss,
}

/// A request to spawn one hostile unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpawn {
    pub pos: CellPos,
    /// Species identifier from the difficulty roster.
    pub species: String,
    pub tag: UnitTag,
    /// Elite variants roll on legendary runs.
    pub elite: bool,
    /// Optional size override (boss entries carry one).
    pub scale: Option<f64>,
}

/// A counteracting environmental source near an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// A fire-ish marker; regresses the freeze accumulator.
    Fire,
    /// Cooling water; regresses the heat accumulator.
    Water,
}

/// Status penalties the hazard milestones apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    Slowness,
    Blindness,
}

/// One status application: kind, strength, and how long it lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: StatusKind,
    /// 0-based amplifier (0 = level I).
    pub amplifier: u8,
    pub duration_ticks: u32,
}

/// Consumables the core recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Regresses the freeze accumulator when used.
    ThawTonic,
    /// Regresses the heat accumulator when used.
    CoolingDraught,
    /// Guarantees a secret-room capture, consumed on use.
    CaptureSigil,
}

/// What a secret-room capture interaction offers a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOffer {
    /// Species being offered.
    pub species: String,
    /// Whether the guaranteed-capture option should be shown
    /// (the actor holds a [`ItemKind::CaptureSigil`]).
    pub guaranteed_option: bool,
}

// ---------------------------------------------------------------------------
// The trait
// ---------------------------------------------------------------------------

/// Host-environment access for the dungeon core.
///
/// All calls happen on the authoritative tick thread; implementations do
/// not need interior synchronization. The barrier controller's off-thread
/// marshal lives above this trait, not inside it.
pub trait World {
    // -- Time --

    /// The current tick of this environment. Monotonic.
    fn current_tick(&self) -> u64;

    // -- Materials and regions --

    /// The material occupying a cell. Unset cells are air.
    fn material_at(&self, pos: CellPos) -> MaterialId;

    /// Overwrite a cell. Returns whether the cell actually changed.
    fn set_material(&mut self, pos: CellPos, material: MaterialId) -> bool;

    /// Whether the cell carries auxiliary state (container inventory,
    /// spawner data, …). Such cells are never overwritten by a barrier.
    fn has_aux_state(&self, pos: CellPos) -> bool;

    /// Whether every cell of the volume is resident in memory.
    fn is_region_loaded(&self, volume: &Volume) -> bool;

    /// Force the volume resident. Mutating an unloaded region is
    /// undefined, so callers must invoke this first.
    fn force_load_region(&mut self, volume: &Volume);

    /// Hold the volume resident on behalf of an instance.
    fn pin_region(&mut self, instance: InstanceId, volume: Volume);

    /// Drop every residency hold owned by the instance.
    fn release_region(&mut self, instance: InstanceId);

    // -- Actors --

    /// Whether the actor is currently connected.
    fn actor_online(&self, actor: ActorId) -> bool;

    /// The actor's cell, or `None` when offline.
    fn actor_pos(&self, actor: ActorId) -> Option<CellPos>;

    /// Whether the actor is alive (false for downed/dead actors).
    fn actor_alive(&self, actor: ActorId) -> bool;

    /// Spectators are present but ineligible for encounters.
    fn actor_spectator(&self, _actor: ActorId) -> bool {
        false
    }

    /// Move the actor to a cell (standing on its center).
    fn teleport(&mut self, actor: ActorId, pos: CellPos);

    // -- Units --

    /// Spawn a hostile unit. `None` if the host refused the spawn.
    fn spawn_unit(&mut self, spawn: UnitSpawn) -> Option<EntityId>;

    /// Live units carrying `tag` whose position intersects the volume.
    fn units_in(&self, volume: &Volume, tag: UnitTag) -> Vec<EntityId>;

    fn unit_alive(&self, unit: EntityId) -> bool;

    fn unit_pos(&self, unit: EntityId) -> Option<CellPos>;

    /// `(current, max)` health, or `None` if the unit is gone.
    fn unit_health(&self, unit: EntityId) -> Option<(f32, f32)>;

    /// Despawn a unit. Returns whether it existed.
    fn remove_unit(&mut self, unit: EntityId) -> bool;

    /// Despawn every tagged unit intersecting the volume, returning the
    /// count. Used by end-of-session cleanup.
    fn remove_units_in(&mut self, volume: &Volume, tag: UnitTag) -> usize;

    // -- Environmental sources --

    /// Whether a source of the given kind exists within `radius` cells
    /// (Chebyshev) of the position.
    fn source_near(&self, pos: CellPos, kind: SourceKind, radius: i32) -> bool;

    // -- Consumables --

    fn actor_has_item(&self, _actor: ActorId, _item: ItemKind) -> bool {
        false
    }

    /// Consume one of the item. Returns whether one was consumed.
    fn consume_item(&mut self, _actor: ActorId, _item: ItemKind) -> bool {
        false
    }

    /// Deliver a secret-room capture reward.
    fn grant_reward(&mut self, _actor: ActorId, _species: &str) {}

    // -- Presentation (default no-ops) --

    fn apply_status(&mut self, _actor: ActorId, _effect: StatusEffect) {}

    /// Lock or unlock an actor's movement (the frozen state).
    fn set_movement_locked(&mut self, _actor: ActorId, _locked: bool) {}

    /// Set the actor on fire for the given number of seconds.
    fn ignite(&mut self, _actor: ActorId, _seconds: u32) {}

    /// Run a host command string (scripted room actions).
    fn run_command(&mut self, _command: &str) {}

    fn send_title(&mut self, _actor: ActorId, _title: &str, _subtitle: &str) {}

    fn send_message(&mut self, _actor: ActorId, _message: &str) {}

    fn broadcast(&mut self, _message: &str) {}

    /// Update a session-scoped progress bar for the given viewers.
    fn update_boss_bar(
        &mut self,
        _key: &SessionKey,
        _title: &str,
        _fraction: f32,
        _viewers: &[ActorId],
    ) {
    }

    fn clear_boss_bar(&mut self, _key: &SessionKey) {}

    /// Open the capture interaction surface for an actor.
    fn open_capture_ui(&mut self, _actor: ActorId, _offer: &CaptureOffer) {}

    /// Force-close the capture interaction surface.
    fn close_capture_ui(&mut self, _actor: ActorId) {}
}
