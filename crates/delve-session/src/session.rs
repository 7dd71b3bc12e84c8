//! The session aggregate: one running dungeon instance for one party.
//!
//! A `Session` owns every sub-state by value (room runtimes, the boss
//! machine, per-actor hazards, the optional secret-room flow) and never
//! hands out back-references. Anything scheduled for a future tick
//! carries the session's key and instance id, not a reference, so stale
//! work resolves to a no-op instead of a dangling pointer.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use delve_encounter::{BossMachine, RaidMachine, SecretMachine, SecretRoomPlan};
use delve_hazard::{FreezeConfig, FreezeMachine, HeatConfig, HeatMachine};
use delve_topology::{ResolvedRoom, Topology};
use delve_world::{ActorId, CellPos, InstanceId, SessionKey};
use serde::{Deserialize, Serialize};

use crate::{ReadyVote, RoomAction, SessionError};

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DungeonStatus {
    /// Rooms and encounters are live.
    Running,
    /// The boss fell; waiting on the ready quorum.
    AwaitingProgress,
    /// The run escalated into the secret-room flow.
    SecretRoom,
    /// Ended; kept only until the registry drops it.
    Ended,
}

/// Lives granted by party size: solo runs get one, pairs three,
/// anything larger five.
pub fn lives_for_party(size: usize) -> u32 {
    match size {
        0..=1 => 1,
        2 => 3,
        _ => 5,
    }
}

/// Runtime state layered over one resolved room.
#[derive(Debug, Clone)]
pub struct RoomRuntime {
    pub room: ResolvedRoom,
    /// Present only for rooms with spawn points (never the boss room).
    pub raid: Option<RaidMachine>,
    /// Victory-cleanup guards: a racing duplicate detection must not
    /// double-run the sweep.
    pub cleanup_running: bool,
    pub cleanup_done: bool,
    pub actions: Vec<RoomAction>,
    /// Actors who have triggered this room's entry hooks.
    pub entered: BTreeSet<ActorId>,
    /// Earliest tick at which a manual door-open is accepted again.
    pub door_reopen_ready_tick: u64,
    /// Per-actor tick until which re-triggering is suppressed.
    trigger_cooldowns: BTreeMap<ActorId, u64>,
}

impl RoomRuntime {
    pub fn new(room: ResolvedRoom, raid: Option<RaidMachine>, actions: Vec<RoomAction>) -> Self {
        Self {
            room,
            raid,
            cleanup_running: false,
            cleanup_done: false,
            actions,
            entered: BTreeSet::new(),
            door_reopen_ready_tick: 0,
            trigger_cooldowns: BTreeMap::new(),
        }
    }

    /// Check-and-arm the per-actor trigger cooldown.
    pub fn try_trigger(&mut self, actor: ActorId, now: u64, cooldown_ticks: u64) -> bool {
        if self.trigger_cooldowns.get(&actor).is_some_and(|&until| now < until) {
            return false;
        }
        self.trigger_cooldowns.insert(actor, now + cooldown_ticks);
        true
    }
}

/// One running dungeon instance.
#[derive(Debug)]
pub struct Session {
    pub key: SessionKey,
    pub instance: InstanceId,
    pub dungeon_type: String,
    pub leader: ActorId,
    /// The party roster snapshotted at start, in party order.
    pub players: Vec<ActorId>,
    pub topology: Topology,
    pub rooms: Vec<RoomRuntime>,
    pub spawn_point: CellPos,
    pub lives: u32,
    pub legendary: bool,
    pub status: DungeonStatus,
    pub created_tick: u64,
    /// Wall-clock creation time (unix seconds), for listings.
    pub created_unix: u64,
    pub boss: BossMachine,
    pub freeze: BTreeMap<ActorId, FreezeMachine>,
    pub heat: BTreeMap<ActorId, HeatMachine>,
    /// Geometry claimed for the legendary escalation, if any was
    /// configured for this dungeon.
    pub secret_plan: Option<SecretRoomPlan>,
    pub secret: Option<SecretMachine>,
    ready: Option<ReadyVote>,
    /// Tick since which no participant has been online.
    pub idle_since_tick: Option<u64>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: SessionKey,
        instance: InstanceId,
        dungeon_type: String,
        leader: ActorId,
        players: Vec<ActorId>,
        topology: Topology,
        rooms: Vec<RoomRuntime>,
        spawn_point: CellPos,
        legendary: bool,
        created_tick: u64,
        boss: BossMachine,
        freeze_config: &FreezeConfig,
        heat_config: &HeatConfig,
    ) -> Self {
        let lives = lives_for_party(players.len());
        let freeze = players
            .iter()
            .map(|&a| (a, FreezeMachine::new(freeze_config.clone())))
            .collect();
        let heat = players
            .iter()
            .map(|&a| (a, HeatMachine::new(heat_config.clone())))
            .collect();
        let created_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            key,
            instance,
            dungeon_type,
            leader,
            players,
            topology,
            rooms,
            spawn_point,
            lives,
            legendary,
            status: DungeonStatus::Running,
            created_tick,
            created_unix,
            boss,
            freeze,
            heat,
            secret_plan: None,
            secret: None,
            ready: None,
            idle_since_tick: None,
        }
    }

    pub fn is_member(&self, actor: ActorId) -> bool {
        self.players.contains(&actor)
    }

    pub fn is_ended(&self) -> bool {
        self.status == DungeonStatus::Ended
    }

    /// Index of the room containing the position, if any.
    pub fn room_index_at(&self, pos: CellPos) -> Option<usize> {
        self.rooms.iter().position(|r| r.room.volume.contains(pos))
    }

    pub fn boss_room(&self) -> &RoomRuntime {
        &self.rooms[self.topology.boss_room]
    }

    /// A death costs the party a life (saturating) and is forwarded to
    /// any raid tracking the actor.
    pub fn note_death(&mut self, actor: ActorId) {
        if !self.is_member(actor) {
            return;
        }
        self.lives = self.lives.saturating_sub(1);
        for room in &mut self.rooms {
            if let Some(raid) = &mut room.raid {
                raid.note_death(actor);
            }
        }
        tracing::info!(key = %self.key, %actor, lives = self.lives, "party member down");
    }

    pub fn note_respawn(&mut self, actor: ActorId) {
        for room in &mut self.rooms {
            if let Some(raid) = &mut room.raid {
                raid.note_respawn(actor);
            }
        }
        if let Some(freeze) = self.freeze.get_mut(&actor) {
            freeze.reset();
        }
        if let Some(heat) = self.heat.get_mut(&actor) {
            heat.reset();
        }
    }

    // -- Ready phase ------------------------------------------------------

    /// Enter the post-boss ready phase. `online_party` is the quorum
    /// snapshot: the members online at the moment of victory.
    pub fn begin_ready_phase(&mut self, online_party: usize, cooldown_ticks: u64) {
        let quota = online_party.clamp(1, self.players.len().max(1));
        self.status = DungeonStatus::AwaitingProgress;
        self.ready = Some(ReadyVote::new(quota, cooldown_ticks));
        tracing::info!(key = %self.key, quota, "ready phase opened");
    }

    /// Cast a ready vote. `Ok(true)` exactly once, when the vote
    /// completes the quorum.
    pub fn progress_ready(&mut self, actor: ActorId, now: u64) -> Result<bool, SessionError> {
        if !self.is_member(actor) {
            return Err(SessionError::NotAMember {
                key: self.key.clone(),
                actor,
            });
        }
        let Some(vote) = &mut self.ready else {
            return Err(SessionError::NotInReadyPhase);
        };
        vote.try_vote(actor, now)
    }

    pub fn ready_votes(&self) -> Option<(usize, usize)> {
        self.ready.as_ref().map(|v| (v.votes(), v.quota()))
    }

    // -- Idle tracking ----------------------------------------------------

    /// Track whether anyone is online; returns how long the session has
    /// been idle, in ticks.
    pub fn update_idle(&mut self, any_online: bool, now: u64) -> u64 {
        if any_online {
            self.idle_since_tick = None;
            return 0;
        }
        let since = *self.idle_since_tick.get_or_insert(now);
        now.saturating_sub(since)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lives_by_party_size() {
        assert_eq!(lives_for_party(1), 1);
        assert_eq!(lives_for_party(2), 3);
        assert_eq!(lives_for_party(3), 5);
        assert_eq!(lives_for_party(6), 5);
    }

    #[test]
    fn test_trigger_cooldown_arms_and_expires() {
        let room = ResolvedRoom {
            volume: delve_world::Volume::new(CellPos::new(0, 0, 0), CellPos::new(24, 6, 24)),
            kind: delve_topology::RoomKind::Standard,
            doors: Vec::new(),
        };
        let mut runtime = RoomRuntime::new(room, None, Vec::new());
        let actor = ActorId(1);

        assert!(runtime.try_trigger(actor, 100, 20));
        assert!(!runtime.try_trigger(actor, 110, 20));
        assert!(runtime.try_trigger(actor, 120, 20));
        // Independent per actor.
        assert!(runtime.try_trigger(ActorId(2), 110, 20));
    }
}
