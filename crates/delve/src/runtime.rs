//! The dungeon runtime: registry, scheduler, barriers, and the tick
//! entry point that drives every live session.
//!
//! All state lives in one [`DungeonRuntime`] value owned by the host's
//! tick task; nothing here is global. Player surfaces (votes, door
//! opens, captures) and host hooks (death, respawn, disconnect) mutate
//! the same value between ticks, so no interior locking is needed.
//!
//! The intra-tick order is fixed: drained deferred actions run first,
//! then per-session lifecycle checks, the raid and boss polls, room
//! entry, and hazards. Later steps always observe the effects of
//! earlier ones within the same tick.

use std::collections::BTreeMap;

use delve_barrier::{BarrierConfig, BarrierController, BarrierKey, BarrierState};
use delve_encounter::{
    BossMachine, BossSignal, CaptureOutcome, GuiCloseAction, RaidMachine, RaidSignal,
    SecretMachine, SecretRoomPlan,
};
use delve_hazard::{FreezeEvent, FreezeInput, HeatEvent, HeatInput, ThawSource};
use delve_schedule::{ActionScheduler, EnvId};
use delve_session::{
    run_room_action, DungeonStatus, DungeonSummary, RoomAction, RoomRuntime, Session,
    SessionError, SessionRegistry,
};
use delve_topology::{labels, resolve_topology, MarkerScan};
use delve_world::{
    ActorId, CellPos, DoorKind, InstanceId, ItemKind, SessionKey, SourceKind, StatusEffect,
    StatusKind, UnitTag, Volume, World,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{DeferredAction, DelveError, GameplayConfig};

/// Everything needed to start one dungeon run.
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// The session key; exactly one live session per name.
    pub name: String,
    /// Dungeon flavor, reported in listings.
    pub dungeon_type: String,
    pub leader: ActorId,
    /// The party roster. The leader is added if absent.
    pub party: Vec<ActorId>,
    /// The labeled marker scan of the instance region.
    pub scan: MarkerScan,
    /// Where the party lands (and respawns).
    pub entry_point: CellPos,
    /// Scripted entry hooks, by room index.
    pub actions: BTreeMap<usize, Vec<RoomAction>>,
    /// Geometry for the legendary escalation, when the dungeon has one.
    pub secret_plan: Option<SecretRoomPlan>,
}

/// How the runtime answered a world-interaction hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractOutcome {
    /// The runtime consumed the interaction.
    Handled,
    /// The interaction must be denied (a locked barrier cell).
    Rejected,
    /// Not ours; let the host proceed.
    Pass,
}

/// The runtime context: one per host environment.
pub struct DungeonRuntime<R: Rng = StdRng> {
    env: EnvId,
    config: GameplayConfig,
    registry: SessionRegistry,
    scheduler: ActionScheduler<DeferredAction>,
    barriers: BarrierController,
    /// Actor → expiry tick of a pre-granted legendary run.
    legendary_grants: BTreeMap<ActorId, u64>,
    next_instance: u64,
    rng: R,
}

impl DungeonRuntime<StdRng> {
    pub fn new(env: EnvId, config: GameplayConfig) -> Self {
        Self::with_rng(env, config, StdRng::from_os_rng())
    }
}

impl<R: Rng> DungeonRuntime<R> {
    /// Construct with an explicit generator; tests inject a seeded one.
    pub fn with_rng(env: EnvId, config: GameplayConfig, rng: R) -> Self {
        Self {
            env,
            config: config.validated(),
            registry: SessionRegistry::new(),
            scheduler: ActionScheduler::new(),
            barriers: BarrierController::new(),
            legendary_grants: BTreeMap::new(),
            next_instance: 1,
            rng,
        }
    }

    pub fn config(&self) -> &GameplayConfig {
        &self.config
    }

    pub fn session(&self, key: &SessionKey) -> Option<&Session> {
        self.registry.get(key)
    }

    pub fn pending_actions(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn barrier_state(&self, key: &BarrierKey) -> Option<BarrierState> {
        self.barriers.state(key)
    }

    /// Summaries of every non-ended session, oldest first.
    pub fn list_active_dungeons(&self) -> Vec<DungeonSummary> {
        self.registry.list_active()
    }

    /// Pre-grant a legendary run to the actor's next session start.
    /// Consumed at most once; expired grants are swept each tick.
    pub fn grant_legendary(&mut self, actor: ActorId, expires_tick: u64) {
        self.legendary_grants.insert(actor, expires_tick);
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Resolve, register, and start one dungeon run.
    pub fn start_session(
        &mut self,
        world: &mut dyn World,
        request: StartRequest,
    ) -> Result<SessionKey, DelveError> {
        let key = SessionKey::new(&request.name);
        if self.registry.get(&key).is_some() {
            return Err(SessionError::DuplicateSession(key).into());
        }

        let topology = resolve_topology(&request.scan, &self.config.topology)?;
        let now = world.current_tick();
        let instance = InstanceId(self.next_instance);
        self.next_instance += 1;

        let mut party = request.party;
        if !party.contains(&request.leader) {
            party.insert(0, request.leader);
        }

        let legendary = self.take_legendary_grant(request.leader, now)
            || self.rng.random_bool(self.config.legendary_chance);

        // Rooms and their raid machines. Spawn markers are assigned to
        // rooms here; the boss room's markers become add spawn points.
        let spawn_markers = request.scan.positions(labels::SPAWN);
        let mut rooms = Vec::with_capacity(topology.rooms.len());
        for (idx, room) in topology.rooms.iter().enumerate() {
            let points: Vec<CellPos> = spawn_markers
                .iter()
                .copied()
                .filter(|&p| room.volume.contains(p))
                .collect();
            let raid = (idx != topology.boss_room && !points.is_empty())
                .then(|| RaidMachine::new(idx, room.volume, points, legendary));
            let actions = request.actions.get(&idx).cloned().unwrap_or_default();
            rooms.push(RoomRuntime::new(room.clone(), raid, actions));
        }
        let boss_points: Vec<CellPos> = spawn_markers
            .iter()
            .copied()
            .filter(|&p| topology.boss_room_volume().contains(p))
            .collect();
        let boss = BossMachine::new(
            *topology.boss_room_volume(),
            topology.boss_anchor,
            boss_points,
            legendary,
        );

        if let Err(error) = self.register_doors(world, &key, &topology) {
            // Drop whatever partial registration happened.
            self.barriers.remove_session(world, &key)?;
            return Err(error);
        }

        world.pin_region(instance, topology.bounds());
        if let Some(plan) = &request.secret_plan {
            world.pin_region(instance, plan.bounds);
        }

        for &member in &party {
            self.scheduler.schedule_in(
                self.env,
                now,
                self.config.participant_teleport_delay_ticks,
                key.clone(),
                DeferredAction::Teleport {
                    actor: member,
                    to: request.entry_point,
                },
            );
            world.send_title(member, "Entering the dungeon", &request.dungeon_type);
        }

        let mut session = Session::new(
            key.clone(),
            instance,
            request.dungeon_type,
            request.leader,
            party,
            topology,
            rooms,
            request.entry_point,
            legendary,
            now,
            boss,
            &self.config.freeze,
            &self.config.heat,
        );
        session.secret_plan = request.secret_plan;
        self.registry.insert(session)?;

        tracing::info!(%key, %instance, legendary, "dungeon session started");
        Ok(key)
    }

    /// Register the boss doors (fatal on failure) and every vertical
    /// passage door (best effort).
    fn register_doors(
        &mut self,
        world: &mut dyn World,
        key: &SessionKey,
        topology: &delve_topology::Topology,
    ) -> Result<(), DelveError> {
        let boss_volume = *topology.boss_room_volume();
        let entrance_key = BarrierKey {
            session: key.clone(),
            room: topology.boss_room,
            door: DoorKind::Entrance,
        };
        let exit_key = BarrierKey {
            session: key.clone(),
            room: topology.boss_room,
            door: DoorKind::Exit,
        };
        self.barriers.register(
            entrance_key,
            &boss_volume,
            &[topology.entrance_pair.0, topology.entrance_pair.1],
            &self.config.barrier,
        )?;
        self.barriers.register(
            exit_key.clone(),
            &boss_volume,
            &[topology.exit_pair.0, topology.exit_pair.1],
            &self.config.barrier,
        )?;
        // The way out stays sealed until the boss falls.
        self.barriers.lock(world, &exit_key)?;

        // Passage doors never match the strict boss-door dimensions.
        let passage_config = BarrierConfig {
            strict_size: false,
            ..self.config.barrier.clone()
        };
        for (idx, room) in topology.rooms.iter().enumerate() {
            for (door_idx, door) in room.doors.iter().enumerate().take(256) {
                let Some((a, b)) = door_plane_markers(door) else {
                    continue;
                };
                let barrier_key = BarrierKey {
                    session: key.clone(),
                    room: idx,
                    door: DoorKind::Passage(door_idx as u8),
                };
                if let Err(error) =
                    self.barriers
                        .register(barrier_key, &room.volume, &[a, b], &passage_config)
                {
                    tracing::warn!(session = %key, room = idx, %error, "skipping passage door");
                }
            }
        }
        Ok(())
    }

    /// End a run: cancel its pending actions, restore every tracked
    /// mutation, clean the world, release the region claim, and drop it
    /// from the registry. Returns the final session state.
    pub fn end_session(
        &mut self,
        world: &mut dyn World,
        key: &SessionKey,
    ) -> Result<Session, DelveError> {
        if self.registry.get(key).is_none() {
            return Err(SessionError::NotFound(key.clone()).into());
        }

        // Nothing pending may fire against a dead session.
        self.scheduler.cancel_owner(key);
        // Exact restoration of every barrier-touched cell.
        self.barriers.remove_session(world, key)?;

        let mut session = self.registry.remove(key)?;
        let bounds = session.topology.bounds();
        world.remove_units_in(&bounds, UnitTag::Raid);
        world.remove_units_in(&bounds, UnitTag::Boss);
        if let Some(plan) = &session.secret_plan {
            world.remove_units_in(&plan.bounds, UnitTag::Raid);
            world.remove_units_in(&plan.bounds, UnitTag::Boss);
        }
        world.clear_boss_bar(key);
        for &actor in &session.players {
            world.close_capture_ui(actor);
            world.set_movement_locked(actor, false);
        }
        world.release_region(session.instance);

        session.status = DungeonStatus::Ended;
        tracing::info!(%key, "dungeon session ended");
        Ok(session)
    }

    // ---------------------------------------------------------------------
    // The tick entry point
    // ---------------------------------------------------------------------

    /// Drive every session one tick. Host tick sources call this once
    /// per tick; the [`delve_schedule::TickDriver`] does the same for
    /// embedders without one.
    pub fn on_tick(&mut self, world: &mut dyn World) {
        let now = world.current_tick();

        for entry in self.scheduler.drain_due(self.env, now) {
            apply_deferred(
                &mut self.registry,
                &mut self.barriers,
                world,
                &entry.owner,
                entry.action,
            );
        }
        self.legendary_grants.retain(|_, expires| *expires > now);

        let mut ended = Vec::new();
        for key in self.registry.keys() {
            let Self {
                registry,
                scheduler,
                barriers,
                rng,
                config,
                env,
                ..
            } = self;
            let Some(session) = registry.get_mut(&key) else {
                continue;
            };
            if drive_session(session, world, scheduler, barriers, rng, config, *env, now) {
                ended.push(key);
            }
        }
        for key in ended {
            if let Err(error) = self.end_session(world, &key) {
                tracing::error!(%key, %error, "failed to end session");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Player surfaces
    // ---------------------------------------------------------------------

    /// Cast a ready vote. On the vote that completes the quorum the run
    /// either escalates into the secret room (legendary, plan present)
    /// or concludes. Returns whether the quorum completed.
    pub fn progress_ready(
        &mut self,
        world: &mut dyn World,
        actor: ActorId,
    ) -> Result<bool, DelveError> {
        let now = world.current_tick();
        let Self {
            registry,
            rng,
            config,
            ..
        } = self;
        let session = registry
            .session_of_mut(actor)
            .ok_or(DelveError::NoSessionForActor(actor))?;
        let key = session.key.clone();

        if !session.progress_ready(actor, now)? {
            return Ok(false);
        }

        let escalation = if session.legendary {
            session.secret_plan.clone()
        } else {
            None
        };
        if let Some(plan) = escalation {
            let participants: Vec<ActorId> = session
                .players
                .iter()
                .copied()
                .filter(|&a| world.actor_online(a))
                .collect();
            session.status = DungeonStatus::SecretRoom;
            session.secret = Some(SecretMachine::begin(
                key.clone(),
                plan,
                config.secret.clone(),
                world,
                participants,
                rng,
            ));
            tracing::info!(%key, "run escalated into the secret room");
            return Ok(true);
        }

        self.end_session(world, &key)?;
        Ok(true)
    }

    /// Manually reopen the doors of the actor's current room, clearing
    /// its raid. Rate-limited per room; returns how many barriers were
    /// restored.
    pub fn open_doors(
        &mut self,
        world: &mut dyn World,
        actor: ActorId,
    ) -> Result<usize, DelveError> {
        let now = world.current_tick();
        let cooldown = self.config.door_reopen_cooldown_ticks;
        let Self {
            registry, barriers, ..
        } = self;
        let session = registry
            .session_of_mut(actor)
            .ok_or(DelveError::NoSessionForActor(actor))?;
        let Some(pos) = world.actor_pos(actor) else {
            return Ok(0);
        };
        let Some(idx) = session.room_index_at(pos) else {
            return Ok(0);
        };

        let room = &mut session.rooms[idx];
        if now < room.door_reopen_ready_tick {
            return Ok(0);
        }
        room.door_reopen_ready_tick = now + cooldown;
        if let Some(raid) = room.raid.as_mut() {
            if raid.is_active() {
                raid.force_complete();
            }
        }

        let key = session.key.clone();
        let opened = open_room_doors(barriers, world, &key, idx);
        tracing::info!(%key, room = idx, opened, "doors opened manually");
        Ok(opened)
    }

    /// A secret-room capture choice. `use_sigil` selects the guaranteed
    /// option.
    pub fn on_capture_choice(
        &mut self,
        world: &mut dyn World,
        actor: ActorId,
        use_sigil: bool,
    ) -> Result<CaptureOutcome, DelveError> {
        let Self { registry, rng, .. } = self;
        let session = registry
            .session_of_mut(actor)
            .ok_or(DelveError::NoSessionForActor(actor))?;
        let Some(secret) = session.secret.as_mut() else {
            return Ok(CaptureOutcome::Rejected);
        };
        let roll: f64 = rng.random();
        Ok(secret.handle_capture(world, actor, use_sigil, roll))
    }

    /// The capture surface reported its UI closed.
    pub fn on_capture_gui_closed(&mut self, actor: ActorId) -> GuiCloseAction {
        self.registry
            .session_of_mut(actor)
            .and_then(|s| s.secret.as_mut())
            .map_or(GuiCloseAction::Ignore, |s| s.handle_gui_closed(actor))
    }

    // ---------------------------------------------------------------------
    // Host hooks
    // ---------------------------------------------------------------------

    /// A party member disconnected. Their active raids force-complete.
    pub fn on_disconnect(&mut self, world: &mut dyn World, actor: ActorId) {
        let Self {
            registry, barriers, ..
        } = self;
        let Some(session) = registry.session_of_mut(actor) else {
            return;
        };
        let key = session.key.clone();
        for idx in 0..session.rooms.len() {
            let Some(raid) = session.rooms[idx].raid.as_mut() else {
                continue;
            };
            if raid.on_disconnect(actor).is_some() {
                open_room_doors(barriers, world, &key, idx);
            }
        }
    }

    /// A party member died: a life is spent and both hazards reset.
    pub fn on_death(&mut self, world: &mut dyn World, actor: ActorId) {
        let Some(session) = self.registry.session_of_mut(actor) else {
            return;
        };
        session.note_death(actor);
        if let Some(freeze) = session.freeze.get_mut(&actor) {
            if freeze.is_frozen() {
                world.set_movement_locked(actor, false);
            }
            freeze.reset();
        }
        if let Some(heat) = session.heat.get_mut(&actor) {
            heat.reset();
        }
    }

    /// A party member respawned: back to the entry point, or to the
    /// secret room's rotation when the escalation is running.
    pub fn on_respawn(&mut self, world: &mut dyn World, actor: ActorId) {
        let Some(session) = self.registry.session_of_mut(actor) else {
            return;
        };
        session.note_respawn(actor);
        if let Some(secret) = session.secret.as_mut() {
            secret.handle_respawn(world, actor);
        } else {
            world.teleport(actor, session.spawn_point);
        }
    }

    /// A relief consumable was used. Returns whether it took effect
    /// (false during the reuse cooldown, or for items handled
    /// elsewhere).
    pub fn on_item_use(&mut self, world: &mut dyn World, actor: ActorId, item: ItemKind) -> bool {
        let now = world.current_tick();
        let Self {
            registry, config, ..
        } = self;
        let Some(session) = registry.session_of_mut(actor) else {
            return false;
        };
        match item {
            ItemKind::ThawTonic => {
                let Some(freeze) = session.freeze.get_mut(&actor) else {
                    return false;
                };
                match freeze.apply_relief(now) {
                    Some(events) => {
                        apply_freeze_events(world, actor, &events, config);
                        true
                    }
                    None => false,
                }
            }
            ItemKind::CoolingDraught => session
                .heat
                .get_mut(&actor)
                .is_some_and(|heat| heat.apply_relief(now).is_some()),
            // Consumed inside the capture flow, not here.
            ItemKind::CaptureSigil => false,
        }
    }

    /// A party member interacted with another actor. Frees a frozen
    /// teammate.
    pub fn on_actor_interact(
        &mut self,
        world: &mut dyn World,
        actor: ActorId,
        target: ActorId,
    ) -> bool {
        let now = world.current_tick();
        let Self {
            registry, config, ..
        } = self;
        let Some(session) = registry.session_of_mut(target) else {
            return false;
        };
        if !session.is_member(actor) {
            return false;
        }
        let Some(freeze) = session.freeze.get_mut(&target) else {
            return false;
        };
        if !freeze.is_frozen() {
            return false;
        }
        let events = freeze.thaw(ThawSource::Teammate, now);
        apply_freeze_events(world, target, &events, config);
        tracing::info!(%actor, %target, "teammate thaw");
        true
    }

    /// A member is interacting with a cell. Locked barrier cells are
    /// rejected so a door cannot be pried open.
    pub fn on_block_interact(&self, actor: ActorId, pos: CellPos) -> InteractOutcome {
        let Some(session) = self.registry.session_of(actor) else {
            return InteractOutcome::Pass;
        };
        for key in self.barriers.keys_for(&session.key) {
            let Some(registration) = self.barriers.registration(&key) else {
                continue;
            };
            if registration.state == BarrierState::Locked
                && registration.plane.bounds.contains(pos)
            {
                return InteractOutcome::Rejected;
            }
        }
        InteractOutcome::Pass
    }

    fn take_legendary_grant(&mut self, actor: ActorId, now: u64) -> bool {
        match self.legendary_grants.remove(&actor) {
            Some(expires) if expires > now => true,
            _ => false,
        }
    }
}

// =========================================================================
// Tick internals (free functions so field borrows stay disjoint)
// =========================================================================

/// One session's share of the tick. Returns whether the session should
/// end.
#[allow(clippy::too_many_arguments)]
fn drive_session(
    session: &mut Session,
    world: &mut dyn World,
    scheduler: &mut ActionScheduler<DeferredAction>,
    barriers: &mut BarrierController,
    rng: &mut impl Rng,
    config: &GameplayConfig,
    env: EnvId,
    now: u64,
) -> bool {
    if session.is_ended() {
        return true;
    }
    if now.saturating_sub(session.created_tick) >= config.overtime_ticks {
        tracing::info!(key = %session.key, "session exceeded maximum duration");
        for &actor in &session.players {
            world.send_message(actor, "The dungeon's magic gives out.");
        }
        return true;
    }
    let any_online = session.players.iter().any(|&a| world.actor_online(a));
    if session.update_idle(any_online, now) >= config.idle_timeout_ticks {
        tracing::info!(key = %session.key, "session idle past the timeout");
        return true;
    }

    if session.status == DungeonStatus::SecretRoom {
        if let Some(secret) = session.secret.as_mut() {
            if secret.tick(world, now) {
                return true;
            }
        }
        return false;
    }

    let key = session.key.clone();
    let party = session.players.clone();
    let boss_room = session.topology.boss_room;

    // Machine polls run first, on the state the previous tick left;
    // entry checks and hazards then see their results within the tick.
    for idx in 0..session.rooms.len() {
        let Some(raid) = session.rooms[idx].raid.as_mut() else {
            continue;
        };
        if !raid.is_active() {
            continue;
        }
        let signals = raid.tick(world, rng, &config.roster, &config.encounter, now);
        apply_raid_signals(world, scheduler, barriers, env, &key, idx, now, signals);
    }

    if session.boss.started() {
        let occupancy = party
            .iter()
            .filter(|&&a| {
                world.actor_online(a)
                    && world.actor_alive(a)
                    && !world.actor_spectator(a)
                    && world
                        .actor_pos(a)
                        .is_some_and(|p| session.boss.bounds().contains(p))
            })
            .count();
        let signals = session
            .boss
            .tick(world, rng, &config.roster, &config.encounter, now, occupancy);
        apply_boss_signals(session, world, scheduler, barriers, env, now, config, signals);
    }

    // Room entry: actions fire on first entry, raids activate on entry,
    // the boss starts when someone steps into its room.
    for &actor in &party {
        if !world.actor_online(actor) {
            continue;
        }
        let Some(pos) = world.actor_pos(actor) else {
            continue;
        };
        let Some(idx) = session.room_index_at(pos) else {
            continue;
        };

        let first_entry = session.rooms[idx].entered.insert(actor);
        if first_entry && session.rooms[idx].try_trigger(actor, now, config.trigger_cooldown_ticks)
        {
            let center = session.rooms[idx].room.volume.center();
            let actions = session.rooms[idx].actions.clone();
            for action in &actions {
                run_room_action(world, action, actor, center);
            }
        }

        if session.status != DungeonStatus::Running {
            continue;
        }

        if idx == boss_room {
            if !session.boss.started() {
                if let Some(signals) = session.boss.try_start(
                    world,
                    &config.boss_species,
                    config.boss_scale,
                    party.len(),
                    now,
                    &config.encounter,
                ) {
                    apply_boss_signals(
                        session, world, scheduler, barriers, env, now, config, signals,
                    );
                }
            }
        } else if let Some(raid) = session.rooms[idx].raid.as_mut() {
            if !raid.is_active() && !raid.is_completed() {
                let signals = raid.activate(world, actor, &party, now, &config.encounter);
                let activated = raid.is_active();
                apply_raid_signals(world, scheduler, barriers, env, &key, idx, now, signals);
                if activated {
                    lock_room_doors(barriers, world, &key, idx);
                }
            }
        }
    }

    // Hazards, evaluated once per interval.
    if now % config.hazard_interval_ticks == 0 {
        let bounds = session.topology.bounds();
        for &actor in &party {
            evaluate_hazards(session, world, config, actor, &bounds, now);
        }
    }

    false
}

fn evaluate_hazards(
    session: &mut Session,
    world: &mut dyn World,
    config: &GameplayConfig,
    actor: ActorId,
    bounds: &Volume,
    now: u64,
) {
    let pos = world.actor_pos(actor);
    let exempt =
        !world.actor_online(actor) || !world.actor_alive(actor) || world.actor_spectator(actor);
    let in_bounds = pos.is_some_and(|p| bounds.contains(p));

    if let Some(freeze) = session.freeze.get_mut(&actor) {
        let near_fire = pos.is_some_and(|p| {
            world.source_near(p, SourceKind::Fire, config.hazard_source_radius)
        });
        let events = freeze.step(FreezeInput {
            now_tick: now,
            in_bounds,
            exempt,
            near_fire,
        });
        apply_freeze_events(world, actor, &events, config);
    }
    if let Some(heat) = session.heat.get_mut(&actor) {
        let near_water = pos.is_some_and(|p| {
            world.source_near(p, SourceKind::Water, config.hazard_source_radius)
        });
        let events = heat.step(HeatInput {
            now_tick: now,
            in_bounds,
            exempt,
            near_water,
        });
        apply_heat_events(world, actor, &events);
    }
}

fn apply_freeze_events(
    world: &mut dyn World,
    actor: ActorId,
    events: &[FreezeEvent],
    config: &GameplayConfig,
) {
    for event in events {
        match event {
            FreezeEvent::MilestoneReached(ordinal) => {
                world.apply_status(
                    actor,
                    StatusEffect {
                        kind: StatusKind::Slowness,
                        amplifier: ordinal.saturating_sub(1),
                        duration_ticks: (config.hazard_interval_ticks * 2) as u32,
                    },
                );
                world.send_title(actor, "", "The cold seeps in...");
            }
            FreezeEvent::Frozen => {
                world.set_movement_locked(actor, true);
                world.send_title(actor, "Frozen!", "A teammate can free you");
            }
            FreezeEvent::Thawed(_) => {
                world.set_movement_locked(actor, false);
                world.send_title(actor, "", "You thaw out");
            }
        }
    }
}

fn apply_heat_events(world: &mut dyn World, actor: ActorId, events: &[HeatEvent]) {
    for event in events {
        match event {
            HeatEvent::MilestoneReached(_) => {
                world.send_title(actor, "", "The heat is unbearable...");
            }
            HeatEvent::Ignited { secs } => {
                world.ignite(actor, *secs);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_raid_signals(
    world: &mut dyn World,
    scheduler: &mut ActionScheduler<DeferredAction>,
    barriers: &mut BarrierController,
    env: EnvId,
    key: &SessionKey,
    room: usize,
    now: u64,
    signals: Vec<RaidSignal>,
) {
    for signal in signals {
        match signal {
            RaidSignal::TeleportLater {
                actor,
                to,
                delay_ticks,
            } => scheduler.schedule_in(
                env,
                now,
                delay_ticks,
                key.clone(),
                DeferredAction::Teleport { actor, to },
            ),
            RaidSignal::SpawnLater { spawn, delay_ticks } => scheduler.schedule_in(
                env,
                now,
                delay_ticks,
                key.clone(),
                DeferredAction::SpawnRaidUnit { room, spawn },
            ),
            RaidSignal::RefreshCacheLater { delay_ticks } => scheduler.schedule_in(
                env,
                now,
                delay_ticks,
                key.clone(),
                DeferredAction::RefreshRaidCache { room },
            ),
            RaidSignal::OpenDoors => {
                open_room_doors(barriers, world, key, room);
            }
            RaidSignal::Completed => {
                tracing::info!(session = %key, room, "room raid cleared");
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_boss_signals(
    session: &mut Session,
    world: &mut dyn World,
    scheduler: &mut ActionScheduler<DeferredAction>,
    barriers: &mut BarrierController,
    env: EnvId,
    now: u64,
    config: &GameplayConfig,
    signals: Vec<BossSignal>,
) {
    let key = session.key.clone();
    for signal in signals {
        match signal {
            BossSignal::SealDoorsLater { delay_ticks } => scheduler.schedule_in(
                env,
                now,
                delay_ticks,
                key.clone(),
                DeferredAction::SealAllDoors,
            ),
            BossSignal::SpawnLater { spawn, delay_ticks } => scheduler.schedule_in(
                env,
                now,
                delay_ticks,
                key.clone(),
                DeferredAction::SpawnBossAdd { spawn },
            ),
            BossSignal::BossBar { fraction } => {
                world.update_boss_bar(&key, session.boss.boss_species(), fraction, &session.players);
            }
            BossSignal::ClearBossBar => world.clear_boss_bar(&key),
            BossSignal::OpenDoors => {
                if let Err(error) = barriers.unlock_all(world, &key) {
                    tracing::warn!(session = %key, %error, "failed to open doors");
                }
            }
            BossSignal::Victory => {
                sweep_boss_room(session, world, &key);
                let online = session
                    .players
                    .iter()
                    .filter(|&&a| world.actor_online(a))
                    .count();
                session.begin_ready_phase(online, config.ready_vote_cooldown_ticks);
                for &actor in &session.players {
                    world.send_title(actor, "Victory!", "Signal ready to proceed");
                }
            }
            BossSignal::Failed => {
                for &actor in &session.players {
                    world.send_message(actor, "The chamber falls silent. The boss awaits again.");
                }
            }
        }
    }
}

/// Remove leftover add-wave units from the boss room on victory. The
/// running/done flags make the sweep idempotent even if two victory
/// detections land on the same room.
fn sweep_boss_room(session: &mut Session, world: &mut dyn World, key: &SessionKey) {
    let bounds = *session.boss.bounds();
    let Some(room) = session.rooms.get_mut(session.topology.boss_room) else {
        return;
    };
    if room.cleanup_done || room.cleanup_running {
        return;
    }
    room.cleanup_running = true;
    let removed = world.remove_units_in(&bounds, UnitTag::Raid);
    room.cleanup_done = true;
    room.cleanup_running = false;
    if removed > 0 {
        tracing::info!(session = %key, removed, "swept leftover boss-room units");
    }
}

/// Execute one drained deferred action. A vanished or ended session
/// turns the action into a no-op.
fn apply_deferred(
    registry: &mut SessionRegistry,
    barriers: &mut BarrierController,
    world: &mut dyn World,
    owner: &SessionKey,
    action: DeferredAction,
) {
    let Some(session) = registry.get_mut(owner) else {
        tracing::trace!(session = %owner, "dropping action for vanished session");
        return;
    };
    if session.is_ended() {
        return;
    }
    match action {
        DeferredAction::Teleport { actor, to } => {
            if session.is_member(actor) && world.actor_online(actor) {
                world.teleport(actor, to);
            }
        }
        DeferredAction::SpawnRaidUnit { room, spawn } => match world.spawn_unit(spawn) {
            Some(unit) => {
                if let Some(raid) = session.rooms.get_mut(room).and_then(|r| r.raid.as_mut()) {
                    raid.note_spawned(unit);
                }
            }
            None => tracing::warn!(session = %owner, room, "host refused raid spawn"),
        },
        DeferredAction::SpawnBossAdd { spawn } => {
            if world.spawn_unit(spawn).is_none() {
                tracing::warn!(session = %owner, "host refused boss add spawn");
            }
        }
        DeferredAction::RefreshRaidCache { room } => {
            if let Some(raid) = session.rooms.get_mut(room).and_then(|r| r.raid.as_mut()) {
                raid.refresh_cache(world);
            }
        }
        DeferredAction::SealAllDoors => {
            if let Err(error) = barriers.lock_all(world, owner) {
                tracing::warn!(session = %owner, %error, "failed to seal doors");
            }
        }
        DeferredAction::OpenRoomDoors { room } => {
            open_room_doors(barriers, world, owner, room);
        }
    }
}

/// Unlock every barrier registered to the room. Returns how many
/// restored cells' doors actually changed state.
fn open_room_doors(
    barriers: &mut BarrierController,
    world: &mut dyn World,
    key: &SessionKey,
    room: usize,
) -> usize {
    let mut opened = 0;
    for barrier_key in barriers.keys_for(key) {
        if barrier_key.room != room {
            continue;
        }
        match barriers.unlock(world, &barrier_key) {
            Ok(true) => opened += 1,
            Ok(false) => {}
            Err(error) => {
                tracing::warn!(barrier = %barrier_key, %error, "failed to unlock door")
            }
        }
    }
    opened
}

fn lock_room_doors(
    barriers: &mut BarrierController,
    world: &mut dyn World,
    key: &SessionKey,
    room: usize,
) -> usize {
    let mut locked = 0;
    for barrier_key in barriers.keys_for(key) {
        if barrier_key.room != room {
            continue;
        }
        match barriers.lock(world, &barrier_key) {
            Ok(true) => locked += 1,
            Ok(false) => {}
            Err(error) => tracing::warn!(barrier = %barrier_key, %error, "failed to lock door"),
        }
    }
    locked
}

/// Reconstruct the marker pair of a vertical passage door from its
/// interior volume. Horizontal hatches have no blocking plane.
fn door_plane_markers(door: &Volume) -> Option<(CellPos, CellPos)> {
    if door.min.y == door.max.y {
        return None;
    }
    let mut a = door.min;
    let mut b = door.max;
    a.y -= 1;
    b.y += 1;
    if door.min.x == door.max.x && door.min.z != door.max.z {
        a.z -= 1;
        b.z += 1;
        Some((a, b))
    } else if door.min.z == door.max.z && door.min.x != door.max.x {
        a.x -= 1;
        b.x += 1;
        Some((a, b))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use delve_world::Volume;

    use super::*;

    #[test]
    fn test_door_plane_markers_from_interior() {
        // Fixed-x vertical door interior (3×3 at x = 0).
        let door = Volume::new(CellPos::new(0, 71, 1), CellPos::new(0, 73, 3));
        let (a, b) = door_plane_markers(&door).unwrap();
        assert_eq!(a, CellPos::new(0, 70, 0));
        assert_eq!(b, CellPos::new(0, 74, 4));
    }

    #[test]
    fn test_horizontal_hatch_has_no_plane() {
        let door = Volume::new(CellPos::new(1, 70, 1), CellPos::new(3, 70, 3));
        assert!(door_plane_markers(&door).is_none());
    }
}
