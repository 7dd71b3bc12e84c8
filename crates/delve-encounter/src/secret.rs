//! The secret-room escalation flow: ready gathering, the side boss, and
//! the per-participant capture ceremony.

use std::collections::{BTreeMap, BTreeSet};

use delve_world::{
    ActorId, CaptureOffer, CellPos, EntityId, ItemKind, SessionKey, StatusEffect, StatusKind,
    UnitSpawn, UnitTag, Volume, World,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Geometry and candidates for one claimed secret room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretRoomPlan {
    /// The claimed side-instance region.
    pub bounds: Volume,
    /// Where entering participants land.
    pub entry_point: CellPos,
    /// All participants must stand here simultaneously to proceed.
    pub ready_volume: Volume,
    /// Where the secret boss spawns.
    pub boss_spawn: CellPos,
    /// Round-robin teleport targets into the boss chamber.
    pub teleport_targets: Vec<CellPos>,
    /// Secret boss candidates; one is drawn at entry.
    pub species_pool: Vec<String>,
}

/// Capture ceremony tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretConfig {
    /// Success probability per attempt; the last entry plateaus.
    pub capture_chances: Vec<f64>,
    /// Ticks between the boss's disappearance and the capture UI.
    pub capture_settle_ticks: u64,
    /// Disorientation applied on entry.
    pub entry_status_ticks: u32,
    pub entry_status_amplifier: u8,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            capture_chances: vec![0.20, 0.20, 0.30],
            capture_settle_ticks: 60,
            entry_status_ticks: 60,
            entry_status_amplifier: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretPhase {
    WaitingReady,
    InBossRoom,
    Capture,
    Completed,
}

/// Result of one capture interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Captured; reward granted.
    Success,
    /// Missed; attempts remain.
    Failure { attempts_left: u8 },
    /// Attempts exhausted; marked done with no reward.
    Exhausted,
    /// The guaranteed option was chosen without the consumable in hand.
    MissingSigil,
    /// The interaction arrived outside the capture phase or from a
    /// participant already done.
    Rejected,
}

/// What an automatic GUI-close should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiCloseAction {
    Ignore,
    Reopen,
}

/// The escalation state machine for one legendary run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretMachine {
    session: SessionKey,
    plan: SecretRoomPlan,
    config: SecretConfig,
    phase: SecretPhase,
    participants: Vec<ActorId>,
    species: String,
    next_teleport_index: usize,
    attempts: BTreeMap<ActorId, u8>,
    successes: BTreeSet<ActorId>,
    done: BTreeSet<ActorId>,
    open_guis: BTreeSet<ActorId>,
    /// Dead at capture-open time; revisited each tick.
    pending_guis: BTreeSet<ActorId>,
    /// System-initiated closes; the close handler consumes these so it
    /// can tell a forced close from an abandon.
    forced_closures: BTreeSet<ActorId>,
    boss_entity: Option<EntityId>,
    boss_confirmed: bool,
    boss_missing_since: Option<u64>,
}

impl SecretMachine {
    /// Enter the secret room: teleport the participants in, disorient
    /// them briefly, and start waiting for the ready gathering.
    pub fn begin<R: Rng>(
        session: SessionKey,
        plan: SecretRoomPlan,
        config: SecretConfig,
        world: &mut dyn World,
        participants: Vec<ActorId>,
        rng: &mut R,
    ) -> Self {
        let species = if plan.species_pool.is_empty() {
            String::new()
        } else {
            plan.species_pool[rng.random_range(0..plan.species_pool.len())].clone()
        };

        for &actor in &participants {
            world.teleport(actor, plan.entry_point);
            world.send_title(actor, "Secret Room Discovered!", "");
            for kind in [StatusKind::Blindness, StatusKind::Slowness] {
                world.apply_status(
                    actor,
                    StatusEffect {
                        kind,
                        amplifier: config.entry_status_amplifier,
                        duration_ticks: config.entry_status_ticks,
                    },
                );
            }
        }
        world.broadcast("A secret room has been discovered!");
        tracing::info!(%session, party = participants.len(), species, "secret room entered");

        Self {
            session,
            plan,
            config,
            phase: SecretPhase::WaitingReady,
            participants,
            species,
            next_teleport_index: 0,
            attempts: BTreeMap::new(),
            successes: BTreeSet::new(),
            done: BTreeSet::new(),
            open_guis: BTreeSet::new(),
            pending_guis: BTreeSet::new(),
            forced_closures: BTreeSet::new(),
            boss_entity: None,
            boss_confirmed: false,
            boss_missing_since: None,
        }
    }

    pub fn phase(&self) -> SecretPhase {
        self.phase
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SecretPhase::Completed
    }

    pub fn successes(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.successes.iter().copied()
    }

    /// One poll. Returns `true` exactly once, when the flow completes
    /// and the session should conclude the run.
    pub fn tick(&mut self, world: &mut dyn World, now: u64) -> bool {
        match self.phase {
            SecretPhase::WaitingReady => {
                self.tick_waiting_ready(world);
                false
            }
            SecretPhase::InBossRoom => {
                self.tick_in_boss_room(world, now);
                false
            }
            SecretPhase::Capture => self.tick_capture(world),
            SecretPhase::Completed => false,
        }
    }

    fn tick_waiting_ready(&mut self, world: &mut dyn World) {
        let all_ready = self.participants.iter().all(|&actor| {
            world.actor_online(actor)
                && world
                    .actor_pos(actor)
                    .is_some_and(|p| self.plan.ready_volume.contains(p))
        });
        if !all_ready {
            return;
        }

        for &actor in &self.participants.clone() {
            let target = self.next_teleport_target();
            world.teleport(actor, target);
        }

        let spawned = world.spawn_unit(UnitSpawn {
            pos: self.plan.boss_spawn,
            species: self.species.clone(),
            tag: UnitTag::Boss,
            elite: false,
            scale: None,
        });
        if spawned.is_none() {
            tracing::warn!(species = %self.species, "host refused secret boss spawn");
        }
        self.boss_entity = spawned;
        self.boss_confirmed = false;
        self.boss_missing_since = None;
        self.phase = SecretPhase::InBossRoom;
        tracing::info!(species = %self.species, "secret boss chamber entered");
    }

    fn tick_in_boss_room(&mut self, world: &mut dyn World, now: u64) {
        match self.find_boss(world) {
            Some(entity) => {
                self.boss_confirmed = true;
                self.boss_missing_since = None;
                if let Some((health, max)) = world.unit_health(entity) {
                    let fraction = if max > 0.0 { (health / max).clamp(0.0, 1.0) } else { 0.0 };
                    let viewers = self.participants.clone();
                    world.update_boss_bar(&self.session, &self.species, fraction, &viewers);
                }
            }
            None if self.boss_confirmed => {
                let since = *self.boss_missing_since.get_or_insert(now);
                if now.saturating_sub(since) >= self.config.capture_settle_ticks {
                    self.open_capture_phase(world);
                }
            }
            None => {}
        }
    }

    fn open_capture_phase(&mut self, world: &mut dyn World) {
        self.phase = SecretPhase::Capture;
        world.clear_boss_bar(&self.session);
        for &actor in &self.participants.clone() {
            if world.actor_alive(actor) && !world.actor_spectator(actor) {
                self.open_gui(world, actor);
            } else {
                self.pending_guis.insert(actor);
            }
        }
        tracing::info!(species = %self.species, "capture phase opened");
    }

    fn tick_capture(&mut self, world: &mut dyn World) -> bool {
        // Revisit participants who were dead when the phase opened.
        let pending: Vec<ActorId> = self.pending_guis.iter().copied().collect();
        for actor in pending {
            if world.actor_alive(actor) && !world.actor_spectator(actor) {
                self.pending_guis.remove(&actor);
                self.open_gui(world, actor);
            }
        }

        // Reopen surfaces that should be open but are not (unless a
        // forced closure is still being processed).
        for &actor in &self.participants.clone() {
            if !self.done.contains(&actor)
                && !self.open_guis.contains(&actor)
                && !self.pending_guis.contains(&actor)
                && !self.forced_closures.contains(&actor)
                && world.actor_alive(actor)
            {
                self.open_gui(world, actor);
            }
        }

        self.check_all_done(world)
    }

    fn open_gui(&mut self, world: &mut dyn World, actor: ActorId) {
        let offer = CaptureOffer {
            species: self.species.clone(),
            guaranteed_option: world.actor_has_item(actor, ItemKind::CaptureSigil),
        };
        world.open_capture_ui(actor, &offer);
        self.open_guis.insert(actor);
    }

    /// A participant clicked a capture option.
    pub fn handle_capture(
        &mut self,
        world: &mut dyn World,
        actor: ActorId,
        use_sigil: bool,
        roll: f64,
    ) -> CaptureOutcome {
        if self.phase != SecretPhase::Capture
            || !self.participants.contains(&actor)
            || self.done.contains(&actor)
        {
            return CaptureOutcome::Rejected;
        }

        if use_sigil {
            if !world.consume_item(actor, ItemKind::CaptureSigil) {
                return CaptureOutcome::MissingSigil;
            }
            self.complete_capture(world, actor, true);
            return CaptureOutcome::Success;
        }

        let attempts = self.attempts.entry(actor).or_insert(0);
        *attempts += 1;
        let made = *attempts;
        let idx = (usize::from(made) - 1).min(self.config.capture_chances.len().saturating_sub(1));
        let chance = self.config.capture_chances.get(idx).copied().unwrap_or(0.0);

        if roll < chance {
            self.complete_capture(world, actor, true);
            return CaptureOutcome::Success;
        }
        if usize::from(made) >= self.config.capture_chances.len() {
            self.complete_capture(world, actor, false);
            return CaptureOutcome::Exhausted;
        }
        CaptureOutcome::Failure {
            attempts_left: self.config.capture_chances.len() as u8 - made,
        }
    }

    fn complete_capture(&mut self, world: &mut dyn World, actor: ActorId, success: bool) {
        if success {
            self.successes.insert(actor);
            world.grant_reward(actor, &self.species);
        }
        self.done.insert(actor);
        self.forced_closures.insert(actor);
        self.pending_guis.remove(&actor);
        world.close_capture_ui(actor);
        self.open_guis.remove(&actor);
        tracing::info!(%actor, success, "capture ceremony finished for participant");
    }

    /// The host reports a capture surface closed. A forced (system)
    /// close is consumed silently; a participant-initiated close while
    /// still mid-ceremony reopens.
    pub fn handle_gui_closed(&mut self, actor: ActorId) -> GuiCloseAction {
        self.open_guis.remove(&actor);
        self.pending_guis.remove(&actor);
        if self.phase != SecretPhase::Capture || self.done.contains(&actor) {
            self.forced_closures.remove(&actor);
            return GuiCloseAction::Ignore;
        }
        if self.forced_closures.remove(&actor) {
            return GuiCloseAction::Ignore;
        }
        GuiCloseAction::Reopen
    }

    /// A participant respawned inside the flow: send them back into the
    /// chamber at the next rotation target.
    pub fn handle_respawn(&mut self, world: &mut dyn World, actor: ActorId) {
        if !self.participants.contains(&actor) {
            return;
        }
        if matches!(self.phase, SecretPhase::InBossRoom | SecretPhase::Capture) {
            let target = self.next_teleport_target();
            world.teleport(actor, target);
        }
    }

    fn check_all_done(&mut self, world: &mut dyn World) -> bool {
        if self.phase != SecretPhase::Capture {
            return false;
        }
        if !self.participants.iter().all(|a| self.done.contains(a)) {
            return false;
        }
        self.phase = SecretPhase::Completed;
        for &actor in &self.participants.clone() {
            world.close_capture_ui(actor);
        }
        world.clear_boss_bar(&self.session);
        self.forced_closures.clear();
        tracing::info!(
            successes = self.successes.len(),
            of = self.participants.len(),
            "secret room completed"
        );
        true
    }

    fn next_teleport_target(&mut self) -> CellPos {
        if self.plan.teleport_targets.is_empty() {
            return self.plan.boss_spawn;
        }
        let target = self.plan.teleport_targets[self.next_teleport_index % self.plan.teleport_targets.len()];
        self.next_teleport_index += 1;
        target
    }

    fn find_boss(&mut self, world: &dyn World) -> Option<EntityId> {
        if let Some(entity) = self.boss_entity {
            let present = world.unit_alive(entity)
                && world.unit_pos(entity).is_some_and(|p| self.plan.bounds.contains(p));
            if present {
                return Some(entity);
            }
            self.boss_entity = None;
        }
        let found = world.units_in(&self.plan.bounds, UnitTag::Boss).into_iter().next();
        self.boss_entity = found;
        found
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use delve_world::MemoryWorld;
    use rand::SeedableRng;

    use super::*;

    fn aid(id: u64) -> ActorId {
        ActorId(id)
    }

    fn plan() -> SecretRoomPlan {
        SecretRoomPlan {
            bounds: Volume::new(CellPos::new(0, 100, 0), CellPos::new(40, 120, 40)),
            entry_point: CellPos::new(5, 101, 5),
            ready_volume: Volume::new(CellPos::new(4, 100, 4), CellPos::new(8, 104, 8)),
            boss_spawn: CellPos::new(20, 101, 20),
            teleport_targets: vec![CellPos::new(18, 101, 18), CellPos::new(22, 101, 22)],
            species_pool: vec!["umbral_stag".into()],
        }
    }

    fn begin(world: &mut MemoryWorld, actors: &[ActorId]) -> SecretMachine {
        for (i, &actor) in actors.iter().enumerate() {
            world.add_actor(actor, CellPos::new(50 + i as i32, 70, 50));
        }
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        SecretMachine::begin(
            SessionKey::from("alpine"),
            plan(),
            SecretConfig::default(),
            world,
            actors.to_vec(),
            &mut rng,
        )
    }

    /// Walk a machine to the capture phase with every actor captured-ready.
    fn to_capture(world: &mut MemoryWorld, machine: &mut SecretMachine, actors: &[ActorId]) {
        for &a in actors {
            world.move_actor(a, CellPos::new(5, 101, 5));
        }
        machine.tick(world, 0);
        assert_eq!(machine.phase(), SecretPhase::InBossRoom);

        machine.tick(world, 1);
        let boss = world.units_in(&plan().bounds, UnitTag::Boss)[0];
        world.kill_unit(boss);
        machine.tick(world, 2);
        machine.tick(world, 2 + 60);
        assert_eq!(machine.phase(), SecretPhase::Capture);
    }

    #[test]
    fn test_begin_teleports_and_disorients() {
        let mut world = MemoryWorld::new();
        let machine = begin(&mut world, &[aid(1), aid(2)]);
        assert_eq!(machine.phase(), SecretPhase::WaitingReady);
        assert_eq!(world.actor_pos(aid(1)), Some(CellPos::new(5, 101, 5)));
        assert_eq!(world.actor_pos(aid(2)), Some(CellPos::new(5, 101, 5)));
    }

    #[test]
    fn test_ready_requires_everyone_in_volume() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1), aid(2)]);

        // One participant wanders off: no transition.
        world.move_actor(aid(2), CellPos::new(30, 101, 30));
        machine.tick(&mut world, 0);
        assert_eq!(machine.phase(), SecretPhase::WaitingReady);

        world.move_actor(aid(2), CellPos::new(6, 101, 6));
        machine.tick(&mut world, 1);
        assert_eq!(machine.phase(), SecretPhase::InBossRoom);
        assert_eq!(world.live_unit_count(UnitTag::Boss), 1);
    }

    #[test]
    fn test_ready_teleports_round_robin() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1), aid(2)]);
        world.move_actor(aid(2), CellPos::new(6, 101, 6));
        machine.tick(&mut world, 0);
        assert_eq!(world.actor_pos(aid(1)), Some(CellPos::new(18, 101, 18)));
        assert_eq!(world.actor_pos(aid(2)), Some(CellPos::new(22, 101, 22)));
    }

    #[test]
    fn test_boss_death_settles_then_opens_capture() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1)]);
        world.move_actor(aid(1), CellPos::new(5, 101, 5));
        machine.tick(&mut world, 0);

        // Confirm, then kill.
        machine.tick(&mut world, 1);
        let boss = world.units_in(&plan().bounds, UnitTag::Boss)[0];
        world.kill_unit(boss);

        // Settle window not yet elapsed.
        machine.tick(&mut world, 10);
        machine.tick(&mut world, 40);
        assert_eq!(machine.phase(), SecretPhase::InBossRoom);

        machine.tick(&mut world, 10 + 60);
        assert_eq!(machine.phase(), SecretPhase::Capture);
    }

    #[test]
    fn test_capture_ladder_exhausts_after_three_attempts() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1)]);
        to_capture(&mut world, &mut machine, &[aid(1)]);

        // Rolls above every chance: two failures, then exhaustion.
        assert_eq!(
            machine.handle_capture(&mut world, aid(1), false, 0.9),
            CaptureOutcome::Failure { attempts_left: 2 }
        );
        assert_eq!(
            machine.handle_capture(&mut world, aid(1), false, 0.9),
            CaptureOutcome::Failure { attempts_left: 1 }
        );
        assert_eq!(
            machine.handle_capture(&mut world, aid(1), false, 0.9),
            CaptureOutcome::Exhausted
        );
        // Further clicks are rejected.
        assert_eq!(
            machine.handle_capture(&mut world, aid(1), false, 0.0),
            CaptureOutcome::Rejected
        );
        // Sole participant done: the next tick completes the flow.
        assert!(machine.tick(&mut world, 100));
        assert!(machine.is_finished());
        assert_eq!(machine.successes().count(), 0);
    }

    #[test]
    fn test_third_attempt_chance_rises() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1)]);
        to_capture(&mut world, &mut machine, &[aid(1)]);

        // 0.25 fails the 20% attempts but succeeds the 30% one.
        machine.handle_capture(&mut world, aid(1), false, 0.25);
        machine.handle_capture(&mut world, aid(1), false, 0.25);
        assert_eq!(
            machine.handle_capture(&mut world, aid(1), false, 0.25),
            CaptureOutcome::Success
        );
        assert_eq!(machine.successes().count(), 1);
    }

    #[test]
    fn test_sigil_guarantees_and_consumes() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1)]);
        to_capture(&mut world, &mut machine, &[aid(1)]);

        // Without the item the guaranteed path is refused.
        assert_eq!(
            machine.handle_capture(&mut world, aid(1), true, 0.9),
            CaptureOutcome::MissingSigil
        );

        world.give_item(aid(1), ItemKind::CaptureSigil, 1);
        assert_eq!(
            machine.handle_capture(&mut world, aid(1), true, 0.9),
            CaptureOutcome::Success
        );
        assert!(!world.actor_has_item(aid(1), ItemKind::CaptureSigil));
    }

    #[test]
    fn test_forced_close_is_not_reopened_but_abandon_is() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1), aid(2)]);
        to_capture(&mut world, &mut machine, &[aid(1), aid(2)]);

        // aid(1) succeeds: their close is system-initiated.
        machine.handle_capture(&mut world, aid(1), false, 0.0);
        assert_eq!(machine.handle_gui_closed(aid(1)), GuiCloseAction::Ignore);

        // aid(2) closes by hand mid-ceremony: reopen.
        assert_eq!(machine.handle_gui_closed(aid(2)), GuiCloseAction::Reopen);
    }

    #[test]
    fn test_respawn_mid_flow_teleports_back_in() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1), aid(2)]);
        to_capture(&mut world, &mut machine, &[aid(1), aid(2)]);

        world.move_actor(aid(2), CellPos::new(500, 70, 500));
        machine.handle_respawn(&mut world, aid(2));
        let pos = world.actor_pos(aid(2)).unwrap();
        assert!(plan().bounds.contains(pos));
        // A stranger's respawn is ignored.
        machine.handle_respawn(&mut world, aid(9));
    }

    #[test]
    fn test_completion_requires_every_participant_done() {
        let mut world = MemoryWorld::new();
        let mut machine = begin(&mut world, &[aid(1), aid(2)]);
        to_capture(&mut world, &mut machine, &[aid(1), aid(2)]);

        machine.handle_capture(&mut world, aid(1), false, 0.0);
        assert!(!machine.tick(&mut world, 100));

        machine.handle_capture(&mut world, aid(2), false, 0.0);
        assert!(machine.tick(&mut world, 101));
        assert!(machine.is_finished());
    }
}
