//! The per-room raid machine: activation, staggered waves, and polled
//! completion.

use std::collections::BTreeSet;

use delve_world::{ActorId, CellPos, EntityId, UnitSpawn, UnitTag, Volume, World};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{select_difficulty, CapCounters, DifficultyRoster, EncounterConfig};

/// Work the raid machine wants done by its owner: door toggles happen
/// through the session's barrier layer, and anything future-tick goes
/// through the scheduler. Spawns are deferred so the stagger applies.
#[derive(Debug, Clone, PartialEq)]
pub enum RaidSignal {
    /// Teleport a gathered participant to the activation point.
    TeleportLater {
        actor: ActorId,
        to: CellPos,
        delay_ticks: u64,
    },
    /// Spawn one wave unit after the stagger delay.
    SpawnLater { spawn: UnitSpawn, delay_ticks: u64 },
    /// Rebuild the tracked-unit cache once the wave has landed.
    RefreshCacheLater { delay_ticks: u64 },
    /// Reopen this room's doors.
    OpenDoors,
    /// The raid is done; the room is cleared.
    Completed,
}

/// Lifecycle of one room's raid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaidPhase {
    Inactive,
    /// Active, between waves.
    Idle,
    /// Active with a wave on the field.
    WaveInProgress,
    Completed,
}

/// Wave-based encounter state for one room with spawn points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidMachine {
    room: usize,
    bounds: Volume,
    spawn_points: Vec<CellPos>,
    active: bool,
    completed: bool,
    wave_in_progress: bool,
    current_wave: u32,
    max_waves: u32,
    participants: BTreeSet<ActorId>,
    dead: BTreeSet<ActorId>,
    caps: CapCounters,
    next_check_tick: u64,
    /// Lazily refreshed ids of this wave's live units.
    tracked: BTreeSet<EntityId>,
    /// Legendary runs spawn elite variants.
    elite: bool,
}

impl RaidMachine {
    pub fn new(room: usize, bounds: Volume, spawn_points: Vec<CellPos>, elite: bool) -> Self {
        Self {
            room,
            bounds,
            spawn_points,
            active: false,
            completed: false,
            wave_in_progress: false,
            current_wave: 0,
            max_waves: 0,
            participants: BTreeSet::new(),
            dead: BTreeSet::new(),
            caps: CapCounters::default(),
            next_check_tick: 0,
            tracked: BTreeSet::new(),
            elite,
        }
    }

    pub fn phase(&self) -> RaidPhase {
        if self.completed {
            RaidPhase::Completed
        } else if !self.active {
            RaidPhase::Inactive
        } else if self.wave_in_progress {
            RaidPhase::WaveInProgress
        } else {
            RaidPhase::Idle
        }
    }

    pub fn has_spawn_points(&self) -> bool {
        !self.spawn_points.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.active && !self.completed
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn max_waves(&self) -> u32 {
        self.max_waves
    }

    pub fn participants(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.participants.iter().copied()
    }

    pub fn is_participant(&self, actor: ActorId) -> bool {
        self.participants.contains(&actor)
    }

    /// Activate the raid: gather eligible party members near the
    /// activator (or already inside the room) as participants and queue
    /// their teleport to the activation point.
    pub fn activate(
        &mut self,
        world: &dyn World,
        activator: ActorId,
        party: &[ActorId],
        now: u64,
        config: &EncounterConfig,
    ) -> Vec<RaidSignal> {
        if self.active || self.completed || self.spawn_points.is_empty() {
            return Vec::new();
        }
        let Some(gather_point) = world.actor_pos(activator) else {
            return Vec::new();
        };

        let radius_sq = f64::from(config.gather_radius) * f64::from(config.gather_radius);
        let mut signals = Vec::new();
        for &actor in party {
            if !eligible(world, actor) {
                continue;
            }
            let Some(pos) = world.actor_pos(actor) else {
                continue;
            };
            let near = pos.distance_sq(gather_point) <= radius_sq;
            if near || self.bounds.contains(pos) {
                self.participants.insert(actor);
                if actor != activator {
                    signals.push(RaidSignal::TeleportLater {
                        actor,
                        to: gather_point,
                        delay_ticks: config.gather_teleport_delay_ticks,
                    });
                }
            }
        }

        self.active = true;
        self.current_wave = 0;
        self.caps = CapCounters::default();
        self.max_waves = config.max_waves(self.participants.len());
        self.next_check_tick = now + config.gather_teleport_delay_ticks;
        tracing::info!(
            room = self.room,
            participants = self.participants.len(),
            max_waves = self.max_waves,
            "raid activated"
        );
        signals
    }

    /// One poll of the raid machine. Cheap when nothing is due: the
    /// next-check tick gates all the expensive work.
    pub fn tick<R: Rng>(
        &mut self,
        world: &dyn World,
        rng: &mut R,
        roster: &DifficultyRoster,
        config: &EncounterConfig,
        now: u64,
    ) -> Vec<RaidSignal> {
        if !self.is_active() {
            return Vec::new();
        }

        // Full wipe force-completes immediately, discarding remaining
        // waves.
        if self.all_participants_down(world) {
            tracing::info!(room = self.room, "raid participants wiped");
            return self.force_complete();
        }

        if now < self.next_check_tick {
            return Vec::new();
        }

        if self.wave_in_progress {
            if self.any_wave_unit_remains(world) {
                self.next_check_tick = now + config.grace_ticks;
                return Vec::new();
            }
            self.wave_in_progress = false;
            if self.current_wave >= self.max_waves {
                return self.force_complete();
            }
            self.next_check_tick = now + config.grace_ticks;
            return Vec::new();
        }

        // Between waves: the next one starts once any participant is in
        // the room.
        let occupied = self
            .participants
            .iter()
            .any(|&a| eligible(world, a) && world.actor_pos(a).is_some_and(|p| self.bounds.contains(p)));
        if occupied {
            return self.start_wave(rng, roster, config, now);
        }
        self.next_check_tick = now + config.grace_ticks;
        Vec::new()
    }

    fn start_wave<R: Rng>(
        &mut self,
        rng: &mut R,
        roster: &DifficultyRoster,
        config: &EncounterConfig,
        now: u64,
    ) -> Vec<RaidSignal> {
        let size = config.wave_size(self.current_wave);
        let mut signals = Vec::new();

        for idx in 0..size {
            let tier = match select_difficulty(roster, &config.weights, self.caps, rng.random()) {
                Some(tier) => tier,
                None => continue,
            };
            let species_list = roster.species(tier);
            let species = species_list[rng.random_range(0..species_list.len())].clone();
            self.caps.record(tier);

            let base = self.spawn_points[idx as usize % self.spawn_points.len()];
            let pos = scatter(base, config.spawn_scatter, &self.bounds, rng);
            signals.push(RaidSignal::SpawnLater {
                spawn: UnitSpawn {
                    pos,
                    species,
                    tag: UnitTag::Raid,
                    elite: self.elite,
                    scale: None,
                },
                delay_ticks: u64::from(idx) * config.spawn_stagger_ticks,
            });
        }

        // Degraded but consistent: an empty plan (no rosters configured)
        // just retries after the grace period.
        if signals.is_empty() {
            tracing::warn!(room = self.room, wave = self.current_wave, "wave plan empty");
            self.next_check_tick = now + config.grace_ticks;
            return signals;
        }

        let stagger_total = u64::from(size.saturating_sub(1)) * config.spawn_stagger_ticks;
        self.wave_in_progress = true;
        self.current_wave += 1;
        self.next_check_tick = now + config.grace_ticks + stagger_total;
        self.tracked.clear();
        signals.push(RaidSignal::RefreshCacheLater {
            delay_ticks: stagger_total + config.cache_refresh_delay_ticks,
        });

        tracing::info!(
            room = self.room,
            wave = self.current_wave,
            units = size,
            "raid wave started"
        );
        signals
    }

    /// Record a unit the deferred spawn actually produced.
    pub fn note_spawned(&mut self, unit: EntityId) {
        if self.wave_in_progress {
            self.tracked.insert(unit);
        }
    }

    /// Drop dead/absent ids and rescan the room when the cache runs dry.
    pub fn refresh_cache(&mut self, world: &dyn World) {
        self.tracked = world.units_in(&self.bounds, UnitTag::Raid).into_iter().collect();
    }

    fn any_wave_unit_remains(&mut self, world: &dyn World) -> bool {
        self.tracked.retain(|&unit| {
            world.unit_alive(unit)
                && world.unit_pos(unit).is_some_and(|p| self.bounds.contains(p))
        });
        if self.tracked.is_empty() {
            // Cache ran dry; one authoritative rescan before declaring
            // the wave cleared.
            self.refresh_cache(world);
        }
        !self.tracked.is_empty()
    }

    fn all_participants_down(&self, world: &dyn World) -> bool {
        !self.participants.is_empty()
            && self.participants.iter().all(|&a| {
                !world.actor_online(a) || !world.actor_alive(a) || self.dead.contains(&a)
            })
    }

    /// Complete the raid now, discarding any remaining waves.
    pub fn force_complete(&mut self) -> Vec<RaidSignal> {
        self.completed = true;
        self.wave_in_progress = false;
        self.tracked.clear();
        tracing::info!(room = self.room, waves = self.current_wave, "raid completed");
        vec![RaidSignal::OpenDoors, RaidSignal::Completed]
    }

    /// A participant disconnecting force-completes their raid: the
    /// conservative fail-safe against a stuck encounter.
    pub fn on_disconnect(&mut self, actor: ActorId) -> Option<Vec<RaidSignal>> {
        if self.is_active() && self.participants.contains(&actor) {
            tracing::info!(room = self.room, %actor, "raid participant disconnected");
            return Some(self.force_complete());
        }
        None
    }

    pub fn note_death(&mut self, actor: ActorId) {
        if self.participants.contains(&actor) {
            self.dead.insert(actor);
        }
    }

    pub fn note_respawn(&mut self, actor: ActorId) {
        self.dead.remove(&actor);
    }
}

fn eligible(world: &dyn World, actor: ActorId) -> bool {
    world.actor_online(actor) && world.actor_alive(actor) && !world.actor_spectator(actor)
}

/// Scatter a spawn point up to `scatter` cells on x/z, clamped to the
/// room.
fn scatter<R: Rng>(base: CellPos, scatter: i32, bounds: &Volume, rng: &mut R) -> CellPos {
    if scatter == 0 {
        return base;
    }
    let pos = base.offset(
        rng.random_range(-scatter..=scatter),
        0,
        rng.random_range(-scatter..=scatter),
    );
    bounds.clamp(pos)
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

    fn bounds() -> Volume {
        Volume::new(CellPos::new(0, 70, 0), CellPos::new(24, 76, 24))
    }

    fn spawn_points() -> Vec<CellPos> {
        vec![
            CellPos::new(5, 71, 5),
            CellPos::new(12, 71, 12),
            CellPos::new(19, 71, 19),
        ]
    }

    fn roster() -> DifficultyRoster {
        DifficultyRoster {
            weak: vec!["ruffian".into()],
            medium: vec!["bruiser".into()],
            hard: vec!["dread_knight".into()],
        }
    }

    fn rng() -> impl Rng {
        rand::rngs::StdRng::seed_from_u64(7)
    }

    fn activated(world: &mut MemoryWorld, party: &[ActorId]) -> RaidMachine {
        for (i, &actor) in party.iter().enumerate() {
            world.add_actor(actor, CellPos::new(5 + i as i32, 71, 5));
        }
        let mut raid = RaidMachine::new(0, bounds(), spawn_points(), false);
        raid.activate(world, party[0], party, 0, &EncounterConfig::default());
        raid
    }

    // =====================================================================
    // Activation
    // =====================================================================

    #[test]
    fn test_activation_gathers_nearby_party_members() {
        let mut world = MemoryWorld::new();
        world.add_actor(aid(1), CellPos::new(5, 71, 5));
        world.add_actor(aid(2), CellPos::new(8, 71, 8));
        // Outside the gather radius and outside the room.
        world.add_actor(aid(3), CellPos::new(200, 71, 200));

        let mut raid = RaidMachine::new(0, bounds(), spawn_points(), false);
        let signals = raid.activate(
            &world,
            aid(1),
            &[aid(1), aid(2), aid(3)],
            0,
            &EncounterConfig::default(),
        );

        assert!(raid.is_participant(aid(1)));
        assert!(raid.is_participant(aid(2)));
        assert!(!raid.is_participant(aid(3)));
        // Only the non-activator participant is teleported.
        assert_eq!(
            signals,
            vec![RaidSignal::TeleportLater {
                actor: aid(2),
                to: CellPos::new(5, 71, 5),
                delay_ticks: 8,
            }]
        );
    }

    #[test]
    fn test_max_waves_follows_participant_count() {
        let mut world = MemoryWorld::new();
        let raid = activated(&mut world, &[aid(1)]);
        assert_eq!(raid.max_waves(), 1);

        let mut world = MemoryWorld::new();
        let raid = activated(&mut world, &[aid(1), aid(2)]);
        assert_eq!(raid.max_waves(), 2);

        let mut world = MemoryWorld::new();
        let raid = activated(&mut world, &[aid(1), aid(2), aid(3), aid(4), aid(5)]);
        assert_eq!(raid.max_waves(), 3);
    }

    #[test]
    fn test_activation_without_spawn_points_is_noop() {
        let mut world = MemoryWorld::new();
        world.add_actor(aid(1), CellPos::new(5, 71, 5));
        let mut raid = RaidMachine::new(0, bounds(), Vec::new(), false);
        raid.activate(&world, aid(1), &[aid(1)], 0, &EncounterConfig::default());
        assert!(!raid.is_active());
    }

    // =====================================================================
    // Waves
    // =====================================================================

    #[test]
    fn test_first_wave_spawns_with_stagger() {
        let mut world = MemoryWorld::new();
        let mut raid = activated(&mut world, &[aid(1)]);

        let signals = raid.tick(&world, &mut rng(), &roster(), &EncounterConfig::default(), 8);
        let spawns: Vec<_> = signals
            .iter()
            .filter_map(|s| match s {
                RaidSignal::SpawnLater { spawn, delay_ticks } => Some((spawn, *delay_ticks)),
                _ => None,
            })
            .collect();

        assert_eq!(spawns.len(), 3);
        assert_eq!(spawns[0].1, 0);
        assert_eq!(spawns[1].1, 4);
        assert_eq!(spawns[2].1, 8);
        assert!(spawns.iter().all(|(s, _)| bounds().contains(s.pos)));
        assert!(signals
            .iter()
            .any(|s| matches!(s, RaidSignal::RefreshCacheLater { delay_ticks: 18 })));
        assert_eq!(raid.phase(), RaidPhase::WaveInProgress);
    }

    #[test]
    fn test_wave_clears_then_raid_completes() {
        let mut world = MemoryWorld::new();
        let mut raid = activated(&mut world, &[aid(1)]);
        let config = EncounterConfig::default();

        raid.tick(&world, &mut rng(), &roster(), &config, 8);
        // Simulate the deferred spawns landing.
        for pos in spawn_points() {
            let unit = world
                .spawn_unit(UnitSpawn {
                    pos,
                    species: "ruffian".into(),
                    tag: UnitTag::Raid,
                    elite: false,
                    scale: None,
                })
                .unwrap();
            raid.note_spawned(unit);
        }

        // Units alive: the wave is still in progress.
        let next_poll = 8 + config.grace_ticks + 8;
        assert!(raid
            .tick(&world, &mut rng(), &roster(), &config, next_poll)
            .is_empty());
        assert_eq!(raid.phase(), RaidPhase::WaveInProgress);

        // Clear the room: solo raid caps at one wave, so it completes.
        world.kill_units_in(&bounds(), UnitTag::Raid);
        let signals = raid.tick(
            &world,
            &mut rng(),
            &roster(),
            &config,
            next_poll + config.grace_ticks,
        );
        assert!(signals.contains(&RaidSignal::OpenDoors));
        assert!(signals.contains(&RaidSignal::Completed));
        assert!(raid.is_completed());
    }

    #[test]
    fn test_cache_rebuild_catches_unnoted_units() {
        let mut world = MemoryWorld::new();
        let mut raid = activated(&mut world, &[aid(1)]);
        let config = EncounterConfig::default();
        raid.tick(&world, &mut rng(), &roster(), &config, 8);

        // A unit spawned without note_spawned: the dry-cache rescan
        // still finds it.
        world
            .spawn_unit(UnitSpawn {
                pos: CellPos::new(12, 71, 12),
                species: "ruffian".into(),
                tag: UnitTag::Raid,
                elite: false,
                scale: None,
            })
            .unwrap();
        raid.tick(&world, &mut rng(), &roster(), &config, 100);
        assert_eq!(raid.phase(), RaidPhase::WaveInProgress);
    }

    #[test]
    fn test_hard_cap_respected_across_large_waves() {
        let mut world = MemoryWorld::new();
        let mut raid = activated(
            &mut world,
            &[aid(1), aid(2), aid(3), aid(4), aid(5)],
        );
        let config = EncounterConfig::default();
        // Hard-only roster plus weak: after 3 hard spawns the cap
        // excludes the tier.
        let roster = DifficultyRoster {
            weak: vec!["ruffian".into()],
            medium: vec![],
            hard: vec!["dread_knight".into()],
        };

        let mut hard_total = 0;
        let mut now = 8;
        let mut r = rng();
        for _ in 0..3 {
            let signals = raid.tick(&world, &mut r, &roster, &config, now);
            hard_total += signals
                .iter()
                .filter(|s| matches!(s, RaidSignal::SpawnLater { spawn, .. } if spawn.species == "dread_knight"))
                .count();
            // Clear the field so the next wave can start.
            world.kill_units_in(&bounds(), UnitTag::Raid);
            now += 1000;
            raid.tick(&world, &mut r, &roster, &config, now);
            now += 1000;
        }
        assert!(hard_total <= 3, "hard cap exceeded: {hard_total}");
    }

    // =====================================================================
    // Fail-safes
    // =====================================================================

    #[test]
    fn test_participant_wipe_force_completes() {
        let mut world = MemoryWorld::new();
        let mut raid = activated(&mut world, &[aid(1), aid(2)]);
        raid.tick(&world, &mut rng(), &roster(), &EncounterConfig::default(), 8);

        world.set_alive(aid(1), false);
        world.set_alive(aid(2), false);
        let signals = raid.tick(&world, &mut rng(), &roster(), &EncounterConfig::default(), 9);
        assert!(signals.contains(&RaidSignal::Completed));
        assert!(raid.is_completed());
    }

    #[test]
    fn test_participant_disconnect_force_completes() {
        let mut world = MemoryWorld::new();
        let mut raid = activated(&mut world, &[aid(1), aid(2)]);

        let signals = raid.on_disconnect(aid(2)).unwrap();
        assert!(signals.contains(&RaidSignal::Completed));
        // A stranger disconnecting does nothing further.
        assert!(raid.on_disconnect(aid(9)).is_none());
    }
}
