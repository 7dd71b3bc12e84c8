//! The boss-phase state machine: start, add-waves, pause/fail on an
//! empty room, and victory on the boss's disappearance.

use delve_world::{CellPos, EntityId, UnitSpawn, UnitTag, Volume, World};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{select_difficulty, CapCounters, DifficultyRoster, EncounterConfig};

/// Work the boss machine wants done by its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum BossSignal {
    /// Close every room door and lock the boss doors, after the delay.
    SealDoorsLater { delay_ticks: u64 },
    /// Spawn one add after the stagger delay.
    SpawnLater { spawn: UnitSpawn, delay_ticks: u64 },
    /// Show or update the boss health bar.
    BossBar { fraction: f32 },
    ClearBossBar,
    /// Reopen every door.
    OpenDoors,
    /// The boss fell; the session moves to the ready phase.
    Victory,
    /// The empty-room fail window elapsed; everything reset.
    Failed,
}

/// Boss encounter state, embedded in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossMachine {
    started: bool,
    completed: bool,
    paused: bool,
    pause_start_tick: u64,
    fail_deadline_tick: u64,
    /// The boss was observed alive at least once; only then can its
    /// absence mean victory rather than a slow spawn.
    spawn_confirmed: bool,
    boss_entity: Option<EntityId>,
    boss_species: String,
    waves_spawned: u32,
    total_waves: u32,
    next_wave_tick: u64,
    caps: CapCounters,
    /// For log throttling only.
    last_occupancy: usize,
    bounds: Volume,
    anchor: CellPos,
    add_spawn_points: Vec<CellPos>,
    elite: bool,
}

impl BossMachine {
    pub fn new(bounds: Volume, anchor: CellPos, add_spawn_points: Vec<CellPos>, elite: bool) -> Self {
        Self {
            started: false,
            completed: false,
            paused: false,
            pause_start_tick: 0,
            fail_deadline_tick: 0,
            spawn_confirmed: false,
            boss_entity: None,
            boss_species: String::new(),
            waves_spawned: 0,
            total_waves: 0,
            next_wave_tick: 0,
            caps: CapCounters::default(),
            last_occupancy: 0,
            bounds,
            anchor,
            add_spawn_points,
            elite,
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn boss_species(&self) -> &str {
        &self.boss_species
    }

    pub fn bounds(&self) -> &Volume {
        &self.bounds
    }

    /// Start the encounter: spawn the boss at the anchor and begin the
    /// add-wave cadence. `None` when already started/completed or when
    /// the host refused the spawn.
    pub fn try_start(
        &mut self,
        world: &mut dyn World,
        species: &str,
        scale: Option<f64>,
        party_size: usize,
        now: u64,
        config: &EncounterConfig,
    ) -> Option<Vec<BossSignal>> {
        if self.started || self.completed {
            return None;
        }

        let spawn = UnitSpawn {
            pos: self.anchor,
            species: species.to_owned(),
            tag: UnitTag::Boss,
            elite: self.elite,
            scale,
        };
        let Some(entity) = world.spawn_unit(spawn) else {
            tracing::warn!(species, "host refused boss spawn");
            return None;
        };

        self.started = true;
        self.paused = false;
        self.spawn_confirmed = false;
        self.boss_entity = Some(entity);
        self.boss_species = species.to_owned();
        self.waves_spawned = 0;
        self.total_waves = config.boss_total_waves(party_size);
        self.next_wave_tick = now + config.boss_wave_interval_ticks;
        self.caps = CapCounters::default();

        tracing::info!(
            species,
            %entity,
            total_waves = self.total_waves,
            "boss encounter started"
        );
        Some(vec![BossSignal::SealDoorsLater {
            delay_ticks: config.boss_door_close_delay_ticks,
        }])
    }

    /// One poll of the boss machine. `occupancy` is the number of
    /// eligible actors currently inside the boss room.
    pub fn tick<R: Rng>(
        &mut self,
        world: &mut dyn World,
        rng: &mut R,
        roster: &DifficultyRoster,
        config: &EncounterConfig,
        now: u64,
        occupancy: usize,
    ) -> Vec<BossSignal> {
        if !self.started || self.completed {
            return Vec::new();
        }

        if occupancy != self.last_occupancy {
            tracing::debug!(occupancy, "boss room occupancy changed");
            self.last_occupancy = occupancy;
        }

        if occupancy == 0 {
            if !self.paused {
                self.paused = true;
                self.pause_start_tick = now;
                self.fail_deadline_tick = now + config.boss_empty_fail_ticks;
                tracing::info!("boss room empty, encounter paused");
                return Vec::new();
            }
            if now >= self.fail_deadline_tick {
                return self.fail(world);
            }
            return Vec::new();
        }

        if self.paused {
            // Re-occupied in time: resume and push the next wave out.
            self.paused = false;
            self.next_wave_tick = now + config.boss_wave_interval_ticks;
            tracing::info!("boss encounter resumed");
        }

        let mut signals = Vec::new();

        if self.waves_spawned < self.total_waves && now >= self.next_wave_tick {
            signals.extend(self.start_add_wave(rng, roster, config));
            self.waves_spawned += 1;
            self.next_wave_tick = now + config.boss_wave_interval_ticks;
        }

        match self.find_boss(world) {
            Some(entity) => {
                self.spawn_confirmed = true;
                if let Some((health, max)) = world.unit_health(entity) {
                    let fraction = if max > 0.0 { health / max } else { 0.0 };
                    signals.push(BossSignal::BossBar {
                        fraction: fraction.clamp(0.0, 1.0),
                    });
                }
            }
            None if self.spawn_confirmed => {
                // The boss vanished after being seen alive: victory.
                self.completed = true;
                tracing::info!(species = %self.boss_species, "boss defeated");
                signals.push(BossSignal::OpenDoors);
                signals.push(BossSignal::ClearBossBar);
                signals.push(BossSignal::Victory);
            }
            None => {}
        }

        signals
    }

    fn start_add_wave<R: Rng>(
        &mut self,
        rng: &mut R,
        roster: &DifficultyRoster,
        config: &EncounterConfig,
    ) -> Vec<BossSignal> {
        let points = if self.add_spawn_points.is_empty() {
            std::slice::from_ref(&self.anchor)
        } else {
            &self.add_spawn_points[..]
        };

        let mut signals = Vec::new();
        for idx in 0..config.boss_adds_per_wave {
            let Some(tier) = select_difficulty(roster, &config.weights, self.caps, rng.random())
            else {
                continue;
            };
            let species_list = roster.species(tier);
            let species = species_list[rng.random_range(0..species_list.len())].clone();
            self.caps.record(tier);
            signals.push(BossSignal::SpawnLater {
                spawn: UnitSpawn {
                    pos: points[idx as usize % points.len()],
                    species,
                    tag: UnitTag::Raid,
                    elite: self.elite,
                    scale: None,
                },
                delay_ticks: u64::from(idx) * config.spawn_stagger_ticks,
            });
        }
        tracing::info!(
            wave = self.waves_spawned + 1,
            of = self.total_waves,
            adds = signals.len(),
            "boss add wave"
        );
        signals
    }

    /// Validate the cached boss id, falling back to a tagged room scan.
    fn find_boss(&mut self, world: &dyn World) -> Option<EntityId> {
        if let Some(entity) = self.boss_entity {
            let present = world.unit_alive(entity)
                && world.unit_pos(entity).is_some_and(|p| self.bounds.contains(p));
            if present {
                return Some(entity);
            }
            self.boss_entity = None;
        }
        let found = world.units_in(&self.bounds, UnitTag::Boss).into_iter().next();
        self.boss_entity = found;
        found
    }

    /// The abnormal edge back to "not started": remove the boss and its
    /// adds, clear every counter, reopen everything.
    fn fail(&mut self, world: &mut dyn World) -> Vec<BossSignal> {
        tracing::info!("boss encounter failed, resetting");
        world.remove_units_in(&self.bounds, UnitTag::Boss);
        world.remove_units_in(&self.bounds, UnitTag::Raid);

        self.started = false;
        self.paused = false;
        self.spawn_confirmed = false;
        self.boss_entity = None;
        self.boss_species.clear();
        self.waves_spawned = 0;
        self.total_waves = 0;
        self.next_wave_tick = 0;
        self.caps = CapCounters::default();

        vec![
            BossSignal::OpenDoors,
            BossSignal::ClearBossBar,
            BossSignal::Failed,
        ]
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

    fn bounds() -> Volume {
        Volume::new(CellPos::new(30, 70, 0), CellPos::new(76, 83, 38))
    }

    fn anchor() -> CellPos {
        CellPos::new(53, 71, 19)
    }

    fn roster() -> DifficultyRoster {
        DifficultyRoster {
            weak: vec!["ruffian".into()],
            medium: vec!["bruiser".into()],
            hard: vec!["dread_knight".into()],
        }
    }

    fn rng() -> impl Rng {
        rand::rngs::StdRng::seed_from_u64(11)
    }

    fn started(world: &mut MemoryWorld) -> BossMachine {
        let mut boss = BossMachine::new(bounds(), anchor(), vec![anchor()], false);
        boss.try_start(world, "frost_tyrant", Some(1.5), 2, 0, &EncounterConfig::default())
            .unwrap();
        boss
    }

    #[test]
    fn test_start_spawns_boss_and_seals_doors_later() {
        let mut world = MemoryWorld::new();
        let mut boss = BossMachine::new(bounds(), anchor(), Vec::new(), false);
        let signals = boss
            .try_start(&mut world, "frost_tyrant", None, 4, 0, &EncounterConfig::default())
            .unwrap();
        assert_eq!(signals, vec![BossSignal::SealDoorsLater { delay_ticks: 7 }]);
        assert!(boss.started());
        assert_eq!(world.live_unit_count(UnitTag::Boss), 1);
        // 4-player party gets 3 add waves.
        assert_eq!(boss.total_waves, 3);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut world = MemoryWorld::new();
        let mut boss = started(&mut world);
        assert!(boss
            .try_start(&mut world, "frost_tyrant", None, 2, 5, &EncounterConfig::default())
            .is_none());
    }

    #[test]
    fn test_refused_spawn_does_not_start() {
        let mut world = MemoryWorld::new();
        world.refuse_spawns = true;
        let mut boss = BossMachine::new(bounds(), anchor(), Vec::new(), false);
        assert!(boss
            .try_start(&mut world, "frost_tyrant", None, 1, 0, &EncounterConfig::default())
            .is_none());
        assert!(!boss.started());
    }

    #[test]
    fn test_boss_bar_tracks_health() {
        let mut world = MemoryWorld::new();
        let mut boss = started(&mut world);
        let entity = world.units_in(&bounds(), UnitTag::Boss)[0];
        world.set_unit_health(entity, 50.0);

        let signals = boss.tick(
            &mut world,
            &mut rng(),
            &roster(),
            &EncounterConfig::default(),
            10,
            2,
        );
        assert!(signals
            .iter()
            .any(|s| matches!(s, BossSignal::BossBar { fraction } if (*fraction - 0.5).abs() < 1e-6)));
    }

    #[test]
    fn test_add_waves_fire_on_interval() {
        let mut world = MemoryWorld::new();
        let mut boss = started(&mut world);
        let config = EncounterConfig::default();

        // Before the interval: no adds.
        let early = boss.tick(&mut world, &mut rng(), &roster(), &config, 100, 1);
        assert!(!early.iter().any(|s| matches!(s, BossSignal::SpawnLater { .. })));

        let due = boss.tick(&mut world, &mut rng(), &roster(), &config, 300, 1);
        let adds = due
            .iter()
            .filter(|s| matches!(s, BossSignal::SpawnLater { .. }))
            .count();
        assert_eq!(adds, 3);
    }

    #[test]
    fn test_empty_room_pauses_then_fails_and_resets() {
        let mut world = MemoryWorld::new();
        let mut boss = started(&mut world);
        let config = EncounterConfig::default();

        // Confirm the boss first so failure is not mistaken for victory.
        boss.tick(&mut world, &mut rng(), &roster(), &config, 10, 1);

        // Room empties: pause with a 900-tick window.
        assert!(boss
            .tick(&mut world, &mut rng(), &roster(), &config, 20, 0)
            .is_empty());
        assert!(boss.paused());

        // Still inside the window: nothing.
        assert!(boss
            .tick(&mut world, &mut rng(), &roster(), &config, 900, 0)
            .is_empty());

        // Window elapsed: fail, reopen, reset to not-started.
        let signals = boss.tick(&mut world, &mut rng(), &roster(), &config, 920, 0);
        assert!(signals.contains(&BossSignal::Failed));
        assert!(signals.contains(&BossSignal::OpenDoors));
        assert!(!boss.started());
        assert_eq!(world.live_unit_count(UnitTag::Boss), 0);
        // The machine can start again.
        assert!(boss
            .try_start(&mut world, "frost_tyrant", None, 2, 1000, &config)
            .is_some());
    }

    #[test]
    fn test_reoccupancy_before_deadline_resumes() {
        let mut world = MemoryWorld::new();
        let mut boss = started(&mut world);
        let config = EncounterConfig::default();

        boss.tick(&mut world, &mut rng(), &roster(), &config, 10, 1);
        boss.tick(&mut world, &mut rng(), &roster(), &config, 20, 0);
        assert!(boss.paused());

        boss.tick(&mut world, &mut rng(), &roster(), &config, 100, 2);
        assert!(!boss.paused());
        assert!(boss.started());
    }

    #[test]
    fn test_boss_disappearance_after_confirmation_is_victory() {
        let mut world = MemoryWorld::new();
        let mut boss = started(&mut world);
        let config = EncounterConfig::default();

        boss.tick(&mut world, &mut rng(), &roster(), &config, 10, 2);
        let entity = world.units_in(&bounds(), UnitTag::Boss)[0];
        world.kill_unit(entity);

        let signals = boss.tick(&mut world, &mut rng(), &roster(), &config, 20, 2);
        assert!(signals.contains(&BossSignal::Victory));
        assert!(signals.contains(&BossSignal::OpenDoors));
        assert!(signals.contains(&BossSignal::ClearBossBar));
        assert!(boss.completed());
    }

    #[test]
    fn test_unconfirmed_absence_is_not_victory() {
        let mut world = MemoryWorld::new();
        let mut boss = started(&mut world);
        let config = EncounterConfig::default();

        // Kill the boss before any confirming poll.
        let entity = world.units_in(&bounds(), UnitTag::Boss)[0];
        world.kill_unit(entity);

        let signals = boss.tick(&mut world, &mut rng(), &roster(), &config, 10, 2);
        assert!(!signals.contains(&BossSignal::Victory));
        assert!(!boss.completed());
    }
}
