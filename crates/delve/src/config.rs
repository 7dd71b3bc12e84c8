//! Runtime-wide gameplay tuning.
//!
//! One document aggregating every sub-crate's knobs plus the timings the
//! runtime itself owns. Deserializable from JSON so hosts can ship it as
//! a config file; [`GameplayConfig::validated`] clamps out-of-range
//! values instead of failing.

use delve_barrier::BarrierConfig;
use delve_encounter::{DifficultyRoster, EncounterConfig, SecretConfig};
use delve_hazard::{FreezeConfig, HeatConfig, TICKS_PER_SEC};
use delve_topology::TopologyConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameplayConfig {
    /// Ticks between hazard evaluations (one evaluation covers one
    /// second of exposure).
    pub hazard_interval_ticks: u64,
    /// Chebyshev radius for counteracting-source lookups.
    pub hazard_source_radius: i32,
    /// Absolute session lifetime; the run is killed when it elapses.
    pub overtime_ticks: u64,
    /// How long a session may sit with nobody online.
    pub idle_timeout_ticks: u64,
    /// Per-player, per-room cooldown on entry-action triggers.
    pub trigger_cooldown_ticks: u64,
    /// Per-player debounce on ready votes.
    pub ready_vote_cooldown_ticks: u64,
    /// Cooldown between manual door-opens of the same room.
    pub door_reopen_cooldown_ticks: u64,
    /// Delay before the party is teleported in at session start.
    pub participant_teleport_delay_ticks: u64,
    /// Probability that a run rolls legendary.
    pub legendary_chance: f64,
    /// Species the boss machine spawns.
    pub boss_species: String,
    /// Optional boss size override.
    pub boss_scale: Option<f64>,
    pub roster: DifficultyRoster,
    pub topology: TopologyConfig,
    pub barrier: BarrierConfig,
    pub encounter: EncounterConfig,
    pub freeze: FreezeConfig,
    pub heat: HeatConfig,
    pub secret: SecretConfig,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            hazard_interval_ticks: TICKS_PER_SEC,
            hazard_source_radius: 3,
            overtime_ticks: 3 * 60 * 60 * TICKS_PER_SEC,
            idle_timeout_ticks: 5 * 60 * TICKS_PER_SEC,
            trigger_cooldown_ticks: 20,
            ready_vote_cooldown_ticks: 5,
            door_reopen_cooldown_ticks: 400,
            participant_teleport_delay_ticks: 40,
            legendary_chance: 0.10,
            boss_species: "dungeon_tyrant".to_string(),
            boss_scale: None,
            roster: DifficultyRoster::default(),
            topology: TopologyConfig::default(),
            barrier: BarrierConfig::default(),
            encounter: EncounterConfig::default(),
            freeze: FreezeConfig::default(),
            heat: HeatConfig::default(),
            secret: SecretConfig::default(),
        }
    }
}

impl GameplayConfig {
    /// Clamp out-of-range values so the config is always safe to run.
    pub fn validated(mut self) -> Self {
        if self.hazard_interval_ticks == 0 {
            warn!("hazard_interval_ticks must be at least 1, clamping");
            self.hazard_interval_ticks = 1;
        }
        if !(0.0..=1.0).contains(&self.legendary_chance) {
            warn!(
                chance = self.legendary_chance,
                "legendary_chance outside [0, 1], clamping"
            );
            self.legendary_chance = self.legendary_chance.clamp(0.0, 1.0);
        }
        if self.overtime_ticks < self.idle_timeout_ticks {
            warn!("overtime_ticks below idle_timeout_ticks, raising");
            self.overtime_ticks = self.idle_timeout_ticks;
        }
        self.hazard_source_radius = self.hazard_source_radius.max(0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_already_valid() {
        let config = GameplayConfig::default();
        assert_eq!(config.clone().validated(), config);
    }

    #[test]
    fn test_validated_clamps_out_of_range_values() {
        let config = GameplayConfig {
            hazard_interval_ticks: 0,
            legendary_chance: 1.7,
            overtime_ticks: 10,
            idle_timeout_ticks: 100,
            ..Default::default()
        }
        .validated();

        assert_eq!(config.hazard_interval_ticks, 1);
        assert_eq!(config.legendary_chance, 1.0);
        assert_eq!(config.overtime_ticks, 100);
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = GameplayConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: GameplayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
