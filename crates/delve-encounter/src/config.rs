//! Encounter tuning knobs. Defaults match the shipped dungeon balance.

use serde::{Deserialize, Serialize};

use crate::DifficultyWeights;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterConfig {
    /// Units per wave, indexed by wave number (last entry repeats).
    pub wave_table: Vec<u32>,
    /// Grace period between completion polls, in ticks.
    pub grace_ticks: u64,
    /// Per-unit spawn stagger within a wave.
    pub spawn_stagger_ticks: u64,
    /// Delay before the tracked-entity cache is rebuilt after a wave.
    pub cache_refresh_delay_ticks: u64,
    /// Horizontal radius around the activator for gathering participants.
    pub gather_radius: i32,
    /// Delay before gathered participants are teleported in.
    pub gather_teleport_delay_ticks: u64,
    /// Spawn positions scatter up to this many cells on x/z.
    pub spawn_scatter: i32,
    /// Difficulty weights and per-raid caps.
    pub weights: DifficultyWeights,
    /// Ticks between boss add-waves.
    pub boss_wave_interval_ticks: u64,
    /// Adds per boss wave.
    pub boss_adds_per_wave: u32,
    /// Empty boss room fail window, in ticks.
    pub boss_empty_fail_ticks: u64,
    /// Delay between boss start and the door close/lock.
    pub boss_door_close_delay_ticks: u64,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            wave_table: vec![3, 5, 7],
            grace_ticks: 40,
            spawn_stagger_ticks: 4,
            cache_refresh_delay_ticks: 10,
            gather_radius: 13,
            gather_teleport_delay_ticks: 8,
            spawn_scatter: 2,
            weights: DifficultyWeights::default(),
            boss_wave_interval_ticks: 300,
            boss_adds_per_wave: 3,
            boss_empty_fail_ticks: 900,
            boss_door_close_delay_ticks: 7,
        }
    }
}

impl EncounterConfig {
    /// Units in the given wave (0-based); the table's last entry repeats
    /// for any wave past its end.
    pub fn wave_size(&self, wave: u32) -> u32 {
        let idx = (wave as usize).min(self.wave_table.len().saturating_sub(1));
        self.wave_table.get(idx).copied().unwrap_or(0)
    }

    /// Raid wave cap from the participant count: 1, 2, or 3.
    pub fn max_waves(&self, participants: usize) -> u32 {
        (participants as u32).clamp(1, self.wave_table.len() as u32)
    }

    /// Boss add-wave count from party size: 1 for solo, 2 for 2-3,
    /// 3 for 4 and up.
    pub fn boss_total_waves(&self, party_size: usize) -> u32 {
        match party_size {
            0..=1 => 1,
            2..=3 => 2,
            _ => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_table_last_entry_repeats() {
        let config = EncounterConfig::default();
        assert_eq!(config.wave_size(0), 3);
        assert_eq!(config.wave_size(2), 7);
        assert_eq!(config.wave_size(9), 7);
    }

    #[test]
    fn test_max_waves_by_participant_count() {
        let config = EncounterConfig::default();
        assert_eq!(config.max_waves(1), 1);
        assert_eq!(config.max_waves(2), 2);
        assert_eq!(config.max_waves(5), 3);
    }

    #[test]
    fn test_boss_waves_by_party_size() {
        let config = EncounterConfig::default();
        assert_eq!(config.boss_total_waves(1), 1);
        assert_eq!(config.boss_total_waves(3), 2);
        assert_eq!(config.boss_total_waves(4), 3);
    }
}
