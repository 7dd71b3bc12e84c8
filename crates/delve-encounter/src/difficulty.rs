//! Weighted difficulty selection with per-raid exhaustion caps.
//!
//! The draw itself is a pure function of the roster, the remaining caps,
//! and a uniform roll, so every weight and fallback edge is testable
//! without any simulation state.

use serde::{Deserialize, Serialize};

/// The three spawn difficulty tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifficultyTier {
    Weak,
    Medium,
    Hard,
}

/// Species rosters per tier, from the config collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyRoster {
    pub weak: Vec<String>,
    pub medium: Vec<String>,
    pub hard: Vec<String>,
}

impl DifficultyRoster {
    pub fn species(&self, tier: DifficultyTier) -> &[String] {
        match tier {
            DifficultyTier::Weak => &self.weak,
            DifficultyTier::Medium => &self.medium,
            DifficultyTier::Hard => &self.hard,
        }
    }

    fn has(&self, tier: DifficultyTier) -> bool {
        !self.species(tier).is_empty()
    }
}

/// Draw weights and per-raid caps.
///
/// Weak and hard carry fixed weights; medium takes the remainder. Hard
/// is capped lower than medium per raid; a tier whose cap is exhausted
/// is excluded from the draw entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyWeights {
    pub weak_weight: f64,
    pub hard_weight: f64,
    pub max_hard: u32,
    pub max_medium: u32,
}

impl Default for DifficultyWeights {
    fn default() -> Self {
        Self {
            weak_weight: 1.0 / 3.0,
            hard_weight: 2.0 / 5.0,
            max_hard: 3,
            max_medium: 5,
        }
    }
}

impl DifficultyWeights {
    pub fn medium_weight(&self) -> f64 {
        (1.0 - self.weak_weight - self.hard_weight).max(0.0)
    }
}

/// How many capped spawns this raid has already used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapCounters {
    pub hard_spawned: u32,
    pub medium_spawned: u32,
}

impl CapCounters {
    pub fn record(&mut self, tier: DifficultyTier) {
        match tier {
            DifficultyTier::Hard => self.hard_spawned += 1,
            DifficultyTier::Medium => self.medium_spawned += 1,
            DifficultyTier::Weak => {}
        }
    }
}

/// Pick a tier from a uniform `roll` in `[0, 1)`.
///
/// Eligible tiers (non-empty roster, cap not exhausted) are weighted
/// weak/medium/hard; the roll is scaled to the eligible total. When no
/// tier is eligible by weight, fall back deterministically: weak, then
/// medium under cap, then hard under cap, then medium, then hard, then
/// weak; the first with any roster wins. `None` only when every roster
/// is empty.
pub fn select_difficulty(
    roster: &DifficultyRoster,
    weights: &DifficultyWeights,
    caps: CapCounters,
    roll: f64,
) -> Option<DifficultyTier> {
    let mut options: Vec<(DifficultyTier, f64)> = Vec::with_capacity(3);
    if roster.has(DifficultyTier::Weak) {
        options.push((DifficultyTier::Weak, weights.weak_weight));
    }
    if roster.has(DifficultyTier::Medium) && caps.medium_spawned < weights.max_medium {
        options.push((DifficultyTier::Medium, weights.medium_weight()));
    }
    if roster.has(DifficultyTier::Hard) && caps.hard_spawned < weights.max_hard {
        options.push((DifficultyTier::Hard, weights.hard_weight));
    }

    let total: f64 = options.iter().map(|(_, w)| w).sum();
    if total > 0.0 {
        let mut cursor = roll.clamp(0.0, 1.0 - f64::EPSILON) * total;
        for (tier, weight) in &options {
            if cursor < *weight {
                return Some(*tier);
            }
            cursor -= weight;
        }
        // Floating-point edge: the roll landed exactly on the total.
        return options.last().map(|(tier, _)| *tier);
    }

    let fallback = [
        (DifficultyTier::Weak, true),
        (
            DifficultyTier::Medium,
            caps.medium_spawned < weights.max_medium,
        ),
        (DifficultyTier::Hard, caps.hard_spawned < weights.max_hard),
        (DifficultyTier::Medium, true),
        (DifficultyTier::Hard, true),
        (DifficultyTier::Weak, true),
    ];
    fallback
        .into_iter()
        .find(|&(tier, allowed)| allowed && roster.has(tier))
        .map(|(tier, _)| tier)
}
