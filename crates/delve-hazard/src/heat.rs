//! The heat accumulator: overheat milestones and terminal ignition.

use serde::{Deserialize, Serialize};

use crate::{Accumulator, TICKS_PER_SEC};

/// Heat tuning. Defaults match the shipped dungeon balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatConfig {
    pub total_secs: u32,
    /// Forward-only milestone thresholds; the last one is terminal.
    pub milestones: Vec<u32>,
    /// Fixed accumulation rate. Heat has no rate-modifier stack.
    pub rate_per_sec: f64,
    /// Regression rate while near cooling water.
    pub water_regress_per_sec: u32,
    /// Elapsed value after a relief consumable.
    pub relief_elapsed_secs: u32,
    /// Accumulation pause after a relief.
    pub relief_pause_secs: u32,
    /// Reuse cooldown between reliefs.
    pub relief_cooldown_secs: u32,
    /// How long the terminal ignition burns, in seconds.
    pub ignite_secs: u32,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            total_secs: 300,
            milestones: vec![240, 300],
            rate_per_sec: 1.0,
            water_regress_per_sec: 1,
            relief_elapsed_secs: 180,
            relief_pause_secs: 120,
            relief_cooldown_secs: 10,
            ignite_secs: 5,
        }
    }
}

/// Observable effects of one heat evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatEvent {
    /// A non-terminal milestone fired (1-based ordinal).
    MilestoneReached(u8),
    /// The terminal threshold was crossed; the actor catches fire for
    /// the carried number of seconds.
    Ignited { secs: u32 },
}

/// What the evaluator observed about the actor this second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatInput {
    pub now_tick: u64,
    pub in_bounds: bool,
    pub exempt: bool,
    /// Cooling water is near; regress instead of accumulating.
    pub near_water: bool,
}

/// One actor's heat state. Evaluated once per second, not per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMachine {
    config: HeatConfig,
    counter: Accumulator,
    paused_until_tick: u64,
    relief_ready_tick: u64,
}

impl HeatMachine {
    pub fn new(config: HeatConfig) -> Self {
        let counter = Accumulator::new(config.total_secs);
        Self {
            config,
            counter,
            paused_until_tick: 0,
            relief_ready_tick: 0,
        }
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.counter.elapsed()
    }

    /// One evaluation step, covering one second of exposure.
    pub fn step(&mut self, input: HeatInput) -> Vec<HeatEvent> {
        if !input.in_bounds || input.exempt {
            return Vec::new();
        }
        if input.now_tick < self.paused_until_tick {
            return Vec::new();
        }

        if input.near_water {
            self.counter.regress(self.config.water_regress_per_sec);
            return Vec::new();
        }

        self.counter.accumulate(self.config.rate_per_sec);

        let terminal = self.config.milestones.len() as u8;
        let mut events = Vec::new();
        for ordinal in self.counter.crossed(&self.config.milestones) {
            if ordinal == terminal {
                tracing::debug!(elapsed = self.counter.elapsed(), "actor ignited by heat");
                events.push(HeatEvent::Ignited {
                    secs: self.config.ignite_secs,
                });
            } else {
                events.push(HeatEvent::MilestoneReached(ordinal));
            }
        }
        events
    }

    /// Use a cooling consumable: set the counter back and pause
    /// accumulation. Rejected (`None`) during the reuse cooldown.
    pub fn apply_relief(&mut self, now_tick: u64) -> Option<()> {
        if now_tick < self.relief_ready_tick {
            return None;
        }
        self.relief_ready_tick =
            now_tick + u64::from(self.config.relief_cooldown_secs) * TICKS_PER_SEC;
        self.counter
            .set_elapsed(self.counter.elapsed().min(self.config.relief_elapsed_secs));
        self.paused_until_tick =
            now_tick + u64::from(self.config.relief_pause_secs) * TICKS_PER_SEC;
        Some(())
    }

    /// Death/respawn reset.
    pub fn reset(&mut self) {
        self.counter.reset();
        self.paused_until_tick = 0;
    }
}

// =========================================================================
// Tests
// =========================================================================
