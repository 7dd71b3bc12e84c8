//! The freeze accumulator: chill milestones, the frozen state, and the
//! thaw paths out of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Accumulator, TICKS_PER_SEC};

/// Freeze tuning. Defaults match the shipped dungeon balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezeConfig {
    /// Terminal threshold in seconds.
    pub total_secs: u32,
    /// Forward-only milestone thresholds; the last one is terminal.
    pub milestones: Vec<u32>,
    /// Base accumulation rate in seconds per evaluated second.
    pub rate_per_sec: f64,
    /// Regression rate while near a fire source.
    pub fire_regress_per_sec: u32,
    /// How long the frozen state lasts before auto-thaw.
    pub auto_thaw_secs: u32,
    /// Elapsed value after an auto-thaw.
    pub auto_thaw_elapsed_secs: u32,
    /// Elapsed value after a teammate thaw.
    pub teammate_thaw_elapsed_secs: u32,
    /// Elapsed value after a consumable thaw or relief.
    pub relief_elapsed_secs: u32,
    /// Accumulation pause after a (non-frozen) relief.
    pub relief_pause_secs: u32,
    /// Reuse cooldown between reliefs.
    pub relief_cooldown_secs: u32,
    /// Re-freeze immunity after any thaw.
    pub immunity_secs: u32,
    /// Rate modifiers only apply below this stage.
    pub modifier_stage_cap_secs: u32,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            total_secs: 300,
            milestones: vec![150, 240, 300],
            rate_per_sec: 1.0,
            fire_regress_per_sec: 4,
            auto_thaw_secs: 60,
            auto_thaw_elapsed_secs: 240,
            teammate_thaw_elapsed_secs: 120,
            relief_elapsed_secs: 180,
            relief_pause_secs: 120,
            relief_cooldown_secs: 10,
            immunity_secs: 4,
            modifier_stage_cap_secs: 240,
        }
    }
}

/// What ended a frozen state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThawSource {
    /// The frozen window elapsed.
    Auto,
    /// A teammate interacted with the frozen actor.
    Teammate,
    /// A thaw consumable was used.
    Consumable,
    /// A nearby fire source melted the ice before the window elapsed.
    Fire,
}

/// Observable effects of one freeze evaluation or thaw.
///
/// The machine knows nothing about the environment; the session layer
/// translates these into status effects, titles, and movement locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreezeEvent {
    /// A non-terminal milestone fired (1-based ordinal).
    MilestoneReached(u8),
    /// The terminal threshold was crossed; movement should lock.
    Frozen,
    /// The frozen state ended; movement should unlock.
    Thawed(ThawSource),
}

/// What the evaluator observed about the actor this second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeInput {
    pub now_tick: u64,
    /// Inside the instance bounds and subject to the hazard.
    pub in_bounds: bool,
    /// Spectators and dead actors are exempt.
    pub exempt: bool,
    /// A fire-ish source is near; regress instead of accumulating.
    pub near_fire: bool,
}

/// One actor's freeze state. Evaluated once per second, not per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezeMachine {
    config: FreezeConfig,
    counter: Accumulator,
    modifiers: BTreeMap<String, f64>,
    is_frozen: bool,
    thaw_deadline_tick: u64,
    immune_until_tick: u64,
    paused_until_tick: u64,
    relief_ready_tick: u64,
}

impl FreezeMachine {
    pub fn new(config: FreezeConfig) -> Self {
        let counter = Accumulator::new(config.total_secs);
        Self {
            config,
            counter,
            modifiers: BTreeMap::new(),
            is_frozen: false,
            thaw_deadline_tick: 0,
            immune_until_tick: 0,
            paused_until_tick: 0,
            relief_ready_tick: 0,
        }
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.counter.elapsed()
    }

    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    /// Install or replace a named rate modifier. Modifiers multiply the
    /// base rate but only while below the stage cap.
    pub fn set_rate_modifier(&mut self, id: impl Into<String>, multiplier: f64) {
        self.modifiers.insert(id.into(), multiplier.max(0.0));
    }

    pub fn clear_rate_modifier(&mut self, id: &str) {
        self.modifiers.remove(id);
    }

    /// One evaluation step, covering one second of exposure.
    pub fn step(&mut self, input: FreezeInput) -> Vec<FreezeEvent> {
        if self.is_frozen {
            if input.now_tick >= self.thaw_deadline_tick {
                return self.thaw(ThawSource::Auto, input.now_tick);
            }
            // Fire keeps working on the ice; once the counter drops
            // below the terminal threshold the actor thaws early.
            if input.near_fire {
                self.counter.regress(self.config.fire_regress_per_sec);
                if !self.counter.is_terminal() {
                    return self.thaw(ThawSource::Fire, input.now_tick);
                }
            }
            return Vec::new();
        }

        if !input.in_bounds || input.exempt {
            return Vec::new();
        }
        if input.now_tick < self.paused_until_tick || input.now_tick < self.immune_until_tick {
            return Vec::new();
        }

        if input.near_fire {
            self.counter.regress(self.config.fire_regress_per_sec);
            return Vec::new();
        }

        let mut rate = self.config.rate_per_sec;
        if self.counter.elapsed() < self.config.modifier_stage_cap_secs {
            rate *= self.modifiers.values().product::<f64>();
        }
        self.counter.accumulate(rate);

        let terminal = self.config.milestones.len() as u8;
        let mut events = Vec::new();
        for ordinal in self.counter.crossed(&self.config.milestones) {
            if ordinal != terminal {
                events.push(FreezeEvent::MilestoneReached(ordinal));
            }
        }
        // Frozen entry is decided by the counter itself, not by the
        // one-shot milestone ladder, so an actor thawed back below the
        // threshold can freeze again.
        if self.counter.is_terminal() {
            self.is_frozen = true;
            self.thaw_deadline_tick =
                input.now_tick + u64::from(self.config.auto_thaw_secs) * TICKS_PER_SEC;
            tracing::debug!(elapsed = self.counter.elapsed(), "actor frozen");
            events.push(FreezeEvent::Frozen);
        }
        events
    }

    /// End the frozen state. The counter is set back (not zeroed) so a
    /// thawed actor stays near the edge, and a short immunity window
    /// prevents instant re-freezing. No-op when not frozen.
    pub fn thaw(&mut self, source: ThawSource, now_tick: u64) -> Vec<FreezeEvent> {
        if !self.is_frozen {
            return Vec::new();
        }
        self.is_frozen = false;
        let elapsed = match source {
            ThawSource::Auto => self.config.auto_thaw_elapsed_secs,
            ThawSource::Teammate => self.config.teammate_thaw_elapsed_secs,
            ThawSource::Consumable => self.config.relief_elapsed_secs,
            // A fire thaw keeps whatever the regression left.
            ThawSource::Fire => self.counter.elapsed(),
        };
        self.counter.set_elapsed(elapsed);
        self.counter.resync_milestones(&self.config.milestones);
        self.immune_until_tick = now_tick + u64::from(self.config.immunity_secs) * TICKS_PER_SEC;
        vec![FreezeEvent::Thawed(source)]
    }

    /// Use a thaw consumable. While frozen this thaws; otherwise it sets
    /// the counter back and pauses accumulation. Rejected (returns
    /// `None`) while the reuse cooldown is running.
    pub fn apply_relief(&mut self, now_tick: u64) -> Option<Vec<FreezeEvent>> {
        if now_tick < self.relief_ready_tick {
            return None;
        }
        self.relief_ready_tick =
            now_tick + u64::from(self.config.relief_cooldown_secs) * TICKS_PER_SEC;

        if self.is_frozen {
            return Some(self.thaw(ThawSource::Consumable, now_tick));
        }
        self.counter
            .set_elapsed(self.counter.elapsed().min(self.config.relief_elapsed_secs));
        self.paused_until_tick =
            now_tick + u64::from(self.config.relief_pause_secs) * TICKS_PER_SEC;
        Some(Vec::new())
    }

    /// Death/respawn: everything back to zero, including milestone
    /// tracking and the frozen state.
    pub fn reset(&mut self) {
        self.counter.reset();
        self.is_frozen = false;
        self.thaw_deadline_tick = 0;
        self.immune_until_tick = 0;
        self.paused_until_tick = 0;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn exposed(now_tick: u64) -> FreezeInput {
        FreezeInput {
            now_tick,
            in_bounds: true,
            exempt: false,
            near_fire: false,
        }
    }

    /// Run `secs` one-second steps starting at `start_tick`, collecting
    /// all events.
    fn run(machine: &mut FreezeMachine, start_tick: u64, secs: u64) -> Vec<FreezeEvent> {
        let mut events = Vec::new();
        for i in 0..secs {
            events.extend(machine.step(exposed(start_tick + i * TICKS_PER_SEC)));
        }
        events
    }

    #[test]
    fn test_milestones_fire_in_order_then_freeze() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        let events = run(&mut machine, 0, 300);
        assert_eq!(
            events,
            vec![
                FreezeEvent::MilestoneReached(1),
                FreezeEvent::MilestoneReached(2),
                FreezeEvent::Frozen,
            ]
        );
        assert!(machine.is_frozen());
        assert_eq!(machine.elapsed_secs(), 300);
    }

    #[test]
    fn test_fire_source_regresses_faster_than_accumulation() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 100);
        assert_eq!(machine.elapsed_secs(), 100);

        let near_fire = FreezeInput {
            near_fire: true,
            ..exposed(100 * TICKS_PER_SEC)
        };
        machine.step(near_fire);
        assert_eq!(machine.elapsed_secs(), 96);
    }

    #[test]
    fn test_out_of_bounds_neither_accumulates_nor_resets() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 50);
        let outside = FreezeInput {
            in_bounds: false,
            ..exposed(50 * TICKS_PER_SEC)
        };
        machine.step(outside);
        assert_eq!(machine.elapsed_secs(), 50);
    }

    #[test]
    fn test_rate_modifier_slows_accumulation_below_stage_cap() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        machine.set_rate_modifier("slow-freeze", 0.5);
        run(&mut machine, 0, 100);
        assert_eq!(machine.elapsed_secs(), 50);

        // Past the stage cap the modifier stops applying.
        machine.clear_rate_modifier("slow-freeze");
        run(&mut machine, 100 * TICKS_PER_SEC, 190);
        assert_eq!(machine.elapsed_secs(), 240);
        machine.set_rate_modifier("slow-freeze", 0.5);
        machine.step(exposed(290 * TICKS_PER_SEC));
        assert_eq!(machine.elapsed_secs(), 241);
    }

    #[test]
    fn test_auto_thaw_after_window_sets_counter_back() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 300);
        assert!(machine.is_frozen());

        // Still frozen just before the window elapses.
        let frozen_at = 299 * TICKS_PER_SEC;
        let almost = frozen_at + 59 * TICKS_PER_SEC;
        assert!(machine.step(exposed(almost)).is_empty());

        let after = frozen_at + 61 * TICKS_PER_SEC;
        assert_eq!(
            machine.step(exposed(after)),
            vec![FreezeEvent::Thawed(ThawSource::Auto)]
        );
        assert!(!machine.is_frozen());
        assert_eq!(machine.elapsed_secs(), 240);
    }

    #[test]
    fn test_teammate_thaw_sets_counter_lower_and_grants_immunity() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 300);

        let now = 300 * TICKS_PER_SEC;
        let events = machine.thaw(ThawSource::Teammate, now);
        assert_eq!(events, vec![FreezeEvent::Thawed(ThawSource::Teammate)]);
        assert_eq!(machine.elapsed_secs(), 120);

        // Immune: the next few evaluations accumulate nothing.
        machine.step(exposed(now + TICKS_PER_SEC));
        assert_eq!(machine.elapsed_secs(), 120);
        machine.step(exposed(now + 5 * TICKS_PER_SEC));
        assert_eq!(machine.elapsed_secs(), 121);
    }

    #[test]
    fn test_refreezes_after_a_teammate_thaw() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 300);
        assert!(machine.is_frozen());

        let thawed_at = 300 * TICKS_PER_SEC;
        machine.thaw(ThawSource::Teammate, thawed_at);
        assert_eq!(machine.elapsed_secs(), 120);

        // Back out in the cold: the ladder climbs again from 120 and
        // the terminal stage fires a second time.
        let resume = thawed_at + 4 * TICKS_PER_SEC;
        let events = run(&mut machine, resume, 181);
        assert!(events.contains(&FreezeEvent::MilestoneReached(1)));
        assert!(events.contains(&FreezeEvent::MilestoneReached(2)));
        assert!(events.contains(&FreezeEvent::Frozen));
        assert!(machine.is_frozen());
    }

    #[test]
    fn test_refreeze_after_auto_thaw_skips_fired_stages() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 300);

        let frozen_at = 299 * TICKS_PER_SEC;
        let after = frozen_at + 61 * TICKS_PER_SEC;
        machine.step(exposed(after));
        assert!(!machine.is_frozen());
        assert_eq!(machine.elapsed_secs(), 240);

        // From 240 only the terminal stage is ahead of the counter.
        let resume = after + 4 * TICKS_PER_SEC;
        let events = run(&mut machine, resume, 61);
        assert_eq!(events, vec![FreezeEvent::Frozen]);
        assert!(machine.is_frozen());
    }

    #[test]
    fn test_fire_near_a_frozen_actor_melts_the_ice_early() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 300);
        assert!(machine.is_frozen());

        let frozen_at = 299 * TICKS_PER_SEC;
        let near_fire = FreezeInput {
            near_fire: true,
            ..exposed(frozen_at + TICKS_PER_SEC)
        };
        let events = machine.step(near_fire);
        assert_eq!(events, vec![FreezeEvent::Thawed(ThawSource::Fire)]);
        assert!(!machine.is_frozen());
        // The counter keeps the regressed value instead of a thaw
        // set-back, so the actor sits right at the edge.
        assert_eq!(machine.elapsed_secs(), 296);
    }

    #[test]
    fn test_relief_pauses_accumulation_and_has_reuse_cooldown() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 200);

        let now = 200 * TICKS_PER_SEC;
        assert!(machine.apply_relief(now).is_some());
        assert_eq!(machine.elapsed_secs(), 180);
        // Paused: no accumulation inside the pause window.
        machine.step(exposed(now + 60 * TICKS_PER_SEC));
        assert_eq!(machine.elapsed_secs(), 180);
        // Reuse within the cooldown is rejected.
        assert!(machine.apply_relief(now + 5 * TICKS_PER_SEC).is_none());
    }

    #[test]
    fn test_thaw_when_not_frozen_is_noop() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 100);
        assert!(machine.thaw(ThawSource::Teammate, 0).is_empty());
        assert_eq!(machine.elapsed_secs(), 100);
    }

    #[test]
    fn test_reset_clears_frozen_state_and_milestones() {
        let mut machine = FreezeMachine::new(FreezeConfig::default());
        run(&mut machine, 0, 300);
        machine.reset();
        assert!(!machine.is_frozen());
        assert_eq!(machine.elapsed_secs(), 0);
        // Milestones fire again on the next climb.
        let events = run(&mut machine, 400 * TICKS_PER_SEC, 150);
        assert_eq!(events, vec![FreezeEvent::MilestoneReached(1)]);
    }
}
