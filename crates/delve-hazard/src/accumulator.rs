//! The shared elapsed-seconds counter under both hazards.

use serde::{Deserialize, Serialize};

/// A clamped monotonic seconds counter with sub-second carry and
/// forward-only milestone tracking.
///
/// `elapsed` is always in `[0, total]` by construction: accumulation
/// saturates at the total and regression saturates at zero. Fractional
/// accumulation (a rate-modified step can add e.g. 0.5 s) is carried in
/// `remainder` until a whole second is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    total: u32,
    elapsed: u32,
    remainder: f64,
    /// Ordinal of the highest milestone already fired (0 = none).
    last_milestone: u8,
}

impl Accumulator {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            elapsed: 0,
            remainder: 0.0,
            last_milestone: 0,
        }
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_terminal(&self) -> bool {
        self.elapsed >= self.total
    }

    /// Add fractional seconds, carrying the sub-second part.
    pub fn accumulate(&mut self, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        self.remainder += amount;
        let whole = self.remainder.floor();
        self.remainder -= whole;
        self.elapsed = self
            .elapsed
            .saturating_add(whole as u32)
            .min(self.total);
        if self.elapsed == self.total {
            self.remainder = 0.0;
        }
    }

    /// Subtract whole seconds, dropping any carry.
    pub fn regress(&mut self, secs: u32) {
        self.elapsed = self.elapsed.saturating_sub(secs);
        self.remainder = 0.0;
    }

    /// Force the counter to an exact value (thaw/relief set-backs).
    /// Does not rewind milestone tracking: milestones are forward-only.
    pub fn set_elapsed(&mut self, secs: u32) {
        self.elapsed = secs.min(self.total);
        self.remainder = 0.0;
    }

    /// Re-derive milestone tracking from the current elapsed value so
    /// every stage above it can fire again. Called on thaw set-backs,
    /// where the climb back toward the terminal stage must be live;
    /// plain regression stays forward-only.
    pub fn resync_milestones(&mut self, milestones: &[u32]) {
        self.last_milestone = milestones
            .iter()
            .filter(|&&threshold| self.elapsed >= threshold)
            .count() as u8;
    }

    /// Ordinals (1-based) of milestones newly crossed since the last
    /// call, in order. Re-entering an already-fired stage after a
    /// regression never re-fires it.
    pub fn crossed(&mut self, milestones: &[u32]) -> Vec<u8> {
        let mut fired = Vec::new();
        for (i, &threshold) in milestones.iter().enumerate() {
            let ordinal = (i + 1) as u8;
            if ordinal > self.last_milestone && self.elapsed >= threshold {
                self.last_milestone = ordinal;
                fired.push(ordinal);
            }
        }
        fired
    }

    /// Full reset: zero counter, zero carry, milestone tracking cleared.
    pub fn reset(&mut self) {
        self.elapsed = 0;
        self.remainder = 0.0;
        self.last_milestone = 0;
    }
}
