//! Environmental hazard accumulators for Delve.
//!
//! Freeze and heat are pure per-actor counter machines: the session
//! layer feeds each one an observation per second (inside bounds? near a
//! counteracting source?) and applies the returned events to the world.
//! Nothing in this crate touches the environment, which keeps every
//! milestone, thaw, and relief path unit-testable in isolation.
//!
//! Both counters are clamped to `[0, total]` by construction, and
//! milestones are forward-only: regressing below a fired stage and
//! climbing back never re-announces it.

mod accumulator;
mod freeze;
mod heat;

pub use accumulator::Accumulator;
pub use freeze::{FreezeConfig, FreezeEvent, FreezeInput, FreezeMachine, ThawSource};
pub use heat::{HeatConfig, HeatEvent, HeatInput, HeatMachine};

/// Simulation ticks per second. Hazards are evaluated once per second,
/// with deadlines tracked in ticks.
pub const TICKS_PER_SEC: u64 = 20;
