//! Encounter machines for Delve: raid waves, the boss phase, and the
//! secret-room escalation.
//!
//! Each machine owns its own state and queries the world directly, but
//! anything that must happen on a future tick (staggered spawns, door
//! seals, cache rebuilds) is returned as a signal for the session layer
//! to schedule. Machines never hold a scheduler, and scheduled work
//! carries only plain data.

mod boss;
mod config;
mod difficulty;
mod raid;
mod secret;

pub use boss::{BossMachine, BossSignal};
pub use config::EncounterConfig;
pub use difficulty::{
    select_difficulty, CapCounters, DifficultyRoster, DifficultyTier, DifficultyWeights,
};
pub use raid::{RaidMachine, RaidPhase, RaidSignal};
pub use secret::{
    CaptureOutcome, GuiCloseAction, SecretConfig, SecretMachine, SecretPhase, SecretRoomPlan,
};
