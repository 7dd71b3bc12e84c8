//! Deferred-action scheduling for Delve.
//!
//! Two pieces live here:
//!
//! - [`ActionScheduler`]: the dungeon core's "do this later" list. Every
//!   delayed behavior in a run (door closures, staggered wave spawns,
//!   participant teleports, cache refreshes) is an entry of
//!   `(environment, due tick, owner session, action)`. Entries for an
//!   environment drain in insertion order once due, and ending a session
//!   bulk-cancels everything it owns.
//! - [`TickDriver`]: an async fixed-rate loop for hosts that do not have
//!   their own tick source. Embedders with a native tick (a game server)
//!   skip it and call the runtime's tick entry point directly.
//!
//! Actions are plain data, not captured references: an entry carries only
//! ids, and the interpreter re-resolves the live session at execution
//! time. A session that ended (or was replaced) between scheduling and
//! firing turns its pending actions into silent no-ops.

mod driver;
mod scheduler;

pub use driver::{TickDriver, TickDriverConfig, TickInfo, TickMetrics, TickPolicy};
pub use scheduler::{ActionScheduler, EnvId, ScheduledEntry};
