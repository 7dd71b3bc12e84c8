//! Session lifecycle for Delve: the per-run aggregate and the registry
//! of live runs.
//!
//! This crate owns *state*, not *policy*: a [`Session`] bundles the
//! resolved topology, room runtimes, encounter machines, and per-actor
//! hazards for one dungeon run, and [`SessionRegistry`] maps session
//! keys to live sessions. The tick loop that drives those machines and
//! translates their signals into world effects lives a layer up.

mod actions;
mod error;
mod ready;
mod registry;
mod session;

pub use actions::{run_room_action, RoomAction};
pub use error::SessionError;
pub use ready::ReadyVote;
pub use registry::{DungeonSummary, SessionRegistry};
pub use session::{lives_for_party, DungeonStatus, RoomRuntime, Session};
