//! # Delve
//!
//! Instanced dungeon encounter runtime.
//!
//! Delve drives party-scoped dungeon runs inside a host game world:
//! marker-scanned room topology, reversible door barriers, wave raids,
//! a boss phase with a ready-vote progression gate, freeze/heat
//! hazards, and a legendary secret-room escalation. The host implements
//! one [`World`](delve_world::World) trait and calls
//! [`DungeonRuntime::on_tick`] from its tick source (or runs the
//! bundled [`delve_schedule::TickDriver`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use delve::prelude::*;
//!
//! let mut world = MemoryWorld::new();
//! let mut runtime = DungeonRuntime::new(EnvId(1), GameplayConfig::default());
//! // runtime.start_session(&mut world, request)?;
//! loop {
//!     world.advance(1);
//!     runtime.on_tick(&mut world);
//! }
//! ```

mod config;
mod deferred;
mod error;
mod runtime;

pub use config::GameplayConfig;
pub use deferred::DeferredAction;
pub use error::DelveError;
pub use runtime::{DungeonRuntime, InteractOutcome, StartRequest};

/// The commonly used surface, for embedders.
pub mod prelude {
    pub use delve_schedule::{EnvId, TickDriver, TickDriverConfig};
    pub use delve_session::{DungeonStatus, DungeonSummary, RoomAction};
    pub use delve_topology::{labels, MarkerScan};
    pub use delve_world::{ActorId, CellPos, MemoryWorld, SessionKey, Volume, World};

    pub use crate::{
        DelveError, DungeonRuntime, GameplayConfig, InteractOutcome, StartRequest,
    };
}
