//! Spatial primitives and the host-world abstraction for Delve.
//!
//! This crate defines the vocabulary every other Delve crate speaks:
//!
//! - **Identity** ([`ActorId`], [`EntityId`], [`SessionKey`], [`InstanceId`]):
//!   newtype wrappers so a unit id can never be passed where a player id
//!   is expected.
//! - **Geometry** ([`CellPos`], [`Volume`]): axis-aligned integer cells
//!   and rectangular volumes. Every room, door, and scan region is one
//!   of these.
//! - **Materials** ([`MaterialId`]): the identifier for what occupies a
//!   cell. The barrier controller swaps these in and out.
//! - **The [`World`] trait**: the single seam between Delve and the host
//!   environment (material read/write, region residency, actor and unit
//!   queries, presentation effects).
//! - **[`MemoryWorld`]**: a deterministic in-memory `World` used by the
//!   test suites and by embedders that want a reference implementation.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session / Encounter / Barrier (above)  ← mutate and query through `World`
//!     ↕
//! World Layer (this crate)  ← ids, geometry, the host seam
//!     ↕
//! Host environment (below)  ← the actual game server or a MemoryWorld
//! ```

mod error;
mod mem;
mod types;
mod world;

pub use error::WorldError;
pub use mem::{MemoryWorld, WorldEvent};
pub use types::{
    ActorId, CellPos, DoorKind, EntityId, InstanceId, MaterialId, SessionKey,
    Volume,
};
pub use world::{
    CaptureOffer, ItemKind, SourceKind, StatusEffect, StatusKind, UnitSpawn,
    UnitTag, World,
};
