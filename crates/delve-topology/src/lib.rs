//! Topology resolution for Delve.
//!
//! A dungeon is authored by placing labeled marker cells in the
//! environment: two same-label markers at opposite corners define a room,
//! paired `door` markers define passage volumes, and `boss` markers
//! define the boss room and its anchor. This crate turns the raw scan
//! (label → positions) into the resolved, deduplicated room/door set a
//! session is built from.
//!
//! Resolution is **deterministic**: identical scans always produce the
//! identical room list, door list, and boss-anchor choice (the anchor
//! tie-break is nearest-center, then lowest y, then a stable coordinate
//! hash). It is also **fatal on ambiguity that matters**: no boss marker
//! anywhere means no run can start, reported as a [`ScanError`] rather
//! than retried.

mod error;
mod resolve;
mod scan;

pub use error::ScanError;
pub use resolve::{resolve_topology, ResolvedRoom, RoomKind, Topology};
pub use scan::{labels, MarkerScan, TopologyConfig};
