//! Error types for the world layer.

use crate::{ActorId, Volume};

/// Errors that can occur at the host-world seam.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A mutation was attempted against a region that is not resident
    /// and could not be forced resident.
    #[error("region {0} is not loaded")]
    RegionNotLoaded(Volume),

    /// An operation referenced an actor the host does not know.
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),
}
