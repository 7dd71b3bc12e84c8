//! Unified error type for the Delve runtime.

use delve_barrier::BarrierError;
use delve_session::SessionError;
use delve_topology::ScanError;
use delve_world::ActorId;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `delve` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DelveError {
    /// A topology scan error (missing boss markers, malformed rooms).
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A barrier error (plane planning, lock/unlock).
    #[error(transparent)]
    Barrier(#[from] BarrierError),

    /// A session-level error (duplicate, membership, ready vote).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A player surface was invoked by someone in no session.
    #[error("{0} is not in any dungeon session")]
    NoSessionForActor(ActorId),
}
