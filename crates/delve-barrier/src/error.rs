//! Error types for barrier registration and mutation.

use delve_world::{DoorKind, SessionKey};

/// Errors that can occur while registering or toggling barriers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BarrierError {
    /// No marker pairing formed a valid barrier plane for the room.
    #[error("no valid barrier plane among {markers} markers for room {room}")]
    NoCandidatePlane { room: usize, markers: usize },

    /// A valid plane exists but fails the strict width/height check.
    #[error("barrier plane is {width}x{height}, expected {expected_width}x{expected_height}")]
    SizeMismatch {
        width: i32,
        height: i32,
        expected_width: i32,
        expected_height: i32,
    },

    /// Lock/unlock addressed a key that was never registered.
    #[error("no barrier registered for {session} room {room} {door}")]
    Unregistered {
        session: SessionKey,
        room: usize,
        door: DoorKind,
    },

    /// The gate actor is gone; no further mutation is possible.
    #[error("barrier gate is closed")]
    GateClosed,
}
