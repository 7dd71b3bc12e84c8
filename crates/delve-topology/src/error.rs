//! Error types for topology resolution.
//!
//! Everything here is fatal-to-start: a scan that fails resolution never
//! constructs a session, so nothing needs rollback.

/// Errors that can occur while resolving a marker scan.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScanError {
    /// No boss-anchor marker exists anywhere in the scan. Without one
    /// there is no boss room and no boss spawn, so a run cannot start.
    #[error("no boss marker found in scan")]
    NoBossAnchor,

    /// Boss markers exist but no pair of them matches the boss-room
    /// shape, even under the relaxed horizontal-only fallback.
    #[error("boss markers present but no boss room could be resolved")]
    BossRoomUnresolved,

    /// Fewer than two entrance-corner markers were found; the boss
    /// entrance barrier cannot be registered.
    #[error("expected 2 entrance markers, found {0}")]
    MissingEntrancePair(usize),

    /// Fewer than two exit-corner markers were found.
    #[error("expected 2 exit markers, found {0}")]
    MissingExitPair(usize),
}
