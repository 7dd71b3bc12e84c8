//! Error types for session lifecycle and player interactions.

use delve_world::{ActorId, SessionKey};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// Exactly one session exists per dungeon name at a time.
    #[error("a session already exists for dungeon '{0}'")]
    DuplicateSession(SessionKey),

    #[error("no session exists for dungeon '{0}'")]
    NotFound(SessionKey),

    #[error("{actor} is not a member of session '{key}'")]
    NotAMember { key: SessionKey, actor: ActorId },

    /// The ready vote only runs during the post-boss ready phase.
    #[error("session is not in the ready phase")]
    NotInReadyPhase,

    /// Per-player debounce on ready votes.
    #[error("ready vote debounced, try again shortly")]
    VoteCooldown,

    #[error("{0} already voted ready")]
    AlreadyVoted(ActorId),

    /// Quorum was already reached; late votes are rejected, never
    /// reprocessed.
    #[error("ready quorum already reached")]
    QuorumAlreadyReached,
}
