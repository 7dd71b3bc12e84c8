//! Ready-quorum voting for the post-boss progression gate.

use std::collections::{BTreeMap, BTreeSet};

use delve_world::ActorId;

use crate::SessionError;

/// Vote tally for one ready phase.
///
/// The quota is a snapshot taken when the phase opens; members joining
/// or leaving afterwards do not move the bar. Votes never exceed the
/// quota: once it is reached, further calls are rejected rather than
/// reprocessed, so the quorum fires exactly once.
#[derive(Debug, Clone)]
pub struct ReadyVote {
    quota: usize,
    votes: BTreeSet<ActorId>,
    /// Per-actor tick until which another attempt is debounced.
    attempt_until: BTreeMap<ActorId, u64>,
    cooldown_ticks: u64,
}

impl ReadyVote {
    pub fn new(quota: usize, cooldown_ticks: u64) -> Self {
        Self {
            quota: quota.max(1),
            votes: BTreeSet::new(),
            attempt_until: BTreeMap::new(),
            cooldown_ticks,
        }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    pub fn votes(&self) -> usize {
        self.votes.len()
    }

    /// Record a vote. `Ok(true)` exactly once, on the vote that
    /// completes the quorum.
    pub fn try_vote(&mut self, actor: ActorId, now: u64) -> Result<bool, SessionError> {
        if self.votes.len() >= self.quota {
            return Err(SessionError::QuorumAlreadyReached);
        }
        if self.attempt_until.get(&actor).is_some_and(|&until| now < until) {
            return Err(SessionError::VoteCooldown);
        }
        self.attempt_until.insert(actor, now + self.cooldown_ticks);
        if !self.votes.insert(actor) {
            return Err(SessionError::AlreadyVoted(actor));
        }
        Ok(self.votes.len() >= self.quota)
    }
}
