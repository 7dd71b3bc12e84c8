//! The deferred-action list.
//!
//! A flat `Vec` ordered by insertion. Draining filters by environment and
//! due tick, preserving insertion order within the batch; an action that
//! schedules further actions only ever affects future ticks, so the drain
//! loop never observes its own additions.

use std::fmt;

use delve_world::SessionKey;

/// Identifies one host environment (one tickable world instance).
///
/// Sessions in different environments never share a drain batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub u64);

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env-{}", self.0)
    }
}

/// One pending entry. `T` is the action payload: the runtime uses a
/// command enum carrying only ids; tests use whatever is convenient.
#[derive(Debug, Clone)]
pub struct ScheduledEntry<T> {
    pub env: EnvId,
    pub due_tick: u64,
    pub owner: SessionKey,
    pub action: T,
    /// Insertion sequence, used to keep drain order stable.
    seq: u64,
}

/// Tick-scoped deferred-action scheduler.
///
/// One instance serves every environment and session; ownership tagging
/// makes per-session cancellation a single retain pass.
#[derive(Debug)]
pub struct ActionScheduler<T> {
    entries: Vec<ScheduledEntry<T>>,
    next_seq: u64,
}

impl<T> Default for ActionScheduler<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T> ActionScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an action to run on the first drain at or after `due_tick`.
    pub fn schedule_at(&mut self, env: EnvId, due_tick: u64, owner: SessionKey, action: T) {
        self.next_seq += 1;
        self.entries.push(ScheduledEntry {
            env,
            due_tick,
            owner,
            action,
            seq: self.next_seq,
        });
    }

    /// Schedule an action `delay` ticks from `now`. A zero delay fires on
    /// the *next* drain, never synchronously inside the current one.
    pub fn schedule_in(
        &mut self,
        env: EnvId,
        now: u64,
        delay: u64,
        owner: SessionKey,
        action: T,
    ) {
        self.schedule_at(env, now + delay.max(1), owner, action);
    }

    /// Remove and return every entry for `env` that is due at `tick`,
    /// in insertion order.
    pub fn drain_due(&mut self, env: EnvId, tick: u64) -> Vec<ScheduledEntry<T>> {
        let mut due = Vec::new();
        let mut remaining = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.env == env && entry.due_tick <= tick {
                due.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        self.entries = remaining;
        // Insertion order within the batch; drain already preserves it,
        // but the sort keeps the guarantee explicit if callers merge.
        due.sort_by_key(|e| e.seq);
        due
    }

    /// Cancel every pending entry owned by the session. Returns how many
    /// were removed. Called unconditionally when a session ends so no
    /// stale action can fire against a destroyed session.
    pub fn cancel_owner(&mut self, owner: &SessionKey) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| &e.owner != owner);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(session = %owner, removed, "cancelled scheduled actions");
        }
        removed
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn pending_for(&self, owner: &SessionKey) -> usize {
        self.entries.iter().filter(|e| &e.owner == owner).count()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> SessionKey {
        SessionKey::new(name)
    }

    const ENV: EnvId = EnvId(1);

    #[test]
    fn test_drain_due_returns_due_entries_in_insertion_order() {
        let mut s = ActionScheduler::new();
        s.schedule_at(ENV, 10, key("a"), "first");
        s.schedule_at(ENV, 5, key("a"), "second");
        s.schedule_at(ENV, 20, key("a"), "later");

        let due = s.drain_due(ENV, 10);
        let actions: Vec<_> = due.iter().map(|e| e.action).collect();
        // Both due; insertion order, not due-tick order.
        assert_eq!(actions, vec!["first", "second"]);
        assert_eq!(s.pending(), 1);
    }

    #[test]
    fn test_drain_due_ignores_other_environments() {
        let mut s = ActionScheduler::new();
        s.schedule_at(EnvId(1), 1, key("a"), "mine");
        s.schedule_at(EnvId(2), 1, key("a"), "theirs");

        let due = s.drain_due(EnvId(1), 5);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].action, "mine");
        assert_eq!(s.pending(), 1);
    }

    #[test]
    fn test_schedule_in_zero_delay_fires_next_tick_not_current() {
        let mut s = ActionScheduler::new();
        s.schedule_in(ENV, 100, 0, key("a"), "soon");
        assert!(s.drain_due(ENV, 100).is_empty());
        assert_eq!(s.drain_due(ENV, 101).len(), 1);
    }

    #[test]
    fn test_cancel_owner_removes_only_that_session() {
        let mut s = ActionScheduler::new();
        s.schedule_at(ENV, 10, key("doomed"), 1);
        s.schedule_at(ENV, 11, key("doomed"), 2);
        s.schedule_at(ENV, 12, key("other"), 3);

        assert_eq!(s.cancel_owner(&key("doomed")), 2);
        assert_eq!(s.pending(), 1);
        assert_eq!(s.pending_for(&key("other")), 1);
        // Cancelling again is a no-op.
        assert_eq!(s.cancel_owner(&key("doomed")), 0);
    }

    #[test]
    fn test_drained_entries_are_gone() {
        let mut s = ActionScheduler::new();
        s.schedule_at(ENV, 1, key("a"), ());
        assert_eq!(s.drain_due(ENV, 1).len(), 1);
        assert!(s.drain_due(ENV, 1).is_empty());
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn test_actions_scheduling_actions_affect_future_drains_only() {
        // Simulates the interpreter pattern: a drained action enqueues a
        // follow-up; the follow-up must not appear in the same batch.
        let mut s: ActionScheduler<&str> = ActionScheduler::new();
        s.schedule_at(ENV, 10, key("a"), "root");

        let batch = s.drain_due(ENV, 10);
        assert_eq!(batch.len(), 1);
        for entry in batch {
            if entry.action == "root" {
                s.schedule_in(ENV, 10, 0, key("a"), "child");
            }
        }
        assert!(s.drain_due(ENV, 10).is_empty());
        assert_eq!(s.drain_due(ENV, 11).len(), 1);
    }
}
