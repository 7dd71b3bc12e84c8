//! The session registry: every live dungeon instance, keyed by session
//! key.
//!
//! A plain map owned by the tick loop. All mutation happens on that one
//! task, so the registry needs no locking; concurrent surfaces marshal
//! onto the loop before touching it.

use std::collections::BTreeMap;

use delve_world::{ActorId, SessionKey};
use serde::{Deserialize, Serialize};

use crate::{DungeonStatus, Session, SessionError};

/// A read-only row describing one live session, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonSummary {
    pub key: SessionKey,
    pub dungeon_type: String,
    pub leader: ActorId,
    pub party_size: usize,
    pub legendary: bool,
    pub status: DungeonStatus,
    /// Unix seconds when the session was created.
    pub created_unix: u64,
}

/// Registry of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionKey, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. The key must be free.
    pub fn insert(&mut self, session: Session) -> Result<(), SessionError> {
        if self.sessions.contains_key(&session.key) {
            return Err(SessionError::DuplicateSession(session.key.clone()));
        }
        tracing::info!(key = %session.key, instance = %session.instance, "session registered");
        self.sessions.insert(session.key.clone(), session);
        Ok(())
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut Session> {
        self.sessions.get_mut(key)
    }

    /// Remove and return a session. The caller is responsible for
    /// unwinding its world-side state first.
    pub fn remove(&mut self, key: &SessionKey) -> Result<Session, SessionError> {
        self.sessions
            .remove(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))
    }

    /// The session the actor belongs to, if any. Rosters are small and
    /// disjoint, so a linear scan is fine.
    pub fn session_of(&self, actor: ActorId) -> Option<&Session> {
        self.sessions.values().find(|s| s.is_member(actor))
    }

    pub fn session_of_mut(&mut self, actor: ActorId) -> Option<&mut Session> {
        self.sessions.values_mut().find(|s| s.is_member(actor))
    }

    /// Mutable iteration for the tick loop.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// A snapshot of the registered keys, for drive loops that mutate
    /// the registry while iterating.
    pub fn keys(&self) -> Vec<SessionKey> {
        self.sessions.keys().cloned().collect()
    }

    /// Summaries of every non-ended session, oldest first.
    pub fn list_active(&self) -> Vec<DungeonSummary> {
        let mut rows: Vec<_> = self
            .sessions
            .values()
            .filter(|s| !s.is_ended())
            .map(|s| DungeonSummary {
                key: s.key.clone(),
                dungeon_type: s.dungeon_type.clone(),
                leader: s.leader,
                party_size: s.players.len(),
                legendary: s.legendary,
                status: s.status,
                created_unix: s.created_unix,
            })
            .collect();
        rows.sort_by_key(|r| r.created_unix);
        rows
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use delve_encounter::BossMachine;
    use delve_hazard::{FreezeConfig, HeatConfig};
    use delve_topology::{ResolvedRoom, RoomKind, Topology};
    use delve_world::{CellPos, InstanceId, Volume};

    use super::*;
    use crate::RoomRuntime;

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn aid(id: u64) -> ActorId {
        ActorId(id)
    }

    fn one_room_topology() -> Topology {
        let volume = Volume::new(CellPos::new(0, 60, 0), CellPos::new(46, 74, 38));
        Topology {
            rooms: vec![ResolvedRoom {
                volume,
                kind: RoomKind::Boss,
                doors: Vec::new(),
            }],
            boss_room: 0,
            boss_anchor: CellPos::new(23, 61, 19),
            entrance_pair: (CellPos::new(0, 61, 10), CellPos::new(0, 66, 14)),
            exit_pair: (CellPos::new(46, 61, 10), CellPos::new(46, 66, 14)),
        }
    }

    fn session(key: &str, players: Vec<ActorId>) -> Session {
        let topology = one_room_topology();
        let rooms = topology
            .rooms
            .iter()
            .map(|r| RoomRuntime::new(r.clone(), None, Vec::new()))
            .collect();
        let boss = BossMachine::new(
            *topology.boss_room_volume(),
            topology.boss_anchor,
            Vec::new(),
            false,
        );
        let leader = players[0];
        Session::new(
            SessionKey(key.to_string()),
            InstanceId(1),
            "frost_keep".to_string(),
            leader,
            players,
            topology,
            rooms,
            CellPos::new(2, 61, 2),
            false,
            0,
            boss,
            &FreezeConfig::default(),
            &HeatConfig::default(),
        )
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    #[test]
    fn test_insert_and_get_session() {
        let mut registry = SessionRegistry::new();
        registry.insert(session("frost-1", vec![aid(1)])).unwrap();

        assert_eq!(registry.len(), 1);
        let found = registry.get(&SessionKey("frost-1".into())).unwrap();
        assert_eq!(found.leader, aid(1));
        assert_eq!(found.lives, 1);
    }

    #[test]
    fn test_insert_duplicate_key_rejected() {
        let mut registry = SessionRegistry::new();
        registry.insert(session("frost-1", vec![aid(1)])).unwrap();

        let err = registry
            .insert(session("frost-1", vec![aid(2)]))
            .unwrap_err();
        assert_eq!(err, SessionError::DuplicateSession(SessionKey("frost-1".into())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_missing_session_errors() {
        let mut registry = SessionRegistry::new();
        let err = registry.remove(&SessionKey("ghost".into())).unwrap_err();
        assert_eq!(err, SessionError::NotFound(SessionKey("ghost".into())));
    }

    #[test]
    fn test_remove_returns_the_session() {
        let mut registry = SessionRegistry::new();
        registry.insert(session("frost-1", vec![aid(1), aid(2)])).unwrap();

        let removed = registry.remove(&SessionKey("frost-1".into())).unwrap();
        assert_eq!(removed.players, vec![aid(1), aid(2)]);
        assert!(registry.is_empty());
    }

    // ---------------------------------------------------------------------
    // Lookup by actor
    // ---------------------------------------------------------------------

    #[test]
    fn test_session_of_finds_membership() {
        let mut registry = SessionRegistry::new();
        registry.insert(session("frost-1", vec![aid(1), aid(2)])).unwrap();
        registry.insert(session("frost-2", vec![aid(3)])).unwrap();

        assert_eq!(
            registry.session_of(aid(2)).map(|s| s.key.clone()),
            Some(SessionKey("frost-1".into()))
        );
        assert_eq!(
            registry.session_of(aid(3)).map(|s| s.key.clone()),
            Some(SessionKey("frost-2".into()))
        );
        assert!(registry.session_of(aid(9)).is_none());
    }

    // ---------------------------------------------------------------------
    // Listings
    // ---------------------------------------------------------------------

    #[test]
    fn test_list_active_excludes_ended() {
        let mut registry = SessionRegistry::new();
        registry.insert(session("frost-1", vec![aid(1)])).unwrap();
        registry.insert(session("frost-2", vec![aid(2), aid(3)])).unwrap();

        registry
            .get_mut(&SessionKey("frost-1".into()))
            .unwrap()
            .status = DungeonStatus::Ended;

        let rows = registry.list_active();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, SessionKey("frost-2".into()));
        assert_eq!(rows[0].party_size, 2);
    }
}
