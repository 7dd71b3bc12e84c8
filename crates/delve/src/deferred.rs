//! Deferred-action payloads for the scheduler.
//!
//! Entries carry only plain data and ids. The interpreter re-resolves
//! the owning session at execution time, so an action whose session
//! ended between scheduling and firing is a silent no-op.

use delve_world::{ActorId, CellPos, UnitSpawn};

/// One unit of work scheduled for a later tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredAction {
    /// Move a party member (gather pulls, the start-of-run entry).
    Teleport { actor: ActorId, to: CellPos },
    /// Spawn one staggered raid-wave unit and register it with the
    /// room's raid machine.
    SpawnRaidUnit { room: usize, spawn: UnitSpawn },
    /// Spawn one boss add. Adds are found by room scan, not tracked.
    SpawnBossAdd { spawn: UnitSpawn },
    /// Rebuild a room's tracked-unit cache after a wave has landed.
    RefreshRaidCache { room: usize },
    /// Lock every registered door of the session (boss lockdown).
    SealAllDoors,
    /// Unlock one room's passage doors.
    OpenRoomDoors { room: usize },
}
