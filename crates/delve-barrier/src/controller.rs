//! The barrier controller: registrations keyed by session/room/door and
//! the lock/unlock mutation passes.
//!
//! Restoration is exact. Locking records the prior material of every
//! cell it overwrites; unlocking puts those materials back and sweeps
//! any leftover barrier residue to air. The controller never mutates a
//! cell it could not later restore.

use std::collections::BTreeMap;

use delve_world::{MaterialId, SessionKey, Volume, World};

use crate::{
    materials, plan_barrier, BarrierConfig, BarrierError, BarrierKey, BarrierPlane, BarrierState,
};

/// One registered barrier and its restoration ledger.
#[derive(Debug, Clone)]
pub struct Registration {
    pub plane: BarrierPlane,
    pub material: MaterialId,
    pub state: BarrierState,
    /// Cell → material recorded at lock time. Empty whenever the state
    /// is [`BarrierState::Unlocked`].
    changed: BTreeMap<delve_world::CellPos, MaterialId>,
}

impl Registration {
    pub fn changed_cells(&self) -> usize {
        self.changed.len()
    }
}

/// The barrier registry for one runtime, owned by the runtime context.
#[derive(Debug, Default)]
pub struct BarrierController {
    registrations: BTreeMap<BarrierKey, Registration>,
}

impl BarrierController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a door's barrier plane from its marker set. Replaces any
    /// prior registration under the same key.
    pub fn register(
        &mut self,
        key: BarrierKey,
        room: &Volume,
        markers: &[delve_world::CellPos],
        config: &BarrierConfig,
    ) -> Result<(), BarrierError> {
        let plane = plan_barrier(room, markers, key.room, config)?;
        tracing::debug!(
            %key,
            cells = plane.interior.len(),
            "barrier registered"
        );
        self.registrations.insert(
            key,
            Registration {
                plane,
                material: config.material.clone(),
                state: BarrierState::Unlocked,
                changed: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn state(&self, key: &BarrierKey) -> Option<BarrierState> {
        self.registrations.get(key).map(|r| r.state)
    }

    pub fn keys_for(&self, session: &SessionKey) -> Vec<BarrierKey> {
        self.registrations
            .keys()
            .filter(|k| &k.session == session)
            .cloned()
            .collect()
    }

    /// Fill the barrier's interior with its material.
    ///
    /// Per cell: already the barrier material is skipped; a protected
    /// fixture or anything carrying auxiliary state is denied (counted,
    /// never overwritten); a replaceable cell has its prior material
    /// recorded and is overwritten. Anything else is left alone. Returns
    /// whether any cell changed.
    pub fn lock(&mut self, world: &mut dyn World, key: &BarrierKey) -> Result<bool, BarrierError> {
        let registration = self
            .registrations
            .get_mut(key)
            .ok_or_else(|| unregistered(key))?;

        ensure_resident(world, &registration.plane.bounds);

        let mut changed = false;
        let mut denied = 0usize;
        for &cell in &registration.plane.interior {
            let current = world.material_at(cell);
            if current == registration.material {
                continue;
            }
            if materials::is_protected(&current) || world.has_aux_state(cell) {
                denied += 1;
                continue;
            }
            if !materials::is_replaceable(&current) {
                continue;
            }
            if world.set_material(cell, registration.material.clone()) {
                registration.changed.insert(cell, current);
                changed = true;
            }
        }

        registration.state = BarrierState::Locked;
        if denied > 0 {
            tracing::warn!(%key, denied, "barrier lock denied protected cells");
        }
        tracing::debug!(%key, recorded = registration.changed.len(), "barrier locked");
        Ok(changed)
    }

    /// Restore everything the lock changed.
    ///
    /// Every recorded `(cell, prior)` pair is put back when the live
    /// cell still differs from it. If the door had been locked, any
    /// interior cell still holding the barrier material is then swept to
    /// air (cells skipped at lock time because they already matched, and
    /// any residue). The ledger is cleared and the state flips to
    /// unlocked unconditionally. Returns whether anything was restored.
    pub fn unlock(
        &mut self,
        world: &mut dyn World,
        key: &BarrierKey,
    ) -> Result<bool, BarrierError> {
        let registration = self
            .registrations
            .get_mut(key)
            .ok_or_else(|| unregistered(key))?;

        ensure_resident(world, &registration.plane.bounds);

        let was_locked = registration.state == BarrierState::Locked;
        let mut restored = false;

        for (&cell, prior) in &registration.changed {
            if world.material_at(cell) != *prior {
                world.set_material(cell, prior.clone());
                restored = true;
            }
        }

        if was_locked {
            for &cell in &registration.plane.interior {
                if world.material_at(cell) == registration.material {
                    world.set_material(cell, MaterialId::air());
                    restored = true;
                }
            }
        }

        registration.changed.clear();
        registration.state = BarrierState::Unlocked;
        tracing::debug!(%key, restored, "barrier unlocked");
        Ok(restored)
    }

    /// Lock every barrier belonging to the session.
    pub fn lock_all(
        &mut self,
        world: &mut dyn World,
        session: &SessionKey,
    ) -> Result<usize, BarrierError> {
        let mut locked = 0;
        for key in self.keys_for(session) {
            if self.lock(world, &key)? {
                locked += 1;
            }
        }
        Ok(locked)
    }

    /// Unlock every barrier belonging to the session.
    pub fn unlock_all(
        &mut self,
        world: &mut dyn World,
        session: &SessionKey,
    ) -> Result<usize, BarrierError> {
        let mut restored = 0;
        for key in self.keys_for(session) {
            if self.unlock(world, &key)? {
                restored += 1;
            }
        }
        Ok(restored)
    }

    /// Unlock and drop every registration owned by the session. Called
    /// on session end so no ledger outlives its run.
    pub fn remove_session(
        &mut self,
        world: &mut dyn World,
        session: &SessionKey,
    ) -> Result<(), BarrierError> {
        self.unlock_all(world, session)?;
        self.registrations.retain(|k, _| &k.session != session);
        Ok(())
    }

    pub fn registration(&self, key: &BarrierKey) -> Option<&Registration> {
        self.registrations.get(key)
    }
}

fn unregistered(key: &BarrierKey) -> BarrierError {
    BarrierError::Unregistered {
        session: key.session.clone(),
        room: key.room,
        door: key.door,
    }
}

/// Mutation against an unloaded region is undefined; force residency
/// before touching anything.
fn ensure_resident(world: &mut dyn World, bounds: &Volume) {
    if !world.is_region_loaded(bounds) {
        tracing::debug!(%bounds, "forcing region resident for barrier mutation");
        world.force_load_region(bounds);
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use delve_world::{CellPos, DoorKind, MemoryWorld};

    use super::*;

    fn key() -> BarrierKey {
        BarrierKey {
            session: SessionKey::from("alpine"),
            room: 0,
            door: DoorKind::Entrance,
        }
    }

    fn room() -> Volume {
        Volume::new(CellPos::new(0, 70, 0), CellPos::new(24, 76, 24))
    }

    fn markers() -> [CellPos; 2] {
        [CellPos::new(0, 70, 10), CellPos::new(0, 75, 14)]
    }

    fn registered() -> (BarrierController, MemoryWorld) {
        let mut controller = BarrierController::new();
        controller
            .register(key(), &room(), &markers(), &BarrierConfig::default())
            .unwrap();
        (controller, MemoryWorld::new())
    }

    // =====================================================================
    // Lock
    // =====================================================================

    #[test]
    fn test_lock_fills_interior_and_records_priors() {
        let (mut controller, mut world) = registered();
        assert!(controller.lock(&mut world, &key()).unwrap());

        let registration = controller.registration(&key()).unwrap();
        assert_eq!(registration.state, BarrierState::Locked);
        assert_eq!(registration.changed_cells(), 28);
        let barrier = MaterialId::new("iron_bars");
        assert_eq!(world.material_at(CellPos::new(0, 72, 12)), barrier);
    }

    #[test]
    fn test_lock_skips_cells_already_barrier_material() {
        let (mut controller, mut world) = registered();
        world.place(CellPos::new(0, 72, 12), MaterialId::new("iron_bars"));

        controller.lock(&mut world, &key()).unwrap();
        // The pre-matching cell is not in the ledger.
        assert_eq!(controller.registration(&key()).unwrap().changed_cells(), 27);
    }

    #[test]
    fn test_lock_denies_protected_and_aux_cells() {
        let (mut controller, mut world) = registered();
        world.place(CellPos::new(0, 71, 11), MaterialId::new("chest"));
        world.place(CellPos::new(0, 71, 12), MaterialId::new("water"));
        world.set_aux(CellPos::new(0, 71, 12), true);

        controller.lock(&mut world, &key()).unwrap();
        assert_eq!(world.material_at(CellPos::new(0, 71, 11)), MaterialId::new("chest"));
        assert_eq!(world.material_at(CellPos::new(0, 71, 12)), MaterialId::new("water"));
    }

    #[test]
    fn test_lock_leaves_ordinary_solids_alone() {
        let (mut controller, mut world) = registered();
        world.place(CellPos::new(0, 73, 13), MaterialId::new("stone"));

        controller.lock(&mut world, &key()).unwrap();
        assert_eq!(world.material_at(CellPos::new(0, 73, 13)), MaterialId::new("stone"));
    }

    #[test]
    fn test_lock_forces_unloaded_region_resident() {
        let (mut controller, mut world) = registered();
        world.mark_unloaded(Volume::new(CellPos::new(0, 70, 10), CellPos::new(0, 75, 14)));

        assert!(controller.lock(&mut world, &key()).unwrap());
    }

    // =====================================================================
    // Unlock
    // =====================================================================

    #[test]
    fn test_lock_then_unlock_restores_every_cell() {
        let (mut controller, mut world) = registered();
        world.place(CellPos::new(0, 71, 11), MaterialId::new("water"));

        controller.lock(&mut world, &key()).unwrap();
        assert!(controller.unlock(&mut world, &key()).unwrap());

        assert_eq!(world.material_at(CellPos::new(0, 71, 11)), MaterialId::new("water"));
        assert!(world.material_at(CellPos::new(0, 72, 12)).is_air());
        let registration = controller.registration(&key()).unwrap();
        assert_eq!(registration.state, BarrierState::Unlocked);
        assert_eq!(registration.changed_cells(), 0);
    }

    #[test]
    fn test_unlock_sweeps_residue_of_prematched_cells() {
        let (mut controller, mut world) = registered();
        // Already barrier material at lock time: skipped, not recorded.
        world.place(CellPos::new(0, 72, 12), MaterialId::new("iron_bars"));

        controller.lock(&mut world, &key()).unwrap();
        controller.unlock(&mut world, &key()).unwrap();
        // The sweep still clears it to air.
        assert!(world.material_at(CellPos::new(0, 72, 12)).is_air());
    }

    #[test]
    fn test_unlock_without_lock_sweeps_nothing() {
        let (mut controller, mut world) = registered();
        world.place(CellPos::new(0, 72, 12), MaterialId::new("iron_bars"));

        // Never locked: the stray barrier-material cell is not ours.
        assert!(!controller.unlock(&mut world, &key()).unwrap());
        assert_eq!(
            world.material_at(CellPos::new(0, 72, 12)),
            MaterialId::new("iron_bars")
        );
    }

    #[test]
    fn test_unlock_unregistered_key_is_error() {
        let mut controller = BarrierController::new();
        let mut world = MemoryWorld::new();
        assert!(matches!(
            controller.unlock(&mut world, &key()),
            Err(BarrierError::Unregistered { .. })
        ));
    }

    // =====================================================================
    // Bulk operations
    // =====================================================================

    #[test]
    fn test_lock_all_and_unlock_all_cover_session_keys() {
        let (mut controller, mut world) = registered();
        let exit = BarrierKey {
            door: DoorKind::Exit,
            ..key()
        };
        controller
            .register(
                exit,
                &room(),
                &[CellPos::new(24, 70, 10), CellPos::new(24, 75, 14)],
                &BarrierConfig::default(),
            )
            .unwrap();

        let session = SessionKey::from("alpine");
        assert_eq!(controller.lock_all(&mut world, &session).unwrap(), 2);
        assert_eq!(controller.unlock_all(&mut world, &session).unwrap(), 2);
    }

    #[test]
    fn test_remove_session_restores_and_forgets() {
        let (mut controller, mut world) = registered();
        controller.lock(&mut world, &key()).unwrap();

        let session = SessionKey::from("alpine");
        controller.remove_session(&mut world, &session).unwrap();

        assert!(world.material_at(CellPos::new(0, 72, 12)).is_air());
        assert!(controller.state(&key()).is_none());
    }
}
