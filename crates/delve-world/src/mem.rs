//! `MemoryWorld`: a deterministic in-memory [`World`].
//!
//! Used as the fixture by every test suite in the workspace and usable by
//! embedders as a reference implementation. All state lives in hash maps;
//! the tick only advances when the caller says so, and every presentation
//! call is recorded in an event log so tests can assert on exactly what
//! the core asked the host to do.

use std::collections::HashMap;

use crate::{
    ActorId, CaptureOffer, CellPos, EntityId, InstanceId, ItemKind, MaterialId,
    SessionKey, SourceKind, StatusEffect, UnitSpawn, UnitTag, Volume, World,
};

/// One recorded host-side effect. Tests assert against these.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Teleported { actor: ActorId, pos: CellPos },
    Status { actor: ActorId, effect: StatusEffect },
    MovementLocked { actor: ActorId, locked: bool },
    Ignited { actor: ActorId, seconds: u32 },
    Title { actor: ActorId, title: String, subtitle: String },
    Message { actor: ActorId, message: String },
    Broadcast { message: String },
    CommandRun { command: String },
    BossBar { key: SessionKey, title: String, fraction: f32, viewers: Vec<ActorId> },
    BossBarCleared { key: SessionKey },
    CaptureOpened { actor: ActorId, offer: CaptureOffer },
    CaptureClosed { actor: ActorId },
    Reward { actor: ActorId, species: String },
    UnitSpawned { unit: EntityId, spawn: UnitSpawn },
    UnitRemoved { unit: EntityId },
    RegionPinned { instance: InstanceId, volume: Volume },
    RegionReleased { instance: InstanceId },
}

#[derive(Debug, Clone)]
struct ActorState {
    pos: CellPos,
    online: bool,
    alive: bool,
    spectator: bool,
    items: HashMap<ItemKind, u32>,
}

#[derive(Debug, Clone)]
struct UnitState {
    pos: CellPos,
    tag: UnitTag,
    alive: bool,
    health: f32,
    max_health: f32,
}

/// Deterministic in-memory world.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    tick: u64,
    materials: HashMap<CellPos, MaterialId>,
    aux: HashMap<CellPos, bool>,
    unloaded: Vec<Volume>,
    pins: HashMap<InstanceId, Vec<Volume>>,
    actors: HashMap<ActorId, ActorState>,
    units: HashMap<EntityId, UnitState>,
    next_entity: u64,
    sources: Vec<(CellPos, SourceKind)>,
    /// When true, `spawn_unit` refuses every request (degraded-host path).
    pub refuse_spawns: bool,
    events: Vec<WorldEvent>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Clock control --

    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn advance(&mut self, ticks: u64) {
        self.tick += ticks;
    }

    // -- Scenario setup --

    /// Place an online, alive actor at a position.
    pub fn add_actor(&mut self, actor: ActorId, pos: CellPos) {
        self.actors.insert(
            actor,
            ActorState {
                pos,
                online: true,
                alive: true,
                spectator: false,
                items: HashMap::new(),
            },
        );
    }

    pub fn move_actor(&mut self, actor: ActorId, pos: CellPos) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.pos = pos;
        }
    }

    pub fn set_online(&mut self, actor: ActorId, online: bool) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.online = online;
        }
    }

    pub fn set_alive(&mut self, actor: ActorId, alive: bool) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.alive = alive;
        }
    }

    pub fn set_spectator(&mut self, actor: ActorId, spectator: bool) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.spectator = spectator;
        }
    }

    pub fn give_item(&mut self, actor: ActorId, item: ItemKind, count: u32) {
        if let Some(state) = self.actors.get_mut(&actor) {
            *state.items.entry(item).or_insert(0) += count;
        }
    }

    pub fn place(&mut self, pos: CellPos, material: impl Into<MaterialId>) {
        self.materials.insert(pos, material.into());
    }

    /// Fill a whole volume with one material.
    pub fn fill(&mut self, volume: &Volume, material: impl Into<MaterialId>) {
        let material = material.into();
        for cell in volume.cells() {
            self.materials.insert(cell, material.clone());
        }
    }

    pub fn set_aux(&mut self, pos: CellPos, present: bool) {
        self.aux.insert(pos, present);
    }

    pub fn mark_unloaded(&mut self, volume: Volume) {
        self.unloaded.push(volume);
    }

    pub fn add_source(&mut self, pos: CellPos, kind: SourceKind) {
        self.sources.push((pos, kind));
    }

    // -- Unit control for tests --

    pub fn kill_unit(&mut self, unit: EntityId) {
        if let Some(state) = self.units.get_mut(&unit) {
            state.alive = false;
        }
    }

    pub fn set_unit_health(&mut self, unit: EntityId, health: f32) {
        if let Some(state) = self.units.get_mut(&unit) {
            state.health = health.clamp(0.0, state.max_health);
            if state.health == 0.0 {
                state.alive = false;
            }
        }
    }

    pub fn move_unit(&mut self, unit: EntityId, pos: CellPos) {
        if let Some(state) = self.units.get_mut(&unit) {
            state.pos = pos;
        }
    }

    /// Kill every live unit with the tag inside a volume.
    pub fn kill_units_in(&mut self, volume: &Volume, tag: UnitTag) {
        for state in self.units.values_mut() {
            if state.tag == tag && state.alive && volume.contains(state.pos) {
                state.alive = false;
            }
        }
    }

    // -- Inspection --

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pinned_volumes(&self, instance: InstanceId) -> &[Volume] {
        self.pins.get(&instance).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn live_unit_count(&self, tag: UnitTag) -> usize {
        self.units
            .values()
            .filter(|u| u.tag == tag && u.alive)
            .count()
    }
}

impl World for MemoryWorld {
    fn current_tick(&self) -> u64 {
        self.tick
    }

    fn material_at(&self, pos: CellPos) -> MaterialId {
        self.materials
            .get(&pos)
            .cloned()
            .unwrap_or_else(MaterialId::air)
    }

    fn set_material(&mut self, pos: CellPos, material: MaterialId) -> bool {
        let changed = self.material_at(pos) != material;
        if changed {
            if material.is_air() {
                self.materials.remove(&pos);
            } else {
                self.materials.insert(pos, material);
            }
        }
        changed
    }

    fn has_aux_state(&self, pos: CellPos) -> bool {
        self.aux.get(&pos).copied().unwrap_or(false)
    }

    fn is_region_loaded(&self, volume: &Volume) -> bool {
        !self.unloaded.iter().any(|u| u.intersects(volume))
    }

    fn force_load_region(&mut self, volume: &Volume) {
        self.unloaded.retain(|u| !u.intersects(volume));
    }

    fn pin_region(&mut self, instance: InstanceId, volume: Volume) {
        self.pins.entry(instance).or_default().push(volume);
        self.events
            .push(WorldEvent::RegionPinned { instance, volume });
    }

    fn release_region(&mut self, instance: InstanceId) {
        if self.pins.remove(&instance).is_some() {
            self.events.push(WorldEvent::RegionReleased { instance });
        }
    }

    fn actor_online(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.online)
    }

    fn actor_pos(&self, actor: ActorId) -> Option<CellPos> {
        self.actors
            .get(&actor)
            .filter(|a| a.online)
            .map(|a| a.pos)
    }

    fn actor_alive(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.alive)
    }

    fn actor_spectator(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.spectator)
    }

    fn teleport(&mut self, actor: ActorId, pos: CellPos) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.pos = pos;
        }
        self.events.push(WorldEvent::Teleported { actor, pos });
    }

    fn spawn_unit(&mut self, spawn: UnitSpawn) -> Option<EntityId> {
        if self.refuse_spawns {
            return None;
        }
        self.next_entity += 1;
        let unit = EntityId(self.next_entity);
        self.units.insert(
            unit,
            UnitState {
                pos: spawn.pos,
                tag: spawn.tag,
                alive: true,
                health: 100.0,
                max_health: 100.0,
            },
        );
        tracing::debug!(%unit, species = %spawn.species, "unit spawned");
        self.events.push(WorldEvent::UnitSpawned { unit, spawn });
        Some(unit)
    }

    fn units_in(&self, volume: &Volume, tag: UnitTag) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .units
            .iter()
            .filter(|(_, u)| u.tag == tag && u.alive && volume.contains(u.pos))
            .map(|(id, _)| *id)
            .collect();
        // Hash-map order is arbitrary; keep results deterministic.
        ids.sort_by_key(|id| id.0);
        ids
    }

    fn unit_alive(&self, unit: EntityId) -> bool {
        self.units.get(&unit).is_some_and(|u| u.alive)
    }

    fn unit_pos(&self, unit: EntityId) -> Option<CellPos> {
        self.units.get(&unit).filter(|u| u.alive).map(|u| u.pos)
    }

    fn unit_health(&self, unit: EntityId) -> Option<(f32, f32)> {
        self.units
            .get(&unit)
            .filter(|u| u.alive)
            .map(|u| (u.health, u.max_health))
    }

    fn remove_unit(&mut self, unit: EntityId) -> bool {
        let existed = self.units.remove(&unit).is_some();
        if existed {
            self.events.push(WorldEvent::UnitRemoved { unit });
        }
        existed
    }

    fn remove_units_in(&mut self, volume: &Volume, tag: UnitTag) -> usize {
        let doomed: Vec<EntityId> = self
            .units
            .iter()
            .filter(|(_, u)| u.tag == tag && volume.contains(u.pos))
            .map(|(id, _)| *id)
            .collect();
        for unit in &doomed {
            self.units.remove(unit);
            self.events.push(WorldEvent::UnitRemoved { unit: *unit });
        }
        doomed.len()
    }

    fn source_near(&self, pos: CellPos, kind: SourceKind, radius: i32) -> bool {
        self.sources.iter().any(|(src, k)| {
            *k == kind
                && (src.x - pos.x).abs() <= radius
                && (src.y - pos.y).abs() <= radius
                && (src.z - pos.z).abs() <= radius
        })
    }

    fn actor_has_item(&self, actor: ActorId, item: ItemKind) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|a| a.items.get(&item).copied().unwrap_or(0) > 0)
    }

    fn consume_item(&mut self, actor: ActorId, item: ItemKind) -> bool {
        let Some(state) = self.actors.get_mut(&actor) else {
            return false;
        };
        match state.items.get_mut(&item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    fn grant_reward(&mut self, actor: ActorId, species: &str) {
        self.events.push(WorldEvent::Reward {
            actor,
            species: species.to_owned(),
        });
    }

    fn apply_status(&mut self, actor: ActorId, effect: StatusEffect) {
        self.events.push(WorldEvent::Status { actor, effect });
    }

    fn set_movement_locked(&mut self, actor: ActorId, locked: bool) {
        self.events.push(WorldEvent::MovementLocked { actor, locked });
    }

    fn ignite(&mut self, actor: ActorId, seconds: u32) {
        self.events.push(WorldEvent::Ignited { actor, seconds });
    }

    fn send_title(&mut self, actor: ActorId, title: &str, subtitle: &str) {
        self.events.push(WorldEvent::Title {
            actor,
            title: title.to_owned(),
            subtitle: subtitle.to_owned(),
        });
    }

    fn send_message(&mut self, actor: ActorId, message: &str) {
        self.events.push(WorldEvent::Message {
            actor,
            message: message.to_owned(),
        });
    }

    fn run_command(&mut self, command: &str) {
        self.events.push(WorldEvent::CommandRun {
            command: command.to_owned(),
        });
    }

    fn broadcast(&mut self, message: &str) {
        self.events.push(WorldEvent::Broadcast {
            message: message.to_owned(),
        });
    }

    fn update_boss_bar(
        &mut self,
        key: &SessionKey,
        title: &str,
        fraction: f32,
        viewers: &[ActorId],
    ) {
        self.events.push(WorldEvent::BossBar {
            key: key.clone(),
            title: title.to_owned(),
            fraction,
            viewers: viewers.to_vec(),
        });
    }

    fn clear_boss_bar(&mut self, key: &SessionKey) {
        self.events.push(WorldEvent::BossBarCleared { key: key.clone() });
    }

    fn open_capture_ui(&mut self, actor: ActorId, offer: &CaptureOffer) {
        self.events.push(WorldEvent::CaptureOpened {
            actor,
            offer: offer.clone(),
        });
    }

    fn close_capture_ui(&mut self, actor: ActorId) {
        self.events.push(WorldEvent::CaptureClosed { actor });
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn aid(id: u64) -> ActorId {
        ActorId(id)
    }

    #[test]
    fn test_material_at_defaults_to_air() {
        let world = MemoryWorld::new();
        assert!(world.material_at(CellPos::new(0, 0, 0)).is_air());
    }

    #[test]
    fn test_set_material_reports_change() {
        let mut world = MemoryWorld::new();
        let pos = CellPos::new(1, 2, 3);
        assert!(world.set_material(pos, MaterialId::new("stone")));
        // Same value again: no change.
        assert!(!world.set_material(pos, MaterialId::new("stone")));
        // Back to air removes the entry.
        assert!(world.set_material(pos, MaterialId::air()));
        assert!(world.material_at(pos).is_air());
    }

    #[test]
    fn test_region_loading_and_force_load() {
        let mut world = MemoryWorld::new();
        let region = Volume::new(CellPos::new(0, 0, 0), CellPos::new(9, 9, 9));
        assert!(world.is_region_loaded(&region));
        world.mark_unloaded(region);
        assert!(!world.is_region_loaded(&region));
        world.force_load_region(&region);
        assert!(world.is_region_loaded(&region));
    }

    #[test]
    fn test_actor_pos_none_when_offline() {
        let mut world = MemoryWorld::new();
        world.add_actor(aid(1), CellPos::new(5, 64, 5));
        assert!(world.actor_pos(aid(1)).is_some());
        world.set_online(aid(1), false);
        assert!(world.actor_pos(aid(1)).is_none());
        assert!(!world.actor_online(aid(1)));
    }

    #[test]
    fn test_spawn_and_query_units_by_tag() {
        let mut world = MemoryWorld::new();
        let room = Volume::new(CellPos::new(0, 0, 0), CellPos::new(10, 10, 10));
        let spawn = UnitSpawn {
            pos: CellPos::new(5, 1, 5),
            species: "ridgeback".into(),
            tag: UnitTag::Raid,
            elite: false,
            scale: None,
        };
        let unit = world.spawn_unit(spawn).unwrap();
        assert_eq!(world.units_in(&room, UnitTag::Raid), vec![unit]);
        assert!(world.units_in(&room, UnitTag::Boss).is_empty());
        world.kill_unit(unit);
        assert!(world.units_in(&room, UnitTag::Raid).is_empty());
    }

    #[test]
    fn test_refuse_spawns_returns_none() {
        let mut world = MemoryWorld::new();
        world.refuse_spawns = true;
        let spawn = UnitSpawn {
            pos: CellPos::new(0, 0, 0),
            species: "ridgeback".into(),
            tag: UnitTag::Raid,
            elite: false,
            scale: None,
        };
        assert!(world.spawn_unit(spawn).is_none());
    }

    #[test]
    fn test_consume_item_decrements_and_stops_at_zero() {
        let mut world = MemoryWorld::new();
        world.add_actor(aid(1), CellPos::new(0, 0, 0));
        world.give_item(aid(1), ItemKind::CaptureSigil, 1);
        assert!(world.actor_has_item(aid(1), ItemKind::CaptureSigil));
        assert!(world.consume_item(aid(1), ItemKind::CaptureSigil));
        assert!(!world.consume_item(aid(1), ItemKind::CaptureSigil));
        assert!(!world.actor_has_item(aid(1), ItemKind::CaptureSigil));
    }

    #[test]
    fn test_source_near_uses_chebyshev_radius() {
        let mut world = MemoryWorld::new();
        world.add_source(CellPos::new(10, 64, 10), SourceKind::Fire);
        assert!(world.source_near(CellPos::new(12, 64, 12), SourceKind::Fire, 2));
        assert!(!world.source_near(CellPos::new(13, 64, 10), SourceKind::Fire, 2));
        assert!(!world.source_near(CellPos::new(10, 64, 10), SourceKind::Water, 2));
    }

    #[test]
    fn test_release_region_drops_all_pins_for_instance() {
        let mut world = MemoryWorld::new();
        let instance = InstanceId(7);
        world.pin_region(instance, Volume::cell(CellPos::new(0, 0, 0)));
        world.pin_region(instance, Volume::cell(CellPos::new(9, 9, 9)));
        assert_eq!(world.pinned_volumes(instance).len(), 2);
        world.release_region(instance);
        assert!(world.pinned_volumes(instance).is_empty());
    }

    #[test]
    fn test_presentation_calls_are_recorded() {
        let mut world = MemoryWorld::new();
        world.add_actor(aid(1), CellPos::new(0, 0, 0));
        world.send_title(aid(1), "Frozen!", "Find a fire");
        world.broadcast("hello");
        let events = world.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WorldEvent::Title { .. }));
        assert!(matches!(events[1], WorldEvent::Broadcast { .. }));
        assert!(world.events().is_empty());
    }
}
