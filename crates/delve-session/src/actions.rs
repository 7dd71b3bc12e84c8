//! Scripted room actions: side-effects fired when an actor first enters
//! a room.
//!
//! Modeled as a closed tagged variant dispatched through one
//! interpreter, not open-ended dynamic dispatch: the set of things a
//! dungeon author can script is small and known.

use delve_world::{ActorId, CellPos, UnitSpawn, UnitTag, World};
use serde::{Deserialize, Serialize};

/// One scripted hook attached to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomAction {
    /// Run host command strings. `{player}` expands to the entering
    /// actor's id.
    Command { commands: Vec<String> },
    /// Send a message to the entering actor.
    Announce { message: String },
    /// Spawn ambient units at the room center.
    Spawn { species: String, count: u32 },
}

/// Execute one action for one entering actor.
pub fn run_room_action(
    world: &mut dyn World,
    action: &RoomAction,
    actor: ActorId,
    room_center: CellPos,
) {
    match action {
        RoomAction::Command { commands } => {
            for command in commands {
                let expanded = command.replace("{player}", &actor.to_string());
                world.run_command(&expanded);
            }
        }
        RoomAction::Announce { message } => {
            world.send_message(actor, message);
        }
        RoomAction::Spawn { species, count } => {
            for _ in 0..*count {
                let spawned = world.spawn_unit(UnitSpawn {
                    pos: room_center,
                    species: species.clone(),
                    tag: UnitTag::Raid,
                    elite: false,
                    scale: None,
                });
                if spawned.is_none() {
                    tracing::warn!(species, "host refused room-action spawn");
                    break;
                }
            }
        }
    }
}
