//! Material classification for barrier mutation.
//!
//! The controller never overwrites a cell it could not cleanly restore:
//! fixtures with inventory or behavior are denied outright, and only a
//! small allowed set of passable materials is ever replaced.

use delve_world::MaterialId;

/// Fixtures a barrier must never overwrite: containers, spawners, and
/// structural/administrative cells. Denials are counted, not errors.
const PROTECTED: &[&str] = &[
    "chest",
    "trapped_chest",
    "barrel",
    "shulker_box",
    "furnace",
    "hopper",
    "dispenser",
    "dropper",
    "spawner",
    "command_block",
    "bedrock",
];

/// Passable materials a barrier may replace: the empty cell, fluids, and
/// a small decorative set that carries no state.
const REPLACEABLE: &[&str] = &[
    MaterialId::AIR,
    "cave_air",
    "water",
    "lava",
    "short_grass",
    "tall_grass",
    "fern",
    "snow",
    "vine",
    "seagrass",
];

/// Whether the material is a protected fixture.
pub fn is_protected(material: &MaterialId) -> bool {
    PROTECTED.contains(&material.as_str())
}

/// Whether the material may be overwritten by a barrier.
pub fn is_replaceable(material: &MaterialId) -> bool {
    REPLACEABLE.contains(&material.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_air_is_replaceable_not_protected() {
        let air = MaterialId::air();
        assert!(is_replaceable(&air));
        assert!(!is_protected(&air));
    }

    #[test]
    fn test_chest_is_protected_not_replaceable() {
        let chest = MaterialId::new("chest");
        assert!(is_protected(&chest));
        assert!(!is_replaceable(&chest));
    }

    #[test]
    fn test_ordinary_solid_is_neither() {
        let stone = MaterialId::new("stone");
        assert!(!is_protected(&stone));
        assert!(!is_replaceable(&stone));
    }
}
