//! Scan input: labeled marker positions and the expected dimensions.

use std::collections::BTreeMap;

use delve_world::CellPos;
use serde::{Deserialize, Serialize};

/// Well-known marker labels.
///
/// Authors are free to invent labels for ordinary rooms; these are the
/// ones the resolver itself gives meaning to.
pub mod labels {
    /// Corner markers of the boss room, and its anchor candidates.
    pub const BOSS: &str = "boss";
    /// Passage markers paired into door volumes.
    pub const DOOR: &str = "door";
    /// The two corners of the boss entrance barrier plane.
    pub const ENTRANCE: &str = "entrance";
    /// The two corners of the boss exit barrier plane.
    pub const EXIT: &str = "exit";
    /// Wave spawn points (assigned to rooms at session start).
    pub const SPAWN: &str = "spawn";
}

/// Raw scan output: every labeled marker found in the scan volume.
///
/// A `BTreeMap` with sorted position lists so resolution order, and
/// therefore the resolved topology, is independent of scan order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerScan {
    markers: BTreeMap<String, Vec<CellPos>>,
}

impl MarkerScan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: impl Into<String>, pos: CellPos) {
        self.markers.entry(label.into()).or_default().push(pos);
    }

    /// Positions for a label, sorted by `(x, y, z)`.
    pub fn positions(&self, label: &str) -> Vec<CellPos> {
        let mut positions = self
            .markers
            .get(label)
            .cloned()
            .unwrap_or_default();
        positions.sort_by_key(|p| (p.x, p.y, p.z));
        positions.dedup();
        positions
    }

    /// Labels that define ordinary rooms: everything except the
    /// resolver-reserved ones.
    pub fn room_labels(&self) -> Vec<&str> {
        self.markers
            .keys()
            .map(String::as_str)
            .filter(|label| {
                !matches!(
                    *label,
                    labels::DOOR | labels::ENTRANCE | labels::EXIT | labels::SPAWN
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Expected shape dimensions, in cells (inclusive spans).
///
/// Defaults match the authored room kit; hosts with a different kit
/// override these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Standard room horizontal span.
    pub room_span_xz: i32,
    /// Standard room height.
    pub room_span_y: i32,
    /// Tall-variant room height.
    pub tall_room_span_y: i32,
    /// Boss room span along its long axis.
    pub boss_span_long: i32,
    /// Boss room height.
    pub boss_span_y: i32,
    /// Boss room span along its short axis.
    pub boss_span_short: i32,
    /// Door marker pair offset on each differing axis.
    pub door_span: i32,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            room_span_xz: 25,
            room_span_y: 7,
            tall_room_span_y: 14,
            boss_span_long: 47,
            boss_span_y: 14,
            boss_span_short: 39,
            door_span: 4,
        }
    }
}
