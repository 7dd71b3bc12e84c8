//! The resolver: marker scan → rooms, doors, boss anchor.

use std::collections::BTreeSet;

use delve_world::{CellPos, Volume};
use serde::{Deserialize, Serialize};

use crate::{labels, MarkerScan, ScanError, TopologyConfig};

/// Which authored shape a resolved room matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomKind {
    Standard,
    Tall,
    Boss,
}

/// One resolved room: an immutable volume plus the door volumes
/// geometrically contained in (or clipped to) it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRoom {
    pub volume: Volume,
    pub kind: RoomKind,
    pub doors: Vec<Volume>,
}

/// The fully resolved topology a session is constructed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub rooms: Vec<ResolvedRoom>,
    /// Index of the boss room in `rooms`.
    pub boss_room: usize,
    /// The deterministic anchor cell where the boss spawns.
    pub boss_anchor: CellPos,
    /// The two corner markers of the boss entrance barrier plane.
    pub entrance_pair: (CellPos, CellPos),
    /// The two corner markers of the boss exit barrier plane.
    pub exit_pair: (CellPos, CellPos),
}

impl Topology {
    pub fn boss_room_volume(&self) -> &Volume {
        &self.rooms[self.boss_room].volume
    }

    /// The overall bounds of the dungeon: the union of all room volumes.
    pub fn bounds(&self) -> Volume {
        let mut min = self.rooms[0].volume.min;
        let mut max = self.rooms[0].volume.max;
        for room in &self.rooms {
            min = CellPos::new(
                min.x.min(room.volume.min.x),
                min.y.min(room.volume.min.y),
                min.z.min(room.volume.min.z),
            );
            max = CellPos::new(
                max.x.max(room.volume.max.x),
                max.y.max(room.volume.max.y),
                max.z.max(room.volume.max.z),
            );
        }
        Volume::new(min, max)
    }
}

/// Resolve a marker scan into rooms, doors, and the boss anchor.
///
/// Deterministic for a given `(scan, config)`: label iteration, position
/// ordering, and every tie-break are fixed. Fails fatally (a run cannot
/// start) when no boss marker exists, when the boss room cannot be
/// shaped, or when the entrance/exit corner pairs are incomplete.
pub fn resolve_topology(
    scan: &MarkerScan,
    config: &TopologyConfig,
) -> Result<Topology, ScanError> {
    let boss_markers = scan.positions(labels::BOSS);
    if boss_markers.is_empty() {
        return Err(ScanError::NoBossAnchor);
    }

    let mut rooms = collect_rooms(scan, config);

    // Relaxed fallback: boss markers present but no exact 3-axis match.
    // Pair on the horizontal footprint only and stretch the vertical
    // span to cover every boss marker.
    if !rooms.iter().any(|(_, kind)| *kind == RoomKind::Boss) {
        if let Some(volume) = boss_room_fallback(&boss_markers, config) {
            tracing::warn!(
                %volume,
                "boss room resolved via horizontal-only fallback"
            );
            rooms.push((volume, RoomKind::Boss));
        } else {
            return Err(ScanError::BossRoomUnresolved);
        }
    }

    let entrance = scan.positions(labels::ENTRANCE);
    if entrance.len() < 2 {
        return Err(ScanError::MissingEntrancePair(entrance.len()));
    }
    let exit = scan.positions(labels::EXIT);
    if exit.len() < 2 {
        return Err(ScanError::MissingExitPair(exit.len()));
    }

    let door_volumes = collect_doors(scan, config);

    let mut resolved: Vec<ResolvedRoom> = rooms
        .into_iter()
        .map(|(volume, kind)| {
            let doors = door_volumes
                .iter()
                .filter(|door| door.intersects(&volume))
                .map(|door| clamp_to_room(door, &volume))
                .collect();
            ResolvedRoom {
                volume,
                kind,
                doors,
            }
        })
        .collect();

    // Boss room last would be fine, but first-found is the stable choice.
    let boss_room = resolved
        .iter()
        .position(|r| r.kind == RoomKind::Boss)
        .ok_or(ScanError::BossRoomUnresolved)?;

    let boss_anchor = select_boss_anchor(&boss_markers, &resolved[boss_room].volume);

    for room in &mut resolved {
        room.doors.dedup();
    }

    tracing::info!(
        rooms = resolved.len(),
        boss_room,
        anchor = %boss_anchor,
        "topology resolved"
    );

    Ok(Topology {
        rooms: resolved,
        boss_room,
        boss_anchor,
        entrance_pair: (entrance[0], entrance[1]),
        exit_pair: (exit[0], exit[1]),
    })
}

/// Find every room by testing same-label marker pairs against the known
/// shapes. Results are deduplicated by volume and ordered by label, then
/// by position order within the label.
fn collect_rooms(scan: &MarkerScan, config: &TopologyConfig) -> Vec<(Volume, RoomKind)> {
    let mut rooms = Vec::new();
    let mut seen: BTreeSet<(i32, i32, i32, i32, i32, i32)> = BTreeSet::new();

    for label in scan.room_labels() {
        let positions = scan.positions(label);
        for (i, &a) in positions.iter().enumerate() {
            for &b in positions.iter().skip(i + 1) {
                let Some(kind) = match_shape(a, b, label == labels::BOSS, config) else {
                    continue;
                };
                let volume = Volume::new(a, b);
                let fingerprint = (
                    volume.min.x,
                    volume.min.y,
                    volume.min.z,
                    volume.max.x,
                    volume.max.y,
                    volume.max.z,
                );
                if seen.insert(fingerprint) {
                    rooms.push((volume, kind));
                }
            }
        }
    }
    rooms
}

/// Exact 3-axis delta match against the shape table.
fn match_shape(a: CellPos, b: CellPos, boss_label: bool, config: &TopologyConfig) -> Option<RoomKind> {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    let dz = (a.z - b.z).abs();

    if boss_label {
        let long = config.boss_span_long - 1;
        let short = config.boss_span_short - 1;
        let height = config.boss_span_y - 1;
        // Either horizontal orientation.
        if dy == height && ((dx == long && dz == short) || (dx == short && dz == long)) {
            return Some(RoomKind::Boss);
        }
        return None;
    }

    let xz = config.room_span_xz - 1;
    if dx == xz && dz == xz {
        if dy == config.room_span_y - 1 {
            return Some(RoomKind::Standard);
        }
        if dy == config.tall_room_span_y - 1 {
            return Some(RoomKind::Tall);
        }
    }
    None
}

/// Horizontal-only boss match: ignore the height delta, stretch the
/// vertical span to at least the expected height and to cover every
/// boss marker.
fn boss_room_fallback(boss_markers: &[CellPos], config: &TopologyConfig) -> Option<Volume> {
    let long = config.boss_span_long - 1;
    let short = config.boss_span_short - 1;
    let lowest = boss_markers.iter().map(|p| p.y).min()?;
    let highest = boss_markers.iter().map(|p| p.y).max()?;
    let top = (lowest + config.boss_span_y - 1).max(highest);

    for (i, &a) in boss_markers.iter().enumerate() {
        for &b in boss_markers.iter().skip(i + 1) {
            let dx = (a.x - b.x).abs();
            let dz = (a.z - b.z).abs();
            if (dx == long && dz == short) || (dx == short && dz == long) {
                return Some(Volume::new(
                    CellPos::new(a.x.min(b.x), lowest, a.z.min(b.z)),
                    CellPos::new(a.x.max(b.x), top, a.z.max(b.z)),
                ));
            }
        }
    }
    None
}

/// Pair `door` markers into interior volumes.
///
/// A valid pair differs by exactly `door_span` on two axes and shares
/// the third; the interior is the open rectangle strictly between the
/// markers (the markers themselves are frame, not passage).
fn collect_doors(scan: &MarkerScan, config: &TopologyConfig) -> Vec<Volume> {
    let span = config.door_span;
    let positions = scan.positions(labels::DOOR);
    let mut doors = Vec::new();

    for (i, &a) in positions.iter().enumerate() {
        for &b in positions.iter().skip(i + 1) {
            let dx = (a.x - b.x).abs();
            let dy = (a.y - b.y).abs();
            let dz = (a.z - b.z).abs();

            let interior = if dx == 0 && dy == span && dz == span {
                // Plane at fixed x.
                Some(Volume::new(
                    CellPos::new(a.x, a.y.min(b.y) + 1, a.z.min(b.z) + 1),
                    CellPos::new(a.x, a.y.max(b.y) - 1, a.z.max(b.z) - 1),
                ))
            } else if dz == 0 && dx == span && dy == span {
                // Plane at fixed z.
                Some(Volume::new(
                    CellPos::new(a.x.min(b.x) + 1, a.y.min(b.y) + 1, a.z),
                    CellPos::new(a.x.max(b.x) - 1, a.y.max(b.y) - 1, a.z),
                ))
            } else if dy == 0 && dx == span && dz == span {
                // Horizontal hatch at fixed y.
                Some(Volume::new(
                    CellPos::new(a.x.min(b.x) + 1, a.y, a.z.min(b.z) + 1),
                    CellPos::new(a.x.max(b.x) - 1, a.y, a.z.max(b.z) - 1),
                ))
            } else {
                None
            };

            if let Some(interior) = interior {
                doors.push(interior);
            }
        }
    }
    doors
}

fn clamp_to_room(door: &Volume, room: &Volume) -> Volume {
    Volume::new(room.clamp(door.min), room.clamp(door.max))
}

/// Pick the anchor among the boss markers inside the boss room: nearest
/// the room center (cell centers, squared distance), ties broken by
/// lowest y, then by the stable horizontal coordinate hash. Guarantees
/// an identical choice for identical scan input.
fn select_boss_anchor(boss_markers: &[CellPos], boss_room: &Volume) -> CellPos {
    let center = boss_room.center();
    let mut candidates: Vec<CellPos> = boss_markers
        .iter()
        .copied()
        .filter(|p| boss_room.contains(*p))
        .collect();
    if candidates.is_empty() {
        // Markers can sit just outside the fallback volume; fall back to
        // considering all of them rather than failing a started resolve.
        candidates = boss_markers.to_vec();
    }
    candidates
        .into_iter()
        .min_by(|a, b| {
            a.distance_sq(center)
                .total_cmp(&b.distance_sq(center))
                .then(a.y.cmp(&b.y))
                .then(a.horizontal_hash().cmp(&b.horizontal_hash()))
        })
        // Unreachable: boss_markers was checked non-empty before resolve.
        .unwrap_or(center)
}

// =========================================================================
// Tests
// =========================================================================
