//! Barrier plane registration: choosing the marker pairing that defines
//! a door's blocking plane.

use delve_world::{CellPos, DoorKind, MaterialId, SessionKey, Volume};
use serde::{Deserialize, Serialize};

use crate::BarrierError;

/// The registry key for one barrier.
///
/// A door has no identity of its own; it is addressed by the session it
/// belongs to, the room index, and which of the boss room's two tracked
/// doors it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BarrierKey {
    pub session: SessionKey,
    pub room: usize,
    pub door: DoorKind,
}

impl std::fmt::Display for BarrierKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.session, self.room, self.door)
    }
}

/// Barrier behavior knobs, sourced from the host's config collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierConfig {
    /// The material a locked barrier fills its interior with.
    pub material: MaterialId,
    /// Reject planes that do not match the expected dimensions.
    pub strict_size: bool,
    /// Expected plane width in cells (markers included).
    pub expected_width: i32,
    /// Expected plane height in cells (markers included).
    pub expected_height: i32,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            material: MaterialId::new("iron_bars"),
            strict_size: true,
            expected_width: 5,
            expected_height: 6,
        }
    }
}

/// Whether a registered barrier is currently blocking its door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarrierState {
    Locked,
    Unlocked,
}

/// A resolved barrier plane: the chosen marker pair and the interior
/// cells between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierPlane {
    /// The two defining markers, in sorted order.
    pub markers: (CellPos, CellPos),
    /// The plane's bounding volume (markers included).
    pub bounds: Volume,
    /// Every cell the barrier fills: the bounding box minus the two
    /// marker cells, restricted to the owning room.
    pub interior: Vec<CellPos>,
}

impl BarrierPlane {
    pub fn width(&self) -> i32 {
        let (sx, _, sz) = self.bounds.span();
        sx.max(sz)
    }

    pub fn height(&self) -> i32 {
        self.bounds.span().1
    }
}

/// Choose the barrier plane for a door from its marker set.
///
/// Every marker is paired with every other; a pair is a candidate when
/// the two positions share exactly one horizontal axis (forming a
/// vertical plane) and are vertically separated. Among candidates the
/// largest wins: cell count, then face area, then height, with the
/// earliest pair in sorted marker order breaking exact ties. Strict
/// sizing, when enabled, rejects the winner if its dimensions differ
/// from the expected ones.
pub fn plan_barrier(
    room: &Volume,
    markers: &[CellPos],
    room_index: usize,
    config: &BarrierConfig,
) -> Result<BarrierPlane, BarrierError> {
    let mut sorted = markers.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut best: Option<(BarrierPlane, (i64, i64, i32))> = None;

    for (i, &a) in sorted.iter().enumerate() {
        for &b in sorted.iter().skip(i + 1) {
            let vertical_plane = (a.x == b.x) != (a.z == b.z);
            if !vertical_plane || a.y == b.y {
                continue;
            }

            let bounds = Volume::new(a, b);
            let (sx, sy, sz) = bounds.span();
            let width = sx.max(sz);
            let score = (
                bounds.cell_count(),
                i64::from(width) * i64::from(sy),
                sy,
            );

            // First-in-sorted-order wins ties: replace only on strictly
            // greater score.
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                let interior = bounds
                    .cells()
                    .filter(|&cell| cell != a && cell != b && room.contains(cell))
                    .collect();
                let plane = BarrierPlane {
                    markers: (a, b),
                    bounds,
                    interior,
                };
                best = Some((plane, score));
            }
        }
    }

    let Some((plane, _)) = best else {
        return Err(BarrierError::NoCandidatePlane {
            room: room_index,
            markers: sorted.len(),
        });
    };

    if config.strict_size
        && (plane.width() != config.expected_width || plane.height() != config.expected_height)
    {
        return Err(BarrierError::SizeMismatch {
            width: plane.width(),
            height: plane.height(),
            expected_width: config.expected_width,
            expected_height: config.expected_height,
        });
    }

    Ok(plane)
}
