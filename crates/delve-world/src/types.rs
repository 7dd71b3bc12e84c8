//! Core identity and geometry types.
//!
//! Everything here is a plain value: cheap to copy (or clone, for the
//! string-backed ids), serializable, and free of any host-environment
//! dependency. The rest of the workspace builds on these.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player (an "actor" in dungeon terms).
///
/// Newtype over `u64`: you can't accidentally pass an [`EntityId`] where
/// an `ActorId` is expected, even though both are `u64` underneath.
///
/// `#[serde(transparent)]` serializes this as the bare number, so an
/// `ActorId(42)` is just `42` in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// A unique identifier for a spawned hostile unit (raid add, boss, …).
///
/// Issued by the host world when a unit is spawned; Delve only ever
/// stores and compares these, never dereferences them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// A unique identifier for one session *instance*.
///
/// Sessions are keyed by dungeon name ([`SessionKey`]), but a name can be
/// reused after a run ends. The instance id disambiguates: a scheduled
/// action that captured `(key, instance)` can detect that the session it
/// belonged to was replaced and turn itself into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I-{}", self.0)
    }
}

/// The registry key for a running session: the dungeon's name.
///
/// Exactly one live session exists per key at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which tracked door of a room a key refers to.
///
/// Ordinary rooms carry numbered passage doors; only the boss room
/// distinguishes the way in from the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DoorKind {
    Entrance,
    Exit,
    /// A numbered passage door of an ordinary room.
    Passage(u8),
}

impl fmt::Display for DoorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entrance => f.write_str("entrance"),
            Self::Exit => f.write_str("exit"),
            Self::Passage(idx) => write!(f, "passage-{idx}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

/// The identifier for whatever occupies a cell.
///
/// Delve treats materials as opaque names; classification (replaceable,
/// protected, barrier) is configuration owned by the barrier controller.
/// Two well-known values exist because the core logic needs them:
/// [`MaterialId::AIR`] (the empty cell) and water (hazard cooling).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub String);

impl MaterialId {
    pub const AIR: &'static str = "air";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn air() -> Self {
        Self(Self::AIR.to_owned())
    }

    pub fn is_air(&self) -> bool {
        self.0 == Self::AIR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MaterialId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// An integer cell position in the host environment.
///
/// Ordering is lexicographic `(x, y, z)`, which gives deterministic
/// iteration wherever positions key a sorted map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// This cell shifted by the given deltas.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The center of this cell in continuous coordinates (cell + 0.5).
    pub fn center(self) -> (f64, f64, f64) {
        (
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        )
    }

    /// Squared Euclidean distance between cell centers.
    ///
    /// Squared (not rooted) because it's only used for comparisons, and
    /// staying in squared space avoids floating-point surprises in the
    /// deterministic anchor tie-break.
    pub fn distance_sq(self, other: Self) -> f64 {
        let (ax, ay, az) = self.center();
        let (bx, by, bz) = other.center();
        let (dx, dy, dz) = (ax - bx, ay - by, az - bz);
        dx * dx + dy * dy + dz * dz
    }

    /// Deterministic hash of the horizontal coordinates, used as the final
    /// tie-break when selecting a boss anchor. Stable across runs and
    /// platforms by construction.
    pub fn horizontal_hash(self) -> i64 {
        self.x as i64 * 31 + self.z as i64
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// An axis-aligned rectangular volume of cells, inclusive on both corners.
///
/// Construction normalizes the corners so `min` is componentwise ≤ `max`;
/// callers can pass any two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Volume {
    pub min: CellPos,
    pub max: CellPos,
}

impl Volume {
    pub fn new(a: CellPos, b: CellPos) -> Self {
        Self {
            min: CellPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: CellPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// A volume covering exactly one cell.
    pub fn cell(pos: CellPos) -> Self {
        Self { min: pos, max: pos }
    }

    pub fn contains(&self, pos: CellPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    pub fn intersects(&self, other: &Volume) -> bool {
        self.max.x >= other.min.x
            && self.min.x <= other.max.x
            && self.max.y >= other.min.y
            && self.min.y <= other.max.y
            && self.max.z >= other.min.z
            && self.min.z <= other.max.z
    }

    /// The cell nearest the geometric center (rounds toward `min`).
    pub fn center(&self) -> CellPos {
        CellPos::new(
            self.min.x + (self.max.x - self.min.x) / 2,
            self.min.y + (self.max.y - self.min.y) / 2,
            self.min.z + (self.max.z - self.min.z) / 2,
        )
    }

    /// Cell counts per axis (inclusive spans).
    pub fn span(&self) -> (i32, i32, i32) {
        (
            self.max.x - self.min.x + 1,
            self.max.y - self.min.y + 1,
            self.max.z - self.min.z + 1,
        )
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> i64 {
        let (sx, sy, sz) = self.span();
        sx as i64 * sy as i64 * sz as i64
    }

    /// Iterate every cell in x → y → z order. Deterministic, so any
    /// cell-by-cell mutation (and its restoration) replays identically.
    pub fn cells(&self) -> impl Iterator<Item = CellPos> + '_ {
        let min = self.min;
        let max = self.max;
        (min.x..=max.x).flat_map(move |x| {
            (min.y..=max.y)
                .flat_map(move |y| (min.z..=max.z).map(move |z| CellPos::new(x, y, z)))
        })
    }

    /// Clamp a position into this volume, componentwise.
    pub fn clamp(&self, pos: CellPos) -> CellPos {
        CellPos::new(
            pos.x.clamp(self.min.x, self.max.x),
            pos.y.clamp(self.min.y, self.max.y),
            pos.z.clamp(self.min.z, self.max.z),
        )
    }

    /// Grow the volume by `r` cells on every horizontal side (used for
    /// "nearby actors" gathers around an activation point).
    pub fn inflate_horizontal(&self, r: i32) -> Self {
        Self {
            min: self.min.offset(-r, 0, -r),
            max: self.max.offset(r, 0, r),
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}

// =========================================================================
// Tests
// =========================================================================
