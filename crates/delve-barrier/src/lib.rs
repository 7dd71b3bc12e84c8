//! Reversible door barriers for Delve.
//!
//! A door becomes impassable by filling its interior plane with a
//! barrier material; it becomes passable again by restoring exactly the
//! materials the lock overwrote. Registration pairs a door's markers
//! into the best blocking plane, the controller performs the lock and
//! unlock passes with a restoration ledger, and the gate marshals
//! off-thread callers onto a single mutation task.

mod controller;
mod error;
mod gate;
mod materials;
mod registration;

pub use controller::{BarrierController, Registration};
pub use error::BarrierError;
pub use gate::BarrierGate;
pub use materials::{is_protected, is_replaceable};
pub use registration::{plan_barrier, BarrierConfig, BarrierKey, BarrierPlane, BarrierState};
