//! Core traits and types for cycle-level serial bus-bridge simulation.
//!
//! Everything advances one local clock tick at a time. The serial clock,
//! chip select and data lines are foreign-clock-domain inputs; they enter
//! the local domain only through [`sync`]. Everything downstream of the
//! synchronizers is deterministic, single-domain logic.

mod bus;
mod clock;
mod observable;
mod sync;
mod tickable;
mod ticks;

pub use bus::{BusCompletion, BusPort, BusReply, BusRequest, CsrBus, CsrFile, SramBus};
pub use clock::MasterClock;
pub use observable::{Observable, Value};
pub use sync::{Edge, EdgeDetector, SyncedLine, Synchronizer};
pub use tickable::Tickable;
pub use ticks::Ticks;
