//! Speed control: target computation, proportional split and the loop that
//! pushes limits to the torrent clients.

mod allocate;
mod run;

pub use allocate::{allocate, split_target, ClientAllocation, SpeedBounds, SpeedTarget};
pub use run::{ClientOutcome, ControlLoop, CycleReport, SharedClients, SIGNAL_WAIT};
