// Sample and snapshot models

mod sample;
mod snapshot;

pub use sample::Sample;
pub use snapshot::{NetSnapshot, NetTotals, Snapshot, round1};
