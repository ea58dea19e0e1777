pub mod link;
pub mod protocol;
pub mod siggen;

#[cfg(test)]
pub mod mock;

pub use siggen::{Result, SigGenError, SignalGenerator};
