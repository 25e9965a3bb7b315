//! Runtime adapters that start execution units.

pub mod launcher;

pub use launcher::{Launch, ThreadLauncher, UnitBody};
