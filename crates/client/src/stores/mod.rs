//! Process-wide state read by the UI.

pub mod counters;

pub use counters::{BackendSnapshots, CounterStore, Counters, SnapshotSource, COUNTERS};
