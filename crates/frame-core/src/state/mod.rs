// # Snapshot State
//
// The canonical dashboard state: an immutable snapshot replaced only through
// transitions of the snapshot store. State is memory-resident.

pub mod snapshot;
pub mod store;

pub use snapshot::Snapshot;
pub use store::{SnapshotStore, Transaction};
