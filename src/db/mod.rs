pub mod models;
pub mod store;
pub mod writer;

pub use store::{SnapshotStore, SqliteSnapshotStore};
pub use writer::SnapshotWriter;
