pub mod clock;
pub mod snapshot_cache;

pub use clock::{Clock, SystemClock};
pub use snapshot_cache::{CacheState, SnapshotCache};
