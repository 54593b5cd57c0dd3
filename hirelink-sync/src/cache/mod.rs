//! In-memory caches and the pure reducers that mutate them.
//!
//! Nothing here performs I/O; the coordinator decides when to call these.

mod inbox;
mod state;
mod thread;

pub use inbox::InboxCache;
pub use state::{EventOutcome, InboxTicket, SnapshotApply, SyncState, ThreadTicket};
pub use thread::ThreadCache;

use crate::error::ErrorKind;

/// Load status of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    #[default]
    Empty,
    Loading,
    Ready,
    /// Last load failed; previously cached content is left untouched.
    Failed(ErrorKind),
}
