//! Watchers - long-running consumers of navigation and selection events
//!
//! - [`ViolationsWatcher`]: keeps one poll task alive while the location is
//!   under the violations route, cancel-before-replace on every navigation
//! - [`BatchWatcher`]: fires one-shot fetch batches for dashboard-style routes
//! - [`LatestFetcher`]: one fetch per request, newest request wins

mod batch;
mod latest;
mod violations;

pub use batch::BatchWatcher;
pub use latest::LatestFetcher;
pub use violations::ViolationsWatcher;

/// Counters reported by every watcher when it stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherStats {
    /// Events or requests handled
    pub events: u64,
    /// Tasks or fetches started
    pub started: u64,
    /// Tasks cancelled before finishing on their own
    pub cancelled: u64,
    /// Events skipped because the watcher fell behind the bus
    pub lagged: u64,
}
