//! Event sources feeding the watchers
//!
//! ```text
//!   router ──publish──▶ LocationBus (broadcast)
//!                          │            │
//!                          ▼            ▼
//!               ViolationsWatcher   BatchWatcher
//!
//!   policy list ──▶ Selection (watch) ──▶ PollTask / LatestFetcher
//! ```

mod bus;
mod selection;

pub use bus::{DEFAULT_BUS_CAPACITY, LocationBus};
pub use selection::Selection;
