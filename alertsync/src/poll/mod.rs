//! Poll tasks
//!
//! A [`PollTask`] repeats a fixed set of fetches on a fixed cadence until
//! its [`PollTaskHandle`] is cancelled.

mod handle;
mod task;

pub use handle::PollTaskHandle;
pub use task::{CycleOutcome, PollTask};
