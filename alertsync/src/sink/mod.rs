//! Result sink
//!
//! Watchers and poll tasks dispatch [`Notification`](crate::domain::Notification)s
//! through a [`NotificationSink`]; the [`AlertStore`] actor owns the folded
//! [`AlertState`].

mod dispatch;
mod state;
mod store;

pub use dispatch::{DispatchGate, GuardedSink, NotificationSink, cancel_guarded, new_gate};
pub use state::{AlertState, FetchFailure};
pub use store::{AlertStore, StoreError};
