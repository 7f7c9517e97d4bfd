//! alertsync - Location-driven alert polling coordinator
//!
//! Keeps a security console's alert views fresh by reacting to navigation.
//! A location bus fans every navigation out to independent watchers; each
//! watcher decides whether to poll, fire a one-shot batch, or do nothing,
//! and every fetch outcome flows as a typed [`Notification`] into a result
//! sink.
//!
//! # Core Concepts
//!
//! - **Cancel before replace**: at most one poll task per watcher; the old
//!   task is cancelled and joined before a new one starts
//! - **No dispatch after cancel**: cancellation and dispatch serialize on a
//!   per-stream gate
//! - **Latest wins**: selection and by-ID fetches supersede the in-flight one
//! - **Escalation**: sustained failures raise one "server unreachable" notice
//!
//! # Modules
//!
//! - [`domain`] - Locations, filters, fetch requests and notifications
//! - [`events`] - Location bus and selection
//! - [`poll`] - Poll task and its handle
//! - [`watcher`] - Watchers consuming the bus
//! - [`service`] - Alert service trait and HTTP implementation
//! - [`sink`] - Notification sink and the alert store actor
//! - [`supervisor`] - Wiring and teardown
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod poll;
pub mod service;
pub mod sink;
pub mod supervisor;
pub mod watcher;

// Re-export commonly used types
pub use config::{BatchRoute, Config, PollConfig, RoutesConfig, ServerConfig};
pub use domain::{
    FetchContext, FetchKind, FetchRequest, FilterValue, LocationEvent, Notification, ParsedFilters, SERVER_UNREACHABLE,
};
pub use events::{LocationBus, Selection};
pub use poll::{CycleOutcome, PollTask, PollTaskHandle};
pub use service::{AlertService, FetchError, HttpAlertService, create_service};
pub use sink::{AlertState, AlertStore, NotificationSink, StoreError};
pub use supervisor::{Supervisor, SupervisorError, SupervisorReport};
pub use watcher::{BatchWatcher, LatestFetcher, ViolationsWatcher, WatcherStats};
