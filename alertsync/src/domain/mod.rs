//! Domain types shared by the watchers, poll tasks and sink

mod filters;
mod location;
mod notification;
mod request;

pub use filters::{FilterValue, ParsedFilters};
pub use location::LocationEvent;
pub use notification::{Notification, SERVER_UNREACHABLE};
pub use request::{FetchContext, FetchKind, FetchRequest};
