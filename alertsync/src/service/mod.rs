//! Alert service module
//!
//! The remote-fetch collaborator: one trait, an HTTP implementation, and
//! a scripted mock for unit tests.

use std::sync::Arc;

use tracing::debug;

mod error;
mod http;
mod traits;

pub use error::FetchError;
pub use http::HttpAlertService;
pub use traits::AlertService;

use crate::config::ServerConfig;

/// Create the HTTP alert service from configuration
pub fn create_service(config: &ServerConfig) -> Result<Arc<dyn AlertService>, FetchError> {
    debug!(base_url = %config.base_url, "create_service: called");
    Ok(Arc::new(HttpAlertService::from_config(config)?))
}
