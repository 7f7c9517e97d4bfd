//! AlertService trait definition

use async_trait::async_trait;

use super::FetchError;
use crate::domain::FetchRequest;

/// Remote source of alert data
///
/// Implementations own transport concerns (timeouts, auth, retries at the
/// transport layer). The coordinator only sees success or failure per call.
#[async_trait]
pub trait AlertService: Send + Sync {
    /// Execute one fetch and return the decoded response body
    async fn fetch(&self, request: &FetchRequest) -> Result<serde_json::Value, FetchError>;
}
