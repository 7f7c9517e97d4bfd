//! HTTP implementation of AlertService against the backend REST API

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::{AlertService, FetchError};
use crate::config::ServerConfig;
use crate::domain::FetchRequest;

/// REST client for the alert endpoints
pub struct HttpAlertService {
    base_url: Url,
    config: ServerConfig,
    token: Option<String>,
    http: Client,
}

impl HttpAlertService {
    /// Create a new client from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self, FetchError> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "HttpAlertService::from_config: called");
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FetchError::Config(format!("invalid base URL {}: {}", config.base_url, e)))?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self {
            base_url,
            config: config.clone(),
            token: config.token(),
            http,
        })
    }

    /// Resolve the URL and query parameters for a request
    pub(crate) fn endpoint(&self, request: &FetchRequest) -> Result<(Url, Vec<(String, String)>), FetchError> {
        let endpoints = &self.config.endpoints;
        let (path, query, tail) = match request {
            FetchRequest::AlertNumsByPolicy(filters) => (&endpoints.alert_nums_by_policy, filters.to_query_pairs(), None),
            FetchRequest::AlertsByPolicy(policy_id) => (
                &endpoints.alerts,
                vec![("query".to_string(), format!("Policy Id:{}", policy_id))],
                None,
            ),
            FetchRequest::AlertCountsByPolicyCategories => (
                &endpoints.alert_counts,
                vec![("group_by".to_string(), "CATEGORY".to_string())],
                None,
            ),
            FetchRequest::AlertCountsByCluster => (
                &endpoints.alert_counts,
                vec![("group_by".to_string(), "CLUSTER".to_string())],
                None,
            ),
            FetchRequest::AlertsByTimeseries => (&endpoints.alerts_timeseries, Vec::new(), None),
            FetchRequest::Alert(alert_id) => (&endpoints.alerts, Vec::new(), Some(alert_id.as_str())),
        };

        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| FetchError::InvalidResponse(format!("bad URL {}: {}", joined, e)))?;

        if let Some(segment) = tail {
            url.path_segments_mut()
                .map_err(|_| FetchError::InvalidResponse(format!("base URL cannot carry a path: {}", joined)))?
                .pop_if_empty()
                .push(segment);
        }

        Ok((url, query))
    }
}

#[async_trait]
impl AlertService for HttpAlertService {
    async fn fetch(&self, request: &FetchRequest) -> Result<serde_json::Value, FetchError> {
        let (url, query) = self.endpoint(request)?;
        debug!(kind = %request.kind(), %url, "HttpAlertService::fetch: called");

        let mut builder = self.http.get(url).query(&query);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(kind = %request.kind(), status = status.as_u16(), "HttpAlertService::fetch: non-success status");
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        if body.trim().is_empty() {
            return Err(FetchError::InvalidResponse("empty response body".to_string()));
        }

        Ok(serde_json::from_str(&body)?)
    }
}
