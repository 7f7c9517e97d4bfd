//! Remote fetch requests

use serde::{Deserialize, Serialize};

use super::filters::ParsedFilters;

/// The remote operations the coordinator knows how to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchKind {
    /// Violation counts grouped by policy, filtered by the location query
    AlertNumsByPolicy,
    /// Alerts raised by the currently selected policy
    AlertsByPolicy,
    AlertCountsByPolicyCategories,
    AlertCountsByCluster,
    AlertsByTimeseries,
    /// A single alert by id
    Alert,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::AlertNumsByPolicy => "alert-nums-by-policy",
            FetchKind::AlertsByPolicy => "alerts-by-policy",
            FetchKind::AlertCountsByPolicyCategories => "alert-counts-by-policy-categories",
            FetchKind::AlertCountsByCluster => "alert-counts-by-cluster",
            FetchKind::AlertsByTimeseries => "alerts-by-timeseries",
            FetchKind::Alert => "alert",
        }
    }
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs a fetch was issued with, echoed back in notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchContext {
    None,
    Filters(ParsedFilters),
    PolicyId(String),
    AlertId(String),
}

impl FetchContext {
    pub fn is_none(&self) -> bool {
        matches!(self, FetchContext::None)
    }
}

/// A fully-parameterized remote fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    AlertNumsByPolicy(ParsedFilters),
    AlertsByPolicy(String),
    AlertCountsByPolicyCategories,
    AlertCountsByCluster,
    AlertsByTimeseries,
    Alert(String),
}

impl FetchRequest {
    pub fn kind(&self) -> FetchKind {
        match self {
            FetchRequest::AlertNumsByPolicy(_) => FetchKind::AlertNumsByPolicy,
            FetchRequest::AlertsByPolicy(_) => FetchKind::AlertsByPolicy,
            FetchRequest::AlertCountsByPolicyCategories => FetchKind::AlertCountsByPolicyCategories,
            FetchRequest::AlertCountsByCluster => FetchKind::AlertCountsByCluster,
            FetchRequest::AlertsByTimeseries => FetchKind::AlertsByTimeseries,
            FetchRequest::Alert(_) => FetchKind::Alert,
        }
    }

    pub fn context(&self) -> FetchContext {
        match self {
            FetchRequest::AlertNumsByPolicy(filters) => FetchContext::Filters(filters.clone()),
            FetchRequest::AlertsByPolicy(policy_id) => FetchContext::PolicyId(policy_id.clone()),
            FetchRequest::Alert(alert_id) => FetchContext::AlertId(alert_id.clone()),
            FetchRequest::AlertCountsByPolicyCategories
            | FetchRequest::AlertCountsByCluster
            | FetchRequest::AlertsByTimeseries => FetchContext::None,
        }
    }

    /// Build the request for a parameterless kind
    ///
    /// Returns `None` for kinds that need inputs; those can't be part of a
    /// route batch.
    pub fn unparameterized(kind: FetchKind) -> Option<Self> {
        match kind {
            FetchKind::AlertCountsByPolicyCategories => Some(FetchRequest::AlertCountsByPolicyCategories),
            FetchKind::AlertCountsByCluster => Some(FetchRequest::AlertCountsByCluster),
            FetchKind::AlertsByTimeseries => Some(FetchRequest::AlertsByTimeseries),
            FetchKind::AlertNumsByPolicy | FetchKind::AlertsByPolicy | FetchKind::Alert => None,
        }
    }
}
