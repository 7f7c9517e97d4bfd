//! AlertState - what the console would render, folded from notifications

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{FetchContext, FetchKind, Notification, ParsedFilters};

/// Last error recorded for one fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub error: String,
    pub context: FetchContext,
}

/// Snapshot of everything the sink has received
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlertState {
    /// Violation counts per policy, with the filters they were fetched for
    pub alert_nums_by_policy: Option<serde_json::Value>,
    pub alert_nums_filters: Option<ParsedFilters>,

    /// Alerts keyed by policy id
    pub alerts_by_policy: BTreeMap<String, serde_json::Value>,

    pub alert_counts_by_category: Option<serde_json::Value>,
    pub alert_counts_by_cluster: Option<serde_json::Value>,
    pub alerts_by_timeseries: Option<serde_json::Value>,

    /// Single alerts keyed by id
    pub alerts: BTreeMap<String, serde_json::Value>,

    /// Most recent failure per fetch; cleared by the next success
    pub errors: HashMap<FetchKind, FetchFailure>,

    /// Banner-level error from sustained polling failures
    pub server_unreachable: Option<String>,

    pub notifications_applied: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl AlertState {
    /// Fold one notification into the state
    pub fn apply(&mut self, notification: &Notification) {
        match notification {
            Notification::Success {
                fetch,
                payload,
                context,
            } => {
                self.errors.remove(fetch);
                self.server_unreachable = None;
                match (fetch, context) {
                    (FetchKind::AlertNumsByPolicy, FetchContext::Filters(filters)) => {
                        self.alert_nums_by_policy = Some(payload.clone());
                        self.alert_nums_filters = Some(filters.clone());
                    }
                    (FetchKind::AlertNumsByPolicy, _) => {
                        self.alert_nums_by_policy = Some(payload.clone());
                        self.alert_nums_filters = None;
                    }
                    (FetchKind::AlertsByPolicy, FetchContext::PolicyId(id)) => {
                        self.alerts_by_policy.insert(id.clone(), payload.clone());
                    }
                    (FetchKind::Alert, FetchContext::AlertId(id)) => {
                        self.alerts.insert(id.clone(), payload.clone());
                    }
                    (FetchKind::AlertCountsByPolicyCategories, _) => {
                        self.alert_counts_by_category = Some(payload.clone());
                    }
                    (FetchKind::AlertCountsByCluster, _) => {
                        self.alert_counts_by_cluster = Some(payload.clone());
                    }
                    (FetchKind::AlertsByTimeseries, _) => {
                        self.alerts_by_timeseries = Some(payload.clone());
                    }
                    (FetchKind::AlertsByPolicy | FetchKind::Alert, other) => {
                        tracing::warn!(%fetch, ?other, "Success without an identifying context, ignoring payload");
                    }
                }
            }
            Notification::Failure { fetch, error, context } => {
                self.errors.insert(
                    *fetch,
                    FetchFailure {
                        error: error.clone(),
                        context: context.clone(),
                    },
                );
            }
            Notification::Unreachable { error } => {
                self.server_unreachable = Some(error.clone());
            }
        }

        self.notifications_applied += 1;
        self.last_updated = Some(Utc::now());
    }

    pub fn error_for(&self, fetch: FetchKind) -> Option<&FetchFailure> {
        self.errors.get(&fetch)
    }
}
