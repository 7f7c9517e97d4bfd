//! Notifications dispatched to the result sink

use serde::{Deserialize, Serialize};

use super::request::{FetchContext, FetchKind};

/// Error text for the sustained-failure escalation
pub const SERVER_UNREACHABLE: &str = "Cannot reach the server.";

/// Outcome of a remote fetch, or an escalation
///
/// On the wire an escalation is a failure without `fetch` or `context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireNotification", from = "WireNotification")]
pub enum Notification {
    /// A fetch completed with a payload
    Success {
        fetch: FetchKind,
        payload: serde_json::Value,
        context: FetchContext,
    },

    /// A single fetch failed
    Failure {
        fetch: FetchKind,
        error: String,
        context: FetchContext,
    },

    /// Consecutive poll cycles failed; not tied to any one fetch
    Unreachable { error: String },
}

impl Notification {
    pub fn success(fetch: FetchKind, payload: serde_json::Value, context: FetchContext) -> Self {
        Notification::Success {
            fetch,
            payload,
            context,
        }
    }

    pub fn failure(fetch: FetchKind, error: impl ToString, context: FetchContext) -> Self {
        Notification::Failure {
            fetch,
            error: error.to_string(),
            context,
        }
    }

    pub fn unreachable() -> Self {
        Notification::Unreachable {
            error: SERVER_UNREACHABLE.to_string(),
        }
    }

    /// The fetch this notification belongs to, if any
    pub fn fetch(&self) -> Option<FetchKind> {
        match self {
            Notification::Success { fetch, .. } | Notification::Failure { fetch, .. } => Some(*fetch),
            Notification::Unreachable { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Notification::Success { .. })
    }
}

/// Serialized form of [`Notification`]
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum WireNotification {
    Success {
        fetch: FetchKind,
        payload: serde_json::Value,
        context: FetchContext,
    },
    Failure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fetch: Option<FetchKind>,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<FetchContext>,
    },
}

impl From<Notification> for WireNotification {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::Success {
                fetch,
                payload,
                context,
            } => WireNotification::Success {
                fetch,
                payload,
                context,
            },
            Notification::Failure { fetch, error, context } => WireNotification::Failure {
                fetch: Some(fetch),
                error,
                context: Some(context),
            },
            Notification::Unreachable { error } => WireNotification::Failure {
                fetch: None,
                error,
                context: None,
            },
        }
    }
}

impl From<WireNotification> for Notification {
    fn from(wire: WireNotification) -> Self {
        match wire {
            WireNotification::Success {
                fetch,
                payload,
                context,
            } => Notification::Success {
                fetch,
                payload,
                context,
            },
            WireNotification::Failure {
                fetch: Some(fetch),
                error,
                context,
            } => Notification::Failure {
                fetch,
                error,
                context: context.unwrap_or(FetchContext::None),
            },
            WireNotification::Failure { fetch: None, error, .. } => Notification::Unreachable { error },
        }
    }
}
