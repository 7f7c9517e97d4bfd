//! Location change events

use serde::{Deserialize, Serialize};

use super::filters::ParsedFilters;

/// A single navigation, as reported by the router
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub pathname: String,

    #[serde(default)]
    pub search: String,
}

impl LocationEvent {
    pub fn new(pathname: impl Into<String>, search: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            search: search.into(),
        }
    }

    /// Whether this location lives under `prefix`
    ///
    /// An empty pathname never matches, even against an empty prefix.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        !self.pathname.is_empty() && self.pathname.starts_with(prefix)
    }

    pub fn filters(&self) -> ParsedFilters {
        ParsedFilters::parse(&self.search)
    }
}
