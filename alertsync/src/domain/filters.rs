//! Query-string filters
//!
//! Decodes a location's `search` component into an ordered key/value map.
//! The map is opaque to the coordinator: it is handed to the alert service
//! and echoed back in notification context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Value of a single query-string key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Key appeared without `=` (`?deleted`)
    Flag,
    /// Key appeared once
    Single(String),
    /// Key appeared more than once, values in order of appearance
    Multiple(Vec<String>),
}

impl FilterValue {
    fn push(&mut self, value: Option<String>) {
        let Some(value) = value else {
            // A bare key repeated after a valued one adds nothing
            return;
        };
        *self = match std::mem::replace(self, FilterValue::Flag) {
            FilterValue::Flag => FilterValue::Single(value),
            FilterValue::Single(first) => FilterValue::Multiple(vec![first, value]),
            FilterValue::Multiple(mut values) => {
                values.push(value);
                FilterValue::Multiple(values)
            }
        };
    }

    /// All values carried by this key
    pub fn values(&self) -> Vec<&str> {
        match self {
            FilterValue::Flag => Vec::new(),
            FilterValue::Single(v) => vec![v.as_str()],
            FilterValue::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// Filters parsed from a location's query string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedFilters(BTreeMap<String, FilterValue>);

impl ParsedFilters {
    /// Parse a query string, with or without the leading `?`
    ///
    /// Uses `application/x-www-form-urlencoded` decoding: `+` is a space and
    /// percent escapes are decoded lossily. Empty keys are ignored.
    pub fn parse(search: &str) -> Self {
        debug!(%search, "ParsedFilters::parse: called");
        let trimmed = search.strip_prefix('?').unwrap_or(search);
        let mut map: BTreeMap<String, FilterValue> = BTreeMap::new();

        for pair in trimmed.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = match pair.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (pair, None),
            };
            let key = decode(raw_key);
            if key.is_empty() {
                continue;
            }
            let value = raw_value.map(decode);
            match map.get_mut(&key) {
                Some(existing) => existing.push(value),
                None => {
                    let entry = match value {
                        Some(v) => FilterValue::Single(v),
                        None => FilterValue::Flag,
                    };
                    map.insert(key, entry);
                }
            }
        }

        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    /// Flatten into `(key, value)` pairs for use as request query parameters
    ///
    /// Flags are emitted with an empty value; repeated keys are emitted once
    /// per value.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.0 {
            match value {
                FilterValue::Flag => pairs.push((key.clone(), String::new())),
                FilterValue::Single(v) => pairs.push((key.clone(), v.clone())),
                FilterValue::Multiple(vs) => pairs.extend(vs.iter().map(|v| (key.clone(), v.clone()))),
            }
        }
        pairs
    }
}

fn decode(raw: &str) -> String {
    // Re-escape '=' so a value like `a=b` decodes as a single component
    url::form_urlencoded::parse(format!("{}=", raw.replace('=', "%3D")).as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_single_value() {
        let filters = ParsedFilters::parse("?cluster=prod");
        assert_eq!(filters.len(), 1);
        assert_eq!(filters.get("cluster"), Some(&FilterValue::Single("prod".to_string())));
    }

    #[test]
    fn test_parse_without_question_mark() {
        let filters = ParsedFilters::parse("cluster=prod&namespace=default");
        assert_eq!(filters.len(), 2);
        assert_eq!(filters.get("namespace"), Some(&FilterValue::Single("default".to_string())));
    }

    #[test]
    fn test_parse_repeated_key() {
        let filters = ParsedFilters::parse("?cluster=prod&cluster=staging&cluster=dev");
        assert_eq!(
            filters.get("cluster"),
            Some(&FilterValue::Multiple(vec![
                "prod".to_string(),
                "staging".to_string(),
                "dev".to_string()
            ]))
        );
    }

    #[test]
    fn test_parse_flag() {
        let filters = ParsedFilters::parse("?deleted&cluster=prod");
        assert_eq!(filters.get("deleted"), Some(&FilterValue::Flag));
        assert!(filters.get("deleted").unwrap().values().is_empty());
    }

    #[test]
    fn test_parse_decodes_escapes() {
        let filters = ParsedFilters::parse("?policy%20name=Latest+tag&q=a%2Bb");
        assert_eq!(filters.get("policy name"), Some(&FilterValue::Single("Latest tag".to_string())));
        assert_eq!(filters.get("q"), Some(&FilterValue::Single("a+b".to_string())));
    }

    #[test]
    fn test_parse_empty() {
        assert!(ParsedFilters::parse("").is_empty());
        assert!(ParsedFilters::parse("?").is_empty());
        assert!(ParsedFilters::parse("?&&=x").is_empty());
    }

    #[test]
    fn test_serializes_like_query_string_object() {
        let filters = ParsedFilters::parse("?cluster=prod&cluster=dev&deleted&ns=web");
        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cluster": ["prod", "dev"], "deleted": null, "ns": "web"})
        );
    }

    #[test]
    fn test_to_query_pairs() {
        let filters = ParsedFilters::parse("?cluster=prod&cluster=dev&deleted");
        assert_eq!(
            filters.to_query_pairs(),
            vec![
                ("cluster".to_string(), "prod".to_string()),
                ("cluster".to_string(), "dev".to_string()),
                ("deleted".to_string(), String::new()),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_single_pairs_survive(key in "[a-z]{1,8}", value in "[a-zA-Z0-9]{1,12}") {
            let filters = ParsedFilters::parse(&format!("?{}={}", key, value));
            prop_assert_eq!(filters.get(&key), Some(&FilterValue::Single(value)));
        }
    }
}
