//! CLI command definitions and stdin command protocol

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::LocationEvent;

/// alertsync - location-driven alert polling coordinator
#[derive(Parser)]
#[command(
    name = "alertsync",
    about = "Location-driven alert polling coordinator",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/alertsync/logs/alertsync.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level override (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, global = true, help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive the coordinator from JSON-line commands on stdin
    Watch {
        /// Backend base URL (overrides server.base-url)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Parse a query string and print the filters as JSON
    Filters {
        /// Query string, with or without the leading '?'
        search: String,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// One line of `watch` input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StdinCommand {
    /// Navigation
    Location(LocationEvent),

    /// Select or clear the current policy
    SelectPolicy {
        #[serde(rename = "policy-id", default)]
        policy_id: Option<String>,
    },

    /// Fetch one alert by identifier
    FetchAlert {
        #[serde(rename = "alert-id")]
        alert_id: String,
    },
}

impl StdinCommand {
    /// Parse one input line; blank lines yield `None`
    pub fn parse_line(line: &str) -> Option<Result<Self, serde_json::Error>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(serde_json::from_str(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_with_globals() {
        let cli = Cli::parse_from([
            "alertsync",
            "-l",
            "DEBUG",
            "watch",
            "--base-url",
            "http://central:8080",
            "-c",
            "/tmp/a.yml",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.yml")));
        match cli.command {
            Command::Watch { base_url } => assert_eq!(base_url.as_deref(), Some("http://central:8080")),
            _ => panic!("Expected watch"),
        }
    }

    #[test]
    fn test_parse_location_line() {
        let cmd = StdinCommand::parse_line(r#"{"type":"location","pathname":"/main/violations","search":"?a=1"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(cmd, StdinCommand::Location(LocationEvent::new("/main/violations", "?a=1")));
    }

    #[test]
    fn test_parse_location_without_search() {
        let cmd = StdinCommand::parse_line(r#"{"type":"location","pathname":"/main/dashboard"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(cmd, StdinCommand::Location(LocationEvent::new("/main/dashboard", "")));
    }

    #[test]
    fn test_parse_select_policy() {
        let cmd = StdinCommand::parse_line(r#"{"type":"select-policy","policy-id":"p-1"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            StdinCommand::SelectPolicy {
                policy_id: Some("p-1".to_string())
            }
        );

        let cleared = StdinCommand::parse_line(r#"{"type":"select-policy","policy-id":null}"#)
            .unwrap()
            .unwrap();
        assert_eq!(cleared, StdinCommand::SelectPolicy { policy_id: None });
    }

    #[test]
    fn test_parse_fetch_alert() {
        let cmd = StdinCommand::parse_line(r#"{"type":"fetch-alert","alert-id":"a-9"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            StdinCommand::FetchAlert {
                alert_id: "a-9".to_string()
            }
        );
    }

    #[test]
    fn test_blank_and_bad_lines() {
        assert!(StdinCommand::parse_line("   ").is_none());
        assert!(StdinCommand::parse_line(r#"{"type":"teleport"}"#).unwrap().is_err());
    }
}
