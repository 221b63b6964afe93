//! CLI interface for DevTeam
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DevTeam orchestration engine
///
/// Turns a natural-language request into a plan, generated code and a
/// reviewed result by routing it through a team of LLM-backed workers.
#[derive(Parser, Debug)]
#[command(name = "devteam")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP/WebSocket server
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one task in-process and print the result
    Run {
        /// The task to execute
        task: String,

        /// Attach a local file (image, video or PDF)
        #[arg(long = "attach", value_name = "FILE")]
        attachments: Vec<PathBuf>,

        /// Prior conversation line, e.g. "User: hi"
        #[arg(long = "history", value_name = "LINE")]
        history: Vec<String>,

        /// Print every worker delta as it arrives
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show recently finished sessions
    History {
        /// Number of sessions to show (default: 10)
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Check configuration and provider availability
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "devteam",
            "run",
            "build a snake game",
            "--attach",
            "a.png",
            "--attach",
            "b.mp4",
            "--history",
            "User: hi",
            "--verbose",
        ])
        .unwrap();

        match cli.command {
            Command::Run {
                task,
                attachments,
                history,
                verbose,
            } => {
                assert_eq!(task, "build a snake game");
                assert_eq!(attachments, vec![PathBuf::from("a.png"), PathBuf::from("b.mp4")]);
                assert_eq!(history, vec!["User: hi".to_string()]);
                assert!(verbose);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["devteam", "history", "--limit", "3", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::History { limit: 3 }));
    }

    #[test]
    fn test_serve_overrides_are_optional() {
        let cli = Cli::try_parse_from(["devteam", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Command::Serve { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            other => panic!("expected serve, got {:?}", other),
        }
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::try_parse_from(["devteam", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Path
            }
        ));
    }
}
