pub mod ask;
pub mod check;
pub mod clear;
pub mod config_cmd;
pub mod refresh;
pub mod status;

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "devpulse")]
#[command(version, about = "Engineering analytics dashboard with an LLM assistant")]
pub struct Cli {
    /// Path to devpulse.toml
    #[arg(
        long,
        global = true,
        env = "DEVPULSE_CONFIG",
        default_value = "devpulse.toml"
    )]
    pub config: PathBuf,

    /// Path to data directory (overrides config file)
    #[arg(long, global = true, env = "DEVPULSE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Show the fetch state of every platform
    Status(StatusArgs),
    /// Reset the context snapshot
    Clear,
    /// Ask the assistant a question against the local snapshot
    Ask(AskArgs),
    /// Fetch platform data and record it without serving
    Refresh(RefreshArgs),
    /// Verify credentials and reachability of each platform
    Check(CheckArgs),
    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// HTTP listen address (overrides config file)
    #[arg(long, env = "DEVPULSE_HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,

    /// Background refresh interval in seconds, 0 disables (overrides config file)
    #[arg(long, env = "DEVPULSE_REFRESH_INTERVAL")]
    pub refresh_interval: Option<u64>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print raw JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question
    pub question: String,

    /// Platform to focus on, or "all"
    #[arg(long, short, default_value = "all")]
    pub scope: String,
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Platform name, or "all" for every configured platform
    #[arg(default_value = "all")]
    pub target: String,

    /// Look-back in days (GitHub, Azure DevOps, Figma)
    #[arg(long)]
    pub days: Option<u32>,

    /// Look-back in hours (Datadog)
    #[arg(long)]
    pub hours: Option<u32>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Platform name, or "all" for every configured platform
    #[arg(default_value = "all")]
    pub target: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate devpulse.toml
    Validate,
    /// Show the effective configuration with secrets masked
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refresh_defaults() {
        let cli = Cli::try_parse_from(["devpulse", "refresh"]).unwrap();
        match cli.command {
            Commands::Refresh(args) => {
                assert_eq!(args.target, "all");
                assert!(args.days.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ask_with_scope_and_global_flags() {
        let cli = Cli::try_parse_from([
            "devpulse",
            "ask",
            "Which service logs the most errors?",
            "--scope",
            "datadog",
            "--data-dir",
            "/tmp/pulse",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/pulse")));
        match cli.command {
            Commands::Ask(args) => {
                assert_eq!(args.scope, "datadog");
                assert!(args.question.starts_with("Which service"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_check_target() {
        let cli = Cli::try_parse_from(["devpulse", "check", "datadog"]).unwrap();
        match cli.command {
            Commands::Check(args) => assert_eq!(args.target, "datadog"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "devpulse",
            "serve",
            "--http-addr",
            "127.0.0.1:9000",
            "--refresh-interval",
            "600",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.http_addr.map(|a| a.port()), Some(9000));
                assert_eq!(args.refresh_interval, Some(600));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
