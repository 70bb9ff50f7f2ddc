mod chat;
mod cli;
mod config;
mod http;
mod llm;
mod metrics;
mod refresh;
mod serve;

use clap::Parser;
use cli::{Cli, Commands};
use config::DevPulseConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Config(cmd) => return cli::config_cmd::run(cmd, &cli.config),
        other => other,
    };

    let mut config = DevPulseConfig::load_or_default(&cli.config);
    config.apply_env();
    if let Some(dir) = cli.data_dir {
        config.server.data_dir = dir;
    }

    match command {
        Commands::Serve(args) => {
            if let Some(addr) = args.http_addr {
                config.server.http_addr = addr;
            }
            if let Some(secs) = args.refresh_interval {
                config.server.refresh_interval_secs = secs;
            }
            serve::run(config).await
        }
        Commands::Status(args) => cli::status::run(&config, args.json),
        Commands::Clear => cli::clear::run(&config),
        Commands::Ask(args) => cli::ask::run(&config, &args.question, &args.scope).await,
        Commands::Refresh(args) => cli::refresh::run(&config, args).await,
        Commands::Check(args) => cli::check::run(&config, args).await,
        Commands::Config(_) => Ok(()),
    }
}
