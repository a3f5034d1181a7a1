use anyhow::Result;
use clap::Parser;
use meetsync::{
    app,
    cli::{handle_meeting_command, handle_status_command, Cli, CliCommand},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("Meetsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Meeting(args)) => handle_meeting_command(args).await,
        Some(CliCommand::Status) => handle_status_command().await,
        Some(CliCommand::Serve(args)) => app::run_service(args.meeting).await,
        None => app::run_service(None).await,
    }
}
