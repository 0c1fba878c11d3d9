//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use saywise_cli::handlers::{self, say::SayArgs};
use saywise_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let Some(command) = cli.command else {
        // No command provided - show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = handlers::load_config(cli.remote_url)?;

    match command {
        Commands::Probe => handlers::probe::execute(&config).await?,
        Commands::Voices => handlers::voices::execute(&config).await?,
        Commands::Say {
            text,
            priority,
            local_only,
            json,
        } => {
            handlers::say::execute(
                config,
                SayArgs {
                    text,
                    priority,
                    local_only,
                    json,
                },
            )
            .await?;
        }
    }

    Ok(())
}
