//! Root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for exercising saywise speech output.
#[derive(Parser)]
#[command(name = "saywise")]
#[command(about = "Speak text through a premium remote voice with device fallback")]
#[command(version)]
pub struct Cli {
    /// Remote synthesis endpoint (overrides SAYWISE_REMOTE_URL)
    #[arg(long = "remote-url", global = true, env = "SAYWISE_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "saywise",
            "--verbose",
            "--remote-url",
            "https://voice.example/speech",
            "probe",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.remote_url.as_deref(), Some("https://voice.example/speech"));
        assert!(matches!(cli.command, Some(Commands::Probe)));
    }
}
