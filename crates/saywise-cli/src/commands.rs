//! Subcommand definitions.

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Force a remote availability check and print the result
    Probe,

    /// List device voices and the one that would be selected
    Voices,

    /// Speak text through the full queue and fallback chain
    Say {
        /// Text to speak
        text: String,

        /// Jump the queue and bypass duplicate suppression
        #[arg(long)]
        priority: bool,

        /// Never use the remote service
        #[arg(long = "local-only")]
        local_only: bool,

        /// Print the run report and final state as JSON
        #[arg(long)]
        json: bool,
    },
}
