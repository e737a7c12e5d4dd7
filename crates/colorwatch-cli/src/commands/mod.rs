//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod detect;
pub mod serve;

/// Color presence detector and real-time relay
#[derive(Parser)]
#[command(name = "colorwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, env = "COLORWATCH_LOG")]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve(serve::ServeArgs),

    /// Watch a camera and notify the relay on presence changes
    Detect(detect::DetectArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve(args) => serve::execute(args).await,
            Commands::Detect(args) => detect::execute(args).await,
        }
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
    fn test_parse_detect() {
        let cli = Cli::try_parse_from([
            "colorwatch",
            "detect",
            "--source",
            "dir:frames",
            "--lower",
            "35,100,50",
            "--notify-mode",
            "queued",
            "--max-frames",
            "10",
        ])
        .unwrap();
        let Commands::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(args.max_frames, Some(10));
        assert!(args.lower.is_some());
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["colorwatch", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 5000);
        assert_eq!(args.host, "127.0.0.1");
    }
}
