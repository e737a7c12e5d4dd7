//! Relay server command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "5000", env = "COLORWATCH_PORT")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "COLORWATCH_HOST")]
    pub host: String,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    println!();
    println!("  {} {}", "colorwatch".cyan().bold(), "Relay Server".bold());
    println!();
    println!("  {}     http://{}:{}", "Viewer".green(), args.host, args.port);
    println!("  {}     http://{}:{}/upload", "Upload".green(), args.host, args.port);
    println!("  {}  ws://{}:{}/ws", "WebSocket".green(), args.host, args.port);
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    colorwatch_web::run_server(&args.host, args.port).await?;

    Ok(())
}
