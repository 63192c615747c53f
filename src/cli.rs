//! CLI argument parsing for the lastmile-router binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lastmile-router", about = "Depot-based delivery fleet routing service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,
}
