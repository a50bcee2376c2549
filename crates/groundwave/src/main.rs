//! groundwave - single-tenant personal data server

use clap::Parser;
use color_eyre::eyre::Result;
use groundwave::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => cmd.run().await,
        Command::Invites(cmd) => cmd.run().await,
    }
}
