//! cli subcommands for groundwave.
//!
//! - `groundwave serve` - run the web server
//! - `groundwave invites create` - create a signup invite
//! - `groundwave invites list` - list invites

mod invites;
mod serve;

pub use invites::InvitesCommand;
pub use serve::ServeCommand;

use clap::{Parser, Subcommand};

/// groundwave - single-tenant personal data server
#[derive(Parser, Debug)]
#[command(name = "groundwave")]
#[command(about = "Single-tenant personal data server", long_about = None)]
#[command(version, long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GROUNDWAVE_GIT_SHA"), ")"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run the web server
    Serve(ServeCommand),

    /// manage signup invites
    #[command(subcommand)]
    Invites(InvitesCommand),
}
