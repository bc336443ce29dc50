//! Command-line interface of registryd.
//!
//! One binary runs the daemon (`registryd` or `registryd run`) and the
//! commands that inspect a running daemon through its control socket.

mod commands;
mod output;

use clap::Parser;
pub use commands::{Cli, Commands, InspectTarget};

use crate::error::RegistryError;

/// Parses the command line and executes the command.
///
/// # Errors
///
/// Returns an error if the command fails.
pub fn run() -> Result<(), RegistryError> {
    let cli = Cli::parse();
    cli.execute()
}
