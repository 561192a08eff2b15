//! CLI command definitions and dispatch.

mod build;
mod version;

use clap::{Parser, Subcommand};

/// dockrun — build container images from a local context directory.
#[derive(Parser)]
#[command(name = "dockrun", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Build an image from the files in a context directory
    Build(build::BuildArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build(args) => build::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
