//! CLI module for nvim-ui-driver.
//!
//! Subcommands:
//! - `attach`: Attach to a running Neovim as a UI and stream what it draws
//! - `info`: Print the Neovim version and the capabilities it would get

mod attach;
mod info;

use clap::{Parser, Subcommand};

pub use attach::AttachCommand;
pub use info::InfoCommand;

/// Neovim UI protocol driver
#[derive(Parser)]
#[command(name = "nvim-ui-driver")]
#[command(about = "Drive a Neovim instance through its UI protocol")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Attach as a UI and print actions and events as they arrive
    Attach(AttachCommand),

    /// Show the Neovim version and negotiated capabilities
    Info(InfoCommand),
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> color_eyre::Result<()> {
        match self.command {
            Command::Attach(cmd) => cmd.run().await,
            Command::Info(cmd) => cmd.run().await,
        }
    }
}
