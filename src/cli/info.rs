//! Info subcommand - report the engine version.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use serde_json::json;

use crate::attach::{negotiate, ApiVersion};
use crate::nvim::{NvimApi, RpcSession};

/// Show what the driver would negotiate with a running Neovim.
#[derive(Parser)]
pub struct InfoCommand {
    /// Socket Neovim listens on (`nvim --listen <path>`).
    #[arg(long)]
    pub socket: PathBuf,

    /// Print as JSON.
    #[arg(long)]
    pub json: bool,
}

impl InfoCommand {
    /// Run the info command.
    pub async fn run(self) -> Result<()> {
        let (session, _events) = RpcSession::connect_unix(&self.socket).await?;
        let info = session.get_api_info().await?;
        let version = ApiVersion::from_api_info(&info)?;
        let capabilities = negotiate(version);

        if self.json {
            let output = match &capabilities {
                Ok(caps) => json!({ "version": version, "capabilities": caps }),
                Err(e) => json!({ "version": version, "error": e.to_string() }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("Neovim {}", version);
        match capabilities {
            Ok(caps) => {
                println!("  rgb:                {}", caps.rgb);
                println!("  popupmenu_external: {}", caps.popupmenu_external);
                println!("  ext_tabline:        {}", caps.ext_tabline);
            }
            Err(e) => println!("  {}", e),
        }
        Ok(())
    }
}
