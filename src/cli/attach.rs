//! Attach subcommand - run the driver against a live Neovim.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use futures::stream::{self, BoxStream, StreamExt};
use futures::FutureExt;
use serde::Serialize;

use crate::buffer::BufferUpdate;
use crate::config::Config;
use crate::context::EventContext;
use crate::driver::UiDriver;
use crate::events::DriverEvents;
use crate::nvim::{RpcSession, Session};
use crate::plugin::YankInfo;
use crate::redraw::{PopupMenuState, TablineState, UiAction};

/// Attach to a running Neovim as a UI.
#[derive(Parser)]
pub struct AttachCommand {
    /// Socket Neovim listens on (`nvim --listen <path>`).
    #[arg(long)]
    pub socket: PathBuf,

    /// Width of the UI area in pixels.
    #[arg(long, default_value = "800")]
    pub width: f64,

    /// Height of the UI area in pixels.
    #[arg(long, default_value = "600")]
    pub height: f64,

    /// Print one JSON object per line instead of debug output.
    #[arg(long)]
    pub json: bool,
}

/// One line of output.
#[derive(Debug, Serialize)]
#[serde(tag = "feed", content = "data", rename_all = "snake_case")]
enum Output {
    Action(UiAction),
    RedrawComplete,
    Title(String),
    Tabline(TablineState),
    Mode(String),
    ShowPopupMenu(PopupMenuState),
    SelectPopupMenu(i64),
    HidePopupMenu,
    ScrollSettled(EventContext),
    Yank(YankInfo),
    BufferUpdate(BufferUpdate),
    Command(String),
    DirectoryChanged(String),
    Event { name: String },
    Leave,
    Error { message: String, fatal: bool },
}

impl Output {
    /// Error that ends the session, if this output is one.
    fn fatal_error(&self) -> Option<color_eyre::Report> {
        match self {
            Output::Error {
                message,
                fatal: true,
            } => Some(color_eyre::eyre::eyre!("{}", message)),
            _ => None,
        }
    }
}

fn outputs(events: &DriverEvents) -> BoxStream<'static, Output> {
    stream::select_all(vec![
        events.ui_actions.stream().map(Output::Action).boxed(),
        events
            .redraw_complete
            .stream()
            .map(|_| Output::RedrawComplete)
            .boxed(),
        events.title.stream().map(Output::Title).boxed(),
        events.tabline.stream().map(Output::Tabline).boxed(),
        events.mode_changed.stream().map(Output::Mode).boxed(),
        events
            .show_popup_menu
            .stream()
            .map(Output::ShowPopupMenu)
            .boxed(),
        events
            .select_popup_menu
            .stream()
            .map(Output::SelectPopupMenu)
            .boxed(),
        events
            .hide_popup_menu
            .stream()
            .map(|_| Output::HidePopupMenu)
            .boxed(),
        events
            .scroll_settled
            .stream()
            .map(Output::ScrollSettled)
            .boxed(),
        events.yank.stream().map(Output::Yank).boxed(),
        events
            .buffer_update
            .stream()
            .map(Output::BufferUpdate)
            .boxed(),
        events
            .external_command
            .stream()
            .map(Output::Command)
            .boxed(),
        events
            .directory_changed
            .stream()
            .map(Output::DirectoryChanged)
            .boxed(),
        events
            .event
            .stream()
            .map(|e| Output::Event { name: e.name })
            .boxed(),
        events.leave.stream().map(|_| Output::Leave).boxed(),
        events
            .error
            .stream()
            .map(|e| Output::Error {
                message: e.to_string(),
                fatal: e.is_fatal(),
            })
            .boxed(),
    ])
    .boxed()
}

impl AttachCommand {
    /// Run the attach command until Neovim exits or Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let (session, session_events) = RpcSession::connect_unix(&self.socket).await?;
        let driver = UiDriver::new(Arc::new(session) as Arc<dyn Session>, config);

        let mut outputs = outputs(driver.events());
        let outcome = driver.resize(self.width, self.height);
        tracing::debug!(?outcome, "Initial geometry");

        let capabilities = driver.start().await?;
        tracing::info!(?capabilities, geometry = ?driver.geometry(), "Attached");

        let runner = driver.clone();
        let mut run = tokio::spawn(async move { runner.run(session_events).await });

        loop {
            tokio::select! {
                Some(output) = outputs.next() => {
                    self.print(&output)?;
                    if let Some(error) = output.fatal_error() {
                        self.flush(&mut outputs)?;
                        return Err(error);
                    }
                }
                _ = &mut run => break,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, asking Neovim to quit");
                    driver.quit().await?;
                }
            }
        }

        self.flush(&mut outputs)?;
        Ok(())
    }

    /// Print whatever the last notifications produced.
    fn flush(&self, outputs: &mut BoxStream<'static, Output>) -> Result<()> {
        while let Some(Some(output)) = outputs.next().now_or_never() {
            self.print(&output)?;
            if let Some(error) = output.fatal_error() {
                return Err(error);
            }
        }
        Ok(())
    }

    fn print(&self, output: &Output) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(output)?);
        } else {
            println!("{:?}", output);
        }
        Ok(())
    }
}
