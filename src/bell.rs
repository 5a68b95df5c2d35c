//! Bell sound playback.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::DriverError;

#[cfg(target_os = "macos")]
const DEFAULT_PLAYER: &str = "afplay";
#[cfg(not(target_os = "macos"))]
const DEFAULT_PLAYER: &str = "paplay";

/// Plays a sound file without waiting for it to finish.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, sound: &Path) -> Result<(), DriverError>;
}

/// Runs an external program with the sound path as its argument.
#[derive(Debug, Clone)]
pub struct ProcessSoundPlayer {
    program: String,
}

impl ProcessSoundPlayer {
    /// `None` selects the platform's usual command-line player.
    pub fn new(program: Option<String>) -> Self {
        Self {
            program: program.unwrap_or_else(|| DEFAULT_PLAYER.to_string()),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SoundPlayer for ProcessSoundPlayer {
    fn play(&self, sound: &Path) -> Result<(), DriverError> {
        let mut child = Command::new(&self.program)
            .arg(sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let program = self.program.clone();
        tokio::spawn(async move {
            if let Err(e) = child.wait().await {
                tracing::debug!(program = %program, error = %e, "Bell player failed");
            }
        });
        Ok(())
    }
}
