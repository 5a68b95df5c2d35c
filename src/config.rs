//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. User config: `~/.config/nvim-ui-driver/config.toml` (XDG) or platform config dir
//! 3. Project config: `.nvim-ui-driver.toml`
//! 4. Environment variables: `NVIM_UI_DRIVER_*` (nested keys split on `__`)
//!
//! # Example
//!
//! ```toml
//! [font]
//! family = "Fira Code"
//! size = 14.0
//! line_padding = 2.0
//!
//! [debug]
//! fixed_size = { rows = 40, cols = 120 }
//!
//! [bell]
//! sound = "/usr/share/sounds/freedesktop/stereo/bell.oga"
//! player = "paplay"
//!
//! [nvim]
//! init_file = "~/.config/oni/init.vim"
//!
//! [buffer]
//! max_lines = 5000
//! ```

use std::ops::Deref;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Default ceiling for full buffer updates.
pub const DEFAULT_MAX_LINES: i64 = 5000;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub font: FontConfig,
    pub debug: DebugConfig,
    pub bell: BellConfig,
    pub nvim: NvimConfig,
    pub buffer: BufferConfig,
    pub ui: UiConfig,
}

/// Editor font settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Font family name (e.g., "Consolas").
    pub family: String,
    /// Font size in pixels.
    pub size: f64,
    /// Extra vertical pixels added to every line.
    pub line_padding: f64,
    /// Cell width as a fraction of the font size, for monospace fonts
    /// measured without a real font backend.
    pub cell_width_ratio: f64,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "monospace".to_string(),
            size: 12.0,
            line_padding: 2.0,
            cell_width_ratio: 0.6,
        }
    }
}

/// Fixed grid size used instead of the pixel-derived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedSize {
    pub rows: i64,
    pub cols: i64,
}

/// Debug-only overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// When set, every resize uses this size instead of the computed one.
    pub fixed_size: Option<FixedSize>,
}

/// Bell sound settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BellConfig {
    /// Sound file played on `bell`. No sound when unset.
    pub sound: Option<PathBuf>,
    /// Program invoked with the sound path as its only argument.
    pub player: Option<String>,
}

/// Engine-side settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NvimConfig {
    /// Init file sourced after attach.
    pub init_file: Option<PathBuf>,
}

impl NvimConfig {
    /// Init file path with a leading `~` expanded to the home directory.
    pub fn resolved_init_file(&self) -> Option<PathBuf> {
        let path = self.init_file.as_ref()?;
        match path.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
            Err(_) => Some(path.clone()),
        }
    }
}

/// Buffer synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Full updates whose end line exceeds this are dropped.
    pub max_lines: i64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// UI timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Delay before a scroll-settled event fires.
    pub scroll_debounce_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            scroll_debounce_ms: 50,
        }
    }
}

impl Config {
    /// Load config with layered resolution (defaults → user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment(&Self::user_config_path(), Path::new(".nvim-ui-driver.toml"))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Build the layered figment from explicit file locations.
    pub fn figment(user_config: &Path, project_config: &Path) -> Figment {
        Figment::new()
            // Layer 1: Built-in defaults (lowest priority)
            .merge(Serialized::defaults(Config::default()))
            // Layer 2: User config
            .merge(Toml::file(user_config))
            // Layer 3: Project config
            .merge(Toml::file(project_config))
            // Layer 4: Environment variables (highest priority)
            .merge(Env::prefixed("NVIM_UI_DRIVER_").split("__"))
    }

    /// User config path: ~/.config/nvim-ui-driver/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home
                .join(".config")
                .join("nvim-ui-driver")
                .join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        // Fall back to platform-specific config dir
        dirs::config_dir()
            .map(|p| p.join("nvim-ui-driver").join("config.toml"))
            .unwrap_or_default()
    }
}
