//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use sp_core::{DEFAULT_UTC_OFFSET_MINUTES, IdStyle, NormalizeOptions};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the task database.
    pub database_path: PathBuf,

    /// Offset of emitted timestamps, in minutes east of UTC.
    pub utc_offset_minutes: i32,

    /// Fail on dropped lines instead of skipping them.
    pub strict: bool,

    /// How record ids are stored.
    pub id_style: IdStyle,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("skillpulse.db"),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            strict: false,
            id_style: IdStyle::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SP_*)
        figment = figment.merge(Env::prefixed("SP_"));

        figment.extract()
    }

    /// Normalization options for one run. `--strict` wins over the config.
    pub const fn normalize_options(&self, strict_flag: bool) -> NormalizeOptions {
        NormalizeOptions {
            utc_offset_minutes: self.utc_offset_minutes,
            strict: self.strict || strict_flag,
        }
    }
}

/// Returns the platform-specific config directory for skillpulse.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("skillpulse"))
}

/// Returns the platform-specific data directory for skillpulse.
///
/// On Linux: `~/.local/share/skillpulse`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("skillpulse"))
}
