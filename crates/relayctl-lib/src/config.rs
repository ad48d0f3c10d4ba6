//! Host configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::{BANKS_MAX, BANKS_MIN, BoardLayout, BoardVariant};

/// First lines of a file written by `relayctl config --init`.
const CONFIG_HEADER: &str = "# relayctl host configuration\n# board: relay4 | relay8 | shift-register\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Board topology. Default: "relay4".
    #[serde(default = "default_board")]
    pub board: BoardVariant,

    /// Shift-register bank count (ignored for direct-GPIO boards). Default: 1.
    #[serde(default = "default_banks")]
    pub banks: usize,

    /// Host loop cadence in milliseconds between `tick` calls. Default: 50.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Snapshot document applied at startup. Empty = none.
    #[serde(default)]
    pub state_file: String,
}

fn default_board() -> BoardVariant {
    BoardVariant::Relay4
}
fn default_banks() -> usize {
    1
}
fn default_tick_interval_ms() -> u64 {
    50
}

impl Default for Config {
    fn default() -> Self {
        Config {
            board: default_board(),
            banks: default_banks(),
            tick_interval_ms: default_tick_interval_ms(),
            state_file: String::new(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `banks` is outside the supported range for a shift-register board.
    BanksOutOfRange(usize),
    /// `tick_interval_ms` is zero.
    ZeroTickInterval,
    /// `state_file` points at a file that does not exist.
    MissingStateFile(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BanksOutOfRange(n) => {
                write!(f, "Bank count {n} is outside {BANKS_MIN}..={BANKS_MAX}")
            }
            ValidationError::ZeroTickInterval => write!(f, "Tick interval cannot be zero"),
            ValidationError::MissingStateFile(path) => {
                write!(f, "State file not found: {path}")
            }
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("relayctl"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Write this config as TOML to `path`, creating parent directories.
    ///
    /// The file is staged next to `path` and renamed over it, so readers
    /// never see a half-written config.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let body = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let staged = path.with_extension("toml.tmp");
        std::fs::write(&staged, format!("{CONFIG_HEADER}{body}"))?;
        std::fs::rename(&staged, path).inspect_err(|_| {
            let _ = std::fs::remove_file(&staged);
        })
    }

    /// Board layout described by this config (bank count clamped).
    pub fn layout(&self) -> BoardLayout {
        BoardLayout::new(self.board, self.banks)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.board.is_shift_register() && !(BANKS_MIN..=BANKS_MAX).contains(&self.banks) {
            errors.push(ValidationError::BanksOutOfRange(self.banks));
        }

        if self.tick_interval_ms == 0 {
            errors.push(ValidationError::ZeroTickInterval);
        }

        let state_file = self.state_file.trim();
        if !state_file.is_empty() && !Path::new(state_file).exists() {
            errors.push(ValidationError::MissingStateFile(state_file.to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Read the configured state file, if any.
    pub fn read_state_file(&self) -> crate::error::Result<Option<String>> {
        let state_file = self.state_file.trim();
        if state_file.is_empty() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(state_file)?))
    }
}
