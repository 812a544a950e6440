//! Configuration file: `gamepauser.toml` next to the executable.
//!
//! ```toml
//! pause_key = "P"
//! modifiers = "Ctrl+Alt"
//!
//! [replay]
//! settle_ms = 380
//! attach_settle_ms = 15
//! gap_jitter_ms = [18, 45]
//! keypress_jitter_ms = [8, 22]
//! ```
//!
//! Every field is optional. A missing file is created with the defaults.

use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::keys::{self, Hotkey, Modifiers};

pub const FILE_NAME: &str = "gamepauser.toml";

const DEFAULT_FILE: &str = "\
# GamePauser configuration
# Hotkey to pause/resume the current foreground process.

# Examples of valid keys: P, Pause, F24, Space, Enter, Esc
# Valid modifiers: Ctrl, Alt, Shift, Win (combine with +)

pause_key = \"P\"
modifiers = \"Ctrl+Alt\"

# Replay pacing in milliseconds.
# [replay]
# settle_ms = 380
# attach_settle_ms = 15
# gap_jitter_ms = [18, 45]
# keypress_jitter_ms = [8, 22]
";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub pause_key: String,
    pub modifiers: String,
    pub replay: ReplayTiming,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pause_key: "P".into(),
            modifiers: "Ctrl+Alt".into(),
            replay: ReplayTiming::default(),
        }
    }
}

/// Pacing of synthesized input, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayTiming {
    /// Wait after resuming before the first injected event.
    pub settle_ms: u64,
    /// Wait after attaching to the foreground input queue.
    pub attach_settle_ms: u64,
    /// Gap between unrelated events, `[min, max]`.
    pub gap_jitter_ms: [u64; 2],
    /// Gap between a key's press and its immediate release, `[min, max]`.
    pub keypress_jitter_ms: [u64; 2],
}

impl Default for ReplayTiming {
    fn default() -> Self {
        Self {
            settle_ms: 380,
            attach_settle_ms: 15,
            gap_jitter_ms: [18, 45],
            keypress_jitter_ms: [8, 22],
        }
    }
}

impl ReplayTiming {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn attach_settle(&self) -> Duration {
        Duration::from_millis(self.attach_settle_ms)
    }

    pub fn gap_range(&self) -> RangeInclusive<u64> {
        self.gap_jitter_ms[0]..=self.gap_jitter_ms[1]
    }

    pub fn keypress_range(&self) -> RangeInclusive<u64> {
        self.keypress_jitter_ms[0]..=self.keypress_jitter_ms[1]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, [min, max]) in [
            ("gap_jitter_ms", self.gap_jitter_ms),
            ("keypress_jitter_ms", self.keypress_jitter_ms),
        ] {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "replay.{name}: minimum {min} exceeds maximum {max}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// `gamepauser.toml` in the executable's directory.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(|source| ConfigError::Io {
        path: PathBuf::from(FILE_NAME),
        source,
    })?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(FILE_NAME))
}

impl Config {
    /// Loads `path`, first writing a default file if none exists.
    ///
    /// Failing to write the default file is not fatal; the defaults are used.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            match fs::write(path, DEFAULT_FILE) {
                Ok(()) => log::info!("config: created default {}", path.display()),
                Err(e) => {
                    log::warn!("config: cannot create {}: {e}; using defaults", path.display());
                    return Ok(Self::default());
                }
            }
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parses TOML text; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.replay.validate()?;
        Ok(config)
    }

    /// The hotkey described by `pause_key` and `modifiers`.
    ///
    /// An unknown key name falls back to P.
    pub fn hotkey(&self) -> Hotkey {
        let vk = keys::parse_key_name(&self.pause_key).unwrap_or_else(|| {
            log::warn!("config: unknown pause_key {:?}, using P", self.pause_key);
            keys::VK_P
        });
        Hotkey {
            vk,
            modifiers: Modifiers::parse(&self.modifiers),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
