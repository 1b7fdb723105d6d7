//! Layered configuration for the tail service.
//!
//! Sources, weakest first:
//! - built-in defaults
//! - `.tailcast/settings.toml`, found by searching from the current
//!   directory upward
//! - environment variables prefixed with `TC_`, with `__` separating
//!   nesting levels
//!
//! # Environment Variables
//!
//! - `TC_ROOT=/var/log` sets `root`
//! - `TC_TAIL__INIT_LINES=25` sets `tail.init_lines`
//! - `TC_TAIL__POLL_INTERVAL_MS=250` sets `tail.poll_interval_ms`

use std::collections::HashMap;
use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

const SETTINGS_DIR: &str = ".tailcast";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory the service is confined to; requested names resolve
    /// under it and may not escape it.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default)]
    pub tail: TailConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Knobs of the follow engine and locator.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TailConfig {
    /// History lines replayed to a subscriber on attach.
    #[serde(default = "default_init_lines")]
    pub init_lines: usize,

    /// Fallback poll interval when no native event arrives.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Read granularity of the backward scan and the line reader.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Log filtering: a default level plus per-module overrides, e.g.
///
/// ```toml
/// [logging]
/// default = "warn"
///
/// [logging.modules]
/// "tailcast::tail" = "debug"
/// ```
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_root() -> PathBuf {
    PathBuf::from("/tmp")
}
fn default_init_lines() -> usize {
    10
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_chunk_size() -> usize {
    1024
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            root: default_root(),
            tail: TailConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            init_lines: default_init_lines(),
            poll_interval_ms: default_poll_interval_ms(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Self::config_path()).extract().map_err(Box::new)
    }

    /// Load from a specific file, still layering defaults and environment.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref().to_path_buf())
            .extract()
            .map_err(Box::new)
    }

    fn figment(config_path: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TC_").map(|key| {
                // Double underscore separates nesting levels; single
                // underscores stay inside field names.
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// The settings file in effect: the nearest ancestor `.tailcast/`
    /// directory, or one to be created in the current directory.
    pub fn config_path() -> PathBuf {
        Self::find_config()
            .unwrap_or_else(|| PathBuf::from(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    fn find_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let dir = ancestor.join(SETTINGS_DIR);
            if dir.is_dir() {
                return Some(dir.join(SETTINGS_FILE));
            }
        }
        None
    }

    /// Write the settings as TOML, creating the parent directory.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.root, PathBuf::from("/tmp"));
        assert_eq!(settings.tail.init_lines, 10);
        assert_eq!(settings.tail.poll_interval_ms, 100);
        assert_eq!(settings.tail.chunk_size, 1024);
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let mut settings = Settings::default();
        settings.root = PathBuf::from("/var/log");
        settings.tail.init_lines = 50;

        let text = toml::to_string_pretty(&settings).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.root, settings.root);
        assert_eq!(back.tail.init_lines, 50);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let back: Settings = toml::from_str("root = \"/data\"\n").unwrap();
        assert_eq!(back.root, PathBuf::from("/data"));
        assert_eq!(back.tail.poll_interval_ms, 100);
    }
}
