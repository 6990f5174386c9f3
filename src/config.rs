//! Configuration for the style loader.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `STYLE_LOADER_` and use double
//! underscores to separate nested levels:
//! - `STYLE_LOADER_RELOAD__DEBOUNCE_MS=500` sets `reload.debounce_ms`
//! - `STYLE_LOADER_WATCH__FILE_POLL_INTERVAL_MS=1000` sets `watch.file_poll_interval_ms`
//! - `STYLE_LOADER_RELOAD__AUTO_RELOAD=false` sets `reload.auto_reload`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the settings file searched for in the current directory and its ancestors.
pub const SETTINGS_FILE: &str = "style-loader.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "STYLE_LOADER_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Filesystem polling
    #[serde(default)]
    pub watch: WatchConfig,

    /// Debounced document reloads
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Node tree observers
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// How often a watched file's timestamp is checked
    #[serde(default = "default_file_poll_interval_ms")]
    pub file_poll_interval_ms: u64,

    /// How often a watched directory is reconciled against its listing
    #[serde(default = "default_directory_poll_interval_ms")]
    pub directory_poll_interval_ms: u64,

    /// Glob or extension patterns for files inside watched directories.
    /// Empty means every file.
    #[serde(default)]
    pub file_filters: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReloadConfig {
    /// Reload the style document automatically on source changes
    #[serde(default = "default_true")]
    pub auto_reload: bool,

    /// Minimum spacing between two automatic reloads
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Period of the pending-reload check
    #[serde(default = "default_timer_interval_ms")]
    pub timer_interval_ms: u64,

    /// Granularity of the async driver loop
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ObserverConfig {
    /// Attribute names starting with this prefix belong to the style
    /// machinery itself and never trigger a reload
    #[serde(default = "default_reserved_attribute_prefix")]
    pub reserved_attribute_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every target (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `style_loader::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_true() -> bool { true }
fn default_file_poll_interval_ms() -> u64 { 2500 }
fn default_directory_poll_interval_ms() -> u64 { 10_000 }
fn default_debounce_ms() -> u64 { 2000 }
fn default_timer_interval_ms() -> u64 { 2000 }
fn default_tick_interval_ms() -> u64 { 250 }
fn default_reserved_attribute_prefix() -> String { "_q_stylesheet".to_string() }
fn default_log_level() -> String { "warn".to_string() }

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            reload: ReloadConfig::default(),
            observer: ObserverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            file_poll_interval_ms: default_file_poll_interval_ms(),
            directory_poll_interval_ms: default_directory_poll_interval_ms(),
            file_filters: Vec::new(),
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            auto_reload: true,
            debounce_ms: default_debounce_ms(),
            timer_interval_ms: default_timer_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            reserved_attribute_prefix: default_reserved_attribute_prefix(),
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
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_config().unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by searching from the current directory up to the root
    fn find_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(SETTINGS_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}
