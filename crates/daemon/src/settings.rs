//! Daemon settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `linecount.toml`, then `LINECOUNT__*` environment variables
//! (`LINECOUNT__RPC__PORT=9700`, `LINECOUNT__IO_BACKEND=gpio`, ...).

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File, FileFormat};
use linecount_core::application::{PauseSchedule, PauseTrigger};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "linecount.toml";
const DEFAULT_DATABASE_URL: &str = "sqlite://~/.linecount/linecount.db";
const DEFAULT_LOG_DIR: &str = "~/.linecount/logs";
const DEFAULT_SIMULATED_RATE: u32 = 6000;

/// Which `LineIo` adapter drives the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoBackend {
    Simulated,
    Gpio,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub io_backend: IoBackend,
    /// Units per hour produced by the simulated line
    pub simulated_rate: u32,
    pub log_dir: String,
    pub rpc: RpcSettings,
    pub gpio: GpioSettings,
    pub pause_triggers: Vec<PauseTriggerSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GpioSettings {
    pub base_path: String,
    pub counter_pin: u32,
    pub gate_pin: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PauseTriggerSettings {
    pub label: String,
    /// "HH:MM", local time
    pub at: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            io_backend: IoBackend::Simulated,
            simulated_rate: DEFAULT_SIMULATED_RATE,
            log_dir: DEFAULT_LOG_DIR.to_string(),
            rpc: RpcSettings::default(),
            gpio: GpioSettings::default(),
            pause_triggers: PauseSchedule::default()
                .triggers()
                .iter()
                .map(|t| PauseTriggerSettings {
                    label: t.label.clone(),
                    at: t.at.format("%H:%M").to_string(),
                })
                .collect(),
        }
    }
}

impl Default for RpcSettings {
    fn default() -> Self {
        let rpc = linecount_api_rpc::RpcServerConfig::default();
        Self {
            host: rpc.host,
            port: rpc.port,
        }
    }
}

impl Default for GpioSettings {
    fn default() -> Self {
        let gpio = linecount_infra_system::GpioConfig::default();
        Self {
            base_path: gpio.base_path.to_string_lossy().into_owned(),
            counter_pin: gpio.counter_pin,
            gate_pin: gpio.gate_pin,
        }
    }
}

impl Settings {
    /// Load from `LINECOUNT_CONFIG` (or `./linecount.toml`) and the environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("LINECOUNT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let builder = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("LINECOUNT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        let settings = Self::from_config(builder.build())
            .with_context(|| format!("Invalid configuration (file: {})", path))?;
        Ok(settings.expanded())
    }

    fn from_config(config: Result<Config, ConfigError>) -> Result<Self, ConfigError> {
        config?.try_deserialize()
    }

    /// Parse settings from a TOML document (no environment layer)
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build();
        Ok(Self::from_config(config)?.expanded())
    }

    /// Expand `~` in every path-like setting
    fn expanded(mut self) -> Self {
        self.database_url = match self.database_url.strip_prefix("sqlite://") {
            Some(path) => format!("sqlite://{}", shellexpand::tilde(path)),
            None => shellexpand::tilde(&self.database_url).into_owned(),
        };
        self.log_dir = shellexpand::tilde(&self.log_dir).into_owned();
        self.gpio.base_path = shellexpand::tilde(&self.gpio.base_path).into_owned();
        self
    }

    /// Filesystem path of the database file, `None` for in-memory databases
    pub fn database_file(&self) -> Option<PathBuf> {
        if self.database_url.contains(":memory:") || self.database_url.contains("mode=memory") {
            return None;
        }
        let path = self
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or(path);
        Some(PathBuf::from(path))
    }

    pub fn pause_schedule(&self) -> Result<PauseSchedule> {
        let triggers = self
            .pause_triggers
            .iter()
            .map(|t| {
                PauseTrigger::parse(t.label.clone(), &t.at)
                    .with_context(|| format!("Invalid pause trigger '{}'", t.label))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PauseSchedule::new(triggers))
    }
}
