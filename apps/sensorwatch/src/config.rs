//! # Configuration
//!
//! `sensorwatch.toml`, overridable from the environment.
//!
//! ```toml
//! rpc_url = "http://127.0.0.1:8545"
//! contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
//! device_id = "device-01"
//!
//! [source]
//! poll_interval_ms = 2000
//! max_block_range = 1000
//! lookup_concurrency = 8
//! max_poll_failures = 5
//!
//! [series]
//! dedup_window = 128
//!
//! [display]
//! time_format = "%H.%M.%S"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```
//!
//! ## Environment Variables
//!
//! - `SENSORWATCH_CONTRACT_ADDRESS` (fallback `CONTRACT_ADDRESS`)
//! - `SENSORWATCH_RPC_URL` (fallback `ETH_RPC_URL`)
//! - `SENSORWATCH_DEVICE_ID`

use crate::error::ConfigError;
use crate::source::SourceSettings;
use sensorwatch_core::primitives::{
    DEFAULT_DEDUP_WINDOW, DEFAULT_DEVICE_ID, DEFAULT_TIME_FORMAT, MAX_DEDUP_WINDOW,
};
use sensorwatch_core::{
    BlockNumber, ContractAddress, DeviceId, DisplayClock, Lifecycle, Normalizer,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "sensorwatch.toml";

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_MAX_BLOCK_RANGE: u64 = 1000;
const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;
const DEFAULT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_MAX_POLL_FAILURES: u32 = 5;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// Upper bound for in-flight block lookups.
const MAX_LOOKUP_CONCURRENCY: usize = 256;

// =============================================================================
// FILE FORMAT
// =============================================================================

/// Contents of `sensorwatch.toml`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub rpc_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub device_id: String,
    pub source: SourceConfig,
    pub series: SeriesConfig,
    pub display: DisplayConfig,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract_address: None,
            device_id: DEFAULT_DEVICE_ID.to_string(),
            source: SourceConfig::default(),
            series: SeriesConfig::default(),
            display: DisplayConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub poll_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_block: Option<u64>,
    pub max_block_range: u64,
    pub lookup_concurrency: usize,
    pub channel_capacity: usize,
    /// Consecutive failed polls before the session is ended.
    pub max_poll_failures: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            start_block: None,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeriesConfig {
    pub dedup_window: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Fixed UTC offset; the host's local offset when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
    pub time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: None,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Load configuration and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `sensorwatch.toml` is read
    /// when present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file without environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            field: "config",
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(address) =
            non_empty("SENSORWATCH_CONTRACT_ADDRESS").or_else(|| non_empty("CONTRACT_ADDRESS"))
        {
            self.contract_address = Some(address);
        }
        if let Some(url) = non_empty("SENSORWATCH_RPC_URL").or_else(|| non_empty("ETH_RPC_URL")) {
            self.rpc_url = url;
        }
        if let Some(device) = non_empty("SENSORWATCH_DEVICE_ID") {
            self.device_id = device;
        }
    }

    /// Validate and convert into runtime settings.
    pub fn resolve(&self) -> Result<RuntimeConfig, ConfigError> {
        let raw_address = self
            .contract_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::MissingContractAddress)?;
        let contract_address = ContractAddress::parse(raw_address)?;
        let device_id = DeviceId::new(self.device_id.clone())?;

        if self.rpc_url.trim().is_empty() {
            return Err(invalid("rpc_url", "must not be empty"));
        }
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(invalid("rpc_url", "must be an http(s) URL"));
        }

        let source = &self.source;
        if source.poll_interval_ms == 0 {
            return Err(invalid("source.poll_interval_ms", "must be positive"));
        }
        if source.max_block_range == 0 {
            return Err(invalid("source.max_block_range", "must be positive"));
        }
        if source.lookup_concurrency == 0 || source.lookup_concurrency > MAX_LOOKUP_CONCURRENCY {
            return Err(invalid(
                "source.lookup_concurrency",
                format!("must be between 1 and {}", MAX_LOOKUP_CONCURRENCY),
            ));
        }
        if source.channel_capacity == 0 {
            return Err(invalid("source.channel_capacity", "must be positive"));
        }
        if source.max_poll_failures == 0 {
            return Err(invalid("source.max_poll_failures", "must be positive"));
        }
        if self.series.dedup_window == 0 || self.series.dedup_window > MAX_DEDUP_WINDOW {
            return Err(invalid(
                "series.dedup_window",
                format!("must be between 1 and {}", MAX_DEDUP_WINDOW),
            ));
        }

        let offset_seconds = match self.display.utc_offset_minutes {
            Some(minutes) => minutes
                .checked_mul(60)
                .ok_or_else(|| invalid("display.utc_offset_minutes", "out of range"))?,
            None => local_offset_seconds(),
        };
        let clock = DisplayClock::new(offset_seconds, self.display.time_format.clone())?;

        Ok(RuntimeConfig {
            rpc_url: self.rpc_url.clone(),
            contract_address: contract_address.clone(),
            device_id,
            clock,
            dedup_window: self.series.dedup_window,
            lookup_concurrency: source.lookup_concurrency,
            source: SourceSettings {
                address: contract_address,
                poll_interval: Duration::from_millis(source.poll_interval_ms),
                start_block: source.start_block.map(BlockNumber),
                max_block_range: source.max_block_range,
                channel_capacity: source.channel_capacity,
                max_poll_failures: source.max_poll_failures,
            },
            server_addr: format!("{}:{}", self.server.host, self.server.port),
        })
    }
}

/// Write a new config file. Refuses to overwrite unless `force` is set.
pub fn write_config(path: &Path, config: &AppConfig, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    // Reject configs that could not be started.
    config.resolve()?;

    let text = config.to_toml()?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn local_offset_seconds() -> i32 {
    chrono::Local::now().offset().local_minus_utc()
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

// =============================================================================
// RUNTIME CONFIG
// =============================================================================

/// Validated settings the commands run with.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub rpc_url: String,
    pub contract_address: ContractAddress,
    pub device_id: DeviceId,
    pub clock: DisplayClock,
    pub dedup_window: usize,
    pub lookup_concurrency: usize,
    pub source: SourceSettings,
    pub server_addr: String,
}

impl RuntimeConfig {
    /// A fresh idle lifecycle for the configured device.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        let normalizer = Normalizer::new(self.device_id.clone(), self.clock.clone());
        Lifecycle::new(normalizer, self.dedup_window)
    }
}

/// Path of the config file to use.
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// =============================================================================
// TESTS
// =============================================================================
