//! Handler configuration
//!
//! [`BarrierConfig`] is the raw, deserializable form. Numeric fields are
//! signed so that a negative value in a TOML file surfaces as a
//! configuration error naming the option instead of a generic parse
//! failure. [`BarrierConfig::validate`] turns it into [`BarrierSettings`],
//! which is what the handler actually runs with.
//!
//! ```toml
//! timeout_ms = 60000
//! reaper_interval_ms = 1000
//! tracked_key_capacity = 1000
//! send_partial_results_on_timeout = false
//! send_timeout_ms = 1000
//! auto_startup = true
//! ```

use crate::barrier::error::{BarrierError, BarrierResult};
use crate::core::validation::{
    validate_capacity, validate_non_negative_millis, validate_positive_millis,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: i64 = 60_000;
pub const DEFAULT_REAPER_INTERVAL_MS: i64 = 1_000;
pub const DEFAULT_TRACKED_KEY_CAPACITY: i64 = 1_000;
pub const DEFAULT_SEND_TIMEOUT_MS: i64 = 1_000;

const CONFIG_DIR_NAME: &str = "msgbarrier";
const CONFIG_FILE_NAME: &str = "msgbarrier.toml";

/// Handler configuration as written by a user
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarrierConfig {
    /// Age after which an incomplete group is expired
    pub timeout_ms: i64,
    /// Period of the background sweep
    pub reaper_interval_ms: i64,
    /// Number of recently finished keys remembered; 0 disables tracking
    pub tracked_key_capacity: i64,
    /// Release a timed-out group through the completion hook instead of discarding it
    pub send_partial_results_on_timeout: bool,
    /// Upper bound on any single send
    pub send_timeout_ms: i64,
    /// Start the reaper on the first handled message
    pub auto_startup: bool,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            reaper_interval_ms: DEFAULT_REAPER_INTERVAL_MS,
            tracked_key_capacity: DEFAULT_TRACKED_KEY_CAPACITY,
            send_partial_results_on_timeout: false,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            auto_startup: true,
        }
    }
}

/// Validated settings the handler runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierSettings {
    pub timeout: Duration,
    pub reaper_interval: Duration,
    pub tracked_key_capacity: usize,
    pub send_partial_results_on_timeout: bool,
    pub send_timeout: Duration,
    pub auto_startup: bool,
}

impl Default for BarrierSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS as u64),
            reaper_interval: Duration::from_millis(DEFAULT_REAPER_INTERVAL_MS as u64),
            tracked_key_capacity: DEFAULT_TRACKED_KEY_CAPACITY as usize,
            send_partial_results_on_timeout: false,
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS as u64),
            auto_startup: true,
        }
    }
}

impl BarrierConfig {
    /// Parse configuration from TOML text; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> BarrierResult<Self> {
        toml::from_str(text)
            .map_err(|e| BarrierError::config(format!("Invalid configuration: {}", e)))
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> BarrierResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BarrierError::config(format!(
                "Unable to read configuration file '{}': {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Location searched when no configuration file is given explicitly
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Check every value and convert to runtime settings
    pub fn validate(&self) -> BarrierResult<BarrierSettings> {
        let timeout =
            validate_non_negative_millis("timeout_ms", self.timeout_ms).map_err(BarrierError::config)?;
        let reaper_interval = validate_positive_millis("reaper_interval_ms", self.reaper_interval_ms)
            .map_err(BarrierError::config)?;
        let tracked_key_capacity =
            validate_capacity("tracked_key_capacity", self.tracked_key_capacity)
                .map_err(BarrierError::config)?;
        let send_timeout = validate_non_negative_millis("send_timeout_ms", self.send_timeout_ms)
            .map_err(BarrierError::config)?;

        Ok(BarrierSettings {
            timeout: Duration::from_millis(timeout),
            reaper_interval: Duration::from_millis(reaper_interval),
            tracked_key_capacity,
            send_partial_results_on_timeout: self.send_partial_results_on_timeout,
            send_timeout: Duration::from_millis(send_timeout),
            auto_startup: self.auto_startup,
        })
    }
}
