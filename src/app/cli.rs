//! Command line arguments

use crate::barrier::api::{BarrierConfig, BarrierResult};
use crate::core::validation::validate_positive_int;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Group stdin records by key and release each group once complete
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "msgbarrier")]
#[command(version, long_version = crate::long_version())]
pub struct Args {
    /// Configuration file path
    #[arg(long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Expire incomplete groups after this many milliseconds
    #[arg(long = "timeout-ms", value_name = "MS", allow_negative_numbers = true)]
    pub timeout_ms: Option<i64>,

    /// Interval between expiry sweeps in milliseconds
    #[arg(long = "reaper-interval-ms", value_name = "MS", value_parser = validate_positive_int)]
    pub reaper_interval_ms: Option<u64>,

    /// Release incomplete groups on timeout instead of discarding them
    #[arg(long = "partial")]
    pub partial: bool,

    /// Verbose output (can be used multiple times for more verbosity)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (can be used multiple times for less verbosity)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Log level (overrides -v/-q)
    #[arg(long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force colored output (overrides TTY detection)
    #[arg(long = "color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,
}

impl Args {
    /// Net verbosity: each -v adds one, each -q takes one away
    pub fn verbosity(&self) -> i8 {
        let verbose = i8::try_from(self.verbose).unwrap_or(i8::MAX);
        let quiet = i8::try_from(self.quiet).unwrap_or(i8::MAX);
        verbose.saturating_sub(quiet)
    }

    /// Log file to use, treating "none" as no file
    pub fn log_file(&self) -> Option<&str> {
        self.log_file
            .as_deref()
            .and_then(|path| path.to_str())
            .filter(|path| !path.eq_ignore_ascii_case("none"))
    }

    /// Configuration from file (explicit, else the default location if it
    /// exists, else built-in defaults) with command line overrides applied
    pub fn barrier_config(&self) -> BarrierResult<BarrierConfig> {
        let mut config = match &self.config_file {
            Some(path) => BarrierConfig::from_file(path)?,
            None => match BarrierConfig::default_path() {
                Some(path) if path.exists() => BarrierConfig::from_file(&path)?,
                _ => BarrierConfig::default(),
            },
        };

        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(interval) = self.reaper_interval_ms {
            config.reaper_interval_ms = i64::try_from(interval).unwrap_or(i64::MAX);
        }
        if self.partial {
            config.send_partial_results_on_timeout = true;
        }

        Ok(config)
    }
}
