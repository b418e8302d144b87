use anyhow::{Result, anyhow};
use clap::{Args, ValueEnum};
use searchhome_core::TrackerConfig;
use searchhome_core::config::{DEFAULT_MAX_RETRIES, SEARCH_DOMAIN_CHECK_URL};
use searchhome_core::prefs::JsonPreferenceStore;
use std::path::PathBuf;
use std::time::Duration;

pub mod commands;
pub mod ui;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Pretty => "pretty",
            OutputFormat::Json => "json",
        }
    }
}

/// Tracker settings shared by `run` and `check`
#[derive(Args, Debug, Clone)]
pub struct TrackerArgs {
    /// Endpoint that reports the search domain suffix
    #[arg(
        long,
        env = "SEARCHHOME_PROBE_URL",
        value_name = "URL",
        default_value = SEARCH_DOMAIN_CHECK_URL
    )]
    pub probe_url: String,

    /// Delay after startup before the first probe may run, in milliseconds
    #[arg(
        long,
        env = "SEARCHHOME_STARTUP_DELAY_MS",
        value_name = "MS",
        default_value_t = 5000
    )]
    pub startup_delay_ms: u64,

    /// Retries on server errors before the probe counts as failed
    #[arg(
        long,
        env = "SEARCHHOME_MAX_RETRIES",
        value_name = "N",
        default_value_t = DEFAULT_MAX_RETRIES
    )]
    pub max_retries: u32,

    /// Never contact the network (administrative kill switch)
    #[arg(long, env = "SEARCHHOME_DISABLE_BACKGROUND_NETWORKING")]
    pub disable_background_networking: bool,
}

impl TrackerArgs {
    pub fn to_config(&self) -> Result<TrackerConfig> {
        let config = TrackerConfig {
            max_retries: self.max_retries,
            ..TrackerConfig::default()
        }
        .with_probe_url(&self.probe_url)?
        .with_startup_delay(Duration::from_millis(self.startup_delay_ms))
        .with_background_networking_disabled(self.disable_background_networking);

        config.validate()?;
        Ok(config)
    }
}

/// Preference file to use: the explicit path, or `~/.searchhome/prefs.json`
pub fn preferences_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    explicit
        .or_else(JsonPreferenceStore::default_path)
        .ok_or_else(|| anyhow!("Could not determine home directory; pass --prefs"))
}
