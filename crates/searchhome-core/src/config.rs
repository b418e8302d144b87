use crate::{Error, Result};
use std::time::Duration;
use url::Url;

/// Domain used until a probe has ever been accepted
pub const DEFAULT_HOMEPAGE: &str = "http://www.google.com/";

/// Endpoint that answers with the user's search domain suffix (e.g. `.google.co.uk`)
pub const SEARCH_DOMAIN_CHECK_URL: &str =
    "https://www.google.com/searchdomaincheck?format=domain&type=chrome";

/// Probe bodies must start with this marker to be considered
pub const DEFAULT_RESPONSE_PREFIX: &str = ".google.";

pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(5);

/// Retries on 5xx responses before the probe reports failure
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Settings for the domain tracker
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub probe_url: Url,
    pub default_domain: Url,
    pub response_prefix: String,
    pub startup_delay: Duration,
    pub max_retries: u32,
    /// Administrative kill switch: when set, no probe is ever issued.
    pub background_networking_disabled: bool,
}

impl TrackerConfig {
    /// Check that the configuration can drive a tracker
    pub fn validate(&self) -> Result<()> {
        match self.probe_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Config(format!(
                    "Probe URL must be http or https, got '{}'",
                    other
                )));
            }
        }

        if self.response_prefix.trim().is_empty() {
            return Err(Error::Config(
                "Probe response prefix cannot be empty".to_string(),
            ));
        }

        if self.default_domain.host_str().is_none() {
            return Err(Error::Config(format!(
                "Default domain has no host: {}",
                self.default_domain
            )));
        }

        Ok(())
    }

    pub fn with_probe_url(mut self, probe_url: &str) -> Result<Self> {
        self.probe_url = Url::parse(probe_url)?;
        Ok(self)
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn with_background_networking_disabled(mut self, disabled: bool) -> Self {
        self.background_networking_disabled = disabled;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            probe_url: Url::parse(SEARCH_DOMAIN_CHECK_URL)
                .expect("built-in probe URL is valid"),
            default_domain: Url::parse(DEFAULT_HOMEPAGE).expect("built-in homepage is valid"),
            response_prefix: DEFAULT_RESPONSE_PREFIX.to_string(),
            startup_delay: DEFAULT_STARTUP_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            background_networking_disabled: false,
        }
    }
}
