use crate::prefs::{LAST_KNOWN_GOOGLE_URL, LAST_PROMPTED_GOOGLE_URL, PreferenceStore};
use url::Url;

/// Domain bookkeeping owned by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerState {
    pub current_domain: Url,
    /// Last candidate from a successful probe
    pub fetched_domain: Option<Url>,
    pub last_prompted_domain: Option<Url>,
    pub need_to_prompt: bool,
    /// Id of the probe currently on the wire
    pub in_flight_fetch: Option<u64>,
    pub next_fetch_id: u64,
    /// Probes that reported back, stale ones excluded
    pub probes_completed: u64,
}

impl TrackerState {
    /// Hydrate from persisted preferences, falling back to `default_domain`
    pub fn load(prefs: &dyn PreferenceStore, default_domain: &Url) -> Self {
        let current_domain = read_url(prefs, LAST_KNOWN_GOOGLE_URL).unwrap_or_else(|| {
            tracing::debug!("No last known domain, using {}", default_domain);
            default_domain.clone()
        });

        Self {
            current_domain,
            fetched_domain: None,
            last_prompted_domain: read_url(prefs, LAST_PROMPTED_GOOGLE_URL),
            need_to_prompt: false,
            in_flight_fetch: None,
            next_fetch_id: 0,
            probes_completed: 0,
        }
    }

    pub fn probe_outstanding(&self) -> bool {
        self.in_flight_fetch.is_some()
    }
}

/// Read a stored URL; empty or unparseable values count as unset
pub fn read_url(prefs: &dyn PreferenceStore, key: &str) -> Option<Url> {
    let value = prefs.get_string(key)?;
    if value.is_empty() {
        return None;
    }
    match Url::parse(&value) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!("Ignoring invalid URL stored under {}: {}", key, e);
            None
        }
    }
}
