mod json;

pub use json::{JsonPreferenceStore, PreferenceFile};

use crate::Result;
use std::collections::BTreeMap;
use url::Url;

/// Domain currently in effect
pub const LAST_KNOWN_GOOGLE_URL: &str = "browser.last_known_google_url";

/// Last candidate the user was asked about (or that was silently accepted)
pub const LAST_PROMPTED_GOOGLE_URL: &str = "browser.last_prompted_google_url";

/// String key/value persistence shared with the rest of the application
pub trait PreferenceStore: Send {
    fn get_string(&self, key: &str) -> Option<String>;

    fn set_string(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Seed the tracker's keys without overwriting anything already stored
pub fn register_defaults(store: &mut dyn PreferenceStore, default_domain: &Url) -> Result<()> {
    if store.get_string(LAST_KNOWN_GOOGLE_URL).is_none() {
        store.set_string(LAST_KNOWN_GOOGLE_URL, default_domain.as_str())?;
    }
    if store.get_string(LAST_PROMPTED_GOOGLE_URL).is_none() {
        store.set_string(LAST_PROMPTED_GOOGLE_URL, "")?;
    }
    Ok(())
}

/// In-process store; nothing survives the process
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: BTreeMap<String, String>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
