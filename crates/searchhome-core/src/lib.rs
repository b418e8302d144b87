pub mod config;
pub mod correlator;
pub mod decision;
pub mod error;
pub mod gate;
pub mod ports;
pub mod prefs;
pub mod state;
pub mod tracker;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use ports::{ConfirmationUi, DomainObserver, ProbeClient, ProbeOutcome, SearchNavigator};
pub use prefs::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use tracker::{Collaborators, Tracker};
