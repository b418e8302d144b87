// Probe client, network watcher and the sequential event loop around the tracker

pub mod error;
pub mod netwatch;
pub mod probe;
pub mod service;

pub use error::{Error, Result};
pub use netwatch::NetworkChangeWatcher;
pub use probe::{HttpProbeClient, RetryPolicy};
pub use service::{
    DomainBus, EventSender, ServiceChannels, TrackerEvent, TrackerHandle, TrackerService,
    TrackerSnapshot,
};
