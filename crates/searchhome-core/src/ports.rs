//! Collaborators the tracker talks to.
//!
//! The tracker is a synchronous state machine. Anything that takes time
//! (the network probe, the user's answer to a prompt) is started through
//! one of these traits and reported back later through a tracker method,
//! on the same sequential context that owns the tracker.

use url::Url;

/// Result of a finished probe, delivered to [`crate::Tracker::on_probe_complete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// False on transport failure (no HTTP response at all)
    pub success: bool,
    pub status: u16,
    pub body: String,
}

impl ProbeOutcome {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            success: true,
            status: 200,
            body: body.into(),
        }
    }

    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            success: true,
            status,
            body: body.into(),
        }
    }

    pub fn transport_failure() -> Self {
        Self {
            success: false,
            status: 0,
            body: String::new(),
        }
    }
}

/// Issues the domain probe
pub trait ProbeClient: Send {
    /// Start a GET of `url`. The outcome must be reported with the same `fetch_id`.
    fn start_probe(&mut self, fetch_id: u64, url: &Url);
}

/// Surfaces the accept/cancel confirmation for a candidate domain
pub trait ConfirmationUi: Send {
    /// The answer comes back as `accept_prompt`, `cancel_prompt` and finally `prompt_closed`.
    fn show_confirmation(&mut self, candidate: &Url);
}

/// Receives the domain-changed notification
pub trait DomainObserver: Send {
    fn domain_changed(&mut self, domain: &Url);
}

/// Opens a URL in the browsing session the search came from
pub trait SearchNavigator: Send {
    fn open(&mut self, url: &Url);
}

/// Drops redo-search requests; for hosts without a browsing session.
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl SearchNavigator for NoopNavigator {
    fn open(&mut self, url: &Url) {
        tracing::debug!("No browsing session to redo search in: {}", url);
    }
}
