use crate::config::TrackerConfig;
use crate::correlator::SearchCorrelator;
use crate::decision::{self, Decision, ProbeVerdict};
use crate::gate::{Readiness, ReadinessGate};
use crate::ports::{ConfirmationUi, DomainObserver, ProbeClient, ProbeOutcome, SearchNavigator};
use crate::prefs::{LAST_KNOWN_GOOGLE_URL, LAST_PROMPTED_GOOGLE_URL, PreferenceStore};
use crate::state::{self, TrackerState};
use url::Url;

/// Everything the tracker calls out to
pub struct Collaborators {
    pub prefs: Box<dyn PreferenceStore>,
    pub probe: Box<dyn ProbeClient>,
    pub ui: Box<dyn ConfirmationUi>,
    pub observer: Box<dyn DomainObserver>,
    pub navigator: Box<dyn SearchNavigator>,
}

/// Learns the user's search domain and decides when to ask about a change.
///
/// All methods are event handlers and must be called from one sequential
/// context. None of them fail: network errors, odd responses and
/// preference write errors leave the current domain as it was.
pub struct Tracker {
    config: TrackerConfig,
    state: TrackerState,
    gate: ReadinessGate,
    correlator: SearchCorrelator,
    prompt_showing: bool,
    /// The candidate the open confirmation asks about; answers apply to it
    shown_candidate: Option<Url>,
    prefs: Box<dyn PreferenceStore>,
    probe: Box<dyn ProbeClient>,
    ui: Box<dyn ConfirmationUi>,
    observer: Box<dyn DomainObserver>,
    navigator: Box<dyn SearchNavigator>,
}

impl Tracker {
    /// Build a tracker from persisted state. The startup delay is pending
    /// until [`Tracker::on_startup_delay_elapsed`] is called.
    pub fn new(
        config: TrackerConfig,
        collaborators: Collaborators,
        context_available: bool,
    ) -> Self {
        let Collaborators {
            prefs,
            probe,
            ui,
            observer,
            navigator,
        } = collaborators;

        let state = TrackerState::load(prefs.as_ref(), &config.default_domain);
        let gate = ReadinessGate::new(context_available, config.background_networking_disabled);

        tracing::debug!(
            "Tracker created: domain={}, last_prompted={:?}, context_available={}",
            state.current_domain,
            state.last_prompted_domain.as_ref().map(Url::as_str),
            context_available
        );

        Self {
            config,
            state,
            gate,
            correlator: SearchCorrelator::new(),
            prompt_showing: false,
            shown_candidate: None,
            prefs,
            probe,
            ui,
            observer,
            navigator,
        }
    }

    /// The domain in effect
    pub fn google_url(&self) -> &Url {
        &self.state.current_domain
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn readiness(&self) -> Readiness {
        self.gate.readiness()
    }

    pub fn correlator(&self) -> &SearchCorrelator {
        &self.correlator
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn request_server_check(&mut self) {
        if self.gate.set_need_to_fetch() {
            self.start_probe();
        }
    }

    pub fn on_startup_delay_elapsed(&mut self) {
        tracing::debug!("Startup delay elapsed");
        if self.gate.on_startup_delay_elapsed() {
            self.start_probe();
        }
    }

    pub fn on_network_context_ready(&mut self) {
        tracing::debug!("Network context available");
        if self.gate.on_context_available() {
            self.start_probe();
        }
    }

    pub fn on_ip_address_changed(&mut self) {
        tracing::debug!("IP address changed, reopening fetch window");
        if self.gate.on_ip_address_changed() {
            self.start_probe();
        }
    }

    pub fn on_probe_complete(&mut self, fetch_id: u64, outcome: ProbeOutcome) {
        if self.state.in_flight_fetch != Some(fetch_id) {
            tracing::debug!("Discarding stale probe result #{}", fetch_id);
            return;
        }
        self.state.in_flight_fetch = None;
        self.state.probes_completed += 1;

        let candidate = match decision::interpret(&outcome, &self.config.response_prefix) {
            ProbeVerdict::Failed => {
                tracing::info!(
                    "Domain probe #{} failed (success={}, status={})",
                    fetch_id,
                    outcome.success,
                    outcome.status
                );
                self.gate.on_probe_failed();
                return;
            }
            ProbeVerdict::Malformed => {
                tracing::debug!("Ignoring unexpected probe response: {:?}", outcome.body);
                return;
            }
            ProbeVerdict::Candidate(candidate) => candidate,
        };

        tracing::info!("Domain probe #{} returned {}", fetch_id, candidate);
        self.state.fetched_domain = Some(candidate.clone());
        self.state.need_to_prompt = false;

        // other settings code shares the store, so read it fresh
        let last_prompted = state::read_url(self.prefs.as_ref(), LAST_PROMPTED_GOOGLE_URL);
        self.state.last_prompted_domain = last_prompted.clone();

        match decision::decide(&candidate, last_prompted.as_ref(), &self.state.current_domain) {
            Decision::SilentAccept => {
                tracing::info!("First domain check, switching to {} silently", candidate);
                self.accept_candidate(candidate);
            }
            Decision::AlreadyDecided => {
                tracing::debug!("Candidate {} was already decided", candidate);
            }
            Decision::SilentReconcile => {
                tracing::debug!("Back on {}, resetting prompted domain", candidate);
                self.record_prompted(&candidate);
            }
            Decision::Prompt => {
                tracing::info!("Candidate {} needs confirmation", candidate);
                self.state.need_to_prompt = true;
            }
        }
    }

    pub fn search_committed(&mut self) {
        let worth_watching = self.state.need_to_prompt || self.state.probe_outstanding();
        self.correlator.search_committed(worth_watching);
    }

    pub fn on_navigation_pending(&mut self, url: Url) {
        self.correlator.navigation_pending(url);
    }

    pub fn on_navigation_committed(&mut self) {
        if !self.correlator.navigation_committed() || !self.state.need_to_prompt {
            return;
        }
        if self.prompt_showing {
            tracing::debug!("Confirmation already showing");
            return;
        }
        if let Some(candidate) = self.state.fetched_domain.clone() {
            tracing::info!("Asking to switch search domain to {}", candidate);
            self.prompt_showing = true;
            self.shown_candidate = Some(candidate.clone());
            self.ui.show_confirmation(&candidate);
        }
    }

    pub fn on_tab_closed(&mut self) {
        self.correlator.navigation_closed();
    }

    /// The user agreed to the shown candidate: switch and redo their search there
    pub fn accept_prompt(&mut self) {
        let Some(candidate) = self.shown_candidate.take() else {
            tracing::debug!("Accept with no confirmation showing, ignoring");
            return;
        };
        self.accept_candidate(candidate);
        self.redo_search();
    }

    pub fn cancel_prompt(&mut self) {
        let Some(candidate) = self.shown_candidate.take() else {
            tracing::debug!("Cancel with no confirmation showing, ignoring");
            return;
        };
        tracing::info!("Keeping {}, declined {}", self.state.current_domain, candidate);
        self.record_prompted(&candidate);
        self.state.need_to_prompt = false;
    }

    /// The confirmation UI went away, whatever the answer was
    pub fn prompt_closed(&mut self) {
        self.prompt_showing = false;
        self.shown_candidate = None;
        self.correlator.prompt_closed();
    }

    fn start_probe(&mut self) {
        let fetch_id = self.state.next_fetch_id;
        self.state.next_fetch_id += 1;
        self.state.in_flight_fetch = Some(fetch_id);

        tracing::info!("Starting domain probe #{} to {}", fetch_id, self.config.probe_url);
        self.probe.start_probe(fetch_id, &self.config.probe_url);
    }

    fn accept_candidate(&mut self, domain: Url) {
        self.state.current_domain = domain.clone();
        self.persist(LAST_KNOWN_GOOGLE_URL, domain.as_str());
        self.record_prompted(&domain);
        self.state.need_to_prompt = false;

        tracing::info!("Search domain changed to {}", domain);
        self.observer.domain_changed(&domain);
    }

    fn record_prompted(&mut self, domain: &Url) {
        self.state.last_prompted_domain = Some(domain.clone());
        self.persist(LAST_PROMPTED_GOOGLE_URL, domain.as_str());
    }

    fn redo_search(&mut self) {
        match self.correlator.redo_target(&self.state.current_domain) {
            Some(target) => {
                tracing::info!("Redoing search on new domain: {}", target);
                self.navigator.open(&target);
            }
            None => tracing::debug!("No recorded search to redo"),
        }
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.prefs.set_string(key, value) {
            tracing::warn!("Failed to persist {}: {}", key, e);
        }
    }
}
