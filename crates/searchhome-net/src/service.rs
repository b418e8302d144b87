//! Sequential event loop that owns the tracker.
//!
//! Every input (handle calls, probe completions, the startup timer, the
//! network watcher) becomes a [`TrackerEvent`] on one queue, so the tracker
//! is only ever mutated from a single task, in arrival order.

use searchhome_core::gate::Readiness;
use searchhome_core::{Collaborators, DomainObserver, ProbeOutcome, Tracker, TrackerConfig};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use url::Url;

const DOMAIN_BUS_CAPACITY: usize = 16;

#[derive(Debug)]
pub enum TrackerEvent {
    RequestServerCheck,
    StartupDelayElapsed,
    NetworkContextReady,
    IpAddressChanged,
    ProbeComplete { fetch_id: u64, outcome: ProbeOutcome },
    SearchCommitted,
    NavigationPending(Url),
    NavigationCommitted,
    TabClosed,
    AcceptPrompt,
    CancelPrompt,
    PromptClosed,
    Snapshot(oneshot::Sender<TrackerSnapshot>),
    Shutdown,
}

pub type EventSender = mpsc::UnboundedSender<TrackerEvent>;

/// Point-in-time view of the tracker, for status output and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub current_domain: Url,
    pub fetched_domain: Option<Url>,
    pub need_to_prompt: bool,
    pub probe_outstanding: bool,
    pub probes_completed: u64,
    pub readiness: Readiness,
}

impl TrackerSnapshot {
    fn of(tracker: &Tracker) -> Self {
        let state = tracker.state();
        Self {
            current_domain: state.current_domain.clone(),
            fetched_domain: state.fetched_domain.clone(),
            need_to_prompt: state.need_to_prompt,
            probe_outstanding: state.probe_outstanding(),
            probes_completed: state.probes_completed,
            readiness: tracker.readiness(),
        }
    }
}

/// Broadcasts domain-changed notifications to any number of subscribers
#[derive(Debug, Clone)]
pub struct DomainBus {
    sender: broadcast::Sender<Url>,
}

impl DomainBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DOMAIN_BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Url> {
        self.sender.subscribe()
    }
}

impl Default for DomainBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainObserver for DomainBus {
    fn domain_changed(&mut self, domain: &Url) {
        // no subscribers is fine
        let _ = self.sender.send(domain.clone());
    }
}

/// Queue and bus created before the collaborators that need them
pub struct ServiceChannels {
    events: EventSender,
    receiver: mpsc::UnboundedReceiver<TrackerEvent>,
    bus: DomainBus,
}

impl ServiceChannels {
    pub fn new() -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            events,
            receiver,
            bus: DomainBus::new(),
        }
    }

    /// Sender for collaborators that report back (probe client, UI, watchers)
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    /// Observer that publishes on this service's bus
    pub fn observer(&self) -> DomainBus {
        self.bus.clone()
    }
}

impl Default for ServiceChannels {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle the rest of the application uses to talk to the tracker
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    events: EventSender,
    current: watch::Receiver<Url>,
    bus: DomainBus,
}

impl TrackerHandle {
    /// Domain in effect; never blocks
    pub fn google_url(&self) -> Url {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Url> {
        self.bus.subscribe()
    }

    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn request_server_check(&self) {
        self.send(TrackerEvent::RequestServerCheck);
    }

    pub fn network_context_ready(&self) {
        self.send(TrackerEvent::NetworkContextReady);
    }

    pub fn ip_address_changed(&self) {
        self.send(TrackerEvent::IpAddressChanged);
    }

    pub fn search_committed(&self) {
        self.send(TrackerEvent::SearchCommitted);
    }

    pub fn navigation_pending(&self, url: Url) {
        self.send(TrackerEvent::NavigationPending(url));
    }

    pub fn navigation_committed(&self) {
        self.send(TrackerEvent::NavigationCommitted);
    }

    pub fn tab_closed(&self) {
        self.send(TrackerEvent::TabClosed);
    }

    pub fn accept_prompt(&self) {
        self.send(TrackerEvent::AcceptPrompt);
    }

    pub fn cancel_prompt(&self) {
        self.send(TrackerEvent::CancelPrompt);
    }

    pub fn prompt_closed(&self) {
        self.send(TrackerEvent::PromptClosed);
    }

    /// Current tracker state, or `None` once the service has stopped
    pub async fn snapshot(&self) -> Option<TrackerSnapshot> {
        let (reply, response) = oneshot::channel();
        self.events.send(TrackerEvent::Snapshot(reply)).ok()?;
        response.await.ok()
    }

    /// Stop the event loop. Dropping every handle does not stop it, since the
    /// tracker's own collaborators keep senders into the queue.
    pub fn shutdown(&self) {
        self.send(TrackerEvent::Shutdown);
    }

    fn send(&self, event: TrackerEvent) {
        if let Err(e) = self.events.send(event) {
            tracing::debug!("Tracker service stopped, dropping {:?}", e.0);
        }
    }
}

/// Owns the tracker and the startup timer
pub struct TrackerService {
    tracker: Tracker,
    receiver: mpsc::UnboundedReceiver<TrackerEvent>,
    current: watch::Sender<Url>,
    startup_timer: Option<JoinHandle<()>>,
}

impl TrackerService {
    /// Build the tracker, arm the startup timer and spawn the event loop.
    ///
    /// Must be called from within a tokio runtime. The loop runs until
    /// [`TrackerHandle::shutdown`] is called; the returned task completes after that.
    pub fn spawn(
        config: TrackerConfig,
        collaborators: Collaborators,
        channels: ServiceChannels,
        context_available: bool,
    ) -> (TrackerHandle, JoinHandle<()>) {
        let ServiceChannels {
            events,
            receiver,
            bus,
        } = channels;

        let startup_delay = config.startup_delay;
        let tracker = Tracker::new(config, collaborators, context_available);
        let (current, current_rx) = watch::channel(tracker.google_url().clone());

        let service = Self {
            tracker,
            receiver,
            current,
            startup_timer: Some(arm_startup_timer(startup_delay, events.clone())),
        };

        let handle = TrackerHandle {
            events,
            current: current_rx,
            bus,
        };

        (handle, tokio::spawn(service.run()))
    }

    async fn run(mut self) {
        tracing::debug!("Tracker service started");

        while let Some(event) = self.receiver.recv().await {
            if matches!(event, TrackerEvent::Shutdown) {
                break;
            }
            self.dispatch(event);
            self.publish_current();
        }

        self.teardown();
    }

    fn dispatch(&mut self, event: TrackerEvent) {
        tracing::trace!("Tracker event: {:?}", event);
        match event {
            TrackerEvent::RequestServerCheck => self.tracker.request_server_check(),
            TrackerEvent::StartupDelayElapsed => {
                self.startup_timer = None;
                self.tracker.on_startup_delay_elapsed();
            }
            TrackerEvent::NetworkContextReady => self.tracker.on_network_context_ready(),
            TrackerEvent::IpAddressChanged => self.tracker.on_ip_address_changed(),
            TrackerEvent::ProbeComplete { fetch_id, outcome } => {
                self.tracker.on_probe_complete(fetch_id, outcome)
            }
            TrackerEvent::SearchCommitted => self.tracker.search_committed(),
            TrackerEvent::NavigationPending(url) => self.tracker.on_navigation_pending(url),
            TrackerEvent::NavigationCommitted => self.tracker.on_navigation_committed(),
            TrackerEvent::TabClosed => self.tracker.on_tab_closed(),
            TrackerEvent::AcceptPrompt => self.tracker.accept_prompt(),
            TrackerEvent::CancelPrompt => self.tracker.cancel_prompt(),
            TrackerEvent::PromptClosed => self.tracker.prompt_closed(),
            TrackerEvent::Snapshot(reply) => {
                let _ = reply.send(TrackerSnapshot::of(&self.tracker));
            }
            TrackerEvent::Shutdown => {}
        }
    }

    fn publish_current(&self) {
        let domain = self.tracker.google_url();
        self.current.send_if_modified(|current| {
            if current == domain {
                return false;
            }
            *current = domain.clone();
            true
        });
    }

    fn teardown(&mut self) {
        if let Some(timer) = self.startup_timer.take() {
            timer.abort();
        }
        // queued events, late probe results included, are dropped with the receiver
        self.receiver.close();
        tracing::debug!("Tracker service stopped");
    }
}

fn arm_startup_timer(delay: Duration, events: EventSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = events.send(TrackerEvent::StartupDelayElapsed);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchhome_core::ports::{NoopNavigator, ProbeClient};
    use searchhome_core::prefs::{LAST_KNOWN_GOOGLE_URL, LAST_PROMPTED_GOOGLE_URL};
    use searchhome_core::{ConfirmationUi, MemoryPreferenceStore};
    use std::sync::{Arc, Mutex};

    /// Answers every probe with a fixed body through the event queue
    struct ReplyingProbe {
        body: &'static str,
        events: EventSender,
        started: Arc<Mutex<u32>>,
    }

    impl ProbeClient for ReplyingProbe {
        fn start_probe(&mut self, fetch_id: u64, _url: &Url) {
            *self.started.lock().unwrap() += 1;
            let _ = self.events.send(TrackerEvent::ProbeComplete {
                fetch_id,
                outcome: ProbeOutcome::ok(self.body),
            });
        }
    }

    /// Answers the confirmation through the handle's event queue
    struct AutoAnswerUi {
        events: EventSender,
        accept: bool,
        shown: Arc<Mutex<Vec<Url>>>,
    }

    impl ConfirmationUi for AutoAnswerUi {
        fn show_confirmation(&mut self, candidate: &Url) {
            self.shown.lock().unwrap().push(candidate.clone());
            let answer = if self.accept {
                TrackerEvent::AcceptPrompt
            } else {
                TrackerEvent::CancelPrompt
            };
            let _ = self.events.send(answer);
            let _ = self.events.send(TrackerEvent::PromptClosed);
        }
    }

    struct Spawned {
        handle: TrackerHandle,
        task: JoinHandle<()>,
        probes: Arc<Mutex<u32>>,
        shown: Arc<Mutex<Vec<Url>>>,
    }

    fn spawn(prefs: MemoryPreferenceStore, body: &'static str, accept: bool) -> Spawned {
        let channels = ServiceChannels::new();
        let probes = Arc::new(Mutex::new(0));
        let shown = Arc::new(Mutex::new(Vec::new()));
        let collaborators = Collaborators {
            prefs: Box::new(prefs),
            probe: Box::new(ReplyingProbe {
                body,
                events: channels.events(),
                started: probes.clone(),
            }),
            ui: Box::new(AutoAnswerUi {
                events: channels.events(),
                accept,
                shown: shown.clone(),
            }),
            observer: Box::new(channels.observer()),
            navigator: Box::new(NoopNavigator),
        };
        let (handle, task) =
            TrackerService::spawn(TrackerConfig::default(), collaborators, channels, true);
        Spawned {
            handle,
            task,
            probes,
            shown,
        }
    }

    fn decided(domain: &str) -> MemoryPreferenceStore {
        MemoryPreferenceStore::new()
            .with_value(LAST_KNOWN_GOOGLE_URL, domain)
            .with_value(LAST_PROMPTED_GOOGLE_URL, domain)
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_waits_for_startup_timer() {
        let s = spawn(MemoryPreferenceStore::new(), ".google.co.uk", true);
        let mut changes = s.handle.subscribe();

        s.handle.request_server_check();
        let snapshot = s.handle.snapshot().await.unwrap();
        assert!(snapshot.readiness.in_startup_sleep);
        assert_eq!(*s.probes.lock().unwrap(), 0);

        // paused clock auto-advances past the five second delay
        let domain = changes.recv().await.unwrap();
        assert_eq!(domain.as_str(), "http://www.google.co.uk/");
        assert_eq!(*s.probes.lock().unwrap(), 1);

        let snapshot = s.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.probes_completed, 1);
        assert!(!snapshot.need_to_prompt);
        assert_eq!(s.handle.google_url().as_str(), "http://www.google.co.uk/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_prompt_changes_domain() {
        let s = spawn(decided("http://www.google.fr/"), ".google.de", true);
        let mut changes = s.handle.subscribe();

        s.handle.request_server_check();
        tokio::time::sleep(Duration::from_secs(6)).await;
        let snapshot = s.handle.snapshot().await.unwrap();
        assert!(snapshot.need_to_prompt);

        s.handle.search_committed();
        s.handle
            .navigation_pending(Url::parse("http://www.google.fr/search?q=tokio").unwrap());
        s.handle.navigation_committed();

        let domain = changes.recv().await.unwrap();
        assert_eq!(domain.as_str(), "http://www.google.de/");
        assert_eq!(s.shown.lock().unwrap().len(), 1);

        s.handle.snapshot().await.unwrap();
        assert_eq!(s.handle.google_url().as_str(), "http://www.google.de/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_prompt_keeps_domain() {
        let s = spawn(decided("http://www.google.fr/"), ".google.de", false);

        s.handle.request_server_check();
        tokio::time::sleep(Duration::from_secs(6)).await;

        s.handle.search_committed();
        s.handle
            .navigation_pending(Url::parse("http://www.google.fr/search?q=tokio").unwrap());
        s.handle.navigation_committed();

        let snapshot = s.handle.snapshot().await.unwrap();
        assert!(!snapshot.need_to_prompt);
        assert_eq!(snapshot.current_domain.as_str(), "http://www.google.fr/");
        assert_eq!(s.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_startup_timer() {
        let s = spawn(MemoryPreferenceStore::new(), ".google.co.uk", true);
        s.handle.request_server_check();
        s.handle.shutdown();
        s.task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*s.probes.lock().unwrap(), 0);
        assert!(s.handle.snapshot().await.is_none());
        assert_eq!(s.handle.google_url().as_str(), "http://www.google.com/");

        // calls after teardown are dropped quietly
        s.handle.request_server_check();
        s.handle.ip_address_changed();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_outlives_dropped_handles_until_shutdown() {
        let Spawned { handle, task, .. } =
            spawn(decided("http://www.google.fr/"), ".google.fr", true);
        let events = handle.events();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!task.is_finished());

        events.send(TrackerEvent::Shutdown).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ip_change_reprobes_once() {
        let s = spawn(MemoryPreferenceStore::new(), ".google.co.uk", true);
        s.handle.request_server_check();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(*s.probes.lock().unwrap(), 1);

        s.handle.ip_address_changed();
        s.handle.request_server_check();
        let snapshot = s.handle.snapshot().await.unwrap();

        assert_eq!(*s.probes.lock().unwrap(), 2);
        assert_eq!(snapshot.probes_completed, 1);
    }
}
