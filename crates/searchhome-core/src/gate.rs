//! Readiness gate: decides when the domain probe may start.
//!
//! Every precondition change goes through a setter that re-evaluates the
//! predicate. When it holds, the setter latches `already_fetched` and
//! returns `true`; the caller must then start exactly one probe.

/// Independent preconditions for issuing a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub in_startup_sleep: bool,
    pub already_fetched: bool,
    pub need_to_fetch: bool,
    pub context_available: bool,
    pub background_networking_disabled: bool,
}

impl Readiness {
    pub fn new(context_available: bool, background_networking_disabled: bool) -> Self {
        Self {
            in_startup_sleep: true,
            already_fetched: false,
            need_to_fetch: false,
            context_available,
            background_networking_disabled,
        }
    }

    /// True when a probe may be issued right now
    pub fn can_fetch_now(&self) -> bool {
        !self.background_networking_disabled
            && !self.in_startup_sleep
            && !self.already_fetched
            && self.need_to_fetch
            && self.context_available
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessGate {
    readiness: Readiness,
}

impl ReadinessGate {
    pub fn new(context_available: bool, background_networking_disabled: bool) -> Self {
        Self {
            readiness: Readiness::new(context_available, background_networking_disabled),
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn set_need_to_fetch(&mut self) -> bool {
        self.readiness.need_to_fetch = true;
        self.try_begin()
    }

    pub fn on_startup_delay_elapsed(&mut self) -> bool {
        self.readiness.in_startup_sleep = false;
        self.try_begin()
    }

    pub fn on_context_available(&mut self) -> bool {
        self.readiness.context_available = true;
        self.try_begin()
    }

    /// A network change invalidates the learned candidate and allows one re-probe
    pub fn on_ip_address_changed(&mut self) -> bool {
        self.readiness.already_fetched = false;
        self.try_begin()
    }

    /// Reopen the fetch window after a failed probe, without starting one
    pub fn on_probe_failed(&mut self) {
        self.readiness.already_fetched = false;
    }

    fn try_begin(&mut self) -> bool {
        if !self.readiness.can_fetch_now() {
            return false;
        }
        self.readiness.already_fetched = true;
        true
    }
}
