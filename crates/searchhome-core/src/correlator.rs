//! Ties a pending confirmation to the navigation of the user's next search.

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    /// A search was committed; waiting for its navigation to start
    AwaitingNavigation,
    /// The search navigation is pending; waiting for commit or close
    AwaitingCommit { pending: Url },
}

#[derive(Debug, Clone)]
pub struct SearchCorrelator {
    state: WatchState,
    /// Last search whose navigation committed; target of a redo
    last_search: Option<Url>,
}

impl SearchCorrelator {
    pub fn new() -> Self {
        Self {
            state: WatchState::Idle,
            last_search: None,
        }
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn pending_search_url(&self) -> Option<&Url> {
        match &self.state {
            WatchState::AwaitingCommit { pending } => Some(pending),
            _ => None,
        }
    }

    pub fn last_search_url(&self) -> Option<&Url> {
        self.last_search.as_ref()
    }

    /// Start watching when there is a reason to. Returns whether watching began.
    pub fn search_committed(&mut self, worth_watching: bool) -> bool {
        if self.state != WatchState::Idle || !worth_watching {
            return false;
        }
        tracing::debug!("Search committed, watching for its navigation");
        self.state = WatchState::AwaitingNavigation;
        true
    }

    pub fn navigation_pending(&mut self, url: Url) {
        if self.state != WatchState::AwaitingNavigation {
            return;
        }
        tracing::debug!("Search navigation pending: {}", url);
        self.state = WatchState::AwaitingCommit { pending: url };
    }

    /// Returns true when a watched search navigation just committed
    pub fn navigation_committed(&mut self) -> bool {
        match std::mem::replace(&mut self.state, WatchState::Idle) {
            WatchState::AwaitingCommit { pending } => {
                tracing::debug!("Search navigation committed: {}", pending);
                self.last_search = Some(pending);
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// The tab went away; the watched navigation will never commit
    pub fn navigation_closed(&mut self) {
        if self.state != WatchState::Idle {
            tracing::debug!("Watched tab closed before commit");
        }
        self.state = WatchState::Idle;
        self.last_search = None;
    }

    /// The confirmation UI is gone; forget the search it was anchored to
    pub fn prompt_closed(&mut self) {
        self.state = WatchState::Idle;
        self.last_search = None;
    }

    /// The recorded search with its host swapped for `domain`'s host
    pub fn redo_target(&self, domain: &Url) -> Option<Url> {
        let search = self.last_search.as_ref().or(self.pending_search_url())?;
        let host = domain.host_str()?;

        let mut target = search.clone();
        match target.set_host(Some(host)) {
            Ok(()) => Some(target),
            Err(e) => {
                tracing::debug!("Cannot move search {} to host {}: {}", search, host, e);
                None
            }
        }
    }
}

impl Default for SearchCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
