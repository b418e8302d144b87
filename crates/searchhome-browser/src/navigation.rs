use crate::{Error, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EnableParams as PageEnableParams, EventFrameNavigated,
};
use futures::StreamExt;
use searchhome_core::SearchNavigator;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Navigation lifecycle of the observed tab, in the order the browser reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// The user issued a search from the tab
    SearchCommitted,
    /// A main-frame document load started
    Pending(Url),
    /// The main frame committed a new document
    Committed,
    /// The tab or browser went away
    Closed,
}

/// Whether `url` is a results page for a typed search
pub fn is_search_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
        && url.path() == "/search"
        && url
            .query_pairs()
            .any(|(key, value)| key == "q" && !value.trim().is_empty())
}

/// Events produced by a main-frame document request
pub fn document_request_events(raw_url: &str) -> Vec<NavigationEvent> {
    let Ok(url) = Url::parse(raw_url) else {
        return Vec::new();
    };
    if is_search_url(&url) {
        vec![NavigationEvent::SearchCommitted, NavigationEvent::Pending(url)]
    } else {
        vec![NavigationEvent::Pending(url)]
    }
}

/// Opens redo-search URLs in the observed tab
#[derive(Debug, Clone)]
pub struct BrowserNavigator {
    commands: mpsc::UnboundedSender<Url>,
}

impl BrowserNavigator {
    pub fn new(commands: mpsc::UnboundedSender<Url>) -> Self {
        Self { commands }
    }
}

impl SearchNavigator for BrowserNavigator {
    fn open(&mut self, url: &Url) {
        if self.commands.send(url.clone()).is_err() {
            tracing::debug!("Browsing session closed, cannot open {}", url);
        }
    }
}

/// Watches one Chrome tab over the DevTools protocol
pub struct NavigationSession {
    debugging_port: u16,
}

impl NavigationSession {
    pub fn new(debugging_port: u16) -> Self {
        Self { debugging_port }
    }

    /// Attach to Chrome and stream the first tab's navigation lifecycle to `events`.
    ///
    /// Returns a navigator that drives the same tab, and the observing task.
    /// The task ends, after sending [`NavigationEvent::Closed`], when the tab
    /// or the browser goes away.
    pub async fn observe(
        &self,
        events: mpsc::UnboundedSender<NavigationEvent>,
    ) -> Result<(BrowserNavigator, JoinHandle<()>)> {
        let (browser, mut handler) = self.connect().await?;

        // the handler must be polled for any command to complete
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        let page = match browser.pages().await?.into_iter().next() {
            Some(page) => page,
            None => {
                tracing::debug!("CDP: no open tab, creating one");
                browser.new_page("about:blank").await?
            }
        };

        page.execute(NetworkEnableParams::default()).await?;
        page.execute(PageEnableParams::default()).await?;

        let main_frame = page.mainframe().await?;
        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut navigations = page.event_listener::<EventFrameNavigated>().await?;
        let (commands, mut command_rx) = mpsc::unbounded_channel::<Url>();

        tracing::info!("Observing navigation in Chrome on port {}", self.debugging_port);

        let task = tokio::spawn(async move {
            let _browser = browser;
            loop {
                tokio::select! {
                    request = requests.next() => {
                        let Some(event) = request else { break };
                        let is_document = event.request_id.inner() == event.loader_id.inner();
                        let in_main_frame = match (&main_frame, &event.frame_id) {
                            (Some(main), Some(frame)) => main == frame,
                            _ => true,
                        };
                        if !is_document || !in_main_frame {
                            continue;
                        }
                        for navigation in document_request_events(&event.request.url) {
                            tracing::debug!("Navigation: {:?}", navigation);
                            if events.send(navigation).is_err() {
                                break;
                            }
                        }
                    }
                    navigated = navigations.next() => {
                        let Some(event) = navigated else { break };
                        if event.frame.parent_id.is_none() {
                            tracing::debug!("Navigation committed: {}", event.frame.url);
                            let _ = events.send(NavigationEvent::Committed);
                        }
                    }
                    Some(url) = command_rx.recv() => {
                        navigate(&page, &url).await;
                    }
                }
            }

            tracing::info!("Observed tab closed");
            let _ = events.send(NavigationEvent::Closed);
            handler_task.abort();
        });

        Ok((BrowserNavigator::new(commands), task))
    }

    async fn connect(&self) -> Result<(Browser, chromiumoxide::Handler)> {
        let endpoint = format!("http://localhost:{}", self.debugging_port);
        let mut retries = 5;
        loop {
            tracing::debug!("Attempting CDP connection to {}...", endpoint);
            match Browser::connect(&endpoint).await {
                Ok(connected) => {
                    tracing::info!("CDP connection established");
                    return Ok(connected);
                }
                Err(e) => {
                    retries -= 1;
                    if retries == 0 {
                        return Err(Error::Connect {
                            port: self.debugging_port,
                            reason: e.to_string(),
                        });
                    }
                    tracing::debug!("CDP connection failed, retrying ({} left)", retries);
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
            }
        }
    }
}

async fn navigate(page: &Page, url: &Url) {
    tracing::info!("Opening {}", url);
    if let Err(e) = page.goto(url.to_string()).await {
        tracing::warn!("Failed to open {}: {}", url, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_search_results_are_searches() {
        assert!(is_search_url(&url("https://www.google.com/search?q=rust")));
        assert!(is_search_url(&url("http://www.google.co.uk/search?hl=en&q=tokio+mpsc")));
    }

    #[test]
    fn test_other_pages_are_not_searches() {
        assert!(!is_search_url(&url("https://www.google.com/")));
        assert!(!is_search_url(&url("https://www.google.com/search")));
        assert!(!is_search_url(&url("https://www.google.com/search?q=")));
        assert!(!is_search_url(&url("https://www.google.com/maps?q=paris")));
        assert!(!is_search_url(&url("file:///search?q=x")));
    }

    #[test]
    fn test_search_request_commits_then_pends() {
        let events = document_request_events("https://www.google.fr/search?q=velo");
        assert_eq!(
            events,
            vec![
                NavigationEvent::SearchCommitted,
                NavigationEvent::Pending(url("https://www.google.fr/search?q=velo")),
            ]
        );
    }

    #[test]
    fn test_plain_document_only_pends() {
        let events = document_request_events("https://docs.rs/");
        assert_eq!(events, vec![NavigationEvent::Pending(url("https://docs.rs/"))]);
    }

    #[test]
    fn test_unparseable_request_is_ignored() {
        assert!(document_request_events("not a url").is_empty());
        assert!(document_request_events("").is_empty());
    }

    #[tokio::test]
    async fn test_navigator_forwards_urls() {
        let (commands, mut receiver) = mpsc::unbounded_channel();
        let mut navigator = BrowserNavigator::new(commands);

        navigator.open(&url("http://www.google.de/search?q=x"));
        assert_eq!(
            receiver.recv().await,
            Some(url("http://www.google.de/search?q=x"))
        );
    }

    #[test]
    fn test_navigator_after_close_is_quiet() {
        let (commands, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        let mut navigator = BrowserNavigator::new(commands);
        navigator.open(&url("http://www.google.de/"));
    }
}
