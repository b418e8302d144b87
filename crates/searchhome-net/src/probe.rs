use crate::service::{EventSender, TrackerEvent};
use crate::Result;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use searchhome_core::{ProbeClient, ProbeOutcome, TrackerConfig};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded retry with exponential backoff, applied to 5xx responses only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500), Duration::from_secs(30))
    }
}

/// Issues the domain probe over HTTP and reports back on the tracker's event queue.
///
/// The request bypasses caches and carries no cookie store, so the check
/// cannot leave state behind in the user's profile.
pub struct HttpProbeClient {
    http: Client,
    retry: RetryPolicy,
    events: EventSender,
    task: Option<JoinHandle<()>>,
}

impl HttpProbeClient {
    pub fn new(config: &TrackerConfig, events: EventSender) -> Result<Self> {
        config.validate()?;
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            ..RetryPolicy::default()
        };
        Ok(Self {
            http: build_client()?,
            retry,
            events,
            task: None,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl ProbeClient for HttpProbeClient {
    fn start_probe(&mut self, fetch_id: u64, url: &Url) {
        if let Some(previous) = self.task.take() {
            previous.abort();
        }

        let http = self.http.clone();
        let retry = self.retry;
        let events = self.events.clone();
        let url = url.clone();

        self.task = Some(tokio::spawn(async move {
            let outcome = fetch(&http, &url, &retry).await;
            if events
                .send(TrackerEvent::ProbeComplete { fetch_id, outcome })
                .is_err()
            {
                tracing::debug!("Tracker gone, dropping probe #{} result", fetch_id);
            }
        }));
    }
}

impl Drop for HttpProbeClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// HTTP client configured for the probe: no cookie store, bounded timeout
pub fn build_client() -> Result<Client> {
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("searchhome/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Perform one probe, retrying server errors per `retry`
pub async fn fetch(http: &Client, url: &Url, retry: &RetryPolicy) -> ProbeOutcome {
    let mut attempt = 0;
    loop {
        tracing::debug!("Probing {} (attempt {})", url, attempt + 1);

        let response = match http
            .get(url.clone())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Domain probe request failed: {}", e);
                return ProbeOutcome::transport_failure();
            }
        };

        let status = response.status();
        if status.is_server_error() && attempt < retry.max_retries {
            let delay = retry.backoff(attempt);
            attempt += 1;
            tracing::debug!(
                "Probe got {}, retrying in {:?} ({} of {})",
                status,
                delay,
                attempt,
                retry.max_retries
            );
            tokio::time::sleep(delay).await;
            continue;
        }

        return match response.text().await {
            Ok(body) => ProbeOutcome {
                success: true,
                status: status.as_u16(),
                body,
            },
            Err(e) => {
                tracing::warn!("Failed to read probe response body: {}", e);
                ProbeOutcome::transport_failure()
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(5))
    }

    fn probe_url(server: &MockServer) -> Url {
        Url::parse(&format!("{}/searchdomaincheck?format=domain&type=chrome", server.uri()))
            .unwrap()
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let retry = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(retry.backoff(0), Duration::from_millis(100));
        assert_eq!(retry.backoff(1), Duration::from_millis(200));
        assert_eq!(retry.backoff(2), Duration::from_millis(350));
        assert_eq!(retry.backoff(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_successful_probe_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/searchdomaincheck"))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_string(".google.co.uk"))
            .expect(1)
            .mount(&server)
            .await;

        let http = build_client().unwrap();
        let outcome = fetch(&http, &probe_url(&server), &quick_retry(5)).await;

        assert_eq!(outcome, ProbeOutcome::ok(".google.co.uk"));
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(".google.de"))
            .mount(&server)
            .await;

        let http = build_client().unwrap();
        let outcome = fetch(&http, &probe_url(&server), &quick_retry(5)).await;

        assert_eq!(outcome, ProbeOutcome::ok(".google.de"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let http = build_client().unwrap();
        let outcome = fetch(&http, &probe_url(&server), &quick_retry(2)).await;

        assert!(outcome.success);
        assert_eq!(outcome.status, 500);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let http = build_client().unwrap();
        let outcome = fetch(&http, &probe_url(&server), &quick_retry(5)).await;

        assert_eq!(outcome.status, 404);
    }

    #[tokio::test]
    async fn test_probe_does_not_send_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "NID=abc; Path=/")
                    .set_body_string(".google.fr"),
            )
            .mount(&server)
            .await;

        let http = build_client().unwrap();
        fetch(&http, &probe_url(&server), &quick_retry(0)).await;
        fetch(&http, &probe_url(&server), &quick_retry(0)).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].headers.get("cookie").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_failure() {
        let http = build_client().unwrap();
        let url = Url::parse("http://127.0.0.1:1/searchdomaincheck").unwrap();
        let outcome = fetch(&http, &url, &quick_retry(3)).await;

        assert_eq!(outcome, ProbeOutcome::transport_failure());
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let (events, _receiver) = tokio::sync::mpsc::unbounded_channel();
        let config = TrackerConfig {
            response_prefix: String::new(),
            ..TrackerConfig::default()
        };

        assert!(matches!(
            HttpProbeClient::new(&config, events),
            Err(crate::Error::Core(_))
        ));
    }

    #[tokio::test]
    async fn test_client_reports_on_event_queue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(".google.it"))
            .mount(&server)
            .await;

        let (events, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let mut client = HttpProbeClient::new(&TrackerConfig::default(), events)
            .unwrap()
            .with_retry(quick_retry(0));
        client.start_probe(7, &probe_url(&server));

        match receiver.recv().await {
            Some(TrackerEvent::ProbeComplete { fetch_id, outcome }) => {
                assert_eq!(fetch_id, 7);
                assert_eq!(outcome, ProbeOutcome::ok(".google.it"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
