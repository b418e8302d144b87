use crate::service::TrackerHandle;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Public address used only to pick the outbound route; nothing is sent to it
const ROUTE_PROBE_ADDR: ([u8; 4], u16) = ([8, 8, 8, 8], 80);

/// Polls the host's outbound IP address and reports changes to the tracker.
///
/// The first time an address is seen the network context is reported ready;
/// every later change of address is reported as an IP address change.
pub struct NetworkChangeWatcher {
    interval: Duration,
    route_probe: SocketAddr,
}

impl NetworkChangeWatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            route_probe: ROUTE_PROBE_ADDR.into(),
        }
    }

    pub fn spawn(self, handle: TrackerHandle) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            let mut last: Option<IpAddr> = None;
            let mut context_reported = false;

            loop {
                ticker.tick().await;
                let now = outbound_address(self.route_probe).await;

                match classify(last, now, context_reported) {
                    NetworkChange::ContextReady => {
                        tracing::debug!("Network up, local address {:?}", now);
                        context_reported = true;
                        handle.network_context_ready();
                    }
                    NetworkChange::AddressChanged => {
                        tracing::info!("Local address changed: {:?} -> {:?}", last, now);
                        handle.ip_address_changed();
                    }
                    NetworkChange::None => {}
                }

                if now.is_some() {
                    last = now;
                }
            }
        })
    }
}

impl Default for NetworkChangeWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetworkChange {
    None,
    ContextReady,
    AddressChanged,
}

/// Losing the address is not reported; the change shows once a new one appears.
fn classify(last: Option<IpAddr>, now: Option<IpAddr>, context_reported: bool) -> NetworkChange {
    match now {
        None => NetworkChange::None,
        Some(_) if !context_reported => NetworkChange::ContextReady,
        Some(addr) if last != Some(addr) => NetworkChange::AddressChanged,
        Some(_) => NetworkChange::None,
    }
}

/// Local address the OS would use to reach `route_probe`
async fn outbound_address(route_probe: SocketAddr) -> Option<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await.ok()?;
    socket.connect(route_probe).await.ok()?;
    let addr = socket.local_addr().ok()?.ip();
    (!addr.is_unspecified()).then_some(addr)
}
