use crate::TrackerArgs;
use crate::ui::ConsoleConfirmation;
use anyhow::{Result, anyhow};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use searchhome_browser::{
    BrowserNavigator, BrowserProfile, ChromeFinder, ChromeLauncher, NavigationEvent,
    NavigationSession,
};
use searchhome_core::ports::NoopNavigator;
use searchhome_core::prefs::{LAST_KNOWN_GOOGLE_URL, register_defaults};
use searchhome_core::state::read_url;
use searchhome_core::{Collaborators, JsonPreferenceStore, SearchNavigator, TrackerConfig};
use searchhome_net::{
    HttpProbeClient, NetworkChangeWatcher, ServiceChannels, TrackerEvent, TrackerHandle,
    TrackerService, TrackerSnapshot,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use url::Url;

/// Longest a headless check waits for the probe after the startup delay
const HEADLESS_PROBE_TIMEOUT: Duration = Duration::from_secs(90);

const SNAPSHOT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct RunOptions {
    pub chrome_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub url: Option<String>,
    pub headless_check: bool,
}

/// Kill a process by PID (cross-platform)
fn kill_process_by_pid(pid: u32) {
    #[cfg(unix)]
    {
        use std::process::Command;
        let _ = Command::new("kill").arg(pid.to_string()).output();
    }

    #[cfg(windows)]
    {
        use std::process::Command;
        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output();
    }
}

pub fn execute(prefs_path: &Path, args: &TrackerArgs, options: RunOptions) -> Result<()> {
    let config = args.to_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        if options.headless_check {
            headless_check(prefs_path, config).await
        } else {
            run_with_browser(prefs_path, config, options).await
        }
    });

    // the console prompt may still be blocked on a key press
    runtime.shutdown_timeout(Duration::from_millis(100));

    result
}

fn open_preferences(path: &Path, config: &TrackerConfig) -> Result<JsonPreferenceStore> {
    let mut store = JsonPreferenceStore::open(path);
    register_defaults(&mut store, &config.default_domain)?;
    Ok(store)
}

/// Start the tracker service with the given navigator and console prompt
fn start_service(
    config: TrackerConfig,
    prefs: JsonPreferenceStore,
    navigator: Box<dyn SearchNavigator>,
    context_available: bool,
) -> Result<(TrackerHandle, tokio::task::JoinHandle<()>)> {
    let channels = ServiceChannels::new();
    let probe = HttpProbeClient::new(&config, channels.events())?;

    let collaborators = Collaborators {
        prefs: Box::new(prefs),
        probe: Box::new(probe),
        ui: Box::new(ConsoleConfirmation::new(channels.events())),
        observer: Box::new(channels.observer()),
        navigator,
    };

    Ok(TrackerService::spawn(
        config,
        collaborators,
        channels,
        context_available,
    ))
}

/// Run the service without a browser until one probe has reported back
async fn headless_check(prefs_path: &Path, config: TrackerConfig) -> Result<()> {
    let prefs = open_preferences(prefs_path, &config)?;
    let deadline = tokio::time::Instant::now() + config.startup_delay + HEADLESS_PROBE_TIMEOUT;
    let kill_switch = config.background_networking_disabled;
    let startup_delay = config.startup_delay;

    let (handle, service_task) = start_service(config, prefs, Box::new(NoopNavigator), true)?;
    let mut changes = handle.subscribe();
    handle.request_server_check();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!(
        "Waiting {:?} startup delay, then probing...",
        startup_delay
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let snapshot = if kill_switch {
        handle.snapshot().await
    } else {
        wait_for_probe(&handle, deadline).await
    };
    spinner.finish_and_clear();

    let snapshot = snapshot.ok_or_else(|| anyhow!("Tracker service stopped unexpectedly"))?;
    report_snapshot(&snapshot, kill_switch);

    while let Ok(domain) = changes.try_recv() {
        println!("✅ Search domain changed to {}", style(domain).green().bold());
    }

    handle.shutdown();
    let _ = service_task.await;

    if !kill_switch && snapshot.probes_completed == 0 {
        return Err(anyhow!("No probe result before timeout"));
    }
    Ok(())
}

async fn wait_for_probe(
    handle: &TrackerHandle,
    deadline: tokio::time::Instant,
) -> Option<TrackerSnapshot> {
    loop {
        let snapshot = handle.snapshot().await?;
        if snapshot.probes_completed > 0 || tokio::time::Instant::now() >= deadline {
            return Some(snapshot);
        }
        tokio::time::sleep(SNAPSHOT_POLL_INTERVAL).await;
    }
}

fn report_snapshot(snapshot: &TrackerSnapshot, kill_switch: bool) {
    if kill_switch {
        println!(
            "{}",
            style("Background networking is disabled; no probe sent.").yellow()
        );
    } else if snapshot.probes_completed == 0 {
        println!("{}", style("⚠️  Probe did not complete").yellow());
    }

    println!("  Search domain: {}", style(&snapshot.current_domain).bold());
    if let Some(fetched) = &snapshot.fetched_domain {
        println!("  Probe result:  {}", fetched);
    }
    if snapshot.need_to_prompt {
        println!(
            "  {}",
            style("A different domain was detected; you will be asked on your next search.")
                .dim()
        );
    }
}

async fn run_with_browser(
    prefs_path: &Path,
    config: TrackerConfig,
    options: RunOptions,
) -> Result<()> {
    // Step 1: Find Chrome binary
    println!("🔍 Locating Chrome...");
    let chrome_binary = ChromeFinder::new(options.chrome_path).find()?;
    println!("✅ Found Chrome at: {}", chrome_binary.display());

    // Step 2: Profile
    let profile = match &options.profile {
        Some(name) => BrowserProfile::named(name)?,
        None => BrowserProfile::temporary()?,
    };
    println!("📁 Using profile: {}", profile.path().display());

    let prefs = open_preferences(prefs_path, &config)?;
    let start_url = options.url.clone().unwrap_or_else(|| {
        read_url(&prefs, LAST_KNOWN_GOOGLE_URL)
            .unwrap_or_else(|| config.default_domain.clone())
            .to_string()
    });

    // Step 3: Launch Chrome
    let launcher = ChromeLauncher::new(chrome_binary, profile.path().to_path_buf(), start_url);
    println!("🚀 Launching Chrome...");
    let chrome_process = launcher.launch()?;
    let chrome_pid = chrome_process.id();

    // Step 4: Attach the navigation observer
    let (navigation_tx, navigation_rx) = mpsc::unbounded_channel();
    let session = NavigationSession::new(launcher.debugging_port());
    let (navigator, observer_task): (BrowserNavigator, _) =
        match session.observe(navigation_tx).await {
            Ok(attached) => attached,
            Err(e) => {
                kill_process_by_pid(chrome_pid);
                return Err(e.into());
            }
        };

    // Step 5: Tracker service and its inputs
    let (handle, service_task) = start_service(config, prefs, Box::new(navigator), false)?;
    let watcher = NetworkChangeWatcher::default().spawn(handle.clone());
    let forwarder = tokio::spawn(forward_navigation(navigation_rx, handle.clone()));
    let announcer = tokio::spawn(announce_changes(handle.subscribe()));
    handle.request_server_check();

    println!(
        "🔎 Watching searches. Current search domain: {}",
        style(handle.google_url()).bold()
    );
    println!("Close Chrome or press Ctrl+C to stop.");

    // Step 6: Wait for Chrome to exit or Ctrl+C
    let mut chrome_process = chrome_process;
    let wait_task = tokio::task::spawn_blocking(move || chrome_process.wait());

    tokio::select! {
        result = wait_task => {
            let status = result??;
            println!("\n🛑 Chrome closed (exit code: {})", status.code().unwrap_or(-1));
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n🛑 Stopping...");
            kill_process_by_pid(chrome_pid);
        }
    }

    // Step 7: Teardown
    handle.tab_closed();
    handle.shutdown();
    let _ = service_task.await;
    for task in [watcher, forwarder, announcer, observer_task] {
        task.abort();
    }

    println!("Search domain: {}", style(handle.google_url()).bold());
    drop(profile);
    Ok(())
}

/// The tracker input for a navigation lifecycle event
pub fn tracker_event(event: NavigationEvent) -> TrackerEvent {
    match event {
        NavigationEvent::SearchCommitted => TrackerEvent::SearchCommitted,
        NavigationEvent::Pending(url) => TrackerEvent::NavigationPending(url),
        NavigationEvent::Committed => TrackerEvent::NavigationCommitted,
        NavigationEvent::Closed => TrackerEvent::TabClosed,
    }
}

async fn forward_navigation(
    mut navigation: mpsc::UnboundedReceiver<NavigationEvent>,
    handle: TrackerHandle,
) {
    let events = handle.events();
    while let Some(event) = navigation.recv().await {
        let closed = event == NavigationEvent::Closed;
        if events.send(tracker_event(event)).is_err() || closed {
            break;
        }
    }
}

async fn announce_changes(mut changes: broadcast::Receiver<Url>) {
    loop {
        match changes.recv().await {
            Ok(domain) => println!(
                "✅ Search domain is now {}",
                style(domain).green().bold()
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Missed {} domain change notifications", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
