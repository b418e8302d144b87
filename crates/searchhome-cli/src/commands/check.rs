use crate::{OutputFormat, TrackerArgs};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use searchhome_core::decision::{self, Decision, ProbeVerdict};
use searchhome_core::state::TrackerState;
use searchhome_core::{JsonPreferenceStore, ProbeOutcome, TrackerConfig};
use searchhome_net::RetryPolicy;
use searchhome_net::probe::{build_client, fetch};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// What one immediate probe would lead the tracker to do
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub probe_url: String,
    pub status: Option<u16>,
    pub verdict: &'static str,
    pub candidate: Option<String>,
    pub current_domain: String,
    pub last_prompted_domain: Option<String>,
    pub decision: Option<&'static str>,
}

impl CheckReport {
    /// Evaluate `outcome` against the stored state without changing it
    pub fn evaluate(
        config: &TrackerConfig,
        state: &TrackerState,
        outcome: Option<&ProbeOutcome>,
    ) -> Self {
        let mut report = Self {
            probe_url: config.probe_url.to_string(),
            status: None,
            verdict: "disabled",
            candidate: None,
            current_domain: state.current_domain.to_string(),
            last_prompted_domain: state.last_prompted_domain.as_ref().map(|u| u.to_string()),
            decision: None,
        };

        let Some(outcome) = outcome else {
            return report;
        };

        report.status = outcome.success.then_some(outcome.status);
        match decision::interpret(outcome, &config.response_prefix) {
            ProbeVerdict::Failed => report.verdict = "failed",
            ProbeVerdict::Malformed => report.verdict = "malformed",
            ProbeVerdict::Candidate(candidate) => {
                let decision = decision::decide(
                    &candidate,
                    state.last_prompted_domain.as_ref(),
                    &state.current_domain,
                );
                report.verdict = "candidate";
                report.candidate = Some(candidate.to_string());
                report.decision = Some(decision_label(decision));
            }
        }

        report
    }
}

fn decision_label(decision: Decision) -> &'static str {
    match decision {
        Decision::SilentAccept => "silent-accept",
        Decision::AlreadyDecided => "already-decided",
        Decision::SilentReconcile => "silent-reconcile",
        Decision::Prompt => "prompt",
    }
}

/// Probe once, right away, and report the decision against stored preferences
pub fn execute(prefs_path: &Path, args: &TrackerArgs, format: OutputFormat) -> Result<()> {
    let config = args.to_config()?;
    let store = JsonPreferenceStore::open(prefs_path);
    let state = TrackerState::load(&store, &config.default_domain);

    let outcome = if config.background_networking_disabled {
        tracing::info!("Background networking disabled, not probing");
        None
    } else {
        Some(probe_now(&config, format)?)
    };

    let report = CheckReport::evaluate(&config, &state, outcome.as_ref());
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => output_pretty(&report),
    }

    Ok(())
}

fn probe_now(config: &TrackerConfig, format: OutputFormat) -> Result<ProbeOutcome> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let spinner = match format {
        OutputFormat::Pretty => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
            spinner.set_message(format!("Probing {}", config.probe_url));
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        }
        OutputFormat::Json => ProgressBar::hidden(),
    };

    let http = build_client()?;
    let retry = RetryPolicy {
        max_retries: config.max_retries,
        ..RetryPolicy::default()
    };
    let outcome = runtime.block_on(fetch(&http, &config.probe_url, &retry));

    spinner.finish_and_clear();
    Ok(outcome)
}

fn output_pretty(report: &CheckReport) {
    use console::style;

    println!("{}", style("Search domain check").bold().cyan());
    println!("{}", style("===================").cyan());
    println!("  Probe:          {}", style(&report.probe_url).dim());
    println!("  Current domain: {}", report.current_domain);
    println!(
        "  Last prompted:  {}",
        report.last_prompted_domain.as_deref().unwrap_or("(never)")
    );
    println!();

    match (report.verdict, &report.candidate, report.decision) {
        ("candidate", Some(candidate), Some(decision)) => {
            println!("  Candidate:      {}", style(candidate).green().bold());
            let explanation = match decision {
                "silent-accept" => "switch without asking (never prompted before)",
                "already-decided" => "nothing to do (already asked about this domain)",
                "silent-reconcile" => "record it; the domain in effect already matches",
                _ => "ask on the next search",
            };
            println!("  Decision:       {} - {}", style(decision).yellow(), explanation);
        }
        ("disabled", _, _) => {
            println!("{}", style("Background networking is disabled; no probe sent.").yellow());
        }
        ("malformed", _, _) => {
            println!(
                "{}",
                style("Probe answered, but not with a search domain; nothing would change.")
                    .yellow()
            );
        }
        _ => {
            let status = report
                .status
                .map(|s| format!("HTTP {}", s))
                .unwrap_or_else(|| "no response".to_string());
            println!(
                "{} ({}); the tracker would retry on the next network change.",
                style("Probe failed").red().bold(),
                status
            );
        }
    }
}
