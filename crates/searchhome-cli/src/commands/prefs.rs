//! Inspect and clear the tracker's stored preferences.
//!
//! ```bash
//! # Show the stored search domain and last prompted domain
//! searchhome prefs show
//!
//! # Forget everything; the next run starts from the default domain
//! searchhome prefs reset
//! ```

use crate::OutputFormat;
use anyhow::Result;
use searchhome_core::JsonPreferenceStore;
use searchhome_core::prefs::{LAST_KNOWN_GOOGLE_URL, LAST_PROMPTED_GOOGLE_URL};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Serialize)]
struct PrefsReport<'a> {
    path: String,
    exists: bool,
    values: &'a BTreeMap<String, String>,
}

/// Print the stored values
pub fn show(path: &Path, format: OutputFormat) -> Result<()> {
    tracing::debug!("Showing preferences from {}", path.display());

    let store = JsonPreferenceStore::open(path);
    let report = PrefsReport {
        path: path.display().to_string(),
        exists: path.exists(),
        values: store.values(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => output_pretty(&report),
    }

    Ok(())
}

fn output_pretty(report: &PrefsReport) {
    use console::style;

    println!("{}", style("Search domain preferences").bold().cyan());
    println!("  File: {}", style(&report.path).dim());

    if report.values.is_empty() {
        println!("\n{}", style("No preferences stored.").yellow());
        return;
    }

    println!();
    for key in [LAST_KNOWN_GOOGLE_URL, LAST_PROMPTED_GOOGLE_URL] {
        let value = match report.values.get(key).map(String::as_str) {
            Some("") => style("(never prompted)".to_string()).dim(),
            Some(value) => style(value.to_string()).green(),
            None => style("(unset)".to_string()).dim(),
        };
        println!("  {:<36} {}", key, value);
    }

    for (key, value) in report.values {
        if key != LAST_KNOWN_GOOGLE_URL && key != LAST_PROMPTED_GOOGLE_URL {
            println!("  {:<36} {}", key, value);
        }
    }
}

/// Remove every stored value
pub fn reset(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("No preference file at {}", path.display());
        return Ok(());
    }

    let mut store = JsonPreferenceStore::open(path);
    let count = store.values().len();
    store.clear()?;

    tracing::info!("Cleared {} preference values", count);
    println!("✅ Cleared {} values in {}", count, path.display());
    Ok(())
}
