//! Console rendition of the domain-change confirmation.

use console::{Term, style};
use searchhome_core::ConfirmationUi;
use searchhome_net::{EventSender, TrackerEvent};
use url::Url;

/// Asks on the terminal whether to switch to a newly detected search domain.
///
/// The question is asked on a blocking thread; the answer goes back to the
/// tracker as `AcceptPrompt`/`CancelPrompt` followed by `PromptClosed`.
pub struct ConsoleConfirmation {
    events: EventSender,
}

impl ConsoleConfirmation {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl ConfirmationUi for ConsoleConfirmation {
    fn show_confirmation(&mut self, candidate: &Url) {
        let events = self.events.clone();
        let host = candidate.host_str().unwrap_or(candidate.as_str()).to_string();

        tokio::task::spawn_blocking(move || {
            let term = Term::stderr();
            let _ = term.write_line("");
            let _ = term.write_line(&format!(
                "🔎 Your searches now resolve to {}",
                style(&host).bold().cyan()
            ));
            let _ = term.write_line(&format!(
                "   Switch your search domain to {}? [y/n]",
                style(&host).bold()
            ));

            let key = match term.read_char() {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!("Could not read confirmation answer: {}", e);
                    None
                }
            };

            for event in answer_events(key) {
                if events.send(event).is_err() {
                    tracing::debug!("Tracker stopped before the prompt was answered");
                    break;
                }
            }
        });
    }
}

/// Events that report a key press back to the tracker. Anything other than
/// yes or no dismisses the prompt without an answer.
pub fn answer_events(key: Option<char>) -> Vec<TrackerEvent> {
    match key.map(|k| k.to_ascii_lowercase()) {
        Some('y') => vec![TrackerEvent::AcceptPrompt, TrackerEvent::PromptClosed],
        Some('n') => vec![TrackerEvent::CancelPrompt, TrackerEvent::PromptClosed],
        _ => vec![TrackerEvent::PromptClosed],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_accepts_then_closes() {
        let events = answer_events(Some('Y'));
        assert!(matches!(
            events.as_slice(),
            [TrackerEvent::AcceptPrompt, TrackerEvent::PromptClosed]
        ));
    }

    #[test]
    fn test_no_cancels_then_closes() {
        let events = answer_events(Some('n'));
        assert!(matches!(
            events.as_slice(),
            [TrackerEvent::CancelPrompt, TrackerEvent::PromptClosed]
        ));
    }

    #[test]
    fn test_other_keys_only_close() {
        assert!(matches!(
            answer_events(Some('q')).as_slice(),
            [TrackerEvent::PromptClosed]
        ));
        assert!(matches!(
            answer_events(None).as_slice(),
            [TrackerEvent::PromptClosed]
        ));
    }
}
