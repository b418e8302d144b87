//! Interpretation of probe results against persisted decisions.

use crate::ports::ProbeOutcome;
use url::Url;

/// What a finished probe told us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// Transport error or non-200 status; the fetch window reopens
    Failed,
    /// 200 but the body is not a domain suffix we understand
    Malformed,
    Candidate(Url),
}

/// How a candidate relates to what the user already has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing was ever prompted: switch without asking
    SilentAccept,
    /// Same candidate as last time the user was asked
    AlreadyDecided,
    /// The user is back on the domain in effect; record it, change nothing
    SilentReconcile,
    /// Ask the user on the next correlated search
    Prompt,
}

pub fn interpret(outcome: &ProbeOutcome, response_prefix: &str) -> ProbeVerdict {
    if !outcome.success || outcome.status != 200 {
        return ProbeVerdict::Failed;
    }

    match candidate_from_body(&outcome.body, response_prefix) {
        Some(candidate) => ProbeVerdict::Candidate(candidate),
        None => ProbeVerdict::Malformed,
    }
}

/// Turn a probe body such as `.google.co.uk` into `http://www.google.co.uk/`
pub fn candidate_from_body(body: &str, response_prefix: &str) -> Option<Url> {
    let suffix = body.trim();
    if !starts_with_ignore_ascii_case(suffix, response_prefix) {
        return None;
    }

    Url::parse(&format!("http://www{}", suffix))
        .ok()
        .filter(|url| url.host_str().is_some())
}

/// First run wins over every other branch, then already-decided, then reconcile.
pub fn decide(candidate: &Url, last_prompted: Option<&Url>, current: &Url) -> Decision {
    match last_prompted {
        None => Decision::SilentAccept,
        Some(prompted) if prompted == candidate => Decision::AlreadyDecided,
        Some(_) if candidate == current => Decision::SilentReconcile,
        Some(_) => Decision::Prompt,
    }
}

fn starts_with_ignore_ascii_case(value: &str, prefix: &str) -> bool {
    let (value, prefix) = (value.as_bytes(), prefix.as_bytes());
    value.len() >= prefix.len() && value[..prefix.len()].eq_ignore_ascii_case(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_candidate_from_plain_suffix() {
        let candidate = candidate_from_body(".google.co.uk", ".google.").unwrap();
        assert_eq!(candidate.as_str(), "http://www.google.co.uk/");
    }

    #[test]
    fn test_candidate_trims_whitespace() {
        let candidate = candidate_from_body("  .google.de\r\n", ".google.").unwrap();
        assert_eq!(candidate.as_str(), "http://www.google.de/");
    }

    #[test]
    fn test_prefix_match_ignores_ascii_case() {
        let candidate = candidate_from_body(".GOOGLE.FR", ".google.").unwrap();
        assert_eq!(candidate.as_str(), "http://www.google.fr/");
    }

    #[test]
    fn test_body_without_prefix_is_rejected() {
        assert_eq!(candidate_from_body("www.google.com", ".google."), None);
        assert_eq!(candidate_from_body(".evil.com", ".google."), None);
        assert_eq!(candidate_from_body("", ".google."), None);
        assert_eq!(candidate_from_body("<html>", ".google."), None);
    }

    #[test]
    fn test_non_ascii_body_does_not_panic() {
        assert_eq!(candidate_from_body("é", ".google."), None);
    }

    #[test]
    fn test_interpret_failures() {
        assert_eq!(
            interpret(&ProbeOutcome::transport_failure(), ".google."),
            ProbeVerdict::Failed
        );
        assert_eq!(
            interpret(&ProbeOutcome::http_status(503, ".google.de"), ".google."),
            ProbeVerdict::Failed
        );
        assert_eq!(
            interpret(&ProbeOutcome::http_status(204, ""), ".google."),
            ProbeVerdict::Failed
        );
    }

    #[test]
    fn test_interpret_malformed_and_candidate() {
        assert_eq!(
            interpret(&ProbeOutcome::ok("nope"), ".google."),
            ProbeVerdict::Malformed
        );
        assert_eq!(
            interpret(&ProbeOutcome::ok(".google.de"), ".google."),
            ProbeVerdict::Candidate(url("http://www.google.de/"))
        );
    }

    #[test]
    fn test_first_run_wins() {
        let current = url("http://www.google.com/");
        assert_eq!(decide(&current, None, &current), Decision::SilentAccept);
        assert_eq!(
            decide(&url("http://www.google.de/"), None, &current),
            Decision::SilentAccept
        );
    }

    #[test]
    fn test_already_decided_before_reconcile() {
        let candidate = url("http://www.google.fr/");
        assert_eq!(
            decide(&candidate, Some(&candidate), &candidate),
            Decision::AlreadyDecided
        );
    }

    #[test]
    fn test_back_on_current_domain_reconciles() {
        let current = url("http://www.google.fr/");
        let prompted = url("http://www.google.de/");
        assert_eq!(
            decide(&current, Some(&prompted), &current),
            Decision::SilentReconcile
        );
    }

    #[test]
    fn test_new_candidate_prompts() {
        assert_eq!(
            decide(
                &url("http://www.google.de/"),
                Some(&url("http://www.google.fr/")),
                &url("http://www.google.fr/"),
            ),
            Decision::Prompt
        );
    }
}
