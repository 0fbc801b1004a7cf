//! Outcome classification: map an arbitrary provider vocabulary onto the
//! engine's terminal outcomes, falling back to call-shape heuristics when
//! the provider does not say explicitly.

use serde::{Deserialize, Serialize};

use crate::campaign::{CallId, ContactStatus, CounterField};

/// Calls shorter than this are not considered a human conversation when
/// classifying by duration alone
const MIN_CONNECTED_DURATION_SECS: u64 = 5;

/// Terminal classification of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Connected,
    Voicemail,
    Busy,
    NoAnswer,
    Failed,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Connected => "connected",
            CallOutcome::Voicemail => "voicemail",
            CallOutcome::Busy => "busy",
            CallOutcome::NoAnswer => "no_answer",
            CallOutcome::Failed => "failed",
        }
    }

    /// The campaign counter this outcome lands in, alongside completed_calls
    pub fn counter(&self) -> CounterField {
        match self {
            CallOutcome::Connected => CounterField::ConnectedCalls,
            CallOutcome::Voicemail => CounterField::VoicemailCalls,
            CallOutcome::Busy | CallOutcome::NoAnswer | CallOutcome::Failed => {
                CounterField::FailedCalls
            }
        }
    }

    /// The contact status this outcome maps to
    pub fn contact_status(&self) -> ContactStatus {
        match self {
            CallOutcome::Connected => ContactStatus::Completed,
            CallOutcome::Voicemail => ContactStatus::Voicemail,
            CallOutcome::Busy | CallOutcome::NoAnswer | CallOutcome::Failed => {
                ContactStatus::Failed
            }
        }
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inbound call-status event, correlated via the provider call id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStatusEvent {
    pub call_id: CallId,
    /// Provider call status, e.g. "ringing", "in-progress", "ended"
    pub status: String,
    /// Explicit provider outcome, when supplied
    pub outcome: Option<String>,
    pub duration_seconds: Option<u64>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub sentiment: Option<String>,
}

impl CallStatusEvent {
    /// Whether this status ends the call
    pub fn is_terminal(&self) -> bool {
        matches!(
            normalize(&self.status).as_str(),
            "ended"
                | "completed"
                | "complete"
                | "done"
                | "failed"
                | "error"
                | "busy"
                | "no_answer"
                | "canceled"
                | "cancelled"
                | "voicemail"
        )
    }
}

/// Classify a terminal call-status event into an outcome.
///
/// Explicit provider vocabulary wins; otherwise transcript/summary content,
/// then duration, then the status itself decide.
pub fn classify_outcome(event: &CallStatusEvent) -> CallOutcome {
    if let Some(outcome) = event.outcome.as_deref() {
        if let Some(mapped) = map_provider_outcome(outcome) {
            return mapped;
        }
    }

    if looks_like_voicemail(event) {
        return CallOutcome::Voicemail;
    }

    if event
        .duration_seconds
        .map_or(false, |d| d >= MIN_CONNECTED_DURATION_SECS)
    {
        return CallOutcome::Connected;
    }

    // A recorded sentiment implies somebody talked
    if event.sentiment.as_deref().map_or(false, |s| !s.is_empty()) {
        return CallOutcome::Connected;
    }

    match normalize(&event.status).as_str() {
        "busy" => CallOutcome::Busy,
        "no_answer" => CallOutcome::NoAnswer,
        _ => CallOutcome::Failed,
    }
}

fn map_provider_outcome(raw: &str) -> Option<CallOutcome> {
    match normalize(raw).as_str() {
        "connected" | "answered" | "human" | "human_answered" | "success" | "successful"
        | "completed" => Some(CallOutcome::Connected),
        "voicemail" | "machine" | "answering_machine" | "voicemail_left" => {
            Some(CallOutcome::Voicemail)
        }
        "busy" => Some(CallOutcome::Busy),
        "no_answer" | "unanswered" | "missed" => Some(CallOutcome::NoAnswer),
        "failed" | "error" | "rejected" | "canceled" | "cancelled" | "declined" => {
            Some(CallOutcome::Failed)
        }
        _ => None,
    }
}

fn looks_like_voicemail(event: &CallStatusEvent) -> bool {
    let text = [event.transcript.as_deref(), event.summary.as_deref()]
        .iter()
        .flatten()
        .map(|s| s.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        return false;
    }

    ["voicemail", "leave a message", "after the tone", "answering machine", "mailbox"]
        .iter()
        .any(|marker| text.contains(marker))
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: &str) -> CallStatusEvent {
        CallStatusEvent {
            call_id: CallId::new(),
            status: status.to_string(),
            outcome: None,
            duration_seconds: None,
            transcript: None,
            summary: None,
            sentiment: None,
        }
    }

    #[test]
    fn explicit_outcome_wins() {
        let mut e = event("ended");
        e.outcome = Some("Answering-Machine".to_string());
        e.duration_seconds = Some(120);
        assert_eq!(classify_outcome(&e), CallOutcome::Voicemail);
    }

    #[test]
    fn voicemail_heuristic_from_transcript() {
        let mut e = event("ended");
        e.transcript = Some("Please leave a message after the tone".to_string());
        assert_eq!(classify_outcome(&e), CallOutcome::Voicemail);
    }

    #[test]
    fn duration_implies_connected() {
        let mut e = event("ended");
        e.duration_seconds = Some(42);
        assert_eq!(classify_outcome(&e), CallOutcome::Connected);
    }

    #[test]
    fn short_call_is_not_connected() {
        let mut e = event("no-answer");
        e.duration_seconds = Some(2);
        assert_eq!(classify_outcome(&e), CallOutcome::NoAnswer);
    }

    #[test]
    fn busy_status_classifies_as_busy() {
        assert_eq!(classify_outcome(&event("busy")), CallOutcome::Busy);
    }

    #[test]
    fn bare_ended_with_nothing_else_fails() {
        assert_eq!(classify_outcome(&event("ended")), CallOutcome::Failed);
    }

    #[test]
    fn ringing_is_not_terminal() {
        assert!(!event("ringing").is_terminal());
        assert!(event("ended").is_terminal());
        assert!(event("no-answer").is_terminal());
    }

    #[test]
    fn outcome_counter_pairing() {
        assert_eq!(CallOutcome::Connected.counter(), CounterField::ConnectedCalls);
        assert_eq!(CallOutcome::Voicemail.counter(), CounterField::VoicemailCalls);
        assert_eq!(CallOutcome::Busy.counter(), CounterField::FailedCalls);
        assert_eq!(CallOutcome::NoAnswer.counter(), CounterField::FailedCalls);
    }
}
