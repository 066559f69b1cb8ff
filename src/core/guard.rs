use std::fmt;

use tracing::{debug, warn};

/// Everything the guard looks at. Borrowed from the session at submit time.
#[derive(Debug, Clone, Copy)]
pub struct GuardInput<'a> {
    pub session_id: Option<&'a str>,
    pub draft: &'a str,
    pub has_attachment: bool,
    pub in_flight: bool,
}

/// Why a submission was not sent. Never shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    SessionUnresolved,
    EmptyDraft,
    RequestInFlight,
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            GuardRejection::SessionUnresolved => "session id not resolved",
            GuardRejection::EmptyDraft => "nothing to send",
            GuardRejection::RequestInFlight => "a request is already in flight",
        };
        f.write_str(reason)
    }
}

pub struct SubmissionGuard;

impl SubmissionGuard {
    /// Checks, in order: session resolved, something to send, nothing in
    /// flight. Has no side effects beyond a diagnostic log line.
    pub fn check(input: &GuardInput<'_>) -> Result<(), GuardRejection> {
        let rejection = if input.session_id.is_none_or(|id| id.trim().is_empty()) {
            GuardRejection::SessionUnresolved
        } else if input.draft.trim().is_empty() && !input.has_attachment {
            GuardRejection::EmptyDraft
        } else if input.in_flight {
            GuardRejection::RequestInFlight
        } else {
            return Ok(());
        };

        match rejection {
            GuardRejection::SessionUnresolved => {
                warn!("Submission dropped: {rejection}")
            }
            _ => debug!("Submission dropped: {rejection}"),
        }
        Err(rejection)
    }
}
