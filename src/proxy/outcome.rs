// src/proxy/outcome.rs
use hyper::{Method, StatusCode, Uri};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Backend response copied to the caller in full.
    Relayed,
    /// A backend answered but its body could not be copied to the caller.
    RelayFailed,
    /// Every backend failed at the transport level.
    Exhausted,
    /// The inbound request could not be captured, so no backend was tried.
    Rejected,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Relayed => "relayed",
            OutcomeKind::RelayFailed => "relay_failed",
            OutcomeKind::Exhausted => "exhausted",
            OutcomeKind::Rejected => "rejected",
        }
    }
}

/// Stands in for the backend on requests that never reached one.
pub const NO_BACKEND: &str = "-";

/// What happened to one inbound request, recorded once it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub method: Method,
    pub url: Uri,
    /// URL of the backend that answered, or of the last one tried on exhaustion.
    pub backend: String,
    /// `host:port` of the same backend, shared with the attempt metrics.
    pub backend_id: String,
    pub status: StatusCode,
    pub attempts: usize,
    pub duration: Duration,
    pub kind: OutcomeKind,
    pub error: Option<String>,
}

/// Receives one [`RequestOutcome`] per request.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, outcome: RequestOutcome);
}
