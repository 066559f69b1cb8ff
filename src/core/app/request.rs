/// Lifecycle of the most recent request.
///
/// `Delivered` and `Failed` are resting states like `Idle`: only `Sending`
/// blocks a new submission. A failure's message stays visible until the next
/// accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestPhase {
    #[default]
    Idle,
    Sending {
        request_id: u64,
    },
    Delivered {
        request_id: u64,
    },
    Failed {
        request_id: u64,
        error: String,
    },
}

impl RequestPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestPhase::Sending { .. })
    }

    pub fn in_flight_id(&self) -> Option<u64> {
        match self {
            RequestPhase::Sending { request_id } => Some(*request_id),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RequestPhase::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// What a view needs to render the request status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    pub is_loading: bool,
    pub error: Option<String>,
}

impl From<&RequestPhase> for ViewState {
    fn from(phase: &RequestPhase) -> Self {
        Self {
            is_loading: phase.is_in_flight(),
            error: phase.error().map(str::to_owned),
        }
    }
}
