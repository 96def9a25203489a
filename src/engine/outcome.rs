use serde::Serialize;

use crate::indexer::SearchResult;
use crate::tunnel::TunnelState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Completed,
    /// The operation ran but matched nothing. Not an error.
    NoResults,
    /// The tunnel came up but health stayed below the threshold; the
    /// operation was not attempted.
    HealthStillDegraded,
    Failed,
}

/// Result of [`OrchestrationEngine::execute`](super::OrchestrationEngine::execute).
/// Every outcome carries a non-empty message, a health score and the
/// tunnel's connection flag.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub kind: OutcomeKind,
    pub success: bool,
    pub message: String,
    pub health_score: u8,
    /// Whether this call had to bring the tunnel up.
    pub tunnel_engaged: bool,
    pub tunnel_connected: bool,
    /// Change in healthy resources across the tunnel recovery. Negative when
    /// health got worse.
    pub resources_recovered: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<TunnelState>,
    pub results: Vec<SearchResult>,
}

impl OperationOutcome {
    pub(crate) fn new(kind: OutcomeKind, message: impl Into<String>, health_score: u8) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = match kind {
                OutcomeKind::Completed => "Operation completed.",
                OutcomeKind::NoResults => "No results found.",
                OutcomeKind::HealthStillDegraded => "Indexer health is still degraded.",
                OutcomeKind::Failed => "Operation failed.",
            }
            .to_string();
        }
        Self {
            success: kind == OutcomeKind::Completed,
            kind,
            message,
            health_score,
            tunnel_engaged: false,
            tunnel_connected: false,
            resources_recovered: 0,
            tunnel: None,
            results: Vec::new(),
        }
    }

    pub(crate) fn with_tunnel(mut self, engaged: bool, state: Option<TunnelState>) -> Self {
        self.tunnel_engaged = engaged;
        self.tunnel_connected = state.as_ref().is_some_and(TunnelState::is_connected);
        self.tunnel = state;
        self
    }

    pub(crate) fn with_recovered(mut self, recovered: i64) -> Self {
        self.resources_recovered = recovered;
        self
    }

    pub(crate) fn with_results(mut self, results: Vec<SearchResult>) -> Self {
        self.results = results;
        self
    }
}
