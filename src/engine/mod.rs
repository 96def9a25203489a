//! Health-gated operation execution.
//!
//! The engine probes indexer health before each operation. Below the
//! threshold it brings the tunnel up (trying each fallback location in
//! order), waits for indexers to recover and re-measures; the operation only
//! runs if health recovered or the tunnel could not be brought up at all.

pub mod outcome;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;
use crate::health::{HealthProbe, HealthSnapshot};
use crate::indexer::{IndexerError, SearchResult};
use crate::tunnel::{TunnelController, TunnelError, TunnelState};

pub use outcome::{OperationOutcome, OutcomeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub indexer_ids: Vec<i64>,
    pub categories: Vec<i64>,
    pub limit: u32,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, limit: u32) -> Self {
        Self {
            query: query.into(),
            indexer_ids: Vec::new(),
            categories: Vec::new(),
            limit,
        }
    }
}

/// Operations the engine can gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Search(SearchQuery),
}

#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error("{0}")]
    Other(String),
}

/// Performs the actual search once the engine lets it through.
#[async_trait]
pub trait SearchDelegate: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, DelegateError>;
}

/// Combined health and tunnel view.
#[derive(Debug, Clone, Serialize)]
pub struct SystemOverview {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_error: Option<String>,
    pub tunnel: TunnelState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnect_deadline: Option<DateTime<Utc>>,
    pub threshold: u8,
    /// Health is at or above the threshold.
    pub ready: bool,
}

#[derive(Clone)]
pub struct OrchestrationEngine {
    probe: HealthProbe,
    controller: TunnelController,
    delegate: Arc<dyn SearchDelegate>,
    recovery_wait: Duration,
}

impl OrchestrationEngine {
    pub fn new(
        probe: HealthProbe,
        controller: TunnelController,
        delegate: Arc<dyn SearchDelegate>,
        recovery_wait: Duration,
    ) -> Self {
        Self {
            probe,
            controller,
            delegate,
            recovery_wait,
        }
    }

    pub fn from_config(
        config: &Config,
        probe: HealthProbe,
        controller: TunnelController,
        delegate: Arc<dyn SearchDelegate>,
    ) -> Self {
        Self::new(
            probe,
            controller,
            delegate,
            Duration::from_secs(config.recovery_wait_secs),
        )
    }

    /// Run `operation` behind the health gate. Never fails; every error is
    /// folded into a `Failed` outcome.
    pub async fn execute(&self, operation: &Operation, threshold: u8) -> OperationOutcome {
        let before = self.snapshot().await;
        info!(score = before.score, threshold, "health before operation");

        let mut engaged = false;
        let mut recovered: i64 = 0;
        let mut tunnel_note = None;
        let tunnel;

        if before.score >= threshold {
            let state = self.controller.status().await;
            if state.is_connected() {
                self.controller.reset_activity_timer();
            }
            tunnel = Some(state);
        } else {
            info!(
                score = before.score,
                threshold, "health below threshold, bringing VPN up"
            );
            match self
                .controller
                .connect_with_fallback(self.controller.recommended_locations())
                .await
            {
                Ok(state) => {
                    engaged = true;
                    sleep(self.recovery_wait).await;
                    let after = self.snapshot().await;
                    recovered = after.healthy_resources as i64 - before.healthy_resources as i64;
                    self.controller.reset_activity_timer();
                    info!(
                        before = before.score,
                        after = after.score,
                        recovered,
                        "health after VPN recovery"
                    );

                    if after.score < threshold {
                        return OperationOutcome::new(
                            OutcomeKind::HealthStillDegraded,
                            format!(
                                "Indexers still unhealthy after VPN connection ({}%, threshold {}%). Check the indexer configuration or try another VPN location.",
                                after.score, threshold
                            ),
                            after.score,
                        )
                        .with_tunnel(true, Some(state))
                        .with_recovered(recovered);
                    }
                    tunnel = Some(state);
                }
                Err(e) => {
                    warn!(error = %e, "VPN could not be brought up, continuing without it");
                    tunnel_note = Some(tunnel_failure_note(&e));
                    tunnel = self.controller.last_known();
                }
            }
        }

        match operation {
            Operation::Search(query) => match self.delegate.search(query).await {
                Ok(results) if results.is_empty() => {
                    let score = self.probe.probe_score().await;
                    let message = append_note(
                        "No results found. Try different terms or check indexer health.".to_string(),
                        tunnel_note,
                    );
                    OperationOutcome::new(OutcomeKind::NoResults, message, score)
                        .with_tunnel(engaged, tunnel)
                        .with_recovered(recovered)
                }
                Ok(results) => {
                    let score = self.probe.probe_score().await;
                    let message = append_note(
                        success_message(results.len(), engaged, recovered),
                        tunnel_note,
                    );
                    info!(results = results.len(), score, engaged, "operation completed");
                    OperationOutcome::new(OutcomeKind::Completed, message, score)
                        .with_tunnel(engaged, tunnel)
                        .with_recovered(recovered)
                        .with_results(results)
                }
                Err(e) => {
                    warn!(error = %e, "search failed");
                    let (score, state) =
                        tokio::join!(self.probe.probe_score(), self.controller.status());
                    OperationOutcome::new(OutcomeKind::Failed, format!("Search failed: {e}"), score)
                        .with_tunnel(engaged, Some(state))
                        .with_recovered(recovered)
                }
            },
        }
    }

    async fn snapshot(&self) -> HealthSnapshot {
        match self.probe.probe().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "health probe failed, treating as score 0");
                HealthSnapshot::default()
            }
        }
    }

    /// Health and tunnel state, probed concurrently.
    pub async fn system_status(&self, threshold: u8) -> SystemOverview {
        let (health, tunnel) = tokio::join!(self.probe.probe(), self.controller.status());
        let (health, health_error) = match health {
            Ok(snapshot) => (Some(snapshot), None),
            Err(e) => (None, Some(e.to_string())),
        };
        SystemOverview {
            timestamp: Utc::now(),
            ready: health.as_ref().is_some_and(|h| h.score >= threshold),
            health,
            health_error,
            tunnel,
            disconnect_deadline: self.controller.disconnect_deadline(),
            threshold,
        }
    }

    pub async fn force_disconnect(&self) -> Result<TunnelState, TunnelError> {
        self.controller.disconnect().await
    }

    /// Extend the tunnel session after activity outside `execute`.
    pub fn record_activity(&self) -> bool {
        self.controller.reset_activity_timer()
    }

    pub fn controller(&self) -> &TunnelController {
        &self.controller
    }

    pub fn probe(&self) -> &HealthProbe {
        &self.probe
    }
}

fn success_message(count: usize, engaged: bool, recovered: i64) -> String {
    let mut message = format!("Found {count} results.");
    if engaged && recovered > 0 {
        let plural = if recovered == 1 { "" } else { "s" };
        message.push_str(&format!(
            " Connected the VPN and restored {recovered} indexer{plural}; it disconnects automatically after a period of inactivity."
        ));
    } else if engaged {
        message.push_str(" Using the VPN connection; the session was extended.");
    }
    message
}

fn tunnel_failure_note(e: &TunnelError) -> String {
    match e {
        TunnelError::AuthenticationRequired { login_url: Some(url) } => {
            format!("VPN not used: the account requires login at {url}.")
        }
        _ => format!("VPN not used: {e}."),
    }
}

fn append_note(message: String, note: Option<String>) -> String {
    match note {
        Some(note) => format!("{message} {note}"),
        None => message,
    }
}
