//! Indexer health measurement.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::indexer::models::{HealthIssue, Indexer, IndexerStatus, SystemStatus};

use super::report::HealthReport;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("health source unavailable: {0}")]
    Unavailable(String),
}

/// Where resource listings and failure records come from.
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<Indexer>, ProbeError>;

    /// Active failure records. A resource with a record is failing.
    async fn list_failures(&self) -> Result<Vec<IndexerStatus>, ProbeError>;

    async fn system_status(&self) -> Result<SystemStatus, ProbeError> {
        Ok(SystemStatus::default())
    }

    async fn health_issues(&self) -> Result<Vec<HealthIssue>, ProbeError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub resource_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_until: Option<String>,
}

/// Health at one point in time. Only enabled resources are counted, so
/// `healthy_resources + failed_resources == total_resources`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub score: u8,
    pub total_resources: usize,
    pub healthy_resources: usize,
    pub failed_resources: usize,
    pub failure_details: Vec<FailureDetail>,
}

impl HealthSnapshot {
    pub fn compute(resources: &[Indexer], failures: &[IndexerStatus]) -> Self {
        let mut healthy = 0usize;
        let mut failure_details = Vec::new();

        for resource in resources.iter().filter(|r| r.enable) {
            match failures.iter().find(|f| f.indexer_id == resource.id) {
                Some(failure) => failure_details.push(FailureDetail {
                    resource_name: display_name(resource),
                    last_failure_time: failure.most_recent_failure.clone(),
                    disabled_until: failure.disabled_till.clone(),
                }),
                None => healthy += 1,
            }
        }

        let failed = failure_details.len();
        let total = healthy + failed;
        Self {
            score: score(healthy, total),
            total_resources: total,
            healthy_resources: healthy,
            failed_resources: failed,
            failure_details,
        }
    }
}

/// `round(100 * healthy / total)` with halves rounded up; 0 when empty.
fn score(healthy: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (healthy * 200 + total) / (total * 2);
    pct.min(100) as u8
}

pub(crate) fn display_name(indexer: &Indexer) -> String {
    if indexer.name.trim().is_empty() {
        format!("ID {}", indexer.id)
    } else {
        indexer.name.clone()
    }
}

/// Reduces the health source to a score. No caching: every call hits the
/// source.
#[derive(Clone)]
pub struct HealthProbe {
    source: Arc<dyn HealthSource>,
}

impl HealthProbe {
    pub fn new(source: Arc<dyn HealthSource>) -> Self {
        Self { source }
    }

    pub async fn probe(&self) -> Result<HealthSnapshot, ProbeError> {
        let (resources, failures) =
            tokio::try_join!(self.source.list_resources(), self.source.list_failures())?;
        let snapshot = HealthSnapshot::compute(&resources, &failures);
        debug!(
            score = snapshot.score,
            healthy = snapshot.healthy_resources,
            total = snapshot.total_resources,
            "health probed"
        );
        Ok(snapshot)
    }

    /// Lenient form of [`probe`](Self::probe): an unreachable source scores 0.
    pub async fn probe_score(&self) -> u8 {
        match self.probe().await {
            Ok(snapshot) => snapshot.score,
            Err(e) => {
                warn!(error = %e, "health probe failed, scoring 0");
                0
            }
        }
    }

    /// Full report including system info and health issues.
    pub async fn report(&self) -> Result<HealthReport, ProbeError> {
        let (system, issues, resources, failures) = tokio::try_join!(
            self.source.system_status(),
            self.source.health_issues(),
            self.source.list_resources(),
            self.source.list_failures(),
        )?;
        Ok(HealthReport::build(system, issues, &resources, &failures))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_zero_resources_scores_zero() {
        let snapshot = HealthSnapshot::compute(&[], &[]);
        assert_eq!(snapshot.score, 0);
        assert_eq!(snapshot.total_resources, 0);
    }

    #[test]
    fn test_only_enabled_resources_count() {
        let resources = vec![
            indexer(1, "a", true),
            indexer(2, "b", true),
            indexer(3, "c", false),
        ];
        let failures = vec![failure(2), failure(3), failure(99)];
        let snapshot = HealthSnapshot::compute(&resources, &failures);
        assert_eq!(snapshot.total_resources, 2);
        assert_eq!(snapshot.healthy_resources, 1);
        assert_eq!(snapshot.failed_resources, 1);
        assert_eq!(snapshot.score, 50);
        assert_eq!(snapshot.failure_details[0].resource_name, "b");
        assert_eq!(
            snapshot.failure_details[0].disabled_until.as_deref(),
            Some("2026-10-16T12:00:00Z")
        );
    }

    #[test]
    fn test_score_rounds_half_up_and_stays_in_range() {
        assert_eq!(score(1, 3), 33);
        assert_eq!(score(2, 3), 67);
        assert_eq!(score(1, 8), 13);
        assert_eq!(score(7, 7), 100);
        for total in 1..40 {
            for healthy in 0..=total {
                let s = score(healthy, total);
                assert!(s <= 100);
                let exact = 100.0 * healthy as f64 / total as f64;
                assert!((s as f64 - exact).abs() <= 0.5, "{healthy}/{total} -> {s}");
            }
        }
    }

    #[tokio::test]
    async fn test_probe_and_probe_score() {
        let source = std::sync::Arc::new(SequencedHealth::new(&[Some(7), None]));
        let probe = HealthProbe::new(source.clone());
        let snapshot = probe.probe().await.unwrap();
        assert_eq!(snapshot.score, 70);
        assert_eq!(snapshot.failed_resources, 3);

        assert!(matches!(probe.probe().await, Err(ProbeError::Unavailable(_))));
        assert_eq!(probe.probe_score().await, 0);
        assert_eq!(source.probe_count(), 3);
    }
}
