use serde::Serialize;

use crate::indexer::models::{HealthIssue, Indexer, IndexerStatus, SystemStatus};

use super::probe::{display_name, FailureDetail, HealthSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLabel {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthLabel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => HealthLabel::Healthy,
            50..=79 => HealthLabel::Degraded,
            _ => HealthLabel::Unhealthy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLabel::Healthy => "healthy",
            HealthLabel::Degraded => "degraded",
            HealthLabel::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub app: String,
    pub environment: String,
    pub os: String,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexerCounts {
    pub total: usize,
    pub enabled: usize,
    pub healthy: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthyIndexer {
    pub name: String,
    pub protocol: String,
    pub privacy: String,
}

/// Human-oriented health report for the `health_check` tool.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall: HealthLabel,
    pub score: u8,
    pub system: SystemInfo,
    pub indexers: IndexerCounts,
    pub issues: Vec<HealthIssue>,
    pub failed_indexers: Vec<FailureDetail>,
    pub healthy_indexers: Vec<HealthyIndexer>,
    pub guidance: String,
}

impl HealthReport {
    pub fn build(
        system: SystemStatus,
        issues: Vec<HealthIssue>,
        resources: &[Indexer],
        failures: &[IndexerStatus],
    ) -> Self {
        let snapshot = HealthSnapshot::compute(resources, failures);
        let overall = HealthLabel::from_score(snapshot.score);

        // Lists every failure record, including disabled or unknown indexers.
        let failed_indexers = failures
            .iter()
            .map(|f| FailureDetail {
                resource_name: resources
                    .iter()
                    .find(|r| r.id == f.indexer_id)
                    .map(display_name)
                    .unwrap_or_else(|| format!("ID {}", f.indexer_id)),
                last_failure_time: f.most_recent_failure.clone(),
                disabled_until: f.disabled_till.clone(),
            })
            .collect();

        let healthy_indexers = resources
            .iter()
            .filter(|r| r.enable && !failures.iter().any(|f| f.indexer_id == r.id))
            .map(|r| HealthyIndexer {
                name: display_name(r),
                protocol: r.protocol.clone(),
                privacy: r.privacy.clone(),
            })
            .collect();

        let app = match (system.app_name.is_empty(), system.version.is_empty()) {
            (false, false) => format!("{} v{}", system.app_name, system.version),
            (false, true) => system.app_name.clone(),
            _ => "unknown".to_string(),
        };

        Self {
            overall,
            score: snapshot.score,
            system: SystemInfo {
                app,
                environment: if system.is_docker { "Docker" } else { "Native" }.to_string(),
                os: system.os_name,
                database: system.database_type,
                started: system.start_time,
            },
            indexers: IndexerCounts {
                total: resources.len(),
                enabled: snapshot.total_resources,
                healthy: snapshot.healthy_resources,
                failed: failures.len(),
            },
            issues,
            failed_indexers,
            healthy_indexers,
            guidance: guidance(overall).to_string(),
        }
    }
}

fn guidance(label: HealthLabel) -> &'static str {
    match label {
        HealthLabel::Healthy => "Indexers are healthy. Searches can run without the VPN.",
        HealthLabel::Degraded => {
            "Some indexers are failing. Searches still run; connecting the VPN may restore more indexers."
        }
        HealthLabel::Unhealthy => {
            "Most indexers are failing. Searches will bring the VPN up automatically; use vpn_connect to pick a location manually."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::testing::{failure, indexer};

    #[test]
    fn test_label_boundaries() {
        assert_eq!(HealthLabel::from_score(100), HealthLabel::Healthy);
        assert_eq!(HealthLabel::from_score(80), HealthLabel::Healthy);
        assert_eq!(HealthLabel::from_score(79), HealthLabel::Degraded);
        assert_eq!(HealthLabel::from_score(50), HealthLabel::Degraded);
        assert_eq!(HealthLabel::from_score(49), HealthLabel::Unhealthy);
        assert_eq!(HealthLabel::from_score(0), HealthLabel::Unhealthy);
    }

    #[test]
    fn test_build_report() {
        let system = SystemStatus {
            app_name: "Prowlarr".into(),
            version: "1.20.0".into(),
            is_docker: true,
            os_name: "alpine".into(),
            database_type: "sqLite".into(),
            ..Default::default()
        };
        let resources = vec![
            indexer(1, "Nyaa", true),
            indexer(2, "1337x", true),
            indexer(3, "Old", false),
        ];
        let failures = vec![failure(2), failure(42)];

        let report = HealthReport::build(system, Vec::new(), &resources, &failures);
        assert_eq!(report.score, 50);
        assert_eq!(report.overall, HealthLabel::Degraded);
        assert_eq!(report.system.app, "Prowlarr v1.20.0");
        assert_eq!(report.system.environment, "Docker");
        assert_eq!(report.indexers.total, 3);
        assert_eq!(report.indexers.enabled, 2);
        assert_eq!(report.indexers.healthy, 1);
        assert_eq!(report.indexers.failed, 2);
        let names: Vec<&str> = report
            .failed_indexers
            .iter()
            .map(|f| f.resource_name.as_str())
            .collect();
        assert_eq!(names, vec!["1337x", "ID 42"]);
        assert_eq!(report.healthy_indexers.len(), 1);
        assert_eq!(report.healthy_indexers[0].name, "Nyaa");
        assert!(!report.guidance.is_empty());
    }
}
