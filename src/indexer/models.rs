//! Wire types for the indexer manager's `/api/v1` endpoints.
//!
//! Only the fields this crate reads are modeled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indexer {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub privacy: String,
    #[serde(default)]
    pub supports_search: bool,
    #[serde(default)]
    pub supports_rss: bool,
}

/// An active failure record. Presence means the indexer is failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerStatus {
    pub indexer_id: i64,
    #[serde(default)]
    pub disabled_till: Option<String>,
    #[serde(default)]
    pub most_recent_failure: Option<String>,
    #[serde(default)]
    pub initial_failure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub is_production: bool,
    #[serde(default)]
    pub is_docker: bool,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub database_type: String,
    #[serde(default)]
    pub authentication: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIssue {
    #[serde(default)]
    pub source: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub wiki_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub indexer_id: i64,
    #[serde(default)]
    pub indexer: String,
    #[serde(default)]
    pub seeders: Option<u32>,
    #[serde(default)]
    pub leechers: Option<u32>,
    #[serde(default)]
    pub age_hours: Option<f64>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub magnet_url: Option<String>,
    #[serde(default)]
    pub info_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadClient {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub implementation: String,
    #[serde(default)]
    pub priority: i32,
}

/// Body of a grab request (`POST /api/v1/search`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GrabRequest<'a> {
    pub guid: &'a str,
    pub indexer_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_tolerates_sparse_payload() {
        let raw = r#"{"guid":"abc","title":"Some.Release.1080p","size":1073741824,"indexerId":3,"indexer":"Nyaa","seeders":12,"unknownField":true}"#;
        let result: SearchResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.indexer_id, 3);
        assert_eq!(result.seeders, Some(12));
        assert!(result.leechers.is_none());
        assert!(result.magnet_url.is_none());
    }

    #[test]
    fn test_health_issue_type_field() {
        let raw = r#"{"source":"IndexerStatusCheck","type":"warning","message":"Indexers unavailable","wikiUrl":"https://wiki.example/x"}"#;
        let issue: HealthIssue = serde_json::from_str(raw).unwrap();
        assert_eq!(issue.kind, "warning");
        assert_eq!(issue.wiki_url.as_deref(), Some("https://wiki.example/x"));
    }
}
