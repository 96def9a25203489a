//! HTTP client for the indexer manager API (`/api/v1`).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::{DelegateError, SearchDelegate, SearchQuery};
use crate::health::{HealthSource, ProbeError};

use super::models::{
    DownloadClient, GrabRequest, HealthIssue, Indexer, IndexerStatus, SearchResult, SystemStatus,
};

/// `indexerIds` value meaning "every torrent indexer".
const ALL_TORRENT_INDEXERS: &str = "-2";

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("{endpoint} request failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },
    #[error("{endpoint} returned an unexpected body: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub struct IndexerClient {
    http: Client,
    base_url: String,
    api_key: String,
    search_timeout: Duration,
    retry_max_attempts: u32,
    retry_base_delay: Duration,
    retry_max_delay: Duration,
}

impl IndexerClient {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.indexer_request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let retry_base_delay = Duration::from_millis(config.indexer_retry_base_delay_ms);
        let retry_max_delay =
            Duration::from_millis(config.indexer_retry_max_delay_ms).max(retry_base_delay);

        Ok(Self {
            http,
            base_url: config.indexer_url.trim_end_matches('/').to_string(),
            api_key: config.indexer_api_key.clone(),
            search_timeout: Duration::from_secs(config.indexer_search_timeout_secs),
            retry_max_attempts: config.indexer_retry_max_attempts.max(1),
            retry_base_delay,
            retry_max_delay,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        timeout: Option<Duration>,
        query: &[(&str, String)],
    ) -> Result<T, IndexerError> {
        let url = self.url(endpoint);
        let resp = self
            .send_with_retry(
                || {
                    let mut req = self
                        .http
                        .get(&url)
                        .header("X-Api-Key", &self.api_key)
                        .query(query);
                    if let Some(timeout) = timeout {
                        req = req.timeout(timeout);
                    }
                    req
                },
                endpoint,
            )
            .await
            .map_err(|source| IndexerError::Request { endpoint, source })?;
        decode(endpoint, resp).await
    }

    pub async fn system_status(&self) -> Result<SystemStatus, IndexerError> {
        self.get_json("/api/v1/system/status", None, &[]).await
    }

    pub async fn health_issues(&self) -> Result<Vec<HealthIssue>, IndexerError> {
        self.get_json("/api/v1/health", None, &[]).await
    }

    pub async fn indexer_status(&self) -> Result<Vec<IndexerStatus>, IndexerError> {
        self.get_json("/api/v1/indexerstatus", None, &[]).await
    }

    pub async fn indexers(&self) -> Result<Vec<Indexer>, IndexerError> {
        self.get_json("/api/v1/indexer", None, &[]).await
    }

    pub async fn download_clients(&self) -> Result<Vec<DownloadClient>, IndexerError> {
        self.get_json("/api/v1/downloadclient", Some(self.search_timeout), &[])
            .await
    }

    /// Search across indexers. An empty id list searches every torrent
    /// indexer.
    pub async fn search_releases(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, IndexerError> {
        let mut params: Vec<(&str, String)> = vec![("query", query.query.clone())];
        if query.indexer_ids.is_empty() {
            params.push(("indexerIds", ALL_TORRENT_INDEXERS.to_string()));
        } else {
            params.push(("indexerIds", join_ids(&query.indexer_ids)));
        }
        if !query.categories.is_empty() {
            params.push(("categories", join_ids(&query.categories)));
        }
        params.push(("type", "search".to_string()));
        params.push(("limit", query.limit.to_string()));

        info!(query = %query.query, limit = query.limit, "searching indexers");
        let results: Option<Vec<SearchResult>> = self
            .get_json("/api/v1/search", Some(self.search_timeout), &params)
            .await?;
        Ok(results.unwrap_or_default())
    }

    /// Send a release to the configured download client.
    pub async fn grab_release(
        &self,
        guid: &str,
        indexer_id: i64,
    ) -> Result<serde_json::Value, IndexerError> {
        const ENDPOINT: &str = "/api/v1/search";
        let url = self.url(ENDPOINT);
        let body = GrabRequest { guid, indexer_id };

        info!(guid = %guid, indexer_id, "grabbing release");
        // Grabs are not idempotent, so a single attempt only.
        let resp = self
            .http
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .timeout(self.search_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|source| IndexerError::Request {
                endpoint: ENDPOINT,
                source,
            })?;
        let value: Option<serde_json::Value> = decode(ENDPOINT, resp).await?;
        Ok(value.unwrap_or(serde_json::Value::Null))
    }

    async fn send_with_retry<F>(
        &self,
        mut make_req: F,
        label: &str,
    ) -> Result<reqwest::Response, reqwest::Error>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        let mut delay = self.retry_base_delay;

        loop {
            attempt = attempt.saturating_add(1);
            match make_req().send().await {
                Ok(resp) => {
                    if should_retry_status(resp.status()) && attempt < self.retry_max_attempts {
                        let sleep_for = jitter_delay(delay);
                        debug!(
                            attempt,
                            status = %resp.status(),
                            sleep_ms = sleep_for.as_millis(),
                            label,
                            "indexer request retrying"
                        );
                        sleep(sleep_for).await;
                        let next_delay = delay.checked_mul(2).unwrap_or(self.retry_max_delay);
                        delay = std::cmp::min(next_delay, self.retry_max_delay);
                        continue;
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    if attempt < self.retry_max_attempts {
                        let sleep_for = jitter_delay(delay);
                        debug!(
                            attempt,
                            error = %e,
                            sleep_ms = sleep_for.as_millis(),
                            label,
                            "indexer request retrying"
                        );
                        sleep(sleep_for).await;
                        let next_delay = delay.checked_mul(2).unwrap_or(self.retry_max_delay);
                        delay = std::cmp::min(next_delay, self.retry_max_delay);
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
}

async fn decode<T: DeserializeOwned>(
    endpoint: &'static str,
    resp: reqwest::Response,
) -> Result<T, IndexerError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|source| IndexerError::Request { endpoint, source })?;
    if !status.is_success() {
        return Err(IndexerError::Status {
            endpoint,
            status,
            message: error_message(&text),
        });
    }
    let body = if text.trim().is_empty() { "null" } else { &text };
    serde_json::from_str(body).map_err(|source| IndexerError::Decode { endpoint, source })
}

/// The API's `message` field when the body is a JSON error object,
/// otherwise the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response".to_string()
            } else {
                trimmed.to_string()
            }
        })
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn jitter_delay(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    base + Duration::from_millis(nanos % 100)
}

#[async_trait]
impl HealthSource for IndexerClient {
    async fn list_resources(&self) -> Result<Vec<Indexer>, ProbeError> {
        self.indexers()
            .await
            .map_err(|e| ProbeError::Unavailable(e.to_string()))
    }

    async fn list_failures(&self) -> Result<Vec<IndexerStatus>, ProbeError> {
        self.indexer_status()
            .await
            .map_err(|e| ProbeError::Unavailable(e.to_string()))
    }

    async fn system_status(&self) -> Result<SystemStatus, ProbeError> {
        IndexerClient::system_status(self)
            .await
            .map_err(|e| ProbeError::Unavailable(e.to_string()))
    }

    async fn health_issues(&self) -> Result<Vec<HealthIssue>, ProbeError> {
        IndexerClient::health_issues(self)
            .await
            .map_err(|e| ProbeError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl SearchDelegate for IndexerClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, DelegateError> {
        Ok(self.search_releases(query).await?)
    }
}
