//! Named tool calls over the engine, the indexer API and the torrent client.
//!
//! `ToolRouter::call` never fails; every error becomes a response with
//! `is_error` set, so a caller can relay it verbatim.

pub mod catalog;
pub mod render;

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine::{Operation, OrchestrationEngine, OutcomeKind, SearchQuery};
use crate::health::ProbeError;
use crate::indexer::{IndexerClient, IndexerError, SearchResult};
use crate::torrent::{AddTorrent, TorrentAction, TorrentClient, TorrentError, TorrentQuery};
use crate::tunnel::TunnelError;

pub use catalog::ToolDescriptor;

/// Location dialed by `vpn_connect` when none is given.
pub const DEFAULT_CITY: &str = "australia";

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[source] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
    #[error("torrent client is not configured (set torrent_url)")]
    TorrentDisabled,
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Tunnel(#[from] TunnelError),
    #[error(transparent)]
    Torrent(#[from] TorrentError),
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GetIndexersArgs {
    #[serde(alias = "enabledOnly")]
    enabled_only: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchArgs {
    query: String,
    #[serde(alias = "indexerIds")]
    indexer_ids: Vec<i64>,
    categories: Vec<i64>,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GrabArgs {
    option: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VpnConnectArgs {
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TorrentControlArgs {
    action: TorrentAction,
    hashes: Vec<String>,
    #[serde(default, alias = "deleteFiles")]
    delete_files: bool,
}

pub struct ToolRouter {
    engine: OrchestrationEngine,
    indexer: Arc<IndexerClient>,
    torrent: Option<TorrentClient>,
    threshold: u8,
    default_limit: u32,
    /// Results of the last successful search; `grab_release` options index
    /// into this list.
    last_results: ArcSwap<Vec<SearchResult>>,
}

impl ToolRouter {
    pub fn new(
        engine: OrchestrationEngine,
        indexer: Arc<IndexerClient>,
        torrent: Option<TorrentClient>,
        threshold: u8,
        default_limit: u32,
    ) -> Self {
        Self {
            engine,
            indexer,
            torrent,
            threshold,
            default_limit: default_limit.max(1),
            last_results: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        catalog::descriptors(self.torrent.is_some())
    }

    pub async fn call(&self, name: &str, arguments: Value) -> ToolResponse {
        debug!(tool = name, "tool call");
        match self.dispatch(name, arguments).await {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                ToolResponse::error(format!("Error: {e}"))
            }
        }
    }

    /// Cancel the inactivity countdown and close the torrent session. The
    /// tunnel itself is left as is.
    pub async fn shutdown(&self) {
        self.engine.controller().shutdown();
        if let Some(ref torrent) = self.torrent {
            torrent.logout().await;
        }
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolResponse, ToolError> {
        match name {
            "health_check" => {
                let report = self.engine.probe().report().await?;
                Ok(ToolResponse::ok(
                    render::health_report(&report).map_err(ToolError::Encode)?,
                ))
            }
            "get_indexers" => {
                let args: GetIndexersArgs = parse_args(arguments)?;
                let mut indexers = self.indexer.indexers().await?;
                if args.enabled_only {
                    indexers.retain(|i| i.enable);
                }
                Ok(ToolResponse::ok(
                    render::json(&indexers).map_err(ToolError::Encode)?,
                ))
            }
            "search" => self.search(parse_args(arguments)?).await,
            "grab_release" => self.grab(parse_args(arguments)?).await,
            "get_download_clients" => {
                let clients = self.indexer.download_clients().await?;
                Ok(ToolResponse::ok(
                    render::json(&clients).map_err(ToolError::Encode)?,
                ))
            }
            "vpn_status" => {
                let controller = self.engine.controller();
                let state = controller.status().await;
                Ok(ToolResponse::ok(render::tunnel_status(
                    &state,
                    controller.disconnect_deadline(),
                )))
            }
            "vpn_connect" => {
                let args: VpnConnectArgs = parse_args(arguments)?;
                let city = args
                    .city
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CITY.to_string());
                let controller = self.engine.controller();
                let state = controller.connect(Some(city.trim())).await?;
                Ok(ToolResponse::ok(render::tunnel_status(
                    &state,
                    controller.disconnect_deadline(),
                )))
            }
            "vpn_disconnect" => {
                let state = self.engine.force_disconnect().await?;
                Ok(ToolResponse::ok(state.summary()))
            }
            "system_status" => {
                let overview = self.engine.system_status(self.threshold).await;
                Ok(ToolResponse::ok(
                    render::system_overview(&overview).map_err(ToolError::Encode)?,
                ))
            }
            "torrent_list" => {
                let query: TorrentQuery = parse_args(arguments)?;
                let torrents = self.torrent()?.torrents(&query).await?;
                Ok(ToolResponse::ok(render::torrents(&torrents)))
            }
            "torrent_add" => {
                let add: AddTorrent = parse_args(arguments)?;
                let torrent = self.torrent()?;
                if add.urls.iter().all(|u| u.trim().is_empty()) {
                    return Err(ToolError::Invalid(
                        "at least one magnet link or URL is required".to_string(),
                    ));
                }
                torrent.add(&add).await?;
                self.engine.record_activity();
                Ok(ToolResponse::ok(format!(
                    "Added {} torrent(s).",
                    add.urls.len()
                )))
            }
            "torrent_control" => {
                let args: TorrentControlArgs = parse_args(arguments)?;
                let torrent = self.torrent()?;
                if args.hashes.iter().all(|h| h.trim().is_empty()) {
                    return Err(ToolError::Invalid("at least one hash is required".to_string()));
                }
                torrent
                    .control(args.action, &args.hashes, args.delete_files)
                    .await?;
                Ok(ToolResponse::ok(format!(
                    "{} applied to {} torrent(s).",
                    args.action.as_str(),
                    args.hashes.len()
                )))
            }
            "torrent_health" => {
                let health = self.torrent()?.health_check().await?;
                Ok(ToolResponse::ok(render::torrent_health(&health)))
            }
            "torrent_transfer_info" => {
                let info = self.torrent()?.transfer_info().await?;
                Ok(ToolResponse::ok(render::transfer(&info)))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn search(&self, args: SearchArgs) -> Result<ToolResponse, ToolError> {
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::Invalid("search query is required".to_string()));
        }
        let query = SearchQuery {
            query: query.to_string(),
            indexer_ids: args.indexer_ids,
            categories: args.categories,
            limit: args.limit.filter(|l| *l > 0).unwrap_or(self.default_limit),
        };

        let outcome = self
            .engine
            .execute(&Operation::Search(query), self.threshold)
            .await;
        let text = render::search_outcome(&outcome);
        match outcome.kind {
            OutcomeKind::Completed => {
                self.last_results.store(Arc::new(outcome.results));
                Ok(ToolResponse::ok(text))
            }
            OutcomeKind::NoResults => Ok(ToolResponse::ok(text)),
            OutcomeKind::HealthStillDegraded | OutcomeKind::Failed => Ok(ToolResponse::error(text)),
        }
    }

    async fn grab(&self, args: GrabArgs) -> Result<ToolResponse, ToolError> {
        let option = args.option.filter(|o| *o >= 1).ok_or_else(|| {
            ToolError::Invalid("a valid option number is required (1, 2, 3...)".to_string())
        })?;
        let results = self.last_results.load_full();
        if results.is_empty() {
            return Err(ToolError::Invalid(
                "no search results available; run a search first".to_string(),
            ));
        }
        let Some(selected) = results.get(option - 1) else {
            return Err(ToolError::Invalid(format!(
                "option {option} not found; choose a number between 1 and {}",
                results.len()
            )));
        };

        let extended = self.engine.record_activity();
        match self
            .indexer
            .grab_release(&selected.guid, selected.indexer_id)
            .await
        {
            Ok(_) => {
                info!(title = %selected.title, indexer = %selected.indexer, "release grabbed");
                Ok(ToolResponse::ok(render::grabbed(selected, extended)))
            }
            Err(e) => Ok(ToolResponse::error(format!(
                "Failed to grab release: {e}\nTitle: {}\nIndexer: {}",
                selected.title, selected.indexer
            ))),
        }
    }

    fn torrent(&self) -> Result<&TorrentClient, ToolError> {
        self.torrent.as_ref().ok_or(ToolError::TorrentDisabled)
    }
}

/// Missing or `null` arguments parse as an empty object.
fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(ToolError::InvalidArguments)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use clap::Parser;

    use super::*;
    use crate::config::Config;
    use crate::daemon::fake::ScriptedDaemon;
    use crate::health::HealthProbe;
    use crate::tunnel::controller::TunnelTimings;
    use crate::tunnel::{TunnelBook, TunnelController, TunnelSettings};

    /// Router over a real indexer client at `indexer_url`, a scripted daemon
    /// and instant tunnel timings. Threshold 50, default limit 20.
    pub fn router(
        indexer_url: &str,
        daemon: Arc<ScriptedDaemon>,
        torrent: Option<TorrentClient>,
    ) -> ToolRouter {
        let config = Config::try_parse_from([
            "indexer-gate",
            "--indexer-url",
            indexer_url,
            "--indexer-api-key",
            "secret",
            "--indexer-retry-base-delay-ms",
            "1",
            "--indexer-retry-max-delay-ms",
            "2",
        ])
        .unwrap();
        let indexer = Arc::new(IndexerClient::new(&config).unwrap());
        let controller = TunnelController::new(
            daemon,
            Arc::new(TunnelBook::new()),
            TunnelSettings {
                timings: TunnelTimings::instant(),
                locations: vec!["australia".into()],
                dns_servers: Vec::new(),
                allow_subnets: Vec::new(),
            },
        );
        let engine = OrchestrationEngine::new(
            HealthProbe::new(indexer.clone()),
            controller,
            indexer.clone(),
            Duration::ZERO,
        );
        ToolRouter::new(engine, indexer, torrent, 50, 20)
    }
}
