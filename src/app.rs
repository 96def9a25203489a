//! Application lifecycle: component wiring, subcommands and shutdown.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{info, warn};

use crate::config::{Config, ConfigFile};
use crate::daemon::DaemonRunner;
use crate::engine::OrchestrationEngine;
use crate::health::HealthProbe;
use crate::indexer::IndexerClient;
use crate::serve;
use crate::tools::{catalog, ToolRouter};
use crate::torrent::TorrentClient;
use crate::tunnel::{TunnelBook, TunnelController, TunnelSettings};

/// Wire every component from `config`.
pub fn build_router(config: &Config) -> anyhow::Result<ToolRouter> {
    let indexer = Arc::new(
        IndexerClient::new(config)
            .map_err(|e| anyhow::anyhow!("failed to build indexer client: {}", e))?,
    );
    let runner = Arc::new(DaemonRunner::new(
        config.vpn_binary.clone(),
        config.vpn_container.clone(),
    ));
    let controller = TunnelController::new(
        runner,
        Arc::new(TunnelBook::new()),
        TunnelSettings::from_config(config),
    );
    let engine = OrchestrationEngine::from_config(
        config,
        HealthProbe::new(indexer.clone()),
        controller,
        indexer.clone(),
    );
    let torrent = TorrentClient::from_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build torrent client: {}", e))?;

    Ok(ToolRouter::new(
        engine,
        indexer,
        torrent,
        config.health_threshold,
        config.search_limit,
    ))
}

/// Serve JSON-lines tool calls on stdin/stdout until EOF or a signal.
pub async fn run_serve(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        indexer_url = %config.indexer_url,
        threshold = config.health_threshold,
        torrent = config.torrent_url.is_some(),
        "indexer-gate starting"
    );

    let router = build_router(&config)?;
    let result = serve::serve(
        &router,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        wait_for_shutdown(),
    )
    .await;

    router.shutdown().await;
    let replies = result?;
    info!(replies, "indexer-gate stopped");
    Ok(())
}

/// Run one tool call and print its text. Exits with status 1 when the
/// response is an error.
pub async fn run_once(config: Config, tool: &str, arguments: Value) -> anyhow::Result<()> {
    config.validate()?;
    init_tracing(&config);

    let router = build_router(&config)?;
    let response = router.call(tool, arguments).await;
    router.shutdown().await;

    if response.is_error {
        eprintln!("{}", response.text);
        std::process::exit(1);
    }
    println!("{}", response.text);
    Ok(())
}

/// Print the tool catalog as JSON.
pub fn print_tools(config: &Config) -> anyhow::Result<()> {
    let tools = catalog::descriptors(config.torrent_url.is_some());
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}

/// Write `config` as TOML. Refuses to overwrite an existing file.
pub fn write_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    ConfigFile::from(config).save(path)?;
    eprintln!("  Config written to {}", path.display());
    Ok(())
}

/// Parse a CLI argument as a JSON object; absent means no arguments.
pub fn parse_arguments(raw: Option<&str>) -> anyhow::Result<Value> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Value::Null),
        Some(raw) => {
            let value: Value = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("arguments must be a JSON object: {}", e))?;
            if !value.is_object() {
                anyhow::bail!("arguments must be a JSON object, got {}", value);
            }
            Ok(value)
        }
    }
}

/// Logs go to stderr; stdout carries tool output.
fn init_tracing(config: &Config) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(None).unwrap(), Value::Null);
        assert_eq!(parse_arguments(Some("  ")).unwrap(), Value::Null);
        assert_eq!(
            parse_arguments(Some(r#"{"query": "debian"}"#)).unwrap()["query"],
            "debian"
        );
        assert!(parse_arguments(Some("[1, 2]")).is_err());
        assert!(parse_arguments(Some("{oops")).is_err());
    }

    #[test]
    fn test_write_config_refuses_overwrite() {
        use clap::Parser;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer-gate.toml");
        let config = Config::try_parse_from(["indexer-gate", "--health-threshold", "65"]).unwrap();

        write_config(&config, &path).unwrap();
        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.health_threshold, Some(65));
        assert!(write_config(&config, &path).is_err());
    }
}
