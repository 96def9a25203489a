mod app;
mod config;
mod daemon;
mod engine;
mod health;
mod indexer;
mod serve;
mod tools;
mod torrent;
mod tunnel;

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches};
use serde_json::json;

use config::Config;

/// Default config file name.
const DEFAULT_CONFIG: &str = "indexer-gate.toml";

/// Build the full clap command: Config args + subcommands.
fn build_command() -> clap::Command {
    Config::command()
        .subcommand(
            clap::Command::new("serve")
                .about("Serve JSON-lines tool calls on stdin, replies on stdout"),
        )
        .subcommand(clap::Command::new("tools").about("List available tools as JSON"))
        .subcommand(
            clap::Command::new("init")
                .about("Write the effective config to a TOML file")
                .arg(
                    clap::Arg::new("config_path")
                        .help("Path to config file")
                        .default_value(DEFAULT_CONFIG),
                ),
        )
        .subcommand(
            clap::Command::new("call")
                .about("Run a single tool call")
                .arg(clap::Arg::new("tool").required(true).help("Tool name"))
                .arg(clap::Arg::new("arguments").help("Tool arguments as a JSON object")),
        )
        .subcommand(clap::Command::new("status").about("Show health, VPN state and readiness"))
        .subcommand(clap::Command::new("health").about("Detailed indexer health report"))
        .subcommand(
            clap::Command::new("connect")
                .about("Connect the VPN")
                .arg(clap::Arg::new("city").help("City or country (default: australia)")),
        )
        .subcommand(clap::Command::new("disconnect").about("Disconnect the VPN"))
        .subcommand(
            clap::Command::new("search")
                .about("Health-gated search")
                .arg(
                    clap::Arg::new("query")
                        .required(true)
                        .num_args(1..)
                        .help("Search terms"),
                ),
        )
        .subcommand_negates_reqs(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config file as env-var defaults (before clap parsing)
    let config_file_path =
        std::env::var("INDEXER_GATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let config_path = std::path::Path::new(&config_file_path);
    if config_path.exists() {
        match config::ConfigFile::load(config_path) {
            Ok(file_cfg) => file_cfg.inject_env(),
            Err(e) => eprintln!("  WARNING: ignoring {}: {}", config_file_path, e),
        }
    }

    let matches = build_command().try_get_matches().unwrap_or_else(|e| e.exit());
    let config = Config::from_arg_matches(&matches)?;

    match matches.subcommand() {
        Some(("serve", _)) | None => app::run_serve(config).await,
        Some(("tools", _)) => app::print_tools(&config),
        Some(("init", sub_m)) => {
            let path = sub_m
                .get_one::<String>("config_path")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
            app::write_config(&config, &path)
        }
        Some(("call", sub_m)) => {
            let tool = sub_m
                .get_one::<String>("tool")
                .map(String::as_str)
                .unwrap_or_default();
            let arguments =
                app::parse_arguments(sub_m.get_one::<String>("arguments").map(String::as_str))?;
            app::run_once(config, tool, arguments).await
        }
        Some(("status", _)) => app::run_once(config, "system_status", json!({})).await,
        Some(("health", _)) => app::run_once(config, "health_check", json!({})).await,
        Some(("connect", sub_m)) => {
            let arguments = match sub_m.get_one::<String>("city") {
                Some(city) => json!({ "city": city }),
                None => json!({}),
            };
            app::run_once(config, "vpn_connect", arguments).await
        }
        Some(("disconnect", _)) => app::run_once(config, "vpn_disconnect", json!({})).await,
        Some(("search", sub_m)) => {
            let query = sub_m
                .get_many::<String>("query")
                .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            app::run_once(config, "search", json!({ "query": query })).await
        }
        Some((other, _)) => anyhow::bail!("unknown subcommand: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        build_command().debug_assert();
    }

    #[test]
    fn test_search_joins_words() {
        let matches = build_command()
            .try_get_matches_from(["indexer-gate", "search", "big", "buck", "bunny"])
            .unwrap();
        let (name, sub_m) = matches.subcommand().unwrap();
        assert_eq!(name, "search");
        let words: Vec<&String> = sub_m.get_many::<String>("query").unwrap().collect();
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let matches = build_command()
            .try_get_matches_from([
                "indexer-gate",
                "--health-threshold",
                "70",
                "connect",
                "singapore",
            ])
            .unwrap();
        let config = Config::from_arg_matches(&matches).unwrap();
        assert_eq!(config.health_threshold, 70);
        let (_, sub_m) = matches.subcommand().unwrap();
        assert_eq!(sub_m.get_one::<String>("city").unwrap(), "singapore");
    }
}
