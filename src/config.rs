use std::path::Path;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Container bridge networks allow-listed after every connect by default.
const DEFAULT_CONTAINER_SUBNETS: [&str; 6] = [
    "172.17.0.0/16",
    "172.18.0.0/16",
    "172.19.0.0/16",
    "172.20.0.0/16",
    "172.21.0.0/16",
    "172.22.0.0/16",
];

/// Health-gated VPN controller for indexer search and torrent downloads.
///
/// Searches the indexer manager, and when too many indexers are failing it
/// brings up the VPN tunnel first (trying fallback locations in order),
/// then tears the tunnel down again after a period of inactivity.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Indexer manager base URL (e.g. http://localhost:9696)
    #[arg(
        long,
        env = "INDEXER_GATE_INDEXER_URL",
        default_value = "http://localhost:9696"
    )]
    pub indexer_url: String,

    /// Indexer manager API key
    #[arg(
        long,
        env = "INDEXER_GATE_INDEXER_API_KEY",
        default_value = "",
        hide_env_values = true
    )]
    pub indexer_api_key: String,

    /// Indexer API request timeout in seconds
    #[arg(
        long,
        env = "INDEXER_GATE_INDEXER_REQUEST_TIMEOUT",
        default_value_t = 30
    )]
    pub indexer_request_timeout_secs: u64,

    /// Indexer search/grab timeout in seconds
    #[arg(
        long,
        env = "INDEXER_GATE_INDEXER_SEARCH_TIMEOUT",
        default_value_t = 180
    )]
    pub indexer_search_timeout_secs: u64,

    /// Indexer API retry attempts (including initial)
    #[arg(
        long,
        env = "INDEXER_GATE_INDEXER_RETRY_MAX_ATTEMPTS",
        default_value_t = 3
    )]
    pub indexer_retry_max_attempts: u32,

    /// Indexer API retry base delay in milliseconds
    #[arg(
        long,
        env = "INDEXER_GATE_INDEXER_RETRY_BASE_DELAY_MS",
        default_value_t = 200
    )]
    pub indexer_retry_base_delay_ms: u64,

    /// Indexer API retry max delay in milliseconds
    #[arg(
        long,
        env = "INDEXER_GATE_INDEXER_RETRY_MAX_DELAY_MS",
        default_value_t = 2000
    )]
    pub indexer_retry_max_delay_ms: u64,

    /// VPN daemon CLI binary
    #[arg(long, env = "INDEXER_GATE_VPN_BINARY", default_value = "nordvpn")]
    pub vpn_binary: String,

    /// Run the VPN CLI inside this container via `docker exec`; empty runs it on the host
    #[arg(
        long,
        env = "INDEXER_GATE_VPN_CONTAINER",
        default_value = "nordvpn_official"
    )]
    pub vpn_container: Option<String>,

    /// Timeout for the VPN connect command in seconds
    #[arg(long, env = "INDEXER_GATE_VPN_CONNECT_TIMEOUT", default_value_t = 60)]
    pub vpn_connect_timeout_secs: u64,

    /// Timeout for VPN status/disconnect commands in seconds
    #[arg(long, env = "INDEXER_GATE_VPN_COMMAND_TIMEOUT", default_value_t = 30)]
    pub vpn_command_timeout_secs: u64,

    /// Timeout for the VPN account check in seconds
    #[arg(long, env = "INDEXER_GATE_VPN_ACCOUNT_TIMEOUT", default_value_t = 10)]
    pub vpn_account_timeout_secs: u64,

    /// Timeout for VPN login URL retrieval in seconds
    #[arg(long, env = "INDEXER_GATE_VPN_LOGIN_TIMEOUT", default_value_t = 15)]
    pub vpn_login_timeout_secs: u64,

    /// Timeout for each post-connection settings command in seconds
    #[arg(long, env = "INDEXER_GATE_VPN_SETTINGS_TIMEOUT", default_value_t = 20)]
    pub vpn_settings_timeout_secs: u64,

    /// Wait after a connect command before re-checking status, in seconds
    #[arg(long, env = "INDEXER_GATE_VPN_CONNECT_SETTLE", default_value_t = 8)]
    pub vpn_connect_settle_secs: u64,

    /// Wait after a disconnect command before re-checking status, in seconds
    #[arg(long, env = "INDEXER_GATE_VPN_DISCONNECT_SETTLE", default_value_t = 3)]
    pub vpn_disconnect_settle_secs: u64,

    /// Disconnect the VPN after this many seconds without activity
    #[arg(
        long,
        env = "INDEXER_GATE_VPN_INACTIVITY_TIMEOUT",
        default_value_t = 600
    )]
    pub vpn_inactivity_timeout_secs: u64,

    /// Ordered fallback locations tried when the tunnel must be brought up
    #[arg(
        long,
        env = "INDEXER_GATE_VPN_LOCATIONS",
        value_delimiter = ',',
        default_values_t = [
            "australia", "singapore", "united_states", "canada",
            "netherlands", "switzerland", "japan",
        ].map(String::from)
    )]
    pub vpn_locations: Vec<String>,

    /// DNS servers applied after connecting (container resolver first)
    #[arg(
        long,
        env = "INDEXER_GATE_VPN_DNS",
        value_delimiter = ',',
        default_values_t = ["127.0.0.11", "1.1.1.1", "1.0.0.1"].map(String::from)
    )]
    pub vpn_dns_servers: Vec<String>,

    /// Primary LAN subnet to keep reachable while connected (e.g. 192.168.1.0/24)
    #[arg(long, env = "INDEXER_GATE_LOCAL_NETWORK")]
    pub local_network: Option<String>,

    /// Container subnets to keep reachable while connected
    #[arg(
        long,
        env = "INDEXER_GATE_VPN_ALLOW_SUBNETS",
        value_delimiter = ',',
        default_values_t = DEFAULT_CONTAINER_SUBNETS.map(String::from)
    )]
    pub vpn_allow_subnets: Vec<String>,

    /// Additional subnet (e.g. the media stack's own network) to keep reachable
    #[arg(long, env = "INDEXER_GATE_VPN_EXTRA_SUBNET")]
    pub vpn_extra_subnet: Option<String>,

    /// Minimum health score (0-100) required before searching without the VPN
    #[arg(long, env = "INDEXER_GATE_HEALTH_THRESHOLD", default_value_t = 50)]
    pub health_threshold: u8,

    /// Wait after the VPN comes up before re-measuring health, in seconds
    #[arg(long, env = "INDEXER_GATE_RECOVERY_WAIT", default_value_t = 5)]
    pub recovery_wait_secs: u64,

    /// Default maximum number of search results
    #[arg(long, env = "INDEXER_GATE_SEARCH_LIMIT", default_value_t = 20)]
    pub search_limit: u32,

    /// Torrent client (qBittorrent Web UI) base URL; torrent tools are disabled when unset
    #[arg(long, env = "INDEXER_GATE_TORRENT_URL")]
    pub torrent_url: Option<String>,

    /// Torrent client username
    #[arg(long, env = "INDEXER_GATE_TORRENT_USERNAME", default_value = "admin")]
    pub torrent_username: String,

    /// Torrent client password
    #[arg(
        long,
        env = "INDEXER_GATE_TORRENT_PASSWORD",
        default_value = "",
        hide_env_values = true
    )]
    pub torrent_password: String,

    /// Torrent client session lifetime in seconds before re-authenticating
    #[arg(
        long,
        env = "INDEXER_GATE_TORRENT_SESSION_TIMEOUT",
        default_value_t = 3600
    )]
    pub torrent_session_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "INDEXER_GATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "INDEXER_GATE_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Config {
    /// Reject configurations the controller cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.indexer_url.trim().is_empty() {
            anyhow::bail!("indexer_url must not be empty");
        }
        url::Url::parse(&self.indexer_url)
            .map_err(|e| anyhow::anyhow!("invalid indexer_url {}: {}", self.indexer_url, e))?;
        if self.indexer_api_key.trim().is_empty() {
            anyhow::bail!(
                "indexer_api_key is required (--indexer-api-key or INDEXER_GATE_INDEXER_API_KEY)"
            );
        }
        if self.health_threshold > 100 {
            anyhow::bail!(
                "health_threshold must be between 0 and 100, got {}",
                self.health_threshold
            );
        }
        if self.vpn_locations.iter().all(|l| l.trim().is_empty()) {
            anyhow::bail!("vpn_locations must contain at least one location");
        }
        let timeouts = [
            ("indexer_request_timeout_secs", self.indexer_request_timeout_secs),
            ("indexer_search_timeout_secs", self.indexer_search_timeout_secs),
            ("vpn_connect_timeout_secs", self.vpn_connect_timeout_secs),
            ("vpn_command_timeout_secs", self.vpn_command_timeout_secs),
            ("vpn_account_timeout_secs", self.vpn_account_timeout_secs),
            ("vpn_login_timeout_secs", self.vpn_login_timeout_secs),
            ("vpn_settings_timeout_secs", self.vpn_settings_timeout_secs),
            ("vpn_inactivity_timeout_secs", self.vpn_inactivity_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v == 0) {
            anyhow::bail!("{} must be greater than zero", name);
        }
        if let Some(ref url) = self.torrent_url {
            url::Url::parse(url)
                .map_err(|e| anyhow::anyhow!("invalid torrent_url {}: {}", url, e))?;
        }
        Ok(())
    }

    /// Subnets allow-listed after connecting: LAN first, then container
    /// subnets, then the extra subnet. Duplicates are dropped.
    pub fn allow_listed_subnets(&self) -> Vec<String> {
        let mut subnets: Vec<String> = Vec::new();
        let candidates = self
            .local_network
            .iter()
            .chain(self.vpn_allow_subnets.iter())
            .chain(self.vpn_extra_subnet.iter());
        for subnet in candidates {
            let subnet = subnet.trim();
            if !subnet.is_empty() && !subnets.iter().any(|s| s == subnet) {
                subnets.push(subnet.to_string());
            }
        }
        subnets
    }
}

// ---------------------------------------------------------------------------
// TOML config file support
// ---------------------------------------------------------------------------

/// Serializable config for TOML file persistence.
/// All fields are optional -- only populated values are written.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_search_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_retry_max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_retry_base_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_retry_max_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_binary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_connect_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_command_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_account_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_login_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_settings_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_connect_settle_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_disconnect_settle_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_inactivity_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_locations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_dns_servers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_allow_subnets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_extra_subnet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_threshold: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_wait_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_session_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_json: Option<bool>,
}

/// Snapshot of an effective config, used by `init` to write a starter file.
impl From<&Config> for ConfigFile {
    fn from(c: &Config) -> Self {
        Self {
            indexer_url: Some(c.indexer_url.clone()),
            indexer_api_key: Some(c.indexer_api_key.clone()).filter(|k| !k.is_empty()),
            indexer_request_timeout_secs: Some(c.indexer_request_timeout_secs),
            indexer_search_timeout_secs: Some(c.indexer_search_timeout_secs),
            indexer_retry_max_attempts: Some(c.indexer_retry_max_attempts),
            indexer_retry_base_delay_ms: Some(c.indexer_retry_base_delay_ms),
            indexer_retry_max_delay_ms: Some(c.indexer_retry_max_delay_ms),
            vpn_binary: Some(c.vpn_binary.clone()),
            vpn_container: c.vpn_container.clone(),
            vpn_connect_timeout_secs: Some(c.vpn_connect_timeout_secs),
            vpn_command_timeout_secs: Some(c.vpn_command_timeout_secs),
            vpn_account_timeout_secs: Some(c.vpn_account_timeout_secs),
            vpn_login_timeout_secs: Some(c.vpn_login_timeout_secs),
            vpn_settings_timeout_secs: Some(c.vpn_settings_timeout_secs),
            vpn_connect_settle_secs: Some(c.vpn_connect_settle_secs),
            vpn_disconnect_settle_secs: Some(c.vpn_disconnect_settle_secs),
            vpn_inactivity_timeout_secs: Some(c.vpn_inactivity_timeout_secs),
            vpn_locations: Some(c.vpn_locations.clone()),
            vpn_dns_servers: Some(c.vpn_dns_servers.clone()),
            local_network: c.local_network.clone(),
            vpn_allow_subnets: Some(c.vpn_allow_subnets.clone()),
            vpn_extra_subnet: c.vpn_extra_subnet.clone(),
            health_threshold: Some(c.health_threshold),
            recovery_wait_secs: Some(c.recovery_wait_secs),
            search_limit: Some(c.search_limit),
            torrent_url: c.torrent_url.clone(),
            torrent_username: Some(c.torrent_username.clone()),
            torrent_password: Some(c.torrent_password.clone()).filter(|p| !p.is_empty()),
            torrent_session_timeout_secs: Some(c.torrent_session_timeout_secs),
            log_level: Some(c.log_level.clone()),
            log_json: Some(c.log_json),
        }
    }
}

impl ConfigFile {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Inject values as environment variables so clap picks them up.
    ///
    /// Only sets variables that are **not** already present in the
    /// environment, preserving the precedence: CLI > env > config file.
    pub fn inject_env(&self) {
        for (key, value) in self.env_pairs() {
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }

    /// Environment variable assignments for every populated field.
    /// List values are joined with commas to match clap's `value_delimiter`.
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        macro_rules! set {
            ($env:expr, $val:expr) => {
                if let Some(ref v) = $val {
                    pairs.push(($env, v.to_string()));
                }
            };
        }
        macro_rules! set_list {
            ($env:expr, $val:expr) => {
                if let Some(ref v) = $val {
                    pairs.push(($env, v.join(",")));
                }
            };
        }

        set!("INDEXER_GATE_INDEXER_URL", self.indexer_url);
        set!("INDEXER_GATE_INDEXER_API_KEY", self.indexer_api_key);
        set!(
            "INDEXER_GATE_INDEXER_REQUEST_TIMEOUT",
            self.indexer_request_timeout_secs
        );
        set!(
            "INDEXER_GATE_INDEXER_SEARCH_TIMEOUT",
            self.indexer_search_timeout_secs
        );
        set!(
            "INDEXER_GATE_INDEXER_RETRY_MAX_ATTEMPTS",
            self.indexer_retry_max_attempts
        );
        set!(
            "INDEXER_GATE_INDEXER_RETRY_BASE_DELAY_MS",
            self.indexer_retry_base_delay_ms
        );
        set!(
            "INDEXER_GATE_INDEXER_RETRY_MAX_DELAY_MS",
            self.indexer_retry_max_delay_ms
        );
        set!("INDEXER_GATE_VPN_BINARY", self.vpn_binary);
        set!("INDEXER_GATE_VPN_CONTAINER", self.vpn_container);
        set!(
            "INDEXER_GATE_VPN_CONNECT_TIMEOUT",
            self.vpn_connect_timeout_secs
        );
        set!(
            "INDEXER_GATE_VPN_COMMAND_TIMEOUT",
            self.vpn_command_timeout_secs
        );
        set!(
            "INDEXER_GATE_VPN_ACCOUNT_TIMEOUT",
            self.vpn_account_timeout_secs
        );
        set!("INDEXER_GATE_VPN_LOGIN_TIMEOUT", self.vpn_login_timeout_secs);
        set!(
            "INDEXER_GATE_VPN_SETTINGS_TIMEOUT",
            self.vpn_settings_timeout_secs
        );
        set!(
            "INDEXER_GATE_VPN_CONNECT_SETTLE",
            self.vpn_connect_settle_secs
        );
        set!(
            "INDEXER_GATE_VPN_DISCONNECT_SETTLE",
            self.vpn_disconnect_settle_secs
        );
        set!(
            "INDEXER_GATE_VPN_INACTIVITY_TIMEOUT",
            self.vpn_inactivity_timeout_secs
        );
        set_list!("INDEXER_GATE_VPN_LOCATIONS", self.vpn_locations);
        set_list!("INDEXER_GATE_VPN_DNS", self.vpn_dns_servers);
        set!("INDEXER_GATE_LOCAL_NETWORK", self.local_network);
        set_list!("INDEXER_GATE_VPN_ALLOW_SUBNETS", self.vpn_allow_subnets);
        set!("INDEXER_GATE_VPN_EXTRA_SUBNET", self.vpn_extra_subnet);
        set!("INDEXER_GATE_HEALTH_THRESHOLD", self.health_threshold);
        set!("INDEXER_GATE_RECOVERY_WAIT", self.recovery_wait_secs);
        set!("INDEXER_GATE_SEARCH_LIMIT", self.search_limit);
        set!("INDEXER_GATE_TORRENT_URL", self.torrent_url);
        set!("INDEXER_GATE_TORRENT_USERNAME", self.torrent_username);
        set!("INDEXER_GATE_TORRENT_PASSWORD", self.torrent_password);
        set!(
            "INDEXER_GATE_TORRENT_SESSION_TIMEOUT",
            self.torrent_session_timeout_secs
        );
        set!("INDEXER_GATE_LOG_LEVEL", self.log_level);
        set!("INDEXER_GATE_LOG_JSON", self.log_json);

        pairs
    }
}
