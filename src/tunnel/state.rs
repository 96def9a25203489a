use chrono::{DateTime, Utc};
use serde::Serialize;

pub(crate) const LOGIN_REQUIRED: &str = "VPN account requires login.";

/// Details reported by the daemon while the tunnel is up. Every field is
/// best-effort; the daemon's output format is not stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
    /// When this process last verified a connect, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_since: Option<DateTime<Utc>>,
}

impl ConnectionDetails {
    /// "Sydney, Australia", "Australia", or `None`.
    pub fn location(&self) -> Option<String> {
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => Some(format!("{city}, {country}")),
            (Some(one), None) | (None, Some(one)) => Some(one.clone()),
            (None, None) => None,
        }
    }
}

/// Observed tunnel state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TunnelState {
    /// The daemon account is logged out; nothing else can proceed.
    NeedsAuthentication {
        #[serde(skip_serializing_if = "Option::is_none")]
        login_url: Option<String>,
        message: String,
    },
    /// Tunnel down. `authenticated` is `None` when the account check itself
    /// failed and the daemon may be unreachable.
    Disconnected {
        authenticated: Option<bool>,
        message: String,
    },
    Connected(ConnectionDetails),
}

impl TunnelState {
    pub fn is_connected(&self) -> bool {
        matches!(self, TunnelState::Connected(_))
    }

    pub fn needs_authentication(&self) -> bool {
        matches!(self, TunnelState::NeedsAuthentication { .. })
    }

    pub fn details(&self) -> Option<&ConnectionDetails> {
        match self {
            TunnelState::Connected(details) => Some(details),
            _ => None,
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self {
            TunnelState::Connected(details) => match details.location() {
                Some(location) => format!("VPN connected to {location}."),
                None => "VPN connected.".to_string(),
            },
            TunnelState::Disconnected { message, .. } => message.clone(),
            TunnelState::NeedsAuthentication { login_url, message } => match login_url {
                Some(url) => format!("{message} Log in at {url}"),
                None => message.clone(),
            },
        }
    }
}
