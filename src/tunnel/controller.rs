//! Tunnel lifecycle: status, connect with verification, fallback across
//! locations, verified disconnect and the inactivity auto-disconnect timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::daemon::status::{extract_login_url, indicates_logged_out, parse_status};
use crate::daemon::{CommandError, CommandRunner};

use super::book::TunnelBook;
use super::state::{TunnelState, LOGIN_REQUIRED};

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("VPN account requires login{}", login_url.as_deref().map(|u| format!(" (log in at {u})")).unwrap_or_default())]
    AuthenticationRequired { login_url: Option<String> },
    #[error("VPN connection to {location} could not be verified: {detail}")]
    ConnectionVerificationFailed { location: String, detail: String },
    #[error("VPN disconnection could not be verified; the daemon still reports a connection")]
    DisconnectionVerificationFailed,
    #[error("all VPN locations failed: {}", format_attempts(attempts))]
    FallbackExhausted { attempts: Vec<(String, String)> },
    #[error("VPN {step} failed: {source}")]
    Command {
        step: &'static str,
        #[source]
        source: CommandError,
    },
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "no locations configured".to_string();
    }
    attempts
        .iter()
        .map(|(location, error)| format!("{location}: {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Time bounds and waits used by the controller.
#[derive(Debug, Clone)]
pub struct TunnelTimings {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub account_timeout: Duration,
    pub login_timeout: Duration,
    pub settings_timeout: Duration,
    pub connect_settle: Duration,
    pub disconnect_settle: Duration,
    pub inactivity: Duration,
}

impl TunnelTimings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.vpn_connect_timeout_secs),
            command_timeout: Duration::from_secs(config.vpn_command_timeout_secs),
            account_timeout: Duration::from_secs(config.vpn_account_timeout_secs),
            login_timeout: Duration::from_secs(config.vpn_login_timeout_secs),
            settings_timeout: Duration::from_secs(config.vpn_settings_timeout_secs),
            connect_settle: Duration::from_secs(config.vpn_connect_settle_secs),
            disconnect_settle: Duration::from_secs(config.vpn_disconnect_settle_secs),
            inactivity: Duration::from_secs(config.vpn_inactivity_timeout_secs),
        }
    }

    /// No waits; inactivity long enough that it never fires during a test.
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            command_timeout: Duration::from_secs(1),
            account_timeout: Duration::from_secs(1),
            login_timeout: Duration::from_secs(1),
            settings_timeout: Duration::from_secs(1),
            connect_settle: Duration::ZERO,
            disconnect_settle: Duration::ZERO,
            inactivity: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TunnelSettings {
    pub timings: TunnelTimings,
    pub locations: Vec<String>,
    pub dns_servers: Vec<String>,
    pub allow_subnets: Vec<String>,
}

impl TunnelSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timings: TunnelTimings::from_config(config),
            locations: config
                .vpn_locations
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            dns_servers: config.vpn_dns_servers.clone(),
            allow_subnets: config.allow_listed_subnets(),
        }
    }
}

/// Owns the tunnel lifecycle. Cheap to clone; clones share the same book.
#[derive(Clone)]
pub struct TunnelController {
    runner: Arc<dyn CommandRunner>,
    book: Arc<TunnelBook>,
    settings: Arc<TunnelSettings>,
}

impl TunnelController {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        book: Arc<TunnelBook>,
        settings: TunnelSettings,
    ) -> Self {
        Self {
            runner,
            book,
            settings: Arc::new(settings),
        }
    }

    /// Current tunnel state. Never fails: daemon errors are folded into
    /// `Disconnected` with a diagnostic message.
    pub async fn status(&self) -> TunnelState {
        let state = self.observe().await;
        self.book.remember(state.clone());
        state
    }

    async fn observe(&self) -> TunnelState {
        let t = &self.settings.timings;

        if let Err(e) = self.runner.run(&["account"], t.account_timeout).await {
            let message = e.to_string();
            if indicates_logged_out(&message) {
                return TunnelState::NeedsAuthentication {
                    login_url: self.login_url().await,
                    message: LOGIN_REQUIRED.to_string(),
                };
            }
            warn!(error = %e, "VPN account check failed");
            return TunnelState::Disconnected {
                authenticated: None,
                message: format!("Error checking VPN account status: {message}"),
            };
        }

        match self.runner.run(&["status"], t.command_timeout).await {
            Ok(output) => match parse_status(&output.stdout) {
                Some(mut details) => {
                    details.connected_since = self.book.last_connected_at();
                    TunnelState::Connected(details)
                }
                None => TunnelState::Disconnected {
                    authenticated: Some(true),
                    message: "VPN disconnected.".to_string(),
                },
            },
            Err(e) if indicates_logged_out(&e.to_string()) => TunnelState::NeedsAuthentication {
                login_url: None,
                message: LOGIN_REQUIRED.to_string(),
            },
            Err(e) => TunnelState::Disconnected {
                authenticated: Some(true),
                message: format!("Error getting VPN status: {e}"),
            },
        }
    }

    /// Best-effort browser login link: `login --callback` first, then plain
    /// `login`.
    async fn login_url(&self) -> Option<String> {
        let timeout = self.settings.timings.login_timeout;
        for args in [&["login", "--callback"][..], &["login"][..]] {
            match self.runner.run(args, timeout).await {
                Ok(output) => {
                    let url = extract_login_url(&output.stdout)
                        .or_else(|| extract_login_url(&output.stderr));
                    if url.is_some() {
                        return url;
                    }
                }
                Err(e) => {
                    debug!(command = %args.join(" "), error = %e, "login URL retrieval failed");
                    if let Some(url) = extract_login_url(&e.to_string()) {
                        return Some(url);
                    }
                }
            }
        }
        None
    }

    /// Bring the tunnel up, optionally at `preferred`. Idempotent: when the
    /// tunnel is already up only the post-connection settings are re-applied
    /// and the inactivity timer restarted.
    pub async fn connect(&self, preferred: Option<&str>) -> Result<TunnelState, TunnelError> {
        self.book.clear_manual_disconnect();
        let previous = self.book.take_last_connected();

        match self.status().await {
            TunnelState::NeedsAuthentication { login_url, .. } => {
                self.book.cancel_timer();
                return Err(TunnelError::AuthenticationRequired { login_url });
            }
            TunnelState::Connected(_) => {
                info!("VPN already connected, re-applying post-connection settings");
                self.apply_post_connection_settings().await;
                self.book.record_connected(previous.unwrap_or_else(Utc::now));
                self.arm_inactivity_timer();
                return Ok(self.status().await);
            }
            // A countdown armed by an earlier connect must not outlive the tunnel.
            TunnelState::Disconnected { .. } => self.book.cancel_timer(),
        }

        let location = preferred.map(str::trim).filter(|l| !l.is_empty());
        let label = location.unwrap_or("default").to_string();
        let mut args = vec!["connect"];
        args.extend(location);

        info!(location = %label, "connecting VPN");
        self.runner
            .run(&args, self.settings.timings.connect_timeout)
            .await
            .map_err(|source| TunnelError::Command {
                step: "connect",
                source,
            })?;

        sleep(self.settings.timings.connect_settle).await;

        match self.status().await {
            TunnelState::Connected(_) => {}
            TunnelState::NeedsAuthentication { login_url, .. } => {
                return Err(TunnelError::AuthenticationRequired { login_url });
            }
            TunnelState::Disconnected { message, .. } => {
                return Err(TunnelError::ConnectionVerificationFailed {
                    location: label,
                    detail: message,
                });
            }
        }

        self.apply_post_connection_settings().await;

        let mut details = match self.status().await {
            TunnelState::Connected(details) => details,
            _ => {
                return Err(TunnelError::ConnectionVerificationFailed {
                    location: label,
                    detail: "tunnel dropped after post-connection settings were applied"
                        .to_string(),
                });
            }
        };

        let now = Utc::now();
        self.book.record_connected(now);
        self.arm_inactivity_timer();
        details.connected_since = Some(now);

        info!(
            location = %label,
            city = details.city.as_deref().unwrap_or("unknown"),
            ip = details.ip.as_deref().unwrap_or("unknown"),
            "VPN connected"
        );
        let state = TunnelState::Connected(details);
        self.book.remember(state.clone());
        Ok(state)
    }

    /// Try `candidates` strictly in order until one connects. An already-up
    /// tunnel counts as success without dialing.
    pub async fn connect_with_fallback(
        &self,
        candidates: &[String],
    ) -> Result<TunnelState, TunnelError> {
        match self.status().await {
            state @ TunnelState::Connected(_) => {
                info!(location = ?state.details().and_then(|d| d.location()), "VPN already connected");
                return Ok(state);
            }
            TunnelState::NeedsAuthentication { login_url, .. } => {
                self.book.cancel_timer();
                return Err(TunnelError::AuthenticationRequired { login_url });
            }
            TunnelState::Disconnected { .. } => {}
        }

        let mut attempts = Vec::with_capacity(candidates.len());
        for location in candidates {
            match self.connect(Some(location)).await {
                Ok(state) => return Ok(state),
                Err(e @ TunnelError::AuthenticationRequired { .. }) => return Err(e),
                Err(e) => {
                    warn!(location = %location, error = %e, "VPN location failed, trying next");
                    attempts.push((location.clone(), e.to_string()));
                }
            }
        }
        Err(TunnelError::FallbackExhausted { attempts })
    }

    /// Bring the tunnel down and verify it. Records manual intent, so no
    /// inactivity timer can fire afterwards until the next `connect`.
    pub async fn disconnect(&self) -> Result<TunnelState, TunnelError> {
        self.book.mark_manual_disconnect();

        match self.status().await {
            TunnelState::NeedsAuthentication { login_url, .. } => {
                return Err(TunnelError::AuthenticationRequired { login_url });
            }
            TunnelState::Disconnected { authenticated, .. } => {
                return Ok(TunnelState::Disconnected {
                    authenticated,
                    message: "VPN was already disconnected.".to_string(),
                });
            }
            TunnelState::Connected(_) => {}
        }

        info!("disconnecting VPN");
        self.runner
            .run(&["disconnect"], self.settings.timings.command_timeout)
            .await
            .map_err(|source| TunnelError::Command {
                step: "disconnect",
                source,
            })?;

        sleep(self.settings.timings.disconnect_settle).await;

        match self.status().await {
            TunnelState::Connected(_) => Err(TunnelError::DisconnectionVerificationFailed),
            TunnelState::Disconnected { authenticated, .. } => {
                info!("VPN disconnected");
                Ok(TunnelState::Disconnected {
                    authenticated,
                    message: "VPN disconnected successfully. Auto-disconnect timer cleared."
                        .to_string(),
                })
            }
            state @ TunnelState::NeedsAuthentication { .. } => Ok(state),
        }
    }

    /// Extend the session after activity. No-op unless this process brought
    /// the tunnel up and no manual disconnect is pending. Returns whether a
    /// countdown was (re)started.
    pub fn reset_activity_timer(&self) -> bool {
        if !self.book.owns_connection() {
            debug!("activity timer not reset: tunnel not owned by this process");
            return false;
        }
        self.arm_inactivity_timer()
    }

    fn arm_inactivity_timer(&self) -> bool {
        let after = self.settings.timings.inactivity;
        let armed = self.book.arm(after, |generation| {
            let this = self.clone();
            tokio::spawn(async move {
                sleep(after).await;
                this.on_inactivity_expired(generation).await;
            })
        });
        if armed {
            debug!(seconds = after.as_secs(), "inactivity timer armed");
        }
        armed
    }

    pub(crate) async fn on_inactivity_expired(&self, generation: u64) {
        if !self.book.take_expired(generation) {
            debug!(generation, "stale inactivity timer ignored");
            return;
        }
        info!("auto-disconnecting VPN after inactivity");
        match self.disconnect().await {
            Ok(state) => info!(state = %state.summary(), "auto-disconnect finished"),
            Err(e) => warn!(error = %e, "auto-disconnect failed"),
        }
    }

    async fn apply_post_connection_settings(&self) {
        let timeout = self.settings.timings.settings_timeout;
        let mut commands: Vec<Vec<&str>> = vec![
            vec!["set", "killswitch", "off"],
            vec!["set", "lan-discovery", "on"],
            vec!["set", "notify", "off"],
        ];
        if !self.settings.dns_servers.is_empty() {
            let mut dns = vec!["set", "dns"];
            dns.extend(self.settings.dns_servers.iter().map(String::as_str));
            commands.push(dns);
        }
        for subnet in &self.settings.allow_subnets {
            commands.push(vec!["whitelist", "add", "subnet", subnet.as_str()]);
        }

        for args in &commands {
            if let Err(e) = self.runner.run(args, timeout).await {
                warn!(command = %args.join(" "), error = %e, "post-connection setting failed");
            }
        }
    }

    pub fn recommended_locations(&self) -> &[String] {
        &self.settings.locations
    }

    pub fn disconnect_deadline(&self) -> Option<DateTime<Utc>> {
        self.book.deadline()
    }

    pub fn last_known(&self) -> Option<TunnelState> {
        self.book.last_known()
    }

    #[cfg(test)]
    pub(crate) fn book(&self) -> &TunnelBook {
        &self.book
    }

    /// Cancel the pending countdown without touching the tunnel.
    pub fn shutdown(&self) {
        self.book.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::fake::ScriptedDaemon;

    fn settings(locations: &[&str]) -> TunnelSettings {
        TunnelSettings {
            timings: TunnelTimings::instant(),
            locations: locations.iter().map(|l| l.to_string()).collect(),
            dns_servers: vec!["127.0.0.11".into(), "1.1.1.1".into()],
            allow_subnets: vec!["192.168.1.0/24".into(), "172.17.0.0/16".into()],
        }
    }

    fn controller(daemon: &Arc<ScriptedDaemon>) -> TunnelController {
        TunnelController::new(
            daemon.clone(),
            Arc::new(TunnelBook::new()),
            settings(&["australia", "singapore", "japan"]),
        )
    }

    fn locations(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_status_connected_parses_details() {
        let daemon = Arc::new(ScriptedDaemon::new().connected("Sydney"));
        let state = controller(&daemon).status().await;
        let details = state.details().unwrap();
        assert_eq!(details.city.as_deref(), Some("Sydney"));
        assert_eq!(details.country.as_deref(), Some("Australia"));
        assert!(details.connected_since.is_none());
    }

    #[tokio::test]
    async fn test_status_logged_out_surfaces_login_url() {
        let daemon = Arc::new(ScriptedDaemon::new().logged_out());
        let state = controller(&daemon).status().await;
        match state {
            TunnelState::NeedsAuthentication { login_url, message } => {
                assert_eq!(login_url.as_deref(), Some("https://example.com/login?attempt=1"));
                assert_eq!(message, LOGIN_REQUIRED);
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(daemon.count("login --callback"), 1);
        assert_eq!(daemon.count("status"), 0);
    }

    #[tokio::test]
    async fn test_status_account_error_is_unknown_auth() {
        let daemon = Arc::new(ScriptedDaemon::new().account_broken());
        match controller(&daemon).status().await {
            TunnelState::Disconnected {
                authenticated,
                message,
            } => {
                assert_eq!(authenticated, None);
                assert!(message.contains("Cannot reach System Daemon"), "{message}");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_twice_dials_once() {
        let daemon = Arc::new(ScriptedDaemon::new());
        let ctl = controller(&daemon);

        let first = ctl.connect(Some("japan")).await.unwrap();
        assert!(first.is_connected());
        let connected_at = ctl.book().last_connected_at().unwrap();

        let second = ctl.connect(Some("japan")).await.unwrap();
        assert!(second.is_connected());
        assert_eq!(daemon.dials(), vec!["japan"]);
        assert_eq!(ctl.book().last_connected_at(), Some(connected_at));
        // settings applied on both calls
        assert_eq!(daemon.count("set killswitch off"), 2);
        assert!(ctl.disconnect_deadline().is_some());
        ctl.shutdown();
    }

    #[tokio::test]
    async fn test_connect_applies_settings_in_order() {
        let daemon = Arc::new(ScriptedDaemon::new());
        let ctl = controller(&daemon);
        ctl.connect(None).await.unwrap();

        let calls = daemon.calls();
        let settings: Vec<&str> = calls
            .iter()
            .map(String::as_str)
            .filter(|c| c.starts_with("set") || c.starts_with("whitelist"))
            .collect();
        assert_eq!(
            settings,
            vec![
                "set killswitch off",
                "set lan-discovery on",
                "set notify off",
                "set dns 127.0.0.11 1.1.1.1",
                "whitelist add subnet 192.168.1.0/24",
                "whitelist add subnet 172.17.0.0/16",
            ]
        );
        assert_eq!(daemon.dials(), vec![""]);
        ctl.shutdown();
    }

    #[tokio::test]
    async fn test_connect_requires_authentication() {
        let daemon = Arc::new(ScriptedDaemon::new().logged_out());
        let err = controller(&daemon).connect(Some("japan")).await.unwrap_err();
        assert!(matches!(err, TunnelError::AuthenticationRequired { login_url: Some(_) }));
        assert!(daemon.dials().is_empty());
    }

    #[tokio::test]
    async fn test_connect_unverified_is_failure() {
        let daemon = Arc::new(ScriptedDaemon::new().reachable(&[]));
        let ctl = controller(&daemon);
        let err = ctl.connect(Some("japan")).await.unwrap_err();
        match err {
            TunnelError::ConnectionVerificationFailed { location, detail } => {
                assert_eq!(location, "japan");
                assert_eq!(detail, "VPN disconnected.");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ctl.book().last_connected_at().is_none());
        assert!(ctl.disconnect_deadline().is_none());
    }

    #[tokio::test]
    async fn test_drop_after_settings_is_verification_failure() {
        let daemon = Arc::new(ScriptedDaemon::new().drop_on_settings());
        let ctl = controller(&daemon);
        let err = ctl.connect(Some("japan")).await.unwrap_err();
        assert!(
            matches!(err, TunnelError::ConnectionVerificationFailed { ref detail, .. } if detail.contains("post-connection")),
            "{err}"
        );
        assert!(ctl.disconnect_deadline().is_none());
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_success() {
        let daemon = Arc::new(ScriptedDaemon::new().reachable(&["singapore"]));
        let ctl = controller(&daemon);
        let state = ctl
            .connect_with_fallback(&locations(&["australia", "singapore", "japan"]))
            .await
            .unwrap();
        assert!(state.is_connected());
        assert_eq!(daemon.dials(), vec!["australia", "singapore"]);
        ctl.shutdown();
    }

    #[tokio::test]
    async fn test_fallback_exhausted_lists_attempts() {
        let daemon = Arc::new(ScriptedDaemon::new().reachable(&[]));
        let err = controller(&daemon)
            .connect_with_fallback(&locations(&["australia", "japan"]))
            .await
            .unwrap_err();
        match err {
            TunnelError::FallbackExhausted { attempts } => {
                let tried: Vec<&str> = attempts.iter().map(|(l, _)| l.as_str()).collect();
                assert_eq!(tried, vec!["australia", "japan"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fallback_moves_past_timed_out_dial() {
        let daemon = Arc::new(ScriptedDaemon::new().dial_fails(&["australia"]));
        let ctl = controller(&daemon);

        let err = ctl.connect(Some("australia")).await.unwrap_err();
        assert!(
            matches!(
                err,
                TunnelError::Command {
                    step: "connect",
                    source: CommandError::TimedOut { .. }
                }
            ),
            "{err}"
        );

        let state = ctl
            .connect_with_fallback(&locations(&["australia", "singapore"]))
            .await
            .unwrap();
        assert!(state.is_connected());
        assert_eq!(daemon.dials(), vec!["australia", "australia", "singapore"]);
        ctl.shutdown();
    }

    #[tokio::test]
    async fn test_failed_reconnect_clears_deadline() {
        let daemon = Arc::new(ScriptedDaemon::new().reachable(&["japan"]));
        let ctl = controller(&daemon);
        ctl.connect(Some("japan")).await.unwrap();
        assert!(ctl.disconnect_deadline().is_some());

        // tunnel drops behind the controller's back
        daemon
            .run(&["disconnect"], Duration::from_secs(1))
            .await
            .unwrap();

        let err = ctl
            .connect_with_fallback(&locations(&["australia"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::FallbackExhausted { .. }));
        assert!(ctl.book().last_connected_at().is_none());
        assert!(ctl.disconnect_deadline().is_none());
        assert!(!ctl.reset_activity_timer());
    }

    #[tokio::test]
    async fn test_fallback_when_already_connected_does_not_dial() {
        let daemon = Arc::new(ScriptedDaemon::new().connected("Tokyo"));
        let state = controller(&daemon)
            .connect_with_fallback(&locations(&["australia"]))
            .await
            .unwrap();
        assert!(state.is_connected());
        assert!(daemon.dials().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_aborts_on_authentication() {
        let daemon = Arc::new(ScriptedDaemon::new().logged_out());
        let err = controller(&daemon)
            .connect_with_fallback(&locations(&["australia", "japan"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::AuthenticationRequired { .. }));
        assert!(daemon.dials().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_when_already_down() {
        let daemon = Arc::new(ScriptedDaemon::new());
        let state = controller(&daemon).disconnect().await.unwrap();
        assert_eq!(state.summary(), "VPN was already disconnected.");
        assert_eq!(daemon.count("disconnect"), 0);
    }

    #[tokio::test]
    async fn test_disconnect_verification_failure() {
        let daemon = Arc::new(ScriptedDaemon::new().connected("Sydney").disconnect_sticks());
        let err = controller(&daemon).disconnect().await.unwrap_err();
        assert!(matches!(err, TunnelError::DisconnectionVerificationFailed));
    }

    #[tokio::test]
    async fn test_reset_extends_deadline() {
        let daemon = Arc::new(ScriptedDaemon::new());
        let ctl = controller(&daemon);
        ctl.connect(Some("japan")).await.unwrap();
        let first = ctl.disconnect_deadline().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ctl.reset_activity_timer());
        let second = ctl.disconnect_deadline().unwrap();
        assert!(second > first);
        ctl.shutdown();
    }

    #[tokio::test]
    async fn test_disconnect_clears_deadline_and_stale_timer_is_noop() {
        let daemon = Arc::new(ScriptedDaemon::new());
        let ctl = controller(&daemon);
        ctl.connect(Some("japan")).await.unwrap();
        let armed_generation = ctl.book().generation();

        ctl.disconnect().await.unwrap();
        assert!(ctl.disconnect_deadline().is_none());
        assert_eq!(daemon.count("disconnect"), 1);

        ctl.on_inactivity_expired(armed_generation).await;
        assert_eq!(daemon.count("disconnect"), 1);
        assert!(!ctl.reset_activity_timer());
    }

    #[tokio::test]
    async fn test_reset_without_owned_connection_is_noop() {
        let daemon = Arc::new(ScriptedDaemon::new().connected("Sydney"));
        let ctl = controller(&daemon);
        assert!(!ctl.reset_activity_timer());
        assert!(ctl.disconnect_deadline().is_none());
    }

    #[tokio::test]
    async fn test_inactivity_expiry_disconnects() {
        let daemon = Arc::new(ScriptedDaemon::new());
        let mut s = settings(&["japan"]);
        s.timings.inactivity = Duration::from_millis(30);
        let ctl = TunnelController::new(daemon.clone(), Arc::new(TunnelBook::new()), s);

        ctl.connect(Some("japan")).await.unwrap();
        assert!(daemon.is_connected());

        for _ in 0..100 {
            if !daemon.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!daemon.is_connected());
        assert!(ctl.disconnect_deadline().is_none());
        assert!(ctl.book().manual_disconnect());
    }
}
