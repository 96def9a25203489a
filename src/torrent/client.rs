//! qBittorrent Web API v2 client with cookie session management.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::header::{COOKIE, ORIGIN, REFERER, SET_COOKIE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::Config;

use super::models::{AddTorrent, TorrentAction, TorrentHealth, TorrentInfo, TorrentQuery, TransferInfo};

#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("torrent client authentication failed: {0}")]
    Auth(String),
    #[error("torrent client unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("torrent client API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("torrent client returned an unexpected body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct Session {
    sid: String,
    expires_at: Instant,
}

pub struct TorrentClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    session_timeout: Duration,
    session: Mutex<Option<Session>>,
}

impl TorrentClient {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        session_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            session_timeout,
            session: Mutex::new(None),
        })
    }

    /// `None` when no torrent client URL is configured.
    pub fn from_config(config: &Config) -> reqwest::Result<Option<Self>> {
        let Some(ref url) = config.torrent_url else {
            return Ok(None);
        };
        Self::new(
            url,
            &config.torrent_username,
            &config.torrent_password,
            Duration::from_secs(config.torrent_session_timeout_secs),
        )
        .map(Some)
    }

    async fn login(&self) -> Result<String, TorrentError> {
        let url = format!("{}/api/v2/auth/login", self.base_url);
        debug!(url = %url, "authenticating with torrent client");
        let resp = self
            .http
            .post(&url)
            .header(REFERER, &self.base_url)
            .header(ORIGIN, &self.base_url)
            .form(&[("username", &self.username), ("password", &self.password)])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::FORBIDDEN {
            return Err(TorrentError::Auth(
                "invalid username or password, or too many failed attempts".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(TorrentError::Api {
                status: status.as_u16(),
                message: format!("login failed: {}", status.canonical_reason().unwrap_or("")),
            });
        }

        let sid = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(parse_sid);
        let body = resp.text().await?;

        let Some(sid) = sid else {
            if body.trim() == "Fails." {
                return Err(TorrentError::Auth("invalid username or password".to_string()));
            }
            return Err(TorrentError::Auth("no session cookie received".to_string()));
        };

        *self.session.lock() = Some(Session {
            sid: sid.clone(),
            expires_at: Instant::now() + self.session_timeout,
        });
        info!("authenticated with torrent client");
        Ok(sid)
    }

    async fn session_id(&self) -> Result<String, TorrentError> {
        let current = self.session.lock().clone();
        match current {
            Some(session) if Instant::now() < session.expires_at => Ok(session.sid),
            _ => self.login().await,
        }
    }

    fn invalidate(&self) {
        *self.session.lock() = None;
    }

    /// Authenticated request returning the raw body. A 403 triggers one
    /// re-login and retry.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        form: Option<&[(&str, String)]>,
    ) -> Result<String, TorrentError> {
        let url = format!("{}/api/v2{}", self.base_url, endpoint);
        let mut relogged = false;

        loop {
            let sid = self.session_id().await?;
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header(COOKIE, format!("SID={sid}"))
                .header(REFERER, &self.base_url)
                .query(query);
            if let Some(form) = form {
                req = req.form(form);
            }

            debug!(method = %method, endpoint, "torrent client request");
            let resp = req.send().await?;
            let status = resp.status();

            if status == StatusCode::FORBIDDEN {
                if relogged {
                    return Err(TorrentError::Auth(
                        "authentication failed after retry".to_string(),
                    ));
                }
                debug!("torrent client session rejected, re-authenticating");
                relogged = true;
                self.invalidate();
                continue;
            }

            let body = resp.text().await?;
            if !status.is_success() {
                return Err(TorrentError::Api {
                    status: status.as_u16(),
                    message: api_message(status, &body),
                });
            }
            return Ok(body);
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, TorrentError> {
        let body = self.request(Method::GET, endpoint, query, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn health_check(&self) -> Result<TorrentHealth, TorrentError> {
        // Sequential so both calls share one login.
        let version = self.request(Method::GET, "/app/version", &[], None).await?;
        let web_api_version = self
            .request(Method::GET, "/app/webapiVersion", &[], None)
            .await?;
        Ok(TorrentHealth {
            version: version.trim().to_string(),
            web_api_version: web_api_version.trim().to_string(),
        })
    }

    pub async fn torrents(&self, query: &TorrentQuery) -> Result<Vec<TorrentInfo>, TorrentError> {
        self.get_json("/torrents/info", &query.params()).await
    }

    pub async fn add(&self, torrent: &AddTorrent) -> Result<(), TorrentError> {
        if torrent.urls.iter().all(|u| u.trim().is_empty()) {
            return Err(TorrentError::Api {
                status: StatusCode::BAD_REQUEST.as_u16(),
                message: "at least one URL or magnet link is required".to_string(),
            });
        }
        let body = self
            .request(Method::POST, "/torrents/add", &[], Some(torrent.form().as_slice()))
            .await?;
        if body.trim() == "Fails." {
            return Err(TorrentError::Api {
                status: StatusCode::OK.as_u16(),
                message: "torrent client rejected the torrent".to_string(),
            });
        }
        info!(count = torrent.urls.len(), "torrents added");
        Ok(())
    }

    pub async fn control(
        &self,
        action: TorrentAction,
        hashes: &[String],
        delete_files: bool,
    ) -> Result<(), TorrentError> {
        let mut form = vec![("hashes", hashes.join("|"))];
        if action == TorrentAction::Delete {
            form.push(("deleteFiles", delete_files.to_string()));
        }
        let endpoint = format!("/torrents/{}", action.as_str());
        self.request(Method::POST, &endpoint, &[], Some(form.as_slice()))
            .await?;
        info!(action = action.as_str(), count = hashes.len(), "torrents updated");
        Ok(())
    }

    pub async fn transfer_info(&self) -> Result<TransferInfo, TorrentError> {
        self.get_json("/transfer/info", &[]).await
    }

    /// Invalidate the session server-side. Failures are logged, never
    /// returned; the local session is dropped either way.
    pub async fn logout(&self) {
        if self.session.lock().is_none() {
            return;
        }
        if let Err(e) = self.request(Method::POST, "/auth/logout", &[], None).await {
            warn!(error = %e, "torrent client logout failed");
        }
        self.invalidate();
    }
}

fn parse_sid(cookie: &str) -> Option<String> {
    cookie
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("SID="))
        .filter(|sid| !sid.is_empty())
        .map(str::to_string)
}

fn api_message(status: StatusCode, body: &str) -> String {
    match status {
        StatusCode::NOT_FOUND => "resource not found".to_string(),
        StatusCode::CONFLICT => "conflict or invalid operation".to_string(),
        StatusCode::BAD_REQUEST => "bad request".to_string(),
        _ => {
            let reason = status.canonical_reason().unwrap_or("request failed");
            let body = body.trim();
            if body.is_empty() {
                reason.to_string()
            } else {
                format!("{reason} - {body}")
            }
        }
    }
}
