//! Plain-text rendering of tool results.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{OperationOutcome, SystemOverview};
use crate::health::HealthReport;
use crate::indexer::SearchResult;
use crate::torrent::{TorrentHealth, TorrentInfo, TransferInfo};
use crate::tunnel::TunnelState;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Binary-prefixed size, e.g. `1.50 GB`. Whole bytes below 1 KB.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

pub fn json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

pub fn health_report(report: &HealthReport) -> Result<String, serde_json::Error> {
    let mut text = format!(
        "Indexer health: {} ({}%), {} of {} enabled indexers healthy.\n{}\n\n",
        report.overall.as_str(),
        report.score,
        report.indexers.healthy,
        report.indexers.enabled,
        report.guidance
    );
    text.push_str(&json(report)?);
    Ok(text)
}

/// Outcome message followed by a numbered result list. Numbers are the
/// options accepted by `grab_release`.
pub fn search_outcome(outcome: &OperationOutcome) -> String {
    let mut text = format!("{}\nHealth score: {}%", outcome.message, outcome.health_score);
    if outcome.tunnel_connected {
        text.push_str(" (VPN connected)");
    }
    text.push('\n');
    if outcome.results.is_empty() {
        return text;
    }
    text.push('\n');
    for (i, result) in outcome.results.iter().enumerate() {
        let _ = writeln!(text, "{}. {}", i + 1, search_result_line(result));
    }
    text.push_str("\nUse grab_release with an option number to download.");
    text
}

fn search_result_line(result: &SearchResult) -> String {
    let mut line = format!(
        "{}\n   {} | {}",
        result.title,
        if result.indexer.is_empty() {
            "unknown indexer"
        } else {
            result.indexer.as_str()
        },
        format_size(result.size)
    );
    if let Some(seeders) = result.seeders {
        let _ = write!(line, " | {seeders} seeders");
    }
    if let Some(leechers) = result.leechers {
        let _ = write!(line, " | {leechers} leechers");
    }
    line
}

pub fn grabbed(result: &SearchResult, extended: bool) -> String {
    let mut text = format!(
        "Grabbed release.\nTitle: {}\nIndexer: {}\nSize: {}",
        result.title,
        result.indexer,
        format_size(result.size)
    );
    if extended {
        text.push_str("\nVPN session extended.");
    }
    text
}

pub fn tunnel_status(state: &TunnelState, deadline: Option<DateTime<Utc>>) -> String {
    let mut text = match state {
        TunnelState::Connected(details) => {
            let mut text = "VPN connected".to_string();
            if let Some(location) = details.location() {
                let _ = write!(text, "\nLocation: {location}");
            }
            if let Some(ref ip) = details.ip {
                let _ = write!(text, "\nIP: {ip}");
            }
            if let Some(ref server) = details.server {
                let _ = write!(text, "\nServer: {server}");
            }
            if let Some(ref technology) = details.technology {
                let _ = write!(text, "\nTechnology: {technology}");
            }
            if let Some(ref uptime) = details.uptime {
                let _ = write!(text, "\nUptime: {uptime}");
            }
            if let Some(since) = details.connected_since {
                let _ = write!(text, "\nConnected since: {}", since.to_rfc3339());
            }
            text
        }
        other => other.summary(),
    };
    if let Some(deadline) = deadline {
        let _ = write!(text, "\nAuto-disconnect at: {}", deadline.to_rfc3339());
    }
    text
}

pub fn system_overview(overview: &SystemOverview) -> Result<String, serde_json::Error> {
    let readiness = if overview.ready {
        "Ready for searching."
    } else if overview.tunnel.needs_authentication() {
        "Health below threshold and the VPN needs a login; searches will run without it."
    } else {
        "Health below threshold; searches will try the VPN first."
    };
    let health = match (&overview.health, &overview.health_error) {
        (Some(snapshot), _) => format!("{}%", snapshot.score),
        (None, Some(error)) => format!("unavailable ({error})"),
        (None, None) => "unknown".to_string(),
    };
    Ok(format!(
        "Health: {health} (threshold {}%)\n{}\n{}\n\n{}",
        overview.threshold,
        overview.tunnel.summary(),
        readiness,
        json(overview)?
    ))
}

pub fn torrents(torrents: &[TorrentInfo]) -> String {
    if torrents.is_empty() {
        return "No torrents.".to_string();
    }
    let mut text = format!("{} torrents:\n", torrents.len());
    for (i, t) in torrents.iter().enumerate() {
        let _ = writeln!(
            text,
            "{}. {}\n   {} | {:.1}% of {} | down {} | up {} | ratio {:.2}\n   hash: {}",
            i + 1,
            t.name,
            t.state,
            t.progress * 100.0,
            format_size(t.size),
            format_speed(t.dlspeed),
            format_speed(t.upspeed),
            t.ratio,
            t.hash
        );
    }
    text
}

pub fn torrent_health(health: &TorrentHealth) -> String {
    format!(
        "Torrent client reachable.\nVersion: {}\nWeb API: {}",
        health.version, health.web_api_version
    )
}

pub fn transfer(info: &TransferInfo) -> String {
    format!(
        "Connection: {}\nDownload: {} ({} this session)\nUpload: {} ({} this session)\nDHT nodes: {}",
        if info.connection_status.is_empty() {
            "unknown"
        } else {
            info.connection_status.as_str()
        },
        format_speed(info.dl_info_speed),
        format_size(info.dl_info_data),
        format_speed(info.up_info_speed),
        format_size(info.up_info_data),
        info.dht_nodes
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OutcomeKind;
    use crate::tunnel::ConnectionDetails;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_size(u64::MAX), "16777216.00 TB");
    }

    #[test]
    fn test_search_outcome_numbers_results() {
        let outcome = OperationOutcome::new(OutcomeKind::Completed, "Found 2 results.", 90)
            .with_results(vec![
                SearchResult {
                    title: "debian-12.iso".into(),
                    indexer: "Linux".into(),
                    size: 1024 * 1024,
                    seeders: Some(40),
                    ..Default::default()
                },
                SearchResult {
                    title: "debian-11.iso".into(),
                    ..Default::default()
                },
            ]);
        let text = search_outcome(&outcome);
        assert!(text.starts_with("Found 2 results."));
        assert!(text.contains("1. debian-12.iso\n   Linux | 1.00 MB | 40 seeders"));
        assert!(text.contains("2. debian-11.iso\n   unknown indexer | 0 B"));
        assert!(text.contains("grab_release"));
    }

    #[test]
    fn test_tunnel_status_lists_details() {
        let state = TunnelState::Connected(ConnectionDetails {
            city: Some("Sydney".into()),
            country: Some("Australia".into()),
            ip: Some("198.51.100.24".into()),
            ..Default::default()
        });
        let text = tunnel_status(&state, None);
        assert!(text.contains("Location: Sydney, Australia"));
        assert!(text.contains("IP: 198.51.100.24"));
        assert!(!text.contains("Auto-disconnect"));

        let down = TunnelState::Disconnected {
            authenticated: Some(true),
            message: "VPN is disconnected.".into(),
        };
        assert_eq!(tunnel_status(&down, None), "VPN is disconnected.");
    }
}
