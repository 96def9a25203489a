//! Parsing of the daemon's human-readable CLI output.
//!
//! The output format is not a stable interface. Every field is optional and
//! a field that cannot be found is reported as absent rather than an error.

use crate::tunnel::ConnectionDetails;

const CONNECTED_MARKER: &str = "status: connected";

/// Parse `status` output. Returns `None` when the daemon is not connected.
pub fn parse_status(stdout: &str) -> Option<ConnectionDetails> {
    let connected = stdout
        .lines()
        .any(|line| line.to_ascii_lowercase().contains(CONNECTED_MARKER));
    if !connected {
        return None;
    }

    Some(ConnectionDetails {
        city: field(stdout, "City:"),
        country: field(stdout, "Country:"),
        ip: field(stdout, "Your new IP:").or_else(|| field(stdout, "Current IP:")),
        server: field(stdout, "Current server:").or_else(|| field(stdout, "Hostname:")),
        protocol: field(stdout, "Protocol:"),
        technology: field(stdout, "Technology:"),
        uptime: field(stdout, "Uptime:"),
        connected_since: None,
    })
}

/// Value following `label` on the first line containing it (ASCII
/// case-insensitive, so `Current protocol:` matches `Protocol:`).
fn field(text: &str, label: &str) -> Option<String> {
    let needle = label.to_ascii_lowercase();
    text.lines().find_map(|line| {
        let idx = line.to_ascii_lowercase().find(&needle)?;
        let value = line[idx + needle.len()..].trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Whether daemon output or an error message says the account is logged out.
pub fn indicates_logged_out(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("you are not logged in") || lower.contains("please login")
}

/// First `https://` URL in `text`, used to surface the browser login link.
pub fn extract_login_url(text: &str) -> Option<String> {
    let start = text.find("https://")?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '\'' || c == '"')
        .unwrap_or(rest.len());
    let url = rest[..end].trim_end_matches(['.', ',', ')']);
    (url.len() > "https://".len()).then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTED: &str = "\
Status: Connected
Hostname: au712.nordvpn.com
Current server: au712.nordvpn.com
Country: Australia
City: Sydney
Server IP: 203.0.113.10
Your new IP: 198.51.100.24
Current technology: NORDLYNX
Current protocol: UDP
Transfer: 1.2 MiB received, 310 KiB sent
Uptime: 4 minutes 12 seconds
";

    #[test]
    fn test_parse_connected() {
        let details = parse_status(CONNECTED).unwrap();
        assert_eq!(details.city.as_deref(), Some("Sydney"));
        assert_eq!(details.country.as_deref(), Some("Australia"));
        assert_eq!(details.ip.as_deref(), Some("198.51.100.24"));
        assert_eq!(details.server.as_deref(), Some("au712.nordvpn.com"));
        assert_eq!(details.protocol.as_deref(), Some("UDP"));
        assert_eq!(details.technology.as_deref(), Some("NORDLYNX"));
        assert_eq!(details.uptime.as_deref(), Some("4 minutes 12 seconds"));
    }

    #[test]
    fn test_parse_disconnected() {
        assert!(parse_status("Status: Disconnected\n").is_none());
        assert!(parse_status("").is_none());
    }

    #[test]
    fn test_parse_spinner_prefix_and_missing_fields() {
        let out = "\r-\r  \r\rStatus: Connected\nCurrent IP: 192.0.2.1\n";
        let details = parse_status(out).unwrap();
        assert_eq!(details.ip.as_deref(), Some("192.0.2.1"));
        assert!(details.city.is_none());
        assert!(details.server.is_none());
        assert!(details.uptime.is_none());
    }

    #[test]
    fn test_empty_field_is_absent() {
        let details = parse_status("Status: Connected\nCity:   \n").unwrap();
        assert!(details.city.is_none());
    }

    #[test]
    fn test_logged_out_detection() {
        assert!(indicates_logged_out("You are not logged in."));
        assert!(indicates_logged_out("command failed (stderr: Please login first)"));
        assert!(!indicates_logged_out("Whoops! Cannot reach System Daemon."));
    }

    #[test]
    fn test_extract_login_url() {
        let out = "Continue in the browser: https://api.nordvpn.com/v1/users/oauth/login-redirect?attempt=abc123\n";
        assert_eq!(
            extract_login_url(out).as_deref(),
            Some("https://api.nordvpn.com/v1/users/oauth/login-redirect?attempt=abc123")
        );
        assert_eq!(
            extract_login_url("open 'https://example.com/login'.").as_deref(),
            Some("https://example.com/login")
        );
        assert!(extract_login_url("no url here").is_none());
    }
}
