//! Scripted in-memory daemon used by controller and engine tests.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::exec::{CommandError, CommandOutput, CommandRunner};

#[derive(Debug)]
struct Script {
    logged_in: bool,
    connected: bool,
    city: Option<String>,
    /// Locations whose dial actually brings the tunnel up. `None` means any.
    reachable: Option<Vec<String>>,
    /// Locations whose `connect` command itself times out.
    dial_fails: Vec<String>,
    drop_on_settings: bool,
    disconnect_sticks: bool,
    account_broken: bool,
    calls: Vec<String>,
}

/// Stateful stand-in for the daemon CLI. Records every invocation.
#[derive(Debug)]
pub struct ScriptedDaemon {
    script: Mutex<Script>,
}

impl ScriptedDaemon {
    /// Logged in, disconnected, every location reachable.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                logged_in: true,
                connected: false,
                city: None,
                reachable: None,
                dial_fails: Vec::new(),
                drop_on_settings: false,
                disconnect_sticks: false,
                account_broken: false,
                calls: Vec::new(),
            }),
        }
    }

    pub fn connected(self, city: &str) -> Self {
        {
            let mut s = self.script.lock();
            s.connected = true;
            s.city = Some(city.to_string());
        }
        self
    }

    pub fn logged_out(self) -> Self {
        self.script.lock().logged_in = false;
        self
    }

    pub fn reachable(self, locations: &[&str]) -> Self {
        self.script.lock().reachable = Some(locations.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn dial_fails(self, locations: &[&str]) -> Self {
        self.script.lock().dial_fails = locations.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn drop_on_settings(self) -> Self {
        self.script.lock().drop_on_settings = true;
        self
    }

    pub fn disconnect_sticks(self) -> Self {
        self.script.lock().disconnect_sticks = true;
        self
    }

    pub fn account_broken(self) -> Self {
        self.script.lock().account_broken = true;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.script.lock().connected
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().calls.clone()
    }

    /// Location argument of every `connect` invocation, in order.
    pub fn dials(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("connect"))
            .map(|rest| rest.trim().to_string())
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn failed(command: &str, stdout: &str) -> CommandError {
    CommandError::Failed {
        command: format!("nordvpn {command}"),
        status: "exit status: 1".to_string(),
        stdout: stdout.to_string(),
        stderr: "N/A".to_string(),
    }
}

fn ok(stdout: impl Into<String>) -> Result<CommandOutput, CommandError> {
    Ok(CommandOutput {
        stdout: stdout.into(),
        stderr: String::new(),
    })
}

#[async_trait]
impl CommandRunner for ScriptedDaemon {
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput, CommandError> {
        let line = args.join(" ");
        let mut s = self.script.lock();
        s.calls.push(line.clone());

        match args.first().copied().unwrap_or_default() {
            "account" if s.account_broken => Err(failed(&line, "Whoops! Cannot reach System Daemon.")),
            "account" if !s.logged_in => Err(failed(&line, "You are not logged in.")),
            "account" => ok("Account Information:\nEmail Address: user@example.com\nVPN Service: Active\n"),
            "login" => ok("Continue in the browser: https://example.com/login?attempt=1\n"),
            "status" if s.connected => {
                let city = s.city.clone().unwrap_or_else(|| "Sydney".to_string());
                ok(format!(
                    "Status: Connected\nHostname: au712.nordvpn.com\nCountry: Australia\nCity: {city}\nYour new IP: 198.51.100.24\nCurrent technology: NORDLYNX\nCurrent protocol: UDP\nUptime: 12 seconds\n"
                ))
            }
            "status" => ok("Status: Disconnected\n"),
            "connect" => {
                let location = args.get(1).copied().unwrap_or_default().to_string();
                if s.dial_fails.iter().any(|l| *l == location) {
                    return Err(CommandError::TimedOut {
                        command: format!("nordvpn {line}"),
                        timeout,
                    });
                }
                let up = s
                    .reachable
                    .as_ref()
                    .map_or(true, |r| r.iter().any(|l| *l == location));
                if up {
                    s.connected = true;
                    s.city = Some(location.clone());
                    ok(format!("Connecting to {location}\nYou are connected to {location}!\n"))
                } else {
                    ok(format!("Connecting to {location}\n"))
                }
            }
            "disconnect" => {
                if !s.disconnect_sticks {
                    s.connected = false;
                }
                ok("You are disconnected from NordVPN.\n")
            }
            "set" | "whitelist" => {
                if s.drop_on_settings {
                    s.connected = false;
                }
                ok("Settings updated.\n")
            }
            _ => Err(failed(&line, "Command not found")),
        }
    }
}
