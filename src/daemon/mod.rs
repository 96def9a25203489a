//! VPN daemon CLI access: process execution and output parsing.

pub mod exec;
#[cfg(test)]
pub mod fake;
pub mod status;

pub use exec::{CommandError, CommandRunner, DaemonRunner};
