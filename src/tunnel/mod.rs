//! VPN tunnel lifecycle.

pub mod book;
pub mod controller;
pub mod state;

pub use book::TunnelBook;
pub use controller::{TunnelController, TunnelError, TunnelSettings};
pub use state::{ConnectionDetails, TunnelState};
