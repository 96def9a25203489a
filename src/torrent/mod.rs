//! Torrent client (qBittorrent Web API v2).

pub mod client;
pub mod models;

pub use client::{TorrentClient, TorrentError};
pub use models::{AddTorrent, TorrentAction, TorrentHealth, TorrentInfo, TorrentQuery, TransferInfo};
