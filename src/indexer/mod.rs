//! Indexer manager API access.

pub mod client;
pub mod models;

pub use client::{IndexerClient, IndexerError};
pub use models::SearchResult;
