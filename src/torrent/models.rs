use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub dlspeed: u64,
    #[serde(default)]
    pub upspeed: u64,
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub added_on: i64,
    #[serde(default)]
    pub downloaded: u64,
    #[serde(default)]
    pub uploaded: u64,
    #[serde(default)]
    pub ratio: f64,
    #[serde(default)]
    pub save_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferInfo {
    #[serde(default)]
    pub dl_info_speed: u64,
    #[serde(default)]
    pub dl_info_data: u64,
    #[serde(default)]
    pub up_info_speed: u64,
    #[serde(default)]
    pub up_info_data: u64,
    #[serde(default)]
    pub dl_rate_limit: u64,
    #[serde(default)]
    pub up_rate_limit: u64,
    #[serde(default)]
    pub dht_nodes: u64,
    #[serde(default)]
    pub connection_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentHealth {
    pub version: String,
    pub web_api_version: String,
}

/// `filter` values accepted by `/torrents/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorrentFilter {
    All,
    Downloading,
    Seeding,
    Completed,
    Paused,
    Active,
    Inactive,
}

impl TorrentFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentFilter::All => "all",
            TorrentFilter::Downloading => "downloading",
            TorrentFilter::Seeding => "seeding",
            TorrentFilter::Completed => "completed",
            TorrentFilter::Paused => "paused",
            TorrentFilter::Active => "active",
            TorrentFilter::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TorrentQuery {
    pub filter: Option<TorrentFilter>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub sort: Option<String>,
    pub reverse: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TorrentQuery {
    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(filter) = self.filter {
            params.push(("filter", filter.as_str().to_string()));
        }
        if let Some(ref category) = self.category {
            params.push(("category", category.clone()));
        }
        if let Some(ref tag) = self.tag {
            params.push(("tag", tag.clone()));
        }
        if let Some(ref sort) = self.sort {
            params.push(("sort", sort.clone()));
        }
        if self.reverse {
            params.push(("reverse", "true".to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            params.push(("offset", offset.to_string()));
        }
        params
    }
}

/// Options for `/torrents/add`. `urls` holds magnet links or .torrent URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddTorrent {
    pub urls: Vec<String>,
    pub savepath: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub paused: Option<bool>,
    pub skip_checking: bool,
    pub rename: Option<String>,
    pub up_limit: Option<u64>,
    pub dl_limit: Option<u64>,
    pub sequential_download: bool,
    pub first_last_piece_prio: bool,
}

impl AddTorrent {
    pub(crate) fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![("urls", self.urls.join("\n"))];
        if let Some(ref savepath) = self.savepath {
            form.push(("savepath", savepath.clone()));
        }
        if let Some(ref category) = self.category {
            form.push(("category", category.clone()));
        }
        if let Some(ref tags) = self.tags {
            form.push(("tags", tags.clone()));
        }
        if let Some(paused) = self.paused {
            form.push(("paused", paused.to_string()));
        }
        if self.skip_checking {
            form.push(("skip_checking", "true".to_string()));
        }
        if let Some(ref rename) = self.rename {
            form.push(("rename", rename.clone()));
        }
        if let Some(limit) = self.up_limit.filter(|l| *l > 0) {
            form.push(("upLimit", limit.to_string()));
        }
        if let Some(limit) = self.dl_limit.filter(|l| *l > 0) {
            form.push(("dlLimit", limit.to_string()));
        }
        if self.sequential_download {
            form.push(("sequentialDownload", "true".to_string()));
        }
        if self.first_last_piece_prio {
            form.push(("firstLastPiecePrio", "true".to_string()));
        }
        form
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorrentAction {
    Pause,
    Resume,
    Delete,
}

impl TorrentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentAction::Pause => "pause",
            TorrentAction::Resume => "resume",
            TorrentAction::Delete => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_skip_unset() {
        let query = TorrentQuery {
            filter: Some(TorrentFilter::Downloading),
            limit: Some(0),
            reverse: true,
            ..Default::default()
        };
        assert_eq!(
            query.params(),
            vec![
                ("filter", "downloading".to_string()),
                ("reverse", "true".to_string())
            ]
        );
    }

    #[test]
    fn test_add_form_joins_urls() {
        let add = AddTorrent {
            urls: vec!["magnet:?xt=urn:btih:aaa".into(), "magnet:?xt=urn:btih:bbb".into()],
            category: Some("tv".into()),
            paused: Some(false),
            ..Default::default()
        };
        let form = add.form();
        assert_eq!(form[0], ("urls", "magnet:?xt=urn:btih:aaa\nmagnet:?xt=urn:btih:bbb".to_string()));
        assert!(form.contains(&("category", "tv".to_string())));
        assert!(form.contains(&("paused", "false".to_string())));
        assert!(!form.iter().any(|(k, _)| *k == "skip_checking"));
    }
}
