//! Tool descriptors advertised to callers.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn tool(name: &'static str, description: &'static str, input_schema: Value) -> ToolDescriptor {
    ToolDescriptor {
        name,
        description,
        input_schema,
    }
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

/// Every tool the router answers. Torrent tools are listed only when a
/// torrent client is configured.
pub fn descriptors(torrent_enabled: bool) -> Vec<ToolDescriptor> {
    let mut tools = vec![
        tool(
            "health_check",
            "Check indexer health: score, failing indexers and suggested next steps",
            no_arguments(),
        ),
        tool(
            "get_indexers",
            "List configured indexers",
            json!({
                "type": "object",
                "properties": {
                    "enabled_only": {
                        "type": "boolean",
                        "description": "Only return enabled indexers",
                        "default": false
                    }
                },
                "required": []
            }),
        ),
        tool(
            "search",
            "Search indexers. Connects the VPN first when indexer health is below the threshold",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms (e.g. 'debian 12', 'big buck bunny')"
                    },
                    "indexer_ids": {
                        "type": "array",
                        "items": { "type": "number" },
                        "description": "Indexer IDs to search. Empty searches every torrent indexer"
                    },
                    "categories": {
                        "type": "array",
                        "items": { "type": "number" },
                        "description": "Category IDs (e.g. 2000 for movies, 5000 for TV)"
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of results"
                    }
                },
                "required": ["query"]
            }),
        ),
        tool(
            "grab_release",
            "Send a release from the last search to the download client by option number",
            json!({
                "type": "object",
                "properties": {
                    "option": {
                        "type": "number",
                        "description": "Option number from the last search results (1, 2, 3...)"
                    }
                },
                "required": ["option"]
            }),
        ),
        tool(
            "get_download_clients",
            "List download clients configured in the indexer manager",
            no_arguments(),
        ),
        tool(
            "vpn_status",
            "Current VPN connection state and auto-disconnect deadline",
            no_arguments(),
        ),
        tool(
            "vpn_connect",
            "Connect the VPN to a city or country",
            json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "City or country (e.g. 'australia', 'sydney', 'singapore')",
                        "default": super::DEFAULT_CITY
                    }
                },
                "required": []
            }),
        ),
        tool("vpn_disconnect", "Disconnect the VPN", no_arguments()),
        tool(
            "system_status",
            "Combined indexer health, VPN state and search readiness",
            no_arguments(),
        ),
    ];

    if torrent_enabled {
        tools.extend([
            tool(
                "torrent_list",
                "List torrents in the torrent client",
                json!({
                    "type": "object",
                    "properties": {
                        "filter": {
                            "type": "string",
                            "enum": ["all", "downloading", "seeding", "completed", "paused", "active", "inactive"]
                        },
                        "category": { "type": "string" },
                        "tag": { "type": "string" },
                        "sort": { "type": "string", "description": "Field to sort by (e.g. 'added_on')" },
                        "reverse": { "type": "boolean" },
                        "limit": { "type": "number" },
                        "offset": { "type": "number" }
                    },
                    "required": []
                }),
            ),
            tool(
                "torrent_add",
                "Add torrents by magnet link or .torrent URL",
                json!({
                    "type": "object",
                    "properties": {
                        "urls": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Magnet links or .torrent URLs"
                        },
                        "savepath": { "type": "string" },
                        "category": { "type": "string" },
                        "tags": { "type": "string", "description": "Comma-separated tags" },
                        "paused": { "type": "boolean" },
                        "skip_checking": { "type": "boolean" },
                        "rename": { "type": "string" },
                        "up_limit": { "type": "number", "description": "Upload limit in bytes/s" },
                        "dl_limit": { "type": "number", "description": "Download limit in bytes/s" },
                        "sequential_download": { "type": "boolean" },
                        "first_last_piece_prio": { "type": "boolean" }
                    },
                    "required": ["urls"]
                }),
            ),
            tool(
                "torrent_control",
                "Pause, resume or delete torrents",
                json!({
                    "type": "object",
                    "properties": {
                        "action": { "type": "string", "enum": ["pause", "resume", "delete"] },
                        "hashes": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Torrent hashes, or [\"all\"]"
                        },
                        "delete_files": {
                            "type": "boolean",
                            "description": "Also delete downloaded data (delete only)",
                            "default": false
                        }
                    },
                    "required": ["action", "hashes"]
                }),
            ),
            tool(
                "torrent_health",
                "Check that the torrent client is reachable and report its version",
                no_arguments(),
            ),
            tool(
                "torrent_transfer_info",
                "Global transfer speeds and connection state of the torrent client",
                no_arguments(),
            ),
        ]);
    }

    tools
}
