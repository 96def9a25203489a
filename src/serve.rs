//! JSON-lines tool server.
//!
//! Each input line is a request `{"id": .., "tool": "search", "arguments": {..}}`;
//! each reply is one line `{"id": .., "text": "..", "is_error": false}`.
//! Requests are answered in order.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::tools::{ToolResponse, ToolRouter};

#[derive(Debug, Deserialize)]
struct ToolRequest {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct ToolReply {
    id: Value,
    #[serde(flatten)]
    response: ToolResponse,
}

/// Answer requests from `reader` until EOF or `shutdown` resolves. Returns
/// the number of replies written.
pub async fn serve<R, W, S>(
    router: &ToolRouter,
    reader: R,
    mut writer: W,
    shutdown: S,
) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = reader.lines();
    tokio::pin!(shutdown);
    let mut replies = 0usize;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping tool server");
                break;
            }
        };
        let Some(line) = line else {
            debug!("input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = handle_line(router, &line).await;
        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
        replies += 1;
    }

    Ok(replies)
}

async fn handle_line(router: &ToolRouter, line: &str) -> ToolReply {
    match serde_json::from_str::<ToolRequest>(line) {
        Ok(request) => {
            let response = router.call(&request.tool, request.arguments).await;
            ToolReply {
                id: request.id,
                response,
            }
        }
        Err(e) => ToolReply {
            id: Value::Null,
            response: ToolResponse {
                text: format!("Error: invalid request: {e}"),
                is_error: true,
            },
        },
    }
}
