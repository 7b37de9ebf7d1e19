mod host_inventory_client;
mod source_inventory_client;

pub use host_inventory_client::*;
pub use source_inventory_client::*;

use crate::domain::{IdentityToken, SyncError, SyncResult, IDENTITY_HEADER};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// Longest error body kept on a `SyncError::Api`
const MAX_ERROR_BODY: usize = 512;

/// Attach the identity header, send, and reject non-success statuses
async fn send(
    request: RequestBuilder,
    identity: &IdentityToken,
    operation: &'static str,
) -> SyncResult<Response> {
    let response = request
        .header(IDENTITY_HEADER, identity.as_str())
        .send()
        .await
        .map_err(|e| SyncError::Transport {
            operation,
            detail: e.to_string(),
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    Err(SyncError::Api {
        operation,
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    operation: &'static str,
) -> SyncResult<T> {
    let bytes = response.bytes().await.map_err(|e| SyncError::Transport {
        operation,
        detail: e.to_string(),
    })?;

    serde_json::from_slice(&bytes).map_err(|e| SyncError::MalformedResponse {
        operation,
        detail: e.to_string(),
    })
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
