use super::{join_url, read_json, send};
use crate::domain::{
    CreateHostInput, DestinationInventory, HostCreateRequest, HostCreateResult, SyncError,
    SyncResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CREATE_HOST: &str = "create host";

#[derive(Debug, Clone)]
pub struct HostInventoryClientConfig {
    /// Base of the destination inventory API, e.g. `http://host:8081/api/inventory/v1`
    pub destination_api_url: String,
}

/// Destination (host based) inventory over HTTP
pub struct HostInventoryClient {
    http: reqwest::Client,
    config: HostInventoryClientConfig,
}

impl HostInventoryClient {
    pub fn new(http: reqwest::Client, config: HostInventoryClientConfig) -> Self {
        Self { http, config }
    }
}

#[derive(Debug, Serialize)]
struct HostPayload<'a> {
    display_name: Option<&'a str>,
    external_id: &'a str,
    mac_addresses: &'a [String],
    account: &'a str,
}

impl<'a> From<&'a HostCreateRequest> for HostPayload<'a> {
    fn from(request: &'a HostCreateRequest) -> Self {
        Self {
            display_name: request.display_name.as_deref(),
            external_id: &request.external_id,
            mac_addresses: &request.mac_addresses,
            account: &request.account,
        }
    }
}

/// Bulk create response: one entry per submitted host
#[derive(Debug, Deserialize)]
struct CreateHostsResponse {
    data: Vec<CreatedHostEntry>,
}

#[derive(Debug, Deserialize)]
struct CreatedHostEntry {
    status: Option<u16>,
    host: Option<CreatedHost>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedHost {
    id: Option<String>,
}

fn host_id_from(response: CreateHostsResponse, external_id: &str) -> SyncResult<HostCreateResult> {
    let entry = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::MalformedResponse {
            operation: CREATE_HOST,
            detail: "empty data array".to_string(),
        })?;

    if let Some(status) = entry.status.filter(|s| *s >= 400) {
        return Err(SyncError::HostRejected {
            external_id: external_id.to_string(),
            status,
            detail: entry.detail.unwrap_or_default(),
        });
    }

    entry
        .host
        .and_then(|host| host.id)
        .filter(|id| !id.is_empty())
        .map(|host_id| HostCreateResult { host_id })
        .ok_or_else(|| SyncError::MalformedResponse {
            operation: CREATE_HOST,
            detail: "missing data[0].host.id".to_string(),
        })
}

#[async_trait]
impl DestinationInventory for HostInventoryClient {
    #[instrument(skip_all, fields(external_id = %input.request.external_id))]
    async fn create_host(&self, input: CreateHostInput) -> SyncResult<HostCreateResult> {
        let body = [HostPayload::from(&input.request)];
        let url = join_url(&self.config.destination_api_url, "hosts");

        let response = send(self.http.post(url).json(&body), &input.identity, CREATE_HOST).await?;
        let parsed: CreateHostsResponse = read_json(response, CREATE_HOST).await?;
        let created = host_id_from(parsed, &input.request.external_id)?;

        debug!(host_id = %created.host_id, "destination host created");
        Ok(created)
    }
}
