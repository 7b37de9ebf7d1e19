use super::{join_url, read_json, send};
use crate::domain::{
    FetchVmsInput, LinkageUpdate, SourceInventory, SyncError, SyncResult, VmId, VmRecord,
    WriteLinkagesInput,
};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, instrument};

const FETCH_VMS: &str = "fetch vms";
const WRITE_LINKAGES: &str = "write linkages";

#[derive(Debug, Clone)]
pub struct SourceInventoryClientConfig {
    /// Base of the source inventory read API, e.g. `http://host:3000/v0.1`
    pub source_api_url: String,
    /// Base of the ingress API that accepts inventory updates
    pub ingress_api_url: String,
}

/// Source inventory over HTTP: reads go to the inventory API and linkage
/// write-backs go through the ingress API.
pub struct SourceInventoryClient {
    http: reqwest::Client,
    vms_url: Url,
    inventory_url: Url,
}

impl SourceInventoryClient {
    /// Both endpoints are resolved here, so a bad base url fails at startup
    pub fn new(http: reqwest::Client, config: SourceInventoryClientConfig) -> SyncResult<Self> {
        Ok(Self {
            http,
            vms_url: endpoint(&config.source_api_url, "vms")?,
            inventory_url: endpoint(&config.ingress_api_url, "inventory")?,
        })
    }

    fn next_page_url(&self, current: &Url, next: &str) -> SyncResult<Url> {
        current
            .join(next)
            .map_err(|e| SyncError::MalformedResponse {
                operation: FETCH_VMS,
                detail: format!("invalid links.next {next:?}: {e}"),
            })
    }
}

fn endpoint(base: &str, path: &str) -> SyncResult<Url> {
    let url = join_url(base, path);
    Url::parse(&url).map_err(|e| SyncError::InvalidEndpoint {
        url,
        detail: e.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct VmCollection {
    #[serde(default)]
    data: Vec<VmPayload>,
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VmPayload {
    id: VmId,
    source_ref: String,
    mac_addresses: Option<Vec<String>>,
    name: Option<String>,
    host_inventory_uuid: Option<String>,
}

impl From<VmPayload> for VmRecord {
    fn from(vm: VmPayload) -> Self {
        Self {
            id: vm.id,
            source_ref: vm.source_ref,
            mac_addresses: vm.mac_addresses.unwrap_or_default(),
            display_name: vm.name,
            destination_host_id: vm.host_inventory_uuid,
        }
    }
}

#[derive(Debug, Serialize)]
struct SaveInventoryRequest<'a> {
    schema: InventorySchema,
    source: &'a str,
    collections: Vec<PartialCollection<'a>>,
}

#[derive(Debug, Serialize)]
struct InventorySchema {
    name: &'static str,
}

/// Only `partial_data` is ever sent; `data` would replace the whole collection
#[derive(Debug, Serialize)]
struct PartialCollection<'a> {
    name: &'static str,
    partial_data: Vec<VmLinkage<'a>>,
}

#[derive(Debug, Serialize)]
struct VmLinkage<'a> {
    source_ref: &'a str,
    host_inventory_uuid: &'a str,
}

impl<'a> From<&'a LinkageUpdate> for VmLinkage<'a> {
    fn from(linkage: &'a LinkageUpdate) -> Self {
        Self {
            source_ref: &linkage.source_ref,
            host_inventory_uuid: &linkage.destination_host_id,
        }
    }
}

#[async_trait]
impl SourceInventory for SourceInventoryClient {
    #[instrument(skip_all, fields(vm_count = input.ids.len()))]
    async fn fetch_vms(&self, input: FetchVmsInput) -> SyncResult<Vec<VmRecord>> {
        let mut url = self.vms_url.clone();
        url.query_pairs_mut()
            .append_pair("filter[id]", &input.ids.to_filter_value());

        let mut records = Vec::new();
        let mut visited = HashSet::new();
        loop {
            debug!(url = %url, "fetching vm page");
            let response = send(self.http.get(url.clone()), &input.identity, FETCH_VMS).await?;
            let page: VmCollection = read_json(response, FETCH_VMS).await?;
            records.extend(page.data.into_iter().map(VmRecord::from));

            visited.insert(url.clone());
            match page.links.and_then(|links| links.next) {
                Some(next) => {
                    let next = self.next_page_url(&url, &next)?;
                    if visited.contains(&next) {
                        return Err(SyncError::MalformedResponse {
                            operation: FETCH_VMS,
                            detail: format!("pagination loops back to {next}"),
                        });
                    }
                    url = next;
                }
                None => break,
            }
        }

        debug!(record_count = records.len(), "fetched vms");
        Ok(records)
    }

    #[instrument(skip_all, fields(source_id = %input.source_id, linkage_count = input.linkages.len()))]
    async fn write_linkages(&self, input: WriteLinkagesInput) -> SyncResult<()> {
        let body = SaveInventoryRequest {
            schema: InventorySchema { name: "Default" },
            source: &input.source_id,
            collections: vec![PartialCollection {
                name: "vms",
                partial_data: input.linkages.iter().map(VmLinkage::from).collect(),
            }],
        };

        let request = self.http.post(self.inventory_url.clone()).json(&body);
        send(request, &input.identity, WRITE_LINKAGES).await?;

        debug!("linkages written back");
        Ok(())
    }
}
