use crate::domain::{
    HostCreateRequest, HostCreateResult, IdentityToken, LinkageUpdate, SyncResult, VmIdSet,
    VmRecord,
};
use async_trait::async_trait;

/// Input for a batched VM read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchVmsInput {
    pub ids: VmIdSet,
    pub identity: IdentityToken,
}

/// Input for the partial linkage write-back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteLinkagesInput {
    pub source_id: String,
    pub linkages: Vec<LinkageUpdate>,
    pub identity: IdentityToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateHostInput {
    pub request: HostCreateRequest,
    pub identity: IdentityToken,
}

/// Source-of-truth VM inventory
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SourceInventory: Send + Sync {
    /// Fetch the VMs named by `ids` in one logical call. Ids without a
    /// record are simply absent from the result.
    async fn fetch_vms(&self, input: FetchVmsInput) -> SyncResult<Vec<VmRecord>>;

    /// Record linkages with partial-update semantics, scoped to one source
    async fn write_linkages(&self, input: WriteLinkagesInput) -> SyncResult<()>;
}

/// Inventory that holds canonical host records
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DestinationInventory: Send + Sync {
    async fn create_host(&self, input: CreateHostInput) -> SyncResult<HostCreateResult>;
}
