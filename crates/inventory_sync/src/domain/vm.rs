use crate::domain::VmId;

/// Authoritative VM data returned by the source inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    pub id: VmId,
    pub source_ref: String,
    pub mac_addresses: Vec<String>,
    pub display_name: Option<String>,
    pub destination_host_id: Option<String>,
}

impl VmRecord {
    /// A VM is linked once it carries a non-empty destination host id
    pub fn is_linked(&self) -> bool {
        self.destination_host_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }

    pub fn to_host_request(&self, account: &str) -> HostCreateRequest {
        HostCreateRequest {
            display_name: self.display_name.clone(),
            external_id: self.source_ref.clone(),
            mac_addresses: self.mac_addresses.clone(),
            account: account.to_string(),
        }
    }
}

/// Host record to create in the destination inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCreateRequest {
    pub display_name: Option<String>,
    /// The VM's `source_ref`
    pub external_id: String,
    pub mac_addresses: Vec<String>,
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCreateResult {
    pub host_id: String,
}

/// Cross-reference written back to the source inventory for one created host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageUpdate {
    pub source_ref: String,
    pub destination_host_id: String,
}
