use crate::domain::{SyncError, SyncResult};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;

/// Source-inventory VM identifier. Producers emit ids as JSON strings or
/// integers; both normalise to the same string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VmId(String);

impl VmId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VmId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => VmId(id),
            RawId::Int(id) => VmId(id.to_string()),
        })
    }
}

/// De-duplicated set of VM ids affected by one change event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmIdSet(BTreeSet<VmId>);

impl VmIdSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &VmId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VmId> {
        self.0.iter()
    }

    /// Comma separated ids, as used by the source inventory `filter[id]` query
    pub fn to_filter_value(&self) -> String {
        self.0
            .iter()
            .map(VmId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<VmId> for VmIdSet {
    fn from_iter<I: IntoIterator<Item = VmId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// VM ids named by one change event, per kind of change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmDeltas {
    pub created: Vec<VmId>,
    pub updated: Vec<VmId>,
    pub deleted: Vec<VmId>,
}

/// A persister-output change notification for one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    pub tenant_account: Option<String>,
    pub source_id: Option<String>,
    pub vm_deltas: VmDeltas,
}

impl ChangeEvent {
    /// Decode a queue message body
    pub fn from_slice(payload: &[u8]) -> SyncResult<Self> {
        let message: ChangeEventMessage = serde_json::from_slice(payload)
            .map_err(|e| SyncError::InvalidMessage(e.to_string()))?;
        Ok(message.into())
    }

    /// The tenant account, when present and non-empty
    pub fn tenant(&self) -> Option<&str> {
        self.tenant_account.as_deref().filter(|t| !t.is_empty())
    }

    /// Union of created, updated and deleted ids without duplicates
    pub fn vm_id_set(&self) -> VmIdSet {
        self.vm_deltas
            .created
            .iter()
            .chain(&self.vm_deltas.updated)
            .chain(&self.vm_deltas.deleted)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ChangeEventMessage {
    external_tenant: Option<String>,
    source: Option<String>,
    payload: Option<ChangeEventPayload>,
}

#[derive(Debug, Deserialize)]
struct ChangeEventPayload {
    vms: Option<VmChanges>,
}

#[derive(Debug, Deserialize)]
struct VmChanges {
    created: Option<Vec<VmRef>>,
    updated: Option<Vec<VmRef>>,
    deleted: Option<Vec<VmRef>>,
}

#[derive(Debug, Deserialize)]
struct VmRef {
    id: VmId,
}

fn ids(refs: Option<Vec<VmRef>>) -> Vec<VmId> {
    refs.unwrap_or_default().into_iter().map(|r| r.id).collect()
}

impl From<ChangeEventMessage> for ChangeEvent {
    fn from(message: ChangeEventMessage) -> Self {
        let vm_deltas = match message.payload.and_then(|p| p.vms) {
            Some(vms) => VmDeltas {
                created: ids(vms.created),
                updated: ids(vms.updated),
                deleted: ids(vms.deleted),
            },
            None => VmDeltas::default(),
        };

        Self {
            tenant_account: message.external_tenant,
            source_id: message.source,
            vm_deltas,
        }
    }
}
