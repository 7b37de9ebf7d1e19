use crate::domain::{
    ChangeEvent, CreateHostInput, DestinationInventory, FetchVmsInput, HostCreateResult,
    IdentityToken, LinkageUpdate, SourceInventory, SyncError, SyncResult, VmId, VmRecord,
    WriteLinkagesInput,
};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// Maximum host creations in flight for one event. Values below 1 are treated as 1.
    pub create_concurrency: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            create_concurrency: 1,
        }
    }
}

/// A VM whose host creation failed this round
#[derive(Debug)]
pub struct FailedHost {
    pub source_ref: String,
    pub error: SyncError,
}

/// What one reconciliation pass did
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Distinct VM ids named by the event
    pub requested: usize,
    /// Distinct VM records the source inventory returned
    pub fetched: usize,
    pub missing: Vec<VmId>,
    pub already_linked: Vec<VmId>,
    /// Linkages written back, in creation order
    pub linked: Vec<LinkageUpdate>,
    pub failed: Vec<FailedHost>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event names no VMs
    NoVmChanges,
}

/// Result of handling one change event at the message boundary
#[derive(Debug)]
pub enum ProcessOutcome {
    Reconciled(ReconcileReport),
    Skipped(SkipReason),
    Failed(SyncError),
}

/// Links VMs from the source inventory to host records in the destination
///
/// Flow per change event:
/// 1. Validate the tenant
/// 2. Collect the distinct VM ids
/// 3. Fetch those VMs in one batched read
/// 4. Skip VMs that already carry a destination host id
/// 5. Create a destination host per remaining VM
/// 6. Write the new linkages back in a single partial update
pub struct ReconciliationService {
    source: Arc<dyn SourceInventory>,
    destination: Arc<dyn DestinationInventory>,
    config: ReconciliationConfig,
}

impl ReconciliationService {
    pub fn new(
        source: Arc<dyn SourceInventory>,
        destination: Arc<dyn DestinationInventory>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            source,
            destination,
            config,
        }
    }

    /// Handle one change event without letting any failure escape
    #[instrument(skip_all, fields(source_id = event.source_id.as_deref().unwrap_or_default()))]
    pub async fn process(&self, event: &ChangeEvent) -> ProcessOutcome {
        match self.reconcile(event).await {
            Ok(report) if report.requested == 0 => {
                info!("skipping change event without vm changes");
                ProcessOutcome::Skipped(SkipReason::NoVmChanges)
            }
            Ok(report) => {
                info!(
                    requested = report.requested,
                    fetched = report.fetched,
                    missing = report.missing.len(),
                    already_linked = report.already_linked.len(),
                    linked = report.linked.len(),
                    failed = report.failed.len(),
                    "change event reconciled"
                );
                ProcessOutcome::Reconciled(report)
            }
            Err(e) => {
                error!(
                    error_kind = e.kind().as_str(),
                    error = %e,
                    "change event processing failed"
                );
                ProcessOutcome::Failed(e)
            }
        }
    }

    /// Run one reconciliation pass, returning the first fatal error
    pub async fn reconcile(&self, event: &ChangeEvent) -> SyncResult<ReconcileReport> {
        let tenant = event.tenant().ok_or(SyncError::MissingTenant)?;

        let ids = event.vm_id_set();
        if ids.is_empty() {
            return Ok(ReconcileReport::default());
        }

        let identity = IdentityToken::encode(tenant);
        let mut report = ReconcileReport {
            requested: ids.len(),
            ..Default::default()
        };

        debug!(vm_count = ids.len(), "fetching vms from source inventory");
        let records = self
            .source
            .fetch_vms(FetchVmsInput {
                ids: ids.clone(),
                identity: identity.clone(),
            })
            .await?;

        let mut seen = HashSet::new();
        let mut to_create = Vec::new();
        for record in records {
            if !ids.contains(&record.id) || !seen.insert(record.id.clone()) {
                continue;
            }
            if record.is_linked() {
                debug!(vm_id = %record.id, "vm already linked");
                report.already_linked.push(record.id);
            } else {
                to_create.push(record);
            }
        }
        report.fetched = seen.len();

        report.missing = ids.iter().filter(|id| !seen.contains(*id)).cloned().collect();
        if !report.missing.is_empty() {
            info!(missing = ?report.missing, "vms not found in source inventory");
        }

        if to_create.is_empty() {
            debug!("no vms need a destination host");
            return Ok(report);
        }

        // Check before creating so a missing source never orphans new hosts
        let source_id = event
            .source_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(SyncError::MissingSource)?;

        for (record, result) in self.create_hosts(to_create, tenant, &identity).await {
            match result {
                Ok(created) => report.linked.push(LinkageUpdate {
                    source_ref: record.source_ref,
                    destination_host_id: created.host_id,
                }),
                Err(e) => {
                    warn!(
                        vm_id = %record.id,
                        source_ref = %record.source_ref,
                        error = %e,
                        "host creation failed"
                    );
                    report.failed.push(FailedHost {
                        source_ref: record.source_ref,
                        error: e,
                    });
                }
            }
        }

        if report.linked.is_empty() {
            return Ok(report);
        }

        let linkage_count = report.linked.len();
        self.source
            .write_linkages(WriteLinkagesInput {
                source_id: source_id.to_string(),
                linkages: report.linked.clone(),
                identity,
            })
            .await
            .inspect_err(|e| {
                error!(
                    orphaned_hosts = linkage_count,
                    error = %e,
                    "linkage write-back failed after hosts were created"
                );
            })?;

        Ok(report)
    }

    /// Results come back in input order regardless of concurrency
    async fn create_hosts(
        &self,
        records: Vec<VmRecord>,
        tenant: &str,
        identity: &IdentityToken,
    ) -> Vec<(VmRecord, SyncResult<HostCreateResult>)> {
        let destination = &self.destination;

        stream::iter(records)
            .map(|record| {
                let input = CreateHostInput {
                    request: record.to_host_request(tenant),
                    identity: identity.clone(),
                };
                async move {
                    debug!(source_ref = %record.source_ref, "creating destination host");
                    let result = destination.create_host(input).await;
                    (record, result)
                }
            })
            .buffered(self.config.create_concurrency.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockDestinationInventory, MockSourceInventory, SyncErrorKind, VmDeltas};
    use std::sync::Mutex;

    fn ids(values: &[&str]) -> Vec<VmId> {
        values.iter().map(|v| VmId::new(*v)).collect()
    }

    fn event(created: &[&str], updated: &[&str], deleted: &[&str]) -> ChangeEvent {
        ChangeEvent {
            tenant_account: Some("external_tenant_uuid".to_string()),
            source_id: Some("source_uuid".to_string()),
            vm_deltas: VmDeltas {
                created: ids(created),
                updated: ids(updated),
                deleted: ids(deleted),
            },
        }
    }

    fn vm(id: &str, macs: &[&str], destination_host_id: Option<&str>) -> VmRecord {
        VmRecord {
            id: VmId::new(id),
            source_ref: format!("vm{id}"),
            mac_addresses: macs.iter().map(|m| m.to_string()).collect(),
            display_name: None,
            destination_host_id: destination_host_id.map(str::to_string),
        }
    }

    fn host_for(input: &CreateHostInput) -> SyncResult<HostCreateResult> {
        Ok(HostCreateResult {
            host_id: format!("host_uuid_{}", input.request.external_id),
        })
    }

    fn service(
        source: MockSourceInventory,
        destination: MockDestinationInventory,
    ) -> ReconciliationService {
        ReconciliationService::new(
            Arc::new(source),
            Arc::new(destination),
            ReconciliationConfig::default(),
        )
    }

    fn scenario_records() -> Vec<VmRecord> {
        vec![
            vm("1", &["06:d5:e7:4e:c8:01", "06:d5:e7:4e:c7:01"], None),
            vm("2", &["06:d5:e7:4e:c8:02"], Some("h2")),
            vm("3", &["06:d5:e7:4e:c8:03"], Some("")),
            vm("4", &["06:d5:e7:4e:c8:04"], None),
            vm("5", &[], None),
        ]
    }

    #[tokio::test]
    async fn test_creates_unlinked_vms_and_writes_back_once() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();
        let expected_identity = IdentityToken::encode("external_tenant_uuid");

        let fetch_identity = expected_identity.clone();
        source
            .expect_fetch_vms()
            .withf(move |input| {
                input.ids.to_filter_value() == "1,2,3,4,5" && input.identity == fetch_identity
            })
            .times(1)
            .return_once(|_| Ok(scenario_records()));

        let created = Arc::new(Mutex::new(Vec::new()));
        let created_clone = created.clone();
        destination
            .expect_create_host()
            .times(4)
            .returning(move |input| {
                assert_eq!(input.request.account, "external_tenant_uuid");
                assert!(input.request.display_name.is_none());
                created_clone
                    .lock()
                    .unwrap()
                    .push(input.request.external_id.clone());
                host_for(&input)
            });

        source
            .expect_write_linkages()
            .withf(|input| {
                input.source_id == "source_uuid"
                    && input.linkages.len() == 4
                    && input.linkages[0]
                        == LinkageUpdate {
                            source_ref: "vm1".to_string(),
                            destination_host_id: "host_uuid_vm1".to_string(),
                        }
            })
            .times(1)
            .return_once(|_| Ok(()));

        let report = service(source, destination)
            .reconcile(&event(&["3"], &["1", "2"], &["4", "5"]))
            .await
            .unwrap();

        assert_eq!(*created.lock().unwrap(), vec!["vm1", "vm3", "vm4", "vm5"]);
        assert_eq!(report.requested, 5);
        assert_eq!(report.fetched, 5);
        assert_eq!(report.already_linked, ids(&["2"]));
        assert_eq!(report.linked.len(), 4);
        assert!(report.failed.is_empty());
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn test_empty_deltas_make_no_calls() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();
        source.expect_fetch_vms().never();
        source.expect_write_linkages().never();
        destination.expect_create_host().never();

        let outcome = service(source, destination)
            .process(&event(&[], &[], &[]))
            .await;

        assert!(matches!(
            outcome,
            ProcessOutcome::Skipped(SkipReason::NoVmChanges)
        ));
    }

    #[tokio::test]
    async fn test_missing_tenant_makes_no_calls() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();
        source.expect_fetch_vms().never();
        source.expect_write_linkages().never();
        destination.expect_create_host().never();

        let mut event = event(&["1"], &[], &[]);
        event.tenant_account = None;
        let outcome = service(source, destination).process(&event).await;

        match outcome {
            ProcessOutcome::Failed(e) => {
                assert!(matches!(e, SyncError::MissingTenant));
                assert_eq!(e.kind(), SyncErrorKind::Validation);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_overlapping_deltas_fetch_each_id_once() {
        let mut source = MockSourceInventory::new();
        let destination = MockDestinationInventory::new();

        source
            .expect_fetch_vms()
            .withf(|input| input.ids.len() == 2 && input.ids.to_filter_value() == "1,2")
            .times(1)
            .return_once(|_| Ok(vec![vm("1", &[], Some("h1")), vm("2", &[], Some("h2"))]));
        source.expect_write_linkages().never();

        let report = service(source, destination)
            .reconcile(&event(&["1"], &["1", "2"], &["2", "1"]))
            .await
            .unwrap();

        assert_eq!(report.requested, 2);
        assert_eq!(report.already_linked, ids(&["1", "2"]));
    }

    #[tokio::test]
    async fn test_all_linked_skips_write_back() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source
            .expect_fetch_vms()
            .return_once(|_| Ok(vec![vm("1", &[], Some("h1"))]));
        destination.expect_create_host().never();
        source.expect_write_linkages().never();

        let outcome = service(source, destination)
            .process(&event(&["1"], &[], &[]))
            .await;

        match outcome {
            ProcessOutcome::Reconciled(report) => {
                assert!(report.linked.is_empty());
                assert_eq!(report.already_linked, ids(&["1"]));
            }
            other => panic!("expected reconciled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_errors() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source.expect_fetch_vms().return_once(|_| {
            Ok(vec![
                vm("1", &[], None),
                vm("2", &[], None),
                vm("3", &[], None),
                vm("5", &[], None),
            ])
        });
        destination
            .expect_create_host()
            .times(4)
            .returning(|input| host_for(&input));
        source
            .expect_write_linkages()
            .withf(|input| input.linkages.len() == 4)
            .times(1)
            .return_once(|_| Ok(()));

        let report = service(source, destination)
            .reconcile(&event(&["3"], &["1", "2"], &["4", "5"]))
            .await
            .unwrap();

        assert_eq!(report.missing, ids(&["4"]));
        assert_eq!(report.fetched, 4);
    }

    #[tokio::test]
    async fn test_duplicate_and_unrequested_records_are_ignored() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source.expect_fetch_vms().return_once(|_| {
            Ok(vec![
                vm("1", &[], None),
                vm("1", &[], None),
                vm("99", &[], None),
            ])
        });
        destination
            .expect_create_host()
            .times(1)
            .returning(|input| host_for(&input));
        source
            .expect_write_linkages()
            .times(1)
            .return_once(|_| Ok(()));

        let report = service(source, destination)
            .reconcile(&event(&["1"], &[], &[]))
            .await
            .unwrap();

        assert_eq!(report.fetched, 1);
        assert_eq!(report.linked.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_creation_is_excluded_from_write_back() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source
            .expect_fetch_vms()
            .return_once(|_| Ok(vec![vm("1", &[], None), vm("2", &[], None), vm("3", &[], None)]));
        destination.expect_create_host().times(3).returning(|input| {
            if input.request.external_id == "vm2" {
                Err(SyncError::Api {
                    operation: "create host",
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                host_for(&input)
            }
        });
        source
            .expect_write_linkages()
            .withf(|input| {
                input
                    .linkages
                    .iter()
                    .map(|l| l.source_ref.as_str())
                    .collect::<Vec<_>>()
                    == vec!["vm1", "vm3"]
            })
            .times(1)
            .return_once(|_| Ok(()));

        let report = service(source, destination)
            .reconcile(&event(&["1", "2", "3"], &[], &[]))
            .await
            .unwrap();

        assert_eq!(report.linked.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source_ref, "vm2");
        assert_eq!(report.failed[0].error.kind(), SyncErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_all_creations_failing_skips_write_back() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source
            .expect_fetch_vms()
            .return_once(|_| Ok(vec![vm("1", &[], None)]));
        destination.expect_create_host().times(1).returning(|_| {
            Err(SyncError::MalformedResponse {
                operation: "create host",
                detail: "missing host id".to_string(),
            })
        });
        source.expect_write_linkages().never();

        let report = service(source, destination)
            .reconcile(&event(&["1"], &[], &[]))
            .await
            .unwrap();

        assert!(report.linked.is_empty());
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_message() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source.expect_fetch_vms().return_once(|_| {
            Err(SyncError::Transport {
                operation: "fetch vms",
                detail: "connection refused".to_string(),
            })
        });
        destination.expect_create_host().never();
        source.expect_write_linkages().never();

        let outcome = service(source, destination)
            .process(&event(&["1"], &[], &[]))
            .await;

        match outcome {
            ProcessOutcome::Failed(e) => assert_eq!(e.kind(), SyncErrorKind::Transport),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_back_failure_fails_message() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source
            .expect_fetch_vms()
            .return_once(|_| Ok(vec![vm("1", &[], None)]));
        destination
            .expect_create_host()
            .times(1)
            .returning(|input| host_for(&input));
        source.expect_write_linkages().times(1).return_once(|_| {
            Err(SyncError::Api {
                operation: "write linkages",
                status: 503,
                body: String::new(),
            })
        });

        let outcome = service(source, destination)
            .process(&event(&["1"], &[], &[]))
            .await;

        assert!(matches!(
            outcome,
            ProcessOutcome::Failed(SyncError::Api { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_creating() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source
            .expect_fetch_vms()
            .return_once(|_| Ok(vec![vm("1", &[], None)]));
        destination.expect_create_host().never();
        source.expect_write_linkages().never();

        let mut event = event(&["1"], &[], &[]);
        event.source_id = None;
        let err = service(source, destination)
            .reconcile(&event)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::MissingSource));
    }

    #[tokio::test]
    async fn test_concurrent_creation_keeps_input_order() {
        let mut source = MockSourceInventory::new();
        let mut destination = MockDestinationInventory::new();

        source
            .expect_fetch_vms()
            .return_once(|_| Ok(scenario_records()));
        destination
            .expect_create_host()
            .times(4)
            .returning(|input| host_for(&input));
        source
            .expect_write_linkages()
            .withf(|input| {
                input
                    .linkages
                    .iter()
                    .map(|l| l.destination_host_id.as_str())
                    .collect::<Vec<_>>()
                    == vec![
                        "host_uuid_vm1",
                        "host_uuid_vm3",
                        "host_uuid_vm4",
                        "host_uuid_vm5",
                    ]
            })
            .times(1)
            .return_once(|_| Ok(()));

        let service = ReconciliationService::new(
            Arc::new(source),
            Arc::new(destination),
            ReconciliationConfig {
                create_concurrency: 4,
            },
        );

        let report = service
            .reconcile(&event(&["3"], &["1", "2"], &["4", "5"]))
            .await
            .unwrap();
        assert_eq!(report.linked.len(), 4);
    }
}
