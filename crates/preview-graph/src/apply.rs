//! Ordered execution of a plan against a control plane.
//!
//! The applier validates the whole graph before making any call, then walks
//! the waves in order. References resolve from outputs recorded in state,
//! which is updated after every successful node so a failed run can resume.
//! Certificate validation nodes block until the control plane reports the
//! certificate as issued.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use preview_core::config::DomainConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ApplyError, ControlPlaneError};
use crate::graph::ResourceGraph;
use crate::plan::{Action, State, StateEntry, plan};
use crate::resource::{Attribute, Outputs, ResolvedNode, ResourceId, ResourceKind, ResourceNode};

/// Certificate issuance status as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Issued,
    Failed(String),
}

/// The cloud side of an apply: creates or updates one node at a time.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create or update a node, returning its outputs.
    async fn apply(&self, node: &ResolvedNode) -> Result<Outputs, ControlPlaneError>;

    async fn validation_status(&self, id: &ResourceId)
    -> Result<ValidationStatus, ControlPlaneError>;
}

#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub validation_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            validation_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl ApplyOptions {
    pub fn from_domain(domain: Option<&DomainConfig>) -> Self {
        match domain {
            Some(d) => Self {
                validation_timeout: Duration::from_secs(d.validation_timeout_secs),
                poll_interval: Duration::from_secs(d.validation_poll_secs),
            },
            None => Self::default(),
        }
    }
}

/// What a successful apply did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub created: Vec<ResourceId>,
    pub updated: Vec<ResourceId>,
    pub unchanged: Vec<ResourceId>,
    pub orphaned: Vec<ResourceId>,
}

impl ApplyReport {
    pub fn changed(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

pub struct Applier {
    control_plane: Arc<dyn ControlPlane>,
    options: ApplyOptions,
}

impl Applier {
    pub fn new(control_plane: Arc<dyn ControlPlane>, options: ApplyOptions) -> Self {
        Self {
            control_plane,
            options,
        }
    }

    /// Apply `graph`, recording each node's result in `state`.
    pub async fn apply(
        &self,
        graph: &ResourceGraph,
        state: &mut State,
    ) -> Result<ApplyReport, ApplyError> {
        let plan = plan(graph, state)?;
        let mut report = ApplyReport {
            orphaned: plan.orphaned.clone(),
            ..ApplyReport::default()
        };
        for id in &plan.orphaned {
            warn!(resource = %id, "recorded resource is no longer declared; leaving it in place");
        }

        for change in plan.changes {
            let Some(node) = graph.get(&change.id) else {
                continue;
            };
            match change.action {
                Action::NoOp => {
                    report.unchanged.push(change.id);
                    continue;
                }
                Action::Create => report.created.push(change.id.clone()),
                Action::Update { ref changed } => {
                    debug!(resource = %change.id, changed = ?changed, "updating");
                    report.updated.push(change.id.clone());
                }
            }

            let resolved = resolve(node, state)?;
            let outputs = self.control_plane.apply(&resolved).await?;
            info!(resource = %node.id, kind = %node.kind, "applied");

            if node.kind == ResourceKind::CertificateValidation {
                self.wait_for_validation(&node.id).await?;
            }

            state.record(
                node.id.clone(),
                StateEntry {
                    kind: node.kind,
                    attributes: node.attributes.clone(),
                    outputs,
                },
            );
        }

        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            "apply complete"
        );
        Ok(report)
    }

    async fn wait_for_validation(&self, id: &ResourceId) -> Result<(), ApplyError> {
        let started = Instant::now();
        let deadline = started + self.options.validation_timeout;
        loop {
            match self.control_plane.validation_status(id).await? {
                ValidationStatus::Issued => {
                    info!(resource = %id, waited = ?started.elapsed(), "certificate issued");
                    return Ok(());
                }
                ValidationStatus::Failed(reason) => {
                    return Err(ApplyError::ValidationFailed {
                        id: id.clone(),
                        reason,
                    });
                }
                ValidationStatus::Pending => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ApplyError::ValidationTimeout {
                            id: id.clone(),
                            waited: now - started,
                        });
                    }
                    debug!(resource = %id, "certificate validation pending");
                    tokio::time::sleep(self.options.poll_interval.min(deadline - now)).await;
                }
            }
        }
    }
}

fn resolve(node: &ResourceNode, state: &State) -> Result<ResolvedNode, ApplyError> {
    let mut attributes = BTreeMap::new();
    for (name, attr) in &node.attributes {
        let value = match attr {
            Attribute::Literal(value) => value.clone(),
            Attribute::Ref { node: from, output } => state
                .output(from, output)
                .cloned()
                .ok_or_else(|| ApplyError::UnresolvedOutput {
                    id: node.id.clone(),
                    node: from.clone(),
                    output: output.clone(),
                })?,
        };
        attributes.insert(name.clone(), value);
    }
    Ok(ResolvedNode {
        id: node.id.clone(),
        kind: node.kind,
        attributes,
    })
}

/// In-memory control plane that records calls and fabricates outputs.
#[derive(Debug, Default)]
pub struct MemoryControlPlane {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    applied: Vec<ResolvedNode>,
    status_calls: usize,
    pending_polls: HashMap<ResourceId, u32>,
    outcomes: HashMap<ResourceId, ValidationStatus>,
    reject: HashMap<ResourceId, String>,
}

impl MemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `Pending` for the first `polls` status checks of `id`.
    pub fn with_pending_polls(self, id: &str, polls: u32) -> Self {
        self.lock().pending_polls.insert(ResourceId::new(id), polls);
        self
    }

    /// Report `Pending` for `id` forever.
    pub fn never_issue(self, id: &str) -> Self {
        self.lock()
            .outcomes
            .insert(ResourceId::new(id), ValidationStatus::Pending);
        self
    }

    pub fn fail_validation(self, id: &str, reason: &str) -> Self {
        self.lock().outcomes.insert(
            ResourceId::new(id),
            ValidationStatus::Failed(reason.to_string()),
        );
        self
    }

    pub fn reject(self, id: &str, reason: &str) -> Self {
        self.lock()
            .reject
            .insert(ResourceId::new(id), reason.to_string());
        self
    }

    /// Every node passed to `apply`, in call order.
    pub fn applied(&self) -> Vec<ResolvedNode> {
        self.lock().applied.clone()
    }

    pub fn applied_ids(&self) -> Vec<ResourceId> {
        self.lock().applied.iter().map(|n| n.id.clone()).collect()
    }

    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().expect("control plane lock")
    }
}

#[async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn apply(&self, node: &ResolvedNode) -> Result<Outputs, ControlPlaneError> {
        let mut inner = self.lock();
        if let Some(reason) = inner.reject.get(&node.id) {
            return Err(ControlPlaneError::Rejected {
                id: node.id.clone(),
                reason: reason.clone(),
            });
        }
        inner.applied.push(node.clone());
        Ok(fabricate_outputs(node, inner.applied.len()))
    }

    async fn validation_status(
        &self,
        id: &ResourceId,
    ) -> Result<ValidationStatus, ControlPlaneError> {
        let mut inner = self.lock();
        inner.status_calls += 1;
        if let Some(remaining) = inner.pending_polls.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(ValidationStatus::Pending);
            }
        }
        Ok(inner
            .outcomes
            .get(id)
            .cloned()
            .unwrap_or(ValidationStatus::Issued))
    }
}

fn fabricate_outputs(node: &ResolvedNode, serial: usize) -> Outputs {
    let id = node.id.as_str();
    let arn = format!("arn:memory:{}:{}", node.kind, id);
    let mut outputs = Outputs::new();
    outputs.insert("id".to_string(), Value::from(id));
    outputs.insert("arn".to_string(), Value::from(arn.as_str()));

    match node.kind {
        ResourceKind::Bucket => {
            let name = node.str_attr("bucket").unwrap_or(id);
            outputs.insert("id".to_string(), Value::from(name));
        }
        ResourceKind::WebsiteConfiguration => {
            let bucket = node.str_attr("bucket").unwrap_or(id);
            outputs.insert(
                "website_endpoint".to_string(),
                Value::from(format!("{bucket}.website.memory.local")),
            );
        }
        ResourceKind::Certificate => {
            let domain = node
                .str_attr("domain_name")
                .unwrap_or(id)
                .trim_start_matches("*.");
            outputs.insert(
                "validation_record_name".to_string(),
                Value::from(format!("_validation.{domain}")),
            );
            outputs.insert(
                "validation_record_value".to_string(),
                Value::from(format!("_{serial}.validation.memory.local")),
            );
        }
        ResourceKind::DnsValidationRecord | ResourceKind::DnsAlias => {
            let fqdn = node.str_attr("name").unwrap_or(id);
            outputs.insert("fqdn".to_string(), Value::from(fqdn));
        }
        ResourceKind::CertificateValidation => {
            let cert = node.str_attr("certificate_arn").unwrap_or(&arn);
            outputs.insert("certificate_arn".to_string(), Value::from(cert));
        }
        ResourceKind::EdgeFunction => {
            let name = node.str_attr("name").unwrap_or(id);
            outputs.insert("name".to_string(), Value::from(name));
        }
        ResourceKind::EdgeFunctionVersion => {
            let function = node.str_attr("function_arn").unwrap_or(&arn);
            outputs.insert("version".to_string(), Value::from(serial));
            outputs.insert(
                "qualified_arn".to_string(),
                Value::from(format!("{function}:{serial}")),
            );
        }
        ResourceKind::Distribution => {
            outputs.insert(
                "domain_name".to_string(),
                Value::from(format!("d{serial:04}.cdn.memory.local")),
            );
            outputs.insert("hosted_zone_id".to_string(), Value::from("ZMEMORYCDN"));
        }
        ResourceKind::DeploymentContent => {
            let objects: u64 = node
                .attributes
                .get("deployments")
                .and_then(Value::as_object)
                .map(|deployments| {
                    deployments
                        .values()
                        .filter_map(|d| d.get("objects").and_then(Value::as_u64))
                        .sum()
                })
                .unwrap_or(0);
            outputs.insert("objects".to_string(), Value::from(objects));
        }
        ResourceKind::BucketAcl => {}
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{ids, synthesize};
    use preview_core::PreviewConfig;

    fn config_with_domain() -> PreviewConfig {
        let mut config = PreviewConfig::scaffold("demo", "demo-previews");
        config.domain = Some(DomainConfig {
            base: "preview.example.com".to_string(),
            hosted_zone: "example.com".to_string(),
            validation_timeout_secs: 60,
            validation_poll_secs: 10,
        });
        config
    }

    fn applier(control_plane: &Arc<MemoryControlPlane>, config: &PreviewConfig) -> Applier {
        Applier::new(
            control_plane.clone(),
            ApplyOptions::from_domain(config.domain.as_ref()),
        )
    }

    #[tokio::test]
    async fn applies_in_dependency_order() {
        let config = config_with_domain();
        let graph = synthesize(&config).unwrap();
        let cp = Arc::new(MemoryControlPlane::new());
        let mut state = State::new();

        let report = applier(&cp, &config).apply(&graph, &mut state).await.unwrap();
        assert_eq!(report.created.len(), graph.len());

        let applied = cp.applied_ids();
        let position = |id: &str| applied.iter().position(|n| n.as_str() == id).unwrap();
        assert!(position(ids::CERTIFICATE_VALIDATION) < position(ids::DISTRIBUTION));
        assert!(position(ids::CONTENT) < position(ids::DISTRIBUTION));
        assert!(position(ids::EDGE_FUNCTION_VERSION) < position(ids::DISTRIBUTION));
        assert!(position(ids::DISTRIBUTION) < position(ids::DNS_ALIAS));
    }

    #[tokio::test]
    async fn references_resolve_to_upstream_outputs() {
        let config = config_with_domain();
        let graph = synthesize(&config).unwrap();
        let cp = Arc::new(MemoryControlPlane::new());
        let mut state = State::new();
        applier(&cp, &config).apply(&graph, &mut state).await.unwrap();

        let applied = cp.applied();
        let distribution = applied
            .iter()
            .find(|n| n.id.as_str() == ids::DISTRIBUTION)
            .unwrap();
        assert_eq!(
            distribution.str_attr("origin_domain"),
            Some("demo-previews.website.memory.local")
        );
        assert_eq!(
            distribution.str_attr("viewer_certificate_arn"),
            Some("arn:memory:certificate:certificate")
        );
        assert!(
            distribution
                .str_attr("lambda_arn")
                .unwrap()
                .starts_with("arn:memory:edge-function:edge-function:")
        );
    }

    #[tokio::test]
    async fn reapply_is_a_noop() {
        let config = config_with_domain();
        let graph = synthesize(&config).unwrap();
        let cp = Arc::new(MemoryControlPlane::new());
        let mut state = State::new();
        let applier = applier(&cp, &config);

        applier.apply(&graph, &mut state).await.unwrap();
        let calls = cp.applied().len();

        assert!(plan(&graph, &state).unwrap().is_noop());
        let report = applier.apply(&graph, &mut state).await.unwrap();
        assert_eq!(report.changed(), 0);
        assert_eq!(cp.applied().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_certificate_issue() {
        let config = config_with_domain();
        let graph = synthesize(&config).unwrap();
        let cp = Arc::new(
            MemoryControlPlane::new().with_pending_polls(ids::CERTIFICATE_VALIDATION, 3),
        );
        let mut state = State::new();

        applier(&cp, &config).apply(&graph, &mut state).await.unwrap();
        assert_eq!(cp.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn validation_timeout_stops_before_distribution() {
        let config = config_with_domain();
        let graph = synthesize(&config).unwrap();
        let cp = Arc::new(MemoryControlPlane::new().never_issue(ids::CERTIFICATE_VALIDATION));
        let mut state = State::new();

        let err = applier(&cp, &config)
            .apply(&graph, &mut state)
            .await
            .unwrap_err();
        match err {
            ApplyError::ValidationTimeout { id, waited } => {
                assert_eq!(id.as_str(), ids::CERTIFICATE_VALIDATION);
                assert!(waited >= Duration::from_secs(60));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(!cp.applied_ids().iter().any(|id| id.as_str() == ids::DISTRIBUTION));
        assert!(state.get(&ResourceId::new(ids::CERTIFICATE)).is_some());
        assert!(state.get(&ResourceId::new(ids::CERTIFICATE_VALIDATION)).is_none());
    }

    #[tokio::test]
    async fn failed_validation_fails_fast() {
        let config = config_with_domain();
        let graph = synthesize(&config).unwrap();
        let cp = Arc::new(
            MemoryControlPlane::new().fail_validation(ids::CERTIFICATE_VALIDATION, "CAA record forbids issuer"),
        );
        let mut state = State::new();

        let err = applier(&cp, &config)
            .apply(&graph, &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::ValidationFailed { .. }));
        assert_eq!(cp.status_calls(), 1);
    }

    #[tokio::test]
    async fn resumes_after_control_plane_rejection() {
        let config = PreviewConfig::scaffold("demo", "demo-previews");
        let graph = synthesize(&config).unwrap();
        let mut state = State::new();

        let failing = Arc::new(MemoryControlPlane::new().reject(ids::DISTRIBUTION, "quota exceeded"));
        let err = applier(&failing, &config)
            .apply(&graph, &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::ControlPlane(ControlPlaneError::Rejected { .. })));

        let healthy = Arc::new(MemoryControlPlane::new());
        let report = applier(&healthy, &config).apply(&graph, &mut state).await.unwrap();
        assert_eq!(report.created, vec![ResourceId::new(ids::DISTRIBUTION)]);
        assert_eq!(healthy.applied_ids(), vec![ResourceId::new(ids::DISTRIBUTION)]);
    }

    #[tokio::test]
    async fn missing_upstream_output_is_reported() {
        let mut graph = ResourceGraph::new();
        graph.add(ResourceNode::new("bucket", ResourceKind::Bucket)).unwrap();
        graph
            .add(
                ResourceNode::new("acl", ResourceKind::BucketAcl)
                    .with_ref("bucket", "bucket", "no_such_output"),
            )
            .unwrap();
        let cp = Arc::new(MemoryControlPlane::new());
        let err = Applier::new(cp, ApplyOptions::default())
            .apply(&graph, &mut State::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::UnresolvedOutput { ref output, .. } if output == "no_such_output"));
    }
}
