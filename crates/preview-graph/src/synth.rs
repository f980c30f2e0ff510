//! Builds the standard preview stack from configuration.
//!
//! Without a `[domain]` section the distribution serves on its default CDN
//! hostname and no certificate or DNS nodes are declared.

use std::collections::BTreeMap;

use preview_core::{AssetRecord, Fingerprint, PreviewConfig};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{GraphResult, SynthesisError};
use crate::graph::ResourceGraph;
use crate::resource::{ResourceKind, ResourceNode};

/// Node ids used by the synthesized stack.
pub mod ids {
    pub const BUCKET: &str = "bucket";
    pub const BUCKET_ACL: &str = "bucket-acl";
    pub const WEBSITE: &str = "website";
    pub const CONTENT: &str = "deployment-content";
    pub const CERTIFICATE: &str = "certificate";
    pub const VALIDATION_RECORD: &str = "certificate-dns-record";
    pub const CERTIFICATE_VALIDATION: &str = "certificate-validation";
    pub const EDGE_FUNCTION: &str = "edge-function";
    pub const EDGE_FUNCTION_VERSION: &str = "edge-function-version";
    pub const DISTRIBUTION: &str = "distribution";
    pub const DNS_ALIAS: &str = "dns-alias";
}

/// Edge functions attached to a distribution must live in this region.
const EDGE_REGION: &str = "us-east-1";

/// Objects synced under one deployment prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContent {
    pub prefix: String,
    pub assets: Vec<AssetRecord>,
}

impl DeploymentContent {
    /// Digest over every key and its fingerprint, independent of order.
    pub fn digest(&self) -> Fingerprint {
        let mut lines: Vec<String> = self
            .assets
            .iter()
            .map(|a| format!("{}\t{}\n", a.key, a.fingerprint))
            .collect();
        lines.sort();
        Fingerprint::of(lines.concat().as_bytes())
    }
}

/// The stack with no deployment content recorded.
pub fn synthesize(config: &PreviewConfig) -> GraphResult<ResourceGraph> {
    synthesize_with_content(config, &[])
}

/// The stack, with the bucket populated by `content` before the
/// distribution is applied.
pub fn synthesize_with_content(
    config: &PreviewConfig,
    content: &[DeploymentContent],
) -> GraphResult<ResourceGraph> {
    config
        .validate()
        .map_err(|e| SynthesisError::InvalidConfig(format!("{e:#}")))?;

    let mut graph = ResourceGraph::new();
    let bucket = &config.bucket;

    graph.add(
        ResourceNode::new(ids::BUCKET, ResourceKind::Bucket)
            .with_literal("bucket", bucket.name.as_str())
            .with_literal("region", config.stack.region.as_str()),
    )?;
    graph.add(
        ResourceNode::new(ids::BUCKET_ACL, ResourceKind::BucketAcl)
            .with_ref("bucket", ids::BUCKET, "id")
            .with_literal("acl", bucket.acl.as_str()),
    )?;
    graph.add(
        ResourceNode::new(ids::WEBSITE, ResourceKind::WebsiteConfiguration)
            .with_ref("bucket", ids::BUCKET, "id")
            .with_literal("index_document", bucket.index_document.as_str())
            .with_literal("error_document", bucket.error_document.as_str()),
    )?;

    let mut deployments = serde_json::Map::new();
    for deployment in content {
        let entry = json!({
            "objects": deployment.assets.len(),
            "digest": deployment.digest().to_hex(),
        });
        if deployments.insert(deployment.prefix.clone(), entry).is_some() {
            return Err(SynthesisError::InvalidConfig(format!(
                "deployment prefix {} listed twice",
                deployment.prefix
            )));
        }
    }
    graph.add(
        ResourceNode::new(ids::CONTENT, ResourceKind::DeploymentContent)
            .with_ref("bucket", ids::BUCKET, "id")
            .with_literal("object_acl", config.sync.object_acl.as_str())
            .with_literal("deployments", Value::Object(deployments)),
    )?;

    // The router's configuration is fixed when the function is built.
    let aliases: BTreeMap<&str, &str> = config
        .edge
        .aliases
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let function = ResourceNode::new(ids::EDGE_FUNCTION, ResourceKind::EdgeFunction)
        .with_literal("name", config.function_name())
        .with_literal("region", EDGE_REGION)
        .with_literal("runtime", "provided.al2023")
        .with_literal("aliases", json!(aliases));
    graph.add(with_origin_domain(function, config))?;
    graph.add(
        ResourceNode::new(ids::EDGE_FUNCTION_VERSION, ResourceKind::EdgeFunctionVersion)
            .with_ref("function_arn", ids::EDGE_FUNCTION, "arn")
            .with_literal("publish", true),
    )?;

    let mut distribution = ResourceNode::new(ids::DISTRIBUTION, ResourceKind::Distribution)
        .with_literal("enabled", true)
        .with_literal("default_root_object", bucket.index_document.as_str())
        .with_literal("event_type", "origin-request")
        .with_ref("lambda_arn", ids::EDGE_FUNCTION_VERSION, "qualified_arn")
        .with_depends_on(ids::CONTENT);
    distribution = with_origin_domain(distribution, config);

    if let Some(domain) = &config.domain {
        let wildcard = format!("*.{}", domain.base);

        graph.add(
            ResourceNode::new(ids::CERTIFICATE, ResourceKind::Certificate)
                .with_literal("domain_name", wildcard.as_str())
                .with_literal("validation_method", "DNS")
                .with_literal("region", EDGE_REGION),
        )?;
        graph.add(
            ResourceNode::new(ids::VALIDATION_RECORD, ResourceKind::DnsValidationRecord)
                .with_literal("zone", domain.hosted_zone.as_str())
                .with_ref("name", ids::CERTIFICATE, "validation_record_name")
                .with_ref("value", ids::CERTIFICATE, "validation_record_value")
                .with_literal("type", "CNAME")
                .with_literal("ttl", 60),
        )?;
        graph.add(
            ResourceNode::new(ids::CERTIFICATE_VALIDATION, ResourceKind::CertificateValidation)
                .with_ref("certificate_arn", ids::CERTIFICATE, "arn")
                .with_ref("record_fqdn", ids::VALIDATION_RECORD, "fqdn"),
        )?;

        distribution = distribution
            .with_literal("aliases", json!([wildcard]))
            .with_ref(
                "viewer_certificate_arn",
                ids::CERTIFICATE_VALIDATION,
                "certificate_arn",
            );

        graph.add(
            ResourceNode::new(ids::DNS_ALIAS, ResourceKind::DnsAlias)
                .with_literal("zone", domain.hosted_zone.as_str())
                .with_literal("name", wildcard.as_str())
                .with_literal("type", "A")
                .with_ref("target", ids::DISTRIBUTION, "domain_name")
                .with_ref("target_zone_id", ids::DISTRIBUTION, "hosted_zone_id"),
        )?;
    } else {
        distribution = distribution.with_literal("default_certificate", true);
    }
    graph.add(distribution)?;

    graph.validate()?;
    debug!(
        stack = %config.stack.name,
        nodes = graph.len(),
        custom_domain = config.domain.is_some(),
        "synthesized resource graph"
    );
    Ok(graph)
}

/// Point a node at the origin: an explicit override, or the bucket's
/// website endpoint once it exists.
fn with_origin_domain(node: ResourceNode, config: &PreviewConfig) -> ResourceNode {
    match &config.edge.origin_domain {
        Some(domain) => node
            .with_literal("origin_domain", Value::from(domain.as_str()))
            .with_depends_on(ids::WEBSITE),
        None => node.with_ref("origin_domain", ids::WEBSITE, "website_endpoint"),
    }
}
