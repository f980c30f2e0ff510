//! Resource nodes, attributes and cross-node references.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier of a node within one graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The kinds of infrastructure a preview stack is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Bucket,
    BucketAcl,
    WebsiteConfiguration,
    /// The synced objects of every deployment, as one unit.
    DeploymentContent,
    Certificate,
    DnsValidationRecord,
    CertificateValidation,
    EdgeFunction,
    EdgeFunctionVersion,
    Distribution,
    DnsAlias,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::BucketAcl => "bucket-acl",
            Self::WebsiteConfiguration => "website-configuration",
            Self::DeploymentContent => "deployment-content",
            Self::Certificate => "certificate",
            Self::DnsValidationRecord => "dns-validation-record",
            Self::CertificateValidation => "certificate-validation",
            Self::EdgeFunction => "edge-function",
            Self::EdgeFunctionVersion => "edge-function-version",
            Self::Distribution => "distribution",
            Self::DnsAlias => "dns-alias",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared attribute: either a literal or an output of another node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Literal(Value),
    Ref { node: ResourceId, output: String },
}

impl Attribute {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(node: impl Into<ResourceId>, output: &str) -> Self {
        Self::Ref {
            node: node.into(),
            output: output.to_string(),
        }
    }
}

/// Named values a node exposes once applied (ARN, endpoint, ...).
pub type Outputs = BTreeMap<String, Value>;

/// A node as declared in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: ResourceId,
    pub kind: ResourceKind,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    /// Ordering-only edges, for dependencies that read no attribute.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<ResourceId>,
}

impl ResourceNode {
    pub fn new(id: impl Into<ResourceId>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: BTreeMap::new(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn with_literal(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes
            .insert(name.to_string(), Attribute::literal(value));
        self
    }

    pub fn with_ref(mut self, name: &str, node: impl Into<ResourceId>, output: &str) -> Self {
        self.attributes
            .insert(name.to_string(), Attribute::reference(node, output));
        self
    }

    pub fn with_depends_on(mut self, node: impl Into<ResourceId>) -> Self {
        self.depends_on.insert(node.into());
        self
    }

    /// Nodes whose outputs this node reads.
    pub fn references(&self) -> impl Iterator<Item = &ResourceId> {
        self.attributes.values().filter_map(|attr| match attr {
            Attribute::Ref { node, .. } => Some(node),
            Attribute::Literal(_) => None,
        })
    }

    /// Every node that must be applied before this one.
    pub fn dependencies(&self) -> BTreeSet<&ResourceId> {
        self.references().chain(self.depends_on.iter()).collect()
    }
}

/// A node with every reference replaced by the referenced output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNode {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub attributes: BTreeMap<String, Value>,
}

impl ResolvedNode {
    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_merge_refs_and_explicit_edges() {
        let node = ResourceNode::new("distribution", ResourceKind::Distribution)
            .with_ref("origin", "website", "website_endpoint")
            .with_ref("certificate_arn", "certificate-validation", "certificate_arn")
            .with_literal("enabled", true)
            .with_depends_on("website");

        let deps: Vec<&str> = node.dependencies().into_iter().map(ResourceId::as_str).collect();
        assert_eq!(deps, vec!["certificate-validation", "website"]);
    }

    #[test]
    fn attribute_serde_shape() {
        let json = serde_json::to_value(Attribute::reference("bucket", "id")).unwrap();
        assert_eq!(json, serde_json::json!({"ref": {"node": "bucket", "output": "id"}}));
        let json = serde_json::to_value(Attribute::literal("private")).unwrap();
        assert_eq!(json, serde_json::json!({"literal": "private"}));
    }

    #[test]
    fn kind_names_are_kebab_case() {
        let json = serde_json::to_value(ResourceKind::CertificateValidation).unwrap();
        assert_eq!(json, "certificate-validation");
        assert_eq!(ResourceKind::CertificateValidation.to_string(), "certificate-validation");
    }
}
