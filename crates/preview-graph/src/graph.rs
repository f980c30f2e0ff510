//! The resource graph: insertion, validation and wave ordering.
//!
//! Ordering is Kahn's algorithm run in layers. Every node in a wave has all
//! of its dependencies in earlier waves, so a wave can be applied in any
//! order. Waves are sorted by id to keep output stable between runs.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{GraphResult, SynthesisError};
use crate::resource::{ResourceId, ResourceKind, ResourceNode};

#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: BTreeMap<ResourceId, ResourceNode>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Ids are unique within a graph.
    pub fn add(&mut self, node: ResourceNode) -> GraphResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(SynthesisError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check references, wiring invariants and acyclicity.
    pub fn validate(&self) -> GraphResult<()> {
        self.check_references()?;
        self.check_distribution_inputs()?;
        self.apply_order().map(|_| ())
    }

    /// Layers of a topological sort, each sorted by id.
    pub fn apply_order(&self) -> GraphResult<Vec<Vec<ResourceId>>> {
        self.check_references()?;

        let mut pending: BTreeMap<&ResourceId, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&ResourceId, Vec<&ResourceId>> = BTreeMap::new();
        for node in self.nodes.values() {
            let deps = node.dependencies();
            pending.insert(&node.id, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(&node.id);
            }
        }

        let mut waves = Vec::new();
        let mut ready: Vec<&ResourceId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();

        while !ready.is_empty() {
            ready.sort();
            for id in &ready {
                pending.remove(*id);
            }
            let mut next = Vec::new();
            for id in &ready {
                for dependent in dependents.get(*id).into_iter().flatten() {
                    if let Some(count) = pending.get_mut(*dependent) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(*dependent);
                        }
                    }
                }
            }
            waves.push(ready.into_iter().cloned().collect::<Vec<_>>());
            ready = next;
        }

        if !pending.is_empty() {
            let stuck: BTreeSet<&ResourceId> = pending.into_keys().collect();
            return Err(SynthesisError::Cycle(self.cycle_members(&stuck)));
        }

        debug!(nodes = self.nodes.len(), waves = waves.len(), "ordered resource graph");
        Ok(waves)
    }

    /// Nodes of `stuck` that can reach themselves. Nodes that are merely
    /// downstream of a cycle never can.
    fn cycle_members(&self, stuck: &BTreeSet<&ResourceId>) -> Vec<ResourceId> {
        stuck
            .iter()
            .filter(|start| {
                let mut seen: BTreeSet<&ResourceId> = BTreeSet::new();
                let mut stack = self.stuck_dependencies(start, stuck);
                while let Some(id) = stack.pop() {
                    if id == **start {
                        return true;
                    }
                    if seen.insert(id) {
                        stack.extend(self.stuck_dependencies(id, stuck));
                    }
                }
                false
            })
            .map(|id| (*id).clone())
            .collect()
    }

    fn stuck_dependencies<'a>(
        &'a self,
        id: &ResourceId,
        stuck: &BTreeSet<&ResourceId>,
    ) -> Vec<&'a ResourceId> {
        self.nodes
            .get(id)
            .map(|node| {
                node.dependencies()
                    .into_iter()
                    .filter(|dep| stuck.contains(dep))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_references(&self) -> GraphResult<()> {
        for node in self.nodes.values() {
            for dep in node.dependencies() {
                if !self.nodes.contains_key(dep) {
                    return Err(SynthesisError::DanglingReference {
                        from: node.id.clone(),
                        to: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// A distribution may only read a validated certificate and a published
    /// function version.
    fn check_distribution_inputs(&self) -> GraphResult<()> {
        for node in self.nodes.values() {
            if node.kind != ResourceKind::Distribution {
                continue;
            }
            let read: BTreeSet<&ResourceId> = node.references().collect();
            for id in read {
                let Some(target) = self.nodes.get(id) else {
                    continue;
                };
                match target.kind {
                    ResourceKind::Certificate => {
                        return Err(SynthesisError::UnvalidatedCertificate {
                            distribution: node.id.clone(),
                            certificate: id.clone(),
                        });
                    }
                    ResourceKind::EdgeFunction => {
                        return Err(SynthesisError::UnpublishedEdgeFunction {
                            distribution: node.id.clone(),
                            function: id.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s)
    }

    fn node(name: &str, kind: ResourceKind) -> ResourceNode {
        ResourceNode::new(name, kind)
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add(node("bucket", ResourceKind::Bucket)).unwrap();
        let err = graph.add(node("bucket", ResourceKind::Bucket)).unwrap_err();
        assert_eq!(err, SynthesisError::DuplicateNode(id("bucket")));
    }

    #[test]
    fn waves_follow_dependencies() {
        let mut graph = ResourceGraph::new();
        graph.add(node("bucket", ResourceKind::Bucket)).unwrap();
        graph
            .add(node("acl", ResourceKind::BucketAcl).with_ref("bucket", "bucket", "id"))
            .unwrap();
        graph
            .add(node("website", ResourceKind::WebsiteConfiguration).with_ref("bucket", "bucket", "id"))
            .unwrap();
        graph.add(node("function", ResourceKind::EdgeFunction)).unwrap();
        graph
            .add(
                node("version", ResourceKind::EdgeFunctionVersion)
                    .with_ref("function_arn", "function", "arn"),
            )
            .unwrap();
        graph
            .add(
                node("distribution", ResourceKind::Distribution)
                    .with_ref("origin", "website", "website_endpoint")
                    .with_ref("lambda_arn", "version", "qualified_arn"),
            )
            .unwrap();

        let waves = graph.apply_order().unwrap();
        assert_eq!(
            waves,
            vec![
                vec![id("bucket"), id("function")],
                vec![id("acl"), id("version"), id("website")],
                vec![id("distribution")],
            ]
        );
        graph.validate().unwrap();
    }

    #[test]
    fn explicit_depends_on_orders_nodes() {
        let mut graph = ResourceGraph::new();
        graph.add(node("a", ResourceKind::Bucket).with_depends_on("b")).unwrap();
        graph.add(node("b", ResourceKind::Bucket)).unwrap();
        assert_eq!(graph.apply_order().unwrap(), vec![vec![id("b")], vec![id("a")]]);
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let mut graph = ResourceGraph::new();
        graph.add(node("root", ResourceKind::Bucket)).unwrap();
        graph
            .add(node("a", ResourceKind::Bucket).with_ref("x", "b", "id").with_depends_on("root"))
            .unwrap();
        graph.add(node("b", ResourceKind::Bucket).with_ref("x", "a", "id")).unwrap();

        let err = graph.validate().unwrap_err();
        assert_eq!(err, SynthesisError::Cycle(vec![id("a"), id("b")]));
    }

    #[test]
    fn nodes_downstream_of_a_cycle_are_not_members() {
        let mut graph = ResourceGraph::new();
        graph
            .add(node("a", ResourceKind::Bucket).with_ref("x", "b", "id"))
            .unwrap();
        graph
            .add(node("b", ResourceKind::Bucket).with_ref("x", "a", "id"))
            .unwrap();
        graph
            .add(node("downstream", ResourceKind::BucketAcl).with_ref("bucket", "a", "id"))
            .unwrap();
        graph
            .add(node("further", ResourceKind::DnsAlias).with_depends_on("downstream"))
            .unwrap();

        assert_eq!(
            graph.apply_order().unwrap_err(),
            SynthesisError::Cycle(vec![id("a"), id("b")])
        );
    }

    #[test]
    fn node_between_two_cycles_is_not_a_member() {
        let mut graph = ResourceGraph::new();
        graph.add(node("a", ResourceKind::Bucket).with_depends_on("b")).unwrap();
        graph.add(node("b", ResourceKind::Bucket).with_depends_on("a")).unwrap();
        graph.add(node("bridge", ResourceKind::Bucket).with_depends_on("a")).unwrap();
        graph
            .add(node("c", ResourceKind::Bucket).with_depends_on("bridge").with_depends_on("d"))
            .unwrap();
        graph.add(node("d", ResourceKind::Bucket).with_depends_on("c")).unwrap();

        assert_eq!(
            graph.apply_order().unwrap_err(),
            SynthesisError::Cycle(vec![id("a"), id("b"), id("c"), id("d")])
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut graph = ResourceGraph::new();
        graph.add(node("a", ResourceKind::Bucket).with_depends_on("a")).unwrap();
        assert_eq!(graph.apply_order().unwrap_err(), SynthesisError::Cycle(vec![id("a")]));
    }

    #[test]
    fn dangling_reference_rejected() {
        let mut graph = ResourceGraph::new();
        graph
            .add(node("acl", ResourceKind::BucketAcl).with_ref("bucket", "bucket", "id"))
            .unwrap();
        assert_eq!(
            graph.validate().unwrap_err(),
            SynthesisError::DanglingReference {
                from: id("acl"),
                to: id("bucket"),
            }
        );
    }

    #[test]
    fn distribution_must_not_read_raw_certificate() {
        let mut graph = ResourceGraph::new();
        graph.add(node("cert", ResourceKind::Certificate)).unwrap();
        graph
            .add(node("distribution", ResourceKind::Distribution).with_ref("certificate_arn", "cert", "arn"))
            .unwrap();
        assert_eq!(
            graph.validate().unwrap_err(),
            SynthesisError::UnvalidatedCertificate {
                distribution: id("distribution"),
                certificate: id("cert"),
            }
        );
    }

    #[test]
    fn distribution_must_not_read_unpublished_function() {
        let mut graph = ResourceGraph::new();
        graph.add(node("function", ResourceKind::EdgeFunction)).unwrap();
        graph
            .add(node("distribution", ResourceKind::Distribution).with_ref("lambda_arn", "function", "arn"))
            .unwrap();
        assert!(matches!(
            graph.validate().unwrap_err(),
            SynthesisError::UnpublishedEdgeFunction { .. }
        ));
    }

    #[test]
    fn empty_graph_has_no_waves() {
        assert!(ResourceGraph::new().apply_order().unwrap().is_empty());
    }
}
