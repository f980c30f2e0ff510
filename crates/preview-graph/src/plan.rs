//! Diff a declared graph against recorded state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::GraphResult;
use crate::graph::ResourceGraph;
use crate::resource::{Attribute, Outputs, ResourceId, ResourceKind};

/// What the control plane last accepted for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub kind: ResourceKind,
    /// Declared attributes as of the last apply, references unresolved.
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default)]
    pub outputs: Outputs,
}

/// Recorded state of every applied node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub resources: BTreeMap<ResourceId, StateEntry>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&StateEntry> {
        self.resources.get(id)
    }

    pub fn record(&mut self, id: ResourceId, entry: StateEntry) {
        self.resources.insert(id, entry);
    }

    pub fn output(&self, id: &ResourceId, name: &str) -> Option<&serde_json::Value> {
        self.resources.get(id).and_then(|entry| entry.outputs.get(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create,
    /// Names of declared attributes whose value changed.
    Update { changed: Vec<String> },
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChange {
    pub id: ResourceId,
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub action: Action,
}

/// Changes in apply order, plus recorded nodes the graph no longer declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub changes: Vec<PlannedChange>,
    /// Never deleted automatically.
    pub orphaned: Vec<ResourceId>,
}

impl Plan {
    /// True when applying would touch nothing.
    pub fn is_noop(&self) -> bool {
        self.changes.iter().all(|c| c.action == Action::NoOp)
    }

    pub fn action_for(&self, id: &ResourceId) -> Option<&Action> {
        self.changes.iter().find(|c| &c.id == id).map(|c| &c.action)
    }

    /// (create, update, no-op) counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.changes
            .iter()
            .fold((0, 0, 0), |(c, u, n), change| match change.action {
                Action::Create => (c + 1, u, n),
                Action::Update { .. } => (c, u + 1, n),
                Action::NoOp => (c, u, n + 1),
            })
    }
}

/// Diff `graph` against `state`, in apply order.
///
/// A node is updated when its own declared attributes changed, or when it
/// reads an output of a node that is being created or updated. The second
/// rule carries a new certificate through its DNS record and validation, and
/// a changed function through a freshly published version.
pub fn plan(graph: &ResourceGraph, state: &State) -> GraphResult<Plan> {
    graph.validate()?;
    let order = graph.apply_order()?;

    let mut dirty: BTreeSet<ResourceId> = BTreeSet::new();
    let mut changes = Vec::with_capacity(graph.len());
    for id in order.into_iter().flatten() {
        let Some(node) = graph.get(&id) else {
            continue;
        };
        let action = match state.get(&id) {
            None => Action::Create,
            Some(entry) => {
                let mut changed = changed_attributes(&entry.attributes, &node.attributes);
                changed.extend(stale_references(&node.attributes, &dirty));
                changed.sort();
                changed.dedup();
                if entry.kind != node.kind {
                    changed.insert(0, "kind".to_string());
                }
                if changed.is_empty() {
                    Action::NoOp
                } else {
                    Action::Update { changed }
                }
            }
        };
        if action != Action::NoOp {
            dirty.insert(id.clone());
        }
        changes.push(PlannedChange {
            id,
            kind: node.kind,
            action,
        });
    }

    let orphaned = state
        .resources
        .keys()
        .filter(|id| !graph.contains(id))
        .cloned()
        .collect();

    Ok(Plan { changes, orphaned })
}

fn changed_attributes(
    recorded: &BTreeMap<String, Attribute>,
    declared: &BTreeMap<String, Attribute>,
) -> Vec<String> {
    let mut names: Vec<&String> = recorded.keys().chain(declared.keys()).collect();
    names.sort();
    names.dedup();
    names
        .into_iter()
        .filter(|name| recorded.get(*name) != declared.get(*name))
        .cloned()
        .collect()
}

/// Attributes that read an output of a node about to change.
fn stale_references(
    declared: &BTreeMap<String, Attribute>,
    dirty: &BTreeSet<ResourceId>,
) -> Vec<String> {
    declared
        .iter()
        .filter(|(_, attr)| matches!(attr, Attribute::Ref { node, .. } if dirty.contains(node)))
        .map(|(name, _)| name.clone())
        .collect()
}
