//! Preview resource graph.
//!
//! Declares the shared infrastructure (bucket, certificate, edge function,
//! distribution, DNS) as an explicit dependency graph, orders it with a
//! topological sort, diffs it against recorded state and applies the
//! difference through a [`ControlPlane`].
//!
//! # Components
//!
//! - **`resource`** — node, attribute and reference types
//! - **`graph`** — validation and wave ordering
//! - **`synth`** — the standard preview stack built from configuration
//! - **`plan`** — diff against recorded state
//! - **`apply`** — ordered execution with certificate-validation polling

pub mod apply;
pub mod error;
pub mod graph;
pub mod plan;
pub mod resource;
pub mod synth;

pub use apply::{
    ApplyOptions, ApplyReport, Applier, ControlPlane, MemoryControlPlane, ValidationStatus,
};
pub use error::{ApplyError, ControlPlaneError, GraphResult, SynthesisError};
pub use graph::ResourceGraph;
pub use plan::{Action, Plan, PlannedChange, State, StateEntry, plan};
pub use resource::{Attribute, Outputs, ResolvedNode, ResourceId, ResourceKind, ResourceNode};
pub use synth::{DeploymentContent, ids, synthesize, synthesize_with_content};
