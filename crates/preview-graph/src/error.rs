//! Error types for synthesis and apply.

use std::time::Duration;

use thiserror::Error;

use crate::resource::ResourceId;

/// Result type alias for graph construction and validation.
pub type GraphResult<T> = Result<T, SynthesisError>;

/// The declared graph is not a valid infrastructure description.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("duplicate resource id: {0}")]
    DuplicateNode(ResourceId),

    #[error("{from} references unknown resource {to}")]
    DanglingReference { from: ResourceId, to: ResourceId },

    #[error("dependency cycle between: {}", display_ids(.0))]
    Cycle(Vec<ResourceId>),

    #[error("distribution {distribution} reads certificate {certificate} before it is validated")]
    UnvalidatedCertificate {
        distribution: ResourceId,
        certificate: ResourceId,
    },

    #[error("distribution {distribution} reads edge function {function} instead of a published version")]
    UnpublishedEdgeFunction {
        distribution: ResourceId,
        function: ResourceId,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn display_ids(ids: &[ResourceId]) -> String {
    ids.iter()
        .map(ResourceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure reported by a control plane.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlPlaneError {
    #[error("control plane rejected {id}: {reason}")]
    Rejected { id: ResourceId, reason: String },

    #[error("control plane unavailable: {0}")]
    Unavailable(String),
}

/// Errors from [`Applier::apply`](crate::Applier::apply).
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("certificate validation {id} not issued after {waited:?}")]
    ValidationTimeout { id: ResourceId, waited: Duration },

    #[error("certificate validation {id} failed: {reason}")]
    ValidationFailed { id: ResourceId, reason: String },

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error("{id} needs output {output:?} of {node}, which has not been applied")]
    UnresolvedOutput {
        id: ResourceId,
        node: ResourceId,
        output: String,
    },
}
