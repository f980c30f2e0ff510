//! Edge routing errors.

use thiserror::Error;

/// The Host header cannot yield a routing key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedHostError {
    #[error("request has no Host header")]
    MissingHost,

    #[error("Host header is empty")]
    EmptyHost,

    #[error("Host {0:?} has no '.'-delimited leading label")]
    NoLabelBoundary(String),

    #[error("Host {0:?} starts with an empty label")]
    EmptyLabel(String),
}
