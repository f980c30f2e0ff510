//! Shared types used across preview crates.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::Fingerprint;

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid DNS label regex")
});

/// Token taken from the leftmost label of a request's Host header.
///
/// Never empty and never contains a `.`. Case is kept exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutingKey(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingKeyError {
    #[error("routing key must not be empty")]
    Empty,
    #[error("routing key must not contain '.': {0}")]
    ContainsDot(String),
}

impl RoutingKey {
    pub fn new(key: impl Into<String>) -> Result<Self, RoutingKeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(RoutingKeyError::Empty);
        }
        if key.contains('.') {
            return Err(RoutingKeyError::ContainsDot(key));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoutingKey {
    type Error = RoutingKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoutingKey> for String {
    fn from(key: RoutingKey) -> Self {
        key.0
    }
}

/// How strictly a deployment prefix is checked before a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrefixPolicy {
    /// Prefix must be a single valid DNS label, so the deployment is
    /// reachable as `<prefix>.<base-domain>`.
    #[default]
    DnsLabel,
    /// Exactly two segments, `<group>/<name>` (e.g. `team/feature-x`).
    /// A fixed depth keeps one deployment's keys out of another's: no
    /// accepted prefix is a leading path of another. A stack uses a single
    /// policy for all of its deployments.
    Path,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrefixError {
    #[error("deployment prefix must not be empty")]
    Empty,
    #[error("deployment prefix must not start or end with '/': {0}")]
    EdgeSlash(String),
    #[error("deployment prefix has an empty or relative segment: {0}")]
    BadSegment(String),
    #[error("deployment prefix is not a valid DNS label: {0}")]
    NotDnsLabel(String),
    #[error("deployment prefix must have exactly two segments, <group>/<name>: {0}")]
    WrongDepth(String),
}

/// Storage namespace that holds one deployment's assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentPrefix(String);

impl DeploymentPrefix {
    pub fn parse(prefix: &str, policy: PrefixPolicy) -> Result<Self, PrefixError> {
        if prefix.is_empty() {
            return Err(PrefixError::Empty);
        }
        if prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(PrefixError::EdgeSlash(prefix.to_string()));
        }
        if prefix
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(PrefixError::BadSegment(prefix.to_string()));
        }
        match policy {
            PrefixPolicy::DnsLabel if !is_dns_label(prefix) => {
                return Err(PrefixError::NotDnsLabel(prefix.to_string()));
            }
            PrefixPolicy::Path if prefix.split('/').count() != 2 => {
                return Err(PrefixError::WrongDepth(prefix.to_string()));
            }
            _ => {}
        }
        Ok(Self(prefix.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Remote key for a path relative to the deployment root.
    pub fn key_for(&self, relative: &str) -> String {
        format!("{}/{}", self.0, relative)
    }
}

impl fmt::Display for DeploymentPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `s` is a single RFC 1123 DNS label.
pub fn is_dns_label(s: &str) -> bool {
    DNS_LABEL.is_match(s)
}

/// Whether every file is rewritten or only changed ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Skip the write when the stored fingerprint matches.
    #[default]
    Incremental,
    /// Overwrite every object on every run.
    Always,
}

/// One local file mapped to its remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Path relative to the build root, `/`-separated.
    pub relative_path: String,
    pub key: String,
    pub fingerprint: Fingerprint,
    pub content_type: String,
    pub size_bytes: u64,
}
