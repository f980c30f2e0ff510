//! Routing-key extraction and origin-path resolution.
//!
//! Hostnames follow `<routing-key>.<rest-of-domain>`. The key is everything
//! before the first `.`, kept byte-for-byte. It resolves to the origin path
//! `/<key>`, or `/<alias>` when the key has a static alias. The resolver
//! never checks whether a deployment exists; an unknown key produces a path
//! that simply matches no stored object.

use std::collections::HashMap;
use std::fmt;

use preview_core::RoutingKey;

use crate::error::MalformedHostError;

/// Path on the origin under which a deployment's assets live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginPath(String);

impl OriginPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OriginPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for OriginPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Extract the routing key from a Host header value.
pub fn routing_key_of(host: &str) -> Result<RoutingKey, MalformedHostError> {
    if host.is_empty() {
        return Err(MalformedHostError::EmptyHost);
    }
    let Some((label, _rest)) = host.split_once('.') else {
        return Err(MalformedHostError::NoLabelBoundary(host.to_string()));
    };
    RoutingKey::new(label).map_err(|_| MalformedHostError::EmptyLabel(host.to_string()))
}

/// `/` followed by the routing key. Pure and total.
pub fn resolve_origin(key: &RoutingKey) -> OriginPath {
    OriginPath(format!("/{}", key.as_str()))
}

/// Resolver with a static alias table, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    aliases: HashMap<String, String>,
}

impl RoutingTable {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    pub fn resolve(&self, key: &RoutingKey) -> OriginPath {
        match self.aliases.get(key.as_str()) {
            Some(alias) => OriginPath(format!("/{alias}")),
            None => resolve_origin(key),
        }
    }
}
