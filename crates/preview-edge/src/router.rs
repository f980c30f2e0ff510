//! Request-time entry point for the edge function.
//!
//! The router holds only values fixed at deploy time: the origin domain and
//! the alias table. Each invocation is a pure rewrite of the incoming
//! request; nothing is shared between invocations.

use std::collections::HashMap;

use preview_core::PreviewConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MalformedHostError;
use crate::request::{CustomOrigin, GeneratedResponse, OriginRequest, OriginRequestEvent};
use crate::routing::{RoutingTable, routing_key_of};

/// What the edge function hands back to the CDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeOutcome {
    /// Forward the (rewritten) request to the origin.
    Request(OriginRequest),
    /// Answer the viewer directly.
    Response(GeneratedResponse),
}

impl EdgeOutcome {
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }
}

/// Rewrites origin requests so that `<key>.<domain>` is served from `/<key>`.
#[derive(Debug, Clone)]
pub struct EdgeRouter {
    origin_domain: String,
    table: RoutingTable,
}

impl EdgeRouter {
    pub fn new(origin_domain: impl Into<String>) -> Self {
        Self {
            origin_domain: origin_domain.into(),
            table: RoutingTable::default(),
        }
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.table = RoutingTable::new(aliases);
        self
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        Self::new(config.origin_domain()).with_aliases(config.edge.aliases.clone())
    }

    pub fn origin_domain(&self) -> &str {
        &self.origin_domain
    }

    /// Rewrite a single origin request.
    ///
    /// Sets the custom origin's path to the resolved prefix and its domain to
    /// the configured origin domain, then pins the Host header to that domain.
    /// The request URI is left untouched; the CDN prepends the origin path.
    pub fn route(&self, mut request: OriginRequest) -> Result<OriginRequest, MalformedHostError> {
        let host = request.host().ok_or(MalformedHostError::MissingHost)?;
        let key = routing_key_of(host)?;
        let path = self.table.resolve(&key);

        debug!(
            host = %host,
            key = %key.as_str(),
            origin_path = %path,
            uri = %request.uri,
            "routing origin request"
        );

        let origin = request
            .origin
            .custom
            .get_or_insert_with(|| CustomOrigin::new(self.origin_domain.clone()));
        origin.domain_name = self.origin_domain.clone();
        origin.path = path.into_string();
        // A request routed by prefix never goes to an S3-style origin.
        request.origin.s3 = None;
        request.headers.set("Host", self.origin_domain.clone());

        Ok(request)
    }

    /// Handle a full CDN event. Never fails: malformed input becomes a
    /// generated error response.
    pub fn handle(&self, event: OriginRequestEvent) -> EdgeOutcome {
        let Some(record) = event.records.into_iter().next() else {
            warn!("origin-request event carried no records");
            return EdgeOutcome::Response(GeneratedResponse::plain_text(
                502,
                "Bad Gateway",
                "origin-request event carried no records",
            ));
        };

        match self.route(record.cf.request) {
            Ok(request) => EdgeOutcome::Request(request),
            Err(e) => {
                warn!(error = %e, "rejecting request with malformed host");
                EdgeOutcome::Response(GeneratedResponse::plain_text(
                    400,
                    "Bad Request",
                    e.to_string(),
                ))
            }
        }
    }

    /// JSON in, JSON out, for runtimes that pass raw payloads.
    pub fn handle_json(&self, payload: &str) -> Result<String, serde_json::Error> {
        let event: OriginRequestEvent = serde_json::from_str(payload)?;
        serde_json::to_string(&self.handle(event))
    }
}
