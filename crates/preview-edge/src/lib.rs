//! Preview edge router.
//!
//! Runs on every CDN origin request. The leftmost label of the viewer's
//! Host header names the preview deployment; the router points the origin
//! path at that deployment's prefix and pins the Host header to the origin
//! store's fixed domain. No lookups, no shared state.
//!
//! # Components
//!
//! - **`routing`** — routing-key extraction and the origin-path resolver
//! - **`request`** — the origin-request event model
//! - **`router`** — the request-time entry point

pub mod error;
pub mod request;
pub mod router;
pub mod routing;

pub use error::MalformedHostError;
pub use request::{
    CustomOrigin, GeneratedResponse, HeaderEntry, Headers, Origin, OriginRequest,
    OriginRequestEvent,
};
pub use router::{EdgeOutcome, EdgeRouter};
pub use routing::{OriginPath, RoutingTable, resolve_origin, routing_key_of};
