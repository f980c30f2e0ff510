use std::path::Path;

use preview_core::PreviewConfig;
use preview_edge::{EdgeOutcome, EdgeRouter, OriginRequest, OriginRequestEvent};

pub fn route(
    host: &str,
    uri: &str,
    config_path: Option<&Path>,
    origin_domain: &str,
) -> anyhow::Result<()> {
    let router = match config_path {
        Some(path) => EdgeRouter::from_config(&PreviewConfig::from_file(path)?),
        None => EdgeRouter::new(origin_domain),
    };
    let outcome = simulate(&router, host, uri);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Run one synthetic viewer request through the router.
pub fn simulate(router: &EdgeRouter, host: &str, uri: &str) -> EdgeOutcome {
    router.handle(OriginRequestEvent::single(OriginRequest::get(host, uri)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_feature_branch() {
        let router = EdgeRouter::new("origin-bucket.example.com");
        let EdgeOutcome::Request(request) =
            simulate(&router, "feature-login.preview.example.com", "/")
        else {
            panic!("expected a forwarded request");
        };
        assert_eq!(request.origin.custom.as_ref().unwrap().path, "/feature-login");
        assert_eq!(request.host(), Some("origin-bucket.example.com"));
    }

    #[test]
    fn bare_host_gets_generated_response() {
        let router = EdgeRouter::new("origin-bucket.example.com");
        assert!(simulate(&router, "localhost", "/").is_response());
    }
}
