//! Origin-request event model.
//!
//! Mirrors the JSON the CDN hands to an origin-request function:
//! `{"Records":[{"cf":{"config":{...},"request":{...}}}]}`. Headers are keyed
//! by lowercase name, each holding a list of `{key, value}` entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One header value with its original-case name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: String,
}

/// Lowercase header name → values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Vec<HeaderEntry>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(|entry| entry.value.as_str())
    }

    /// Replace all values of `name` with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(
            name.to_ascii_lowercase(),
            vec![HeaderEntry {
                key: Some(name.to_string()),
                value: value.into(),
            }],
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A custom (HTTP) origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOrigin {
    pub domain_name: String,
    /// Prefix the CDN prepends to the request URI when fetching.
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u32,
    #[serde(default = "default_keepalive_timeout")]
    pub keepalive_timeout: u32,
    #[serde(default)]
    pub ssl_protocols: Vec<String>,
    #[serde(default)]
    pub custom_headers: Headers,
}

fn default_port() -> u16 {
    80
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_read_timeout() -> u32 {
    30
}

fn default_keepalive_timeout() -> u32 {
    5
}

impl CustomOrigin {
    /// A plain-HTTP origin, as used for bucket website endpoints.
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            path: String::new(),
            port: default_port(),
            protocol: default_protocol(),
            read_timeout: default_read_timeout(),
            keepalive_timeout: default_keepalive_timeout(),
            ssl_protocols: vec!["TLSv1.2".to_string()],
            custom_headers: Headers::default(),
        }
    }
}

/// Object-store origin accessed through the store's REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Origin {
    pub domain_name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub auth_method: String,
    #[serde(default)]
    pub custom_headers: Headers,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Origin>,
}

/// The request the CDN is about to send to its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub querystring: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub origin: Origin,
}

fn default_method() -> String {
    "GET".to_string()
}

impl OriginRequest {
    /// A GET for `uri` with a Host header and no origin yet.
    pub fn get(host: &str, uri: &str) -> Self {
        let mut headers = Headers::new();
        headers.set("Host", host);
        Self {
            client_ip: None,
            method: default_method(),
            uri: uri.to_string(),
            querystring: String::new(),
            headers,
            origin: Origin::default(),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.first("host")
    }
}

/// Distribution metadata attached to each record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfConfig {
    #[serde(default)]
    pub distribution_domain_name: String,
    #[serde(default)]
    pub distribution_id: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfRecord {
    #[serde(default)]
    pub config: CfConfig,
    pub request: OriginRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub cf: CfRecord,
}

/// The event delivered to the origin-request function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginRequestEvent {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

impl OriginRequestEvent {
    pub fn single(request: OriginRequest) -> Self {
        Self {
            records: vec![EventRecord {
                cf: CfRecord {
                    config: CfConfig {
                        event_type: "origin-request".to_string(),
                        ..CfConfig::default()
                    },
                    request,
                },
            }],
        }
    }
}

/// A response generated at the edge instead of forwarding to the origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResponse {
    pub status: String,
    pub status_description: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

impl GeneratedResponse {
    pub fn plain_text(status: u16, description: &str, body: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        headers.set("Cache-Control", "no-store");
        Self {
            status: status.to_string(),
            status_description: description.to_string(),
            headers,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
      "Records": [{
        "cf": {
          "config": {
            "distributionDomainName": "d111111abcdef8.cloudfront.net",
            "distributionId": "EDFDVBD6EXAMPLE",
            "eventType": "origin-request",
            "requestId": "4TyzHTaYWb1GX1qTfsHhEqV6HUDd_BzoBZnwfnvQc_1oF26ClkoUSEQ=="
          },
          "request": {
            "clientIp": "203.0.113.178",
            "headers": {
              "host": [{"key": "Host", "value": "feature-login.preview.example.com"}],
              "user-agent": [{"key": "User-Agent", "value": "curl/8.0"}]
            },
            "method": "GET",
            "origin": {
              "custom": {
                "customHeaders": {},
                "domainName": "origin-bucket.example.com",
                "keepaliveTimeout": 5,
                "path": "",
                "port": 80,
                "protocol": "http",
                "readTimeout": 30,
                "sslProtocols": ["TLSv1.2"]
              }
            },
            "querystring": "",
            "uri": "/static/app.js"
          }
        }
      }]
    }"#;

    #[test]
    fn parses_cdn_event() {
        let event: OriginRequestEvent = serde_json::from_str(EVENT).unwrap();
        let request = &event.records[0].cf.request;
        assert_eq!(request.host(), Some("feature-login.preview.example.com"));
        assert_eq!(request.uri, "/static/app.js");
        assert_eq!(
            request.origin.custom.as_ref().unwrap().domain_name,
            "origin-bucket.example.com"
        );
        assert_eq!(event.records[0].cf.config.event_type, "origin-request");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        assert!(headers.is_empty());
        headers.set("X-Forwarded-Host", "a.example.com");
        assert_eq!(headers.first("x-forwarded-host"), Some("a.example.com"));
        assert!(headers.contains("X-FORWARDED-HOST"));
    }

    #[test]
    fn set_replaces_all_values() {
        let mut headers: Headers = serde_json::from_str(
            r#"{"host":[{"key":"Host","value":"a.example.com"},{"value":"b.example.com"}]}"#,
        )
        .unwrap();
        headers.set("Host", "origin.example.com");
        assert_eq!(headers.first("host"), Some("origin.example.com"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn generated_response_serializes_camel_case() {
        let response = GeneratedResponse::plain_text(400, "Bad Request", "nope");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "400");
        assert_eq!(json["statusDescription"], "Bad Request");
        assert_eq!(json["headers"]["content-type"][0]["value"], "text/plain");
    }
}
