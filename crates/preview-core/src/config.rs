//! preview.toml configuration parser.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::types::{DeploymentPrefix, PrefixPolicy, RoutingKey, SyncMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default)]
    pub stack: StackConfig,
    pub bucket: BucketConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
    /// Custom domain for previews. Without it the distribution serves on its
    /// default CDN hostname and no certificate is requested.
    pub domain: Option<DomainConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub name: String,
    pub region: String,
    /// Credential profile name, passed through to the control plane untouched.
    pub profile: Option<String>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: "preview".to_string(),
            region: "us-east-1".to_string(),
            profile: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    pub name: String,
    #[serde(default = "default_acl")]
    pub acl: String,
    #[serde(default = "default_index")]
    pub index_document: String,
    #[serde(default = "default_index")]
    pub error_document: String,
}

fn default_acl() -> String {
    "private".to_string()
}

fn default_index() -> String {
    "index.html".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Fixed Host presented to the origin store. Defaults to the bucket's
    /// website endpoint when unset.
    pub origin_domain: Option<String>,
    pub function_name: Option<String>,
    /// Routing key → deployment prefix overrides. Keys must be valid
    /// routing keys and values valid prefixes under `[sync] prefix_policy`.
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Base domain; previews are served at `<key>.<base>`.
    pub base: String,
    pub hosted_zone: String,
    #[serde(default = "default_validation_timeout")]
    pub validation_timeout_secs: u64,
    #[serde(default = "default_validation_poll")]
    pub validation_poll_secs: u64,
}

fn default_validation_timeout() -> u64 {
    600
}

fn default_validation_poll() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub mode: SyncMode,
    pub prefix_policy: PrefixPolicy,
    /// Maximum uploads in flight at once.
    pub concurrency: usize,
    /// Total attempts per object, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Canned ACL written with every uploaded object.
    pub object_acl: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::Incremental,
            prefix_policy: PrefixPolicy::DnsLabel,
            concurrency: 8,
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            object_acl: "public-read".to_string(),
        }
    }
}

impl PreviewConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: PreviewConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.stack.name.trim().is_empty() {
            bail!("[stack] name must not be empty");
        }
        if self.bucket.name.trim().is_empty() {
            bail!("[bucket] name must not be empty");
        }
        if self.sync.concurrency == 0 {
            bail!("[sync] concurrency must be at least 1");
        }
        if self.sync.max_attempts == 0 {
            bail!("[sync] max_attempts must be at least 1");
        }
        if self.sync.base_delay_ms > self.sync.max_delay_ms {
            bail!(
                "[sync] base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.sync.base_delay_ms,
                self.sync.max_delay_ms
            );
        }
        if self.sync.object_acl.trim().is_empty() {
            bail!("[sync] object_acl must not be empty");
        }
        for (key, prefix) in &self.edge.aliases {
            RoutingKey::new(key.as_str())
                .with_context(|| format!("[edge.aliases] invalid routing key {key:?}"))?;
            DeploymentPrefix::parse(prefix, self.sync.prefix_policy)
                .with_context(|| format!("[edge.aliases] invalid prefix for {key:?}"))?;
        }
        if let Some(domain) = &self.domain {
            if domain.base.trim().is_empty() || domain.hosted_zone.trim().is_empty() {
                bail!("[domain] base and hosted_zone must not be empty");
            }
            if domain.validation_poll_secs == 0 {
                bail!("[domain] validation_poll_secs must be at least 1");
            }
        }
        Ok(())
    }

    /// Host the edge router presents to the origin.
    pub fn origin_domain(&self) -> String {
        self.edge
            .origin_domain
            .clone()
            .unwrap_or_else(|| self.website_endpoint())
    }

    /// Static website endpoint of the bucket in the configured region.
    pub fn website_endpoint(&self) -> String {
        format!(
            "{}.s3-website-{}.amazonaws.com",
            self.bucket.name, self.stack.region
        )
    }

    pub fn function_name(&self) -> String {
        self.edge
            .function_name
            .clone()
            .unwrap_or_else(|| format!("{}-origin-request", self.stack.name))
    }

    /// Scaffold a minimal preview.toml.
    pub fn scaffold(stack_name: &str, bucket: &str) -> Self {
        PreviewConfig {
            stack: StackConfig {
                name: stack_name.to_string(),
                ..StackConfig::default()
            },
            bucket: BucketConfig {
                name: bucket.to_string(),
                acl: default_acl(),
                index_document: default_index(),
                error_document: default_index(),
            },
            edge: EdgeConfig::default(),
            domain: None,
            sync: SyncConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold_round_trips_through_toml() {
        let config = PreviewConfig::scaffold("previews", "previews-root");
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("previews-root"));
        let parsed = PreviewConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.bucket.name, "previews-root");
        assert_eq!(parsed.sync.mode, SyncMode::Incremental);
    }

    #[test]
    fn test_parse_minimal() {
        let config = PreviewConfig::from_toml_str(
            r#"
[bucket]
name = "previews-root"
"#,
        )
        .unwrap();
        assert_eq!(config.stack.region, "us-east-1");
        assert_eq!(config.bucket.acl, "private");
        assert_eq!(config.sync.concurrency, 8);
        assert!(config.domain.is_none());
        assert_eq!(
            config.origin_domain(),
            "previews-root.s3-website-us-east-1.amazonaws.com"
        );
        assert_eq!(config.function_name(), "preview-origin-request");
    }

    #[test]
    fn test_parse_full() {
        let config = PreviewConfig::from_toml_str(
            r#"
[stack]
name = "web"
region = "eu-west-1"
profile = "deploy"

[bucket]
name = "web-previews"

[edge]
origin_domain = "origin-bucket.example.com"
[edge.aliases]
main = "releases/production"

[domain]
base = "preview.example.com"
hosted_zone = "example.com"

[sync]
mode = "always"
prefix_policy = "path"
concurrency = 2
"#,
        )
        .unwrap();
        assert_eq!(config.stack.profile.as_deref(), Some("deploy"));
        assert_eq!(config.origin_domain(), "origin-bucket.example.com");
        assert_eq!(config.edge.aliases["main"], "releases/production");
        assert_eq!(config.domain.as_ref().unwrap().validation_timeout_secs, 600);
        assert_eq!(config.sync.mode, SyncMode::Always);
        assert_eq!(config.sync.prefix_policy, PrefixPolicy::Path);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = PreviewConfig::from_toml_str(
            r#"
[bucket]
name = "b"

[sync]
concurrency = 0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_object_acl_defaults_to_public_read() {
        let config = PreviewConfig::scaffold("demo", "demo-previews");
        assert_eq!(config.sync.object_acl, "public-read");
    }

    #[test]
    fn test_rejects_unroutable_alias_key() {
        let err = PreviewConfig::from_toml_str(
            r#"
[bucket]
name = "b"

[edge.aliases]
"www.main" = "production"
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid routing key"));
    }

    #[test]
    fn test_rejects_empty_alias_target() {
        let mut config = PreviewConfig::scaffold("demo", "demo-previews");
        config.edge.aliases.insert("main".into(), String::new());
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("must not be empty"));
    }

    #[test]
    fn test_alias_target_follows_prefix_policy() {
        let mut config = PreviewConfig::scaffold("demo", "demo-previews");
        config
            .edge
            .aliases
            .insert("main".into(), "team/production".into());
        assert!(config.validate().is_err());

        config.sync.prefix_policy = PrefixPolicy::Path;
        config.validate().unwrap();

        config.edge.aliases.insert("main".into(), "production".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_delays() {
        let err = PreviewConfig::from_toml_str(
            r#"
[bucket]
name = "b"

[sync]
base_delay_ms = 1000
max_delay_ms = 10
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("base_delay_ms"));
    }
}
