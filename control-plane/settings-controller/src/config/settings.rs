use std::path::{Path, PathBuf};

use k8s_openapi::api::core::v1::ResourceQuotaSpec;
use k8s_openapi::api::networking::v1::NetworkPolicySpec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHILD_NAME: &str = "platform";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unable to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Operator configuration loaded once at startup and shared read-only.
///
/// Unknown keys (e.g. controller-manager health/metrics sections) are
/// ignored, so the same file can carry manager settings.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsConfig {
    /// Tenant namespace that receives the child resources
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub network_policy_config: NetworkPolicyConfig,
    #[serde(default)]
    pub quota_config: QuotaConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct NetworkPolicyConfig {
    #[serde(default = "default_child_name")]
    pub name: String,
    #[serde(default)]
    pub spec: NetworkPolicySpec,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct QuotaConfig {
    #[serde(default = "default_child_name")]
    pub name: String,
    #[serde(default)]
    pub spec: ResourceQuotaSpec,
}

fn default_child_name() -> String {
    DEFAULT_CHILD_NAME.into()
}

impl Default for NetworkPolicyConfig {
    fn default() -> Self {
        Self {
            name: default_child_name(),
            spec: NetworkPolicySpec::default(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            name: default_child_name(),
            spec: ResourceQuotaSpec::default(),
        }
    }
}

impl SettingsConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: SettingsConfig = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_dns_label(&self.namespace) {
            return Err(ConfigError::Invalid(format!(
                "namespace {:?} is not a DNS-1123 label",
                self.namespace
            )));
        }
        for name in [&self.network_policy_config.name, &self.quota_config.name] {
            if name.is_empty() {
                return Err(ConfigError::Invalid("child resource name is empty".into()));
            }
        }
        Ok(())
    }
}

fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}
