pub mod settings;
pub mod types;

pub use settings::{ConfigError, NetworkPolicyConfig, QuotaConfig, SettingsConfig};
pub use types::ControllerConfig;
