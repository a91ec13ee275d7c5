use envconfig::Envconfig;

use crate::scope::ScopeFilter;

#[derive(Envconfig, Clone, Debug)]
pub struct ControllerConfig {
    /// YAML operator configuration (namespace and child specs).
    /// Env: SETTINGS_CONFIG_FILE
    #[envconfig(
        from = "SETTINGS_CONFIG_FILE",
        default = "config/manager/controller_manager_config.yaml"
    )]
    pub config_file: String,

    #[envconfig(
        from = "SETTINGS_API_EXPORT_NAME",
        default = "settings-configuration.pipeline-service.io"
    )]
    pub api_export_name: String,

    /// Workspace path holding the APIExport
    #[envconfig(from = "SETTINGS_API_EXPORT_WORKSPACE", default = "")]
    pub api_export_workspace: String,

    /// Only reconcile APIBindings that reference the configured export
    #[envconfig(from = "SETTINGS_SCOPE_FILTER", default = "true")]
    pub scope_filter: bool,

    /// Skip APIExport discovery and talk to this URL directly
    #[envconfig(from = "SETTINGS_VIRTUAL_WORKSPACE_URL")]
    pub virtual_workspace_url: Option<String>,

    #[envconfig(from = "SETTINGS_WORKERS", default = "4")]
    pub workers: usize,

    #[envconfig(from = "SETTINGS_RECONCILE_TIMEOUT_SECS", default = "30")]
    pub reconcile_timeout_secs: u64,

    /// Health/readiness endpoint port
    #[envconfig(from = "HTTP_PORT", default = "8081")]
    pub http_port: u16,
}

impl ControllerConfig {
    pub fn scope_filter(&self) -> Option<ScopeFilter> {
        self.scope_filter.then(|| ScopeFilter {
            export_name: self.api_export_name.clone(),
            export_path: self.api_export_workspace.clone(),
        })
    }
}
