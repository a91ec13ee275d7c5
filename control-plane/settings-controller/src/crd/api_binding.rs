//! Minimal kcp `apis.kcp.dev/v1alpha1` types the controller reads.
//!
//! Only the fields consumed here are modelled; unknown fields are ignored on
//! deserialization.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Binding of an exported API into a tenant workspace. Cluster-scoped.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[kube(
    group = "apis.kcp.dev",
    version = "v1alpha1",
    kind = "APIBinding",
    plural = "apibindings"
)]
#[serde(rename_all = "camelCase")]
pub struct APIBindingSpec {
    #[serde(default)]
    pub reference: ExportReference,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExportReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceExportReference>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceExportReference {
    /// Workspace path of the export (e.g. "root:org:ws")
    #[serde(default)]
    pub path: String,
    pub export_name: String,
}

impl APIBinding {
    /// Export (name, path) this binding points at, when it references a workspace export.
    pub fn export_target(&self) -> Option<(&str, &str)> {
        self.spec
            .reference
            .workspace
            .as_ref()
            .map(|w| (w.export_name.as_str(), w.path.as_str()))
    }
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[kube(
    group = "apis.kcp.dev",
    version = "v1alpha1",
    kind = "APIExport",
    plural = "apiexports",
    status = "APIExportStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct APIExportSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub latest_resource_schemas: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct APIExportStatus {
    #[serde(default)]
    pub virtual_workspaces: Vec<VirtualWorkspace>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct VirtualWorkspace {
    pub url: String,
}
