use kube::{Client, api::{Api, ListParams}};
use tracing::info;

use crate::crd::api_binding::APIExport;

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("error getting APIExport {0:?}: {1}")]
    Get(String, #[source] kube::Error),
    #[error("error listing APIExports: {0}")]
    List(#[source] kube::Error),
    #[error("no APIExport found")]
    NoExport,
    #[error("more than one APIExport found")]
    AmbiguousExport,
    #[error("APIExport {0:?} status.virtualWorkspaces is empty")]
    NoVirtualWorkspace(String),
}

/// Resolve the virtual-workspace URL of an APIExport. With an empty name,
/// exactly one export must exist.
pub async fn virtual_workspace_url(
    client: Client,
    export_name: &str,
) -> Result<String, DiscoveryError> {
    let api: Api<APIExport> = Api::all(client);
    let export = if export_name.is_empty() {
        info!("api export name is empty - listing");
        let mut list = api
            .list(&ListParams::default())
            .await
            .map_err(DiscoveryError::List)?
            .items;
        match list.len() {
            0 => return Err(DiscoveryError::NoExport),
            1 => list.remove(0),
            _ => return Err(DiscoveryError::AmbiguousExport),
        }
    } else {
        api.get(export_name)
            .await
            .map_err(|e| DiscoveryError::Get(export_name.into(), e))?
    };
    first_virtual_workspace(&export)
        .ok_or_else(|| DiscoveryError::NoVirtualWorkspace(export_name.into()))
}

fn first_virtual_workspace(export: &APIExport) -> Option<String> {
    export
        .status
        .as_ref()
        .and_then(|s| s.virtual_workspaces.first())
        .map(|vw| vw.url.clone())
}
