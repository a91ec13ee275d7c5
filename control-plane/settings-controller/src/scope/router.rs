use std::collections::HashMap;
use std::sync::Arc;

use http::Uri;
use kube::Client;
use tokio::sync::RwLock;
use tracing::debug;

use super::Scope;
use crate::store::StoreError;

/// Hands out one client per logical cluster, all derived from the base
/// virtual-workspace config. Clients are built lazily and cached until the
/// scope is forgotten.
#[derive(Clone)]
pub struct ScopeRouter {
    base: kube::Config,
    clients: Arc<RwLock<HashMap<Scope, Client>>>,
}

impl ScopeRouter {
    pub fn new(base: kube::Config) -> Self {
        Self {
            base,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Client addressing every logical cluster at once; used for watches.
    pub fn wildcard_client(&self) -> Result<Client, StoreError> {
        self.build("*")
    }

    pub async fn client_for(&self, scope: &Scope) -> Result<Client, StoreError> {
        if let Some(c) = self.clients.read().await.get(scope) {
            return Ok(c.clone());
        }
        let client = self.build(scope.as_str())?;
        let mut w = self.clients.write().await;
        Ok(w.entry(scope.clone()).or_insert(client).clone())
    }

    /// Evict the cached client for `scope`; the next request rebuilds it.
    pub async fn forget(&self, scope: &Scope) {
        if self.clients.write().await.remove(scope).is_some() {
            debug!(cluster = %scope, "dropped scoped client");
        }
    }

    #[cfg(test)]
    async fn cached(&self) -> usize {
        self.clients.read().await.len()
    }

    fn build(&self, cluster: &str) -> Result<Client, StoreError> {
        let mut cfg = self.base.clone();
        cfg.cluster_url = cluster_url(&self.base.cluster_url, cluster)
            .map_err(|e| StoreError::Client(cluster.into(), e.to_string()))?;
        debug!(cluster, url = %cfg.cluster_url, "building scoped client");
        Client::try_from(cfg)
            .map_err(|e| StoreError::Client(cluster.into(), e.to_string()))
    }
}

pub fn cluster_url(
    base: &Uri,
    cluster: &str,
) -> Result<Uri, http::uri::InvalidUri> {
    let base = base.to_string();
    format!("{}/clusters/{}", base.trim_end_matches('/'), cluster).parse()
}
