use std::fmt::Debug;

use futures_util::StreamExt;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use super::dispatch::Trigger;
use crate::scope::TriggerKey;

/// Watch every object of `K` through `client` and schedule the trigger key
/// `map` derives from it. Objects without a key are dropped.
pub fn spawn_watch<K, F>(
    client: Client,
    trigger: Trigger,
    token: CancellationToken,
    map: F,
) -> JoinHandle<()>
where
    K: Resource<DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
    F: Fn(&K) -> Option<TriggerKey> + Send + 'static,
{
    tokio::spawn(async move {
        let kind = K::kind(&()).to_string();
        let api: Api<K> = Api::all(client);
        let stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .touched_objects();
        futures_util::pin_mut!(stream);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                item = stream.next() => match item {
                    Some(Ok(obj)) => match map(&obj) {
                        Some(key) => {
                            trace!(%kind, %key, "watch: schedule");
                            trigger.now(key);
                        }
                        None => trace!(%kind, "watch: object without trigger key"),
                    },
                    Some(Err(e)) => warn!(%kind, error = %e, "watch: stream error"),
                    None => break,
                },
            }
        }
    })
}
