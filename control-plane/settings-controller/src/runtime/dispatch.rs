//! Scope-aware reconcile dispatch on top of kube's [`scheduler`].
//!
//! kube's `Controller` keys its queue and reflector cache by `ObjectRef`,
//! which carries name and namespace but no logical cluster, so bindings
//! with the same name in two workspaces would collapse into one entry.
//! Here the scheduler is keyed by [`TriggerKey`] instead. The scheduler
//! de-duplicates pending keys and holds a key back while a pass for it is
//! still running; failures are retried with kube's exponential backoff.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::{FutureExt, Stream, StreamExt};
use kube::runtime::scheduler::{ScheduleRequest, scheduler};
use kube::runtime::watcher::ExponentialBackoff;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::{Outcome, ReconcileErr};
use crate::scope::TriggerKey;

const RETRY_MIN: Duration = Duration::from_millis(5);
const RETRY_MAX: Duration = Duration::from_secs(1000);

/// Per-key retry delay: 5ms doubling up to 1000s.
pub fn retry_backoff() -> ExponentialBackoff {
    backon::ExponentialBuilder::default()
        .with_min_delay(RETRY_MIN)
        .with_max_delay(RETRY_MAX)
        .with_factor(2.0)
        .without_max_times()
        .into()
}

/// Sending half of a dispatcher's request stream.
#[derive(Clone, Debug)]
pub struct Trigger {
    tx: mpsc::UnboundedSender<ScheduleRequest<TriggerKey>>,
}

pub type Requests = UnboundedReceiverStream<ScheduleRequest<TriggerKey>>;

pub fn trigger_channel() -> (Trigger, Requests) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Trigger { tx }, UnboundedReceiverStream::new(rx))
}

impl Trigger {
    pub fn now(&self, key: TriggerKey) {
        self.at(key, Instant::now());
    }

    pub fn after(&self, key: TriggerKey, delay: Duration) {
        self.at(key, Instant::now() + delay);
    }

    fn at(&self, key: TriggerKey, run_at: Instant) {
        // the receiver only goes away on shutdown
        let _ = self.tx.send(ScheduleRequest {
            message: key,
            run_at,
        });
    }
}

enum Pass {
    Done(Outcome),
    Failed(ReconcileErr),
    TimedOut,
    Panicked,
}

/// Pull keys from `requests` and run up to `workers` passes at a time,
/// never two for the same key. Each pass is bounded by `timeout`. Returns
/// once `token` is cancelled or the request stream ends; passes still in
/// flight are aborted.
pub async fn run_dispatcher<S, F, Fut>(
    name: &'static str,
    trigger: Trigger,
    requests: S,
    workers: usize,
    timeout: Duration,
    token: CancellationToken,
    reconcile: F,
) where
    S: Stream<Item = ScheduleRequest<TriggerKey>>,
    F: Fn(TriggerKey) -> Fut,
    Fut: Future<Output = Result<Outcome, ReconcileErr>> + Send + 'static,
{
    let workers = workers.max(1);
    let mut queue = std::pin::pin!(scheduler(requests));
    let mut in_flight: HashSet<TriggerKey> = HashSet::new();
    let mut backoffs: HashMap<TriggerKey, ExponentialBackoff> = HashMap::new();
    let mut running: JoinSet<(TriggerKey, Pass)> = JoinSet::new();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            next = async {
                if in_flight.len() < workers {
                    queue
                        .as_mut()
                        .hold_unless(|k: &TriggerKey| !in_flight.contains(k))
                        .next()
                        .await
                } else {
                    queue.as_mut().hold().next().await
                }
            } => {
                let Some(key) = next else { break };
                in_flight.insert(key.clone());
                let pass = AssertUnwindSafe(tokio::time::timeout(timeout, reconcile(key.clone())));
                running.spawn(async move {
                    let pass = match pass.catch_unwind().await {
                        Ok(Ok(Ok(outcome))) => Pass::Done(outcome),
                        Ok(Ok(Err(e))) => Pass::Failed(e),
                        Ok(Err(_)) => Pass::TimedOut,
                        Err(_) => Pass::Panicked,
                    };
                    (key, pass)
                });
            }
            Some(joined) = running.join_next() => {
                let Ok((key, pass)) = joined else { continue };
                in_flight.remove(&key);
                if let Pass::Done(Outcome::Continue) = pass {
                    debug!(controller = name, %key, "reconciled");
                    backoffs.remove(&key);
                    continue;
                }
                let delay = backoffs
                    .entry(key.clone())
                    .or_insert_with(retry_backoff)
                    .next()
                    .unwrap_or(RETRY_MAX);
                match pass {
                    Pass::Done(_) => debug!(controller = name, %key, ?delay, "reconciled: requeue"),
                    Pass::Failed(e) => error!(controller = name, %key, error = %e, ?delay, "reconcile error"),
                    Pass::TimedOut => warn!(controller = name, %key, ?timeout, ?delay, "reconcile timed out"),
                    Pass::Panicked => error!(controller = name, %key, ?delay, "reconcile panicked"),
                }
                trigger.after(key, delay);
            }
        }
    }

    running.shutdown().await;
    info!(controller = name, "dispatcher stopped");
}
