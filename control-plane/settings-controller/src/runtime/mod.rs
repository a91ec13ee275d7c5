pub mod dispatch;
pub mod watch;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, ResourceQuota};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::Resource;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ControllerConfig, SettingsConfig};
use crate::controller::{ControllerContext, reconcile, widget::reconcile_widget};
use crate::crd::{api_binding::APIBinding, settings::Settings, widget::Widget};
use crate::scope::{ScopeRouter, TriggerKey};
use crate::store::{KubeStore, Store};
use crate::web::run_health_server;

use dispatch::{run_dispatcher, trigger_channel};
use watch::spawn_watch;

const OWNER_KIND: &str = "APIBinding";

/// Compute the health server bind address based on config.
pub fn compute_http_addr(cfg: &ControllerConfig) -> SocketAddr {
    ([0, 0, 0, 0], cfg.http_port).into()
}

/// Start watches, dispatchers and the health server against the virtual
/// workspace described by `base`, and run until a shutdown signal.
pub async fn run_all(
    base: kube::Config,
    cfg: ControllerConfig,
    settings: SettingsConfig,
) -> anyhow::Result<()> {
    let router = ScopeRouter::new(base);
    let wildcard = router.wildcard_client()?;
    let store: Arc<dyn Store> = Arc::new(KubeStore::new(router));
    let ctx = Arc::new(ControllerContext::new(
        Arc::clone(&store),
        Arc::new(settings),
        cfg.scope_filter(),
    ));

    let token = CancellationToken::new();
    let (settings_trigger, settings_requests) = trigger_channel();
    let (widget_trigger, widget_requests) = trigger_channel();

    let watches = vec![
        spawn_watch::<APIBinding, _>(
            wildcard.clone(),
            settings_trigger.clone(),
            token.clone(),
            |b| TriggerKey::for_object(b.meta()),
        ),
        spawn_watch::<Settings, _>(
            wildcard.clone(),
            settings_trigger.clone(),
            token.clone(),
            |s| TriggerKey::for_owner(s.meta(), OWNER_KIND),
        ),
        spawn_watch::<Namespace, _>(
            wildcard.clone(),
            settings_trigger.clone(),
            token.clone(),
            |n| TriggerKey::for_owner(n.meta(), OWNER_KIND),
        ),
        spawn_watch::<NetworkPolicy, _>(
            wildcard.clone(),
            settings_trigger.clone(),
            token.clone(),
            |p| TriggerKey::for_owner(p.meta(), OWNER_KIND),
        ),
        spawn_watch::<ResourceQuota, _>(
            wildcard.clone(),
            settings_trigger.clone(),
            token.clone(),
            |q| TriggerKey::for_owner(q.meta(), OWNER_KIND),
        ),
        spawn_watch::<Widget, _>(
            wildcard,
            widget_trigger.clone(),
            token.clone(),
            |w| TriggerKey::for_object(w.meta()),
        ),
    ];

    let timeout = Duration::from_secs(cfg.reconcile_timeout_secs);
    let settings_dispatch = tokio::spawn(run_dispatcher(
        "settings",
        settings_trigger,
        settings_requests,
        cfg.workers,
        timeout,
        token.clone(),
        move |key: TriggerKey| {
            let ctx = Arc::clone(&ctx);
            async move { reconcile(&key, &ctx).await }
        },
    ));
    let widget_dispatch = tokio::spawn(run_dispatcher(
        "widget",
        widget_trigger,
        widget_requests,
        cfg.workers,
        timeout,
        token.clone(),
        move |key: TriggerKey| {
            let store = Arc::clone(&store);
            async move { reconcile_widget(&key, store.as_ref()).await }
        },
    ));
    let health = tokio::spawn(run_health_server(compute_http_addr(&cfg), token.clone()));

    shutdown_signal().await;
    info!("shutdown signal received; stopping controller");
    token.cancel();

    settings_dispatch.await?;
    widget_dispatch.await?;
    for w in watches {
        w.await?;
    }
    health.await??;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
