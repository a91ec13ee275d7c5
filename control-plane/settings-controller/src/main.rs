use envconfig::Envconfig;
use settings_controller::{
    config::{ControllerConfig, SettingsConfig},
    init_tracing, runtime,
    scope::discovery::virtual_workspace_url,
};
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    // Ensure rustls uses the aws-lc-rs provider explicitly.
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    let cfg = ControllerConfig::init_from_env()?;
    let settings = SettingsConfig::load(&cfg.config_file)?;
    info!(?cfg, namespace = %settings.namespace, "Starting settings controller");

    let base = kube::Config::infer().await?;
    let url = match cfg.virtual_workspace_url.clone() {
        Some(url) => url,
        None => {
            let client = kube::Client::try_from(base.clone())?;
            virtual_workspace_url(client, &cfg.api_export_name).await?
        }
    };
    info!(%url, "Using virtual workspace URL");

    let mut vw = base;
    vw.cluster_url = url.parse()?;
    runtime::run_all(vw, cfg, settings).await
}
