use anyhow::Result;
use forecastd::{config::Config, server, server::proxy::ProxyContext, store::DataStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env).init();
    info!("startup");

    // ─── 2) config + data store ──────────────────────────────────────
    let config = Config::from_env();
    let store = Arc::new(DataStore::new(&config.data_root)?);
    info!(
        data_root = %store.root().display(),
        upstream = config.upstream.is_some(),
        "configured"
    );

    // ─── 3) serve ────────────────────────────────────────────────────
    let proxy_ctx = Arc::new(ProxyContext::new(config.upstream.clone()));
    let routes = server::routes(store, proxy_ctx);

    info!(port = config.port, "server starting");
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;

    Ok(())
}
