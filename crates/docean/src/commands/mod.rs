pub mod auth;
pub mod state;
pub mod sweep;

use anyhow::Context as _;
use docean_cloud::Context;
use docean_provider::Provider;

/// Provider configured from `DIGITALOCEAN_*` variables
pub fn provider() -> anyhow::Result<Provider> {
    Provider::from_env().context("failed to configure the DigitalOcean provider")
}

/// Context cancelled on Ctrl-C
pub fn interruptible() -> Context {
    let ctx = Context::new();
    let handle = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            handle.cancel();
        }
    });
    ctx
}
