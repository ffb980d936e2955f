//! outpost server entry point.
//!
//! Boots the intercept layer: config, versioned store, origin client,
//! deployment hooks, then the HTTP loop. Logs go to stderr as JSON so
//! proxied traffic on stdout pipes stay clean.

use anyhow::Result;
use outpost_client::origin::resolve;
use outpost_client::{ClassifierRules, OriginClient, OriginConfig, OriginFetcher};
use outpost_core::{AppConfig, VersionedStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod gateway;
mod http;
mod lifecycle;
mod proxy;
#[cfg(test)]
mod testutil;

use gateway::NotificationGateway;
use http::AppState;
use lifecycle::LifecycleManager;
use proxy::FetchCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let base = config.origin_url()?;

    tracing::info!("starting outpost in front of {}", base);

    let store = VersionedStore::open(&config.db_path).await?;

    let origin_config = OriginConfig {
        base: base.clone(),
        user_agent: config.user_agent.clone(),
        timeout: config.timeout(),
        max_redirects: 5,
    };
    let origin: Arc<dyn OriginFetcher> = Arc::new(OriginClient::new(origin_config)?);

    let lifecycle =
        Arc::new(LifecycleManager::new(store.clone(), Arc::clone(&origin), base.clone()));

    // Deploy hooks: pre-warm the configured generation, then flip the
    // pointer. A failed install is not fatal; the proxy serves whatever
    // generation the store already holds.
    match lifecycle.install(&config.manifest, &config.generation).await {
        Ok(()) => lifecycle.activate(&config.generation).await?,
        Err(err) => tracing::warn!("startup install failed, serving without refresh: {}", err),
    }

    let rules = ClassifierRules::new(config.bypass_patterns.clone());
    let coordinator = FetchCoordinator::new(
        store.clone(),
        Arc::clone(&origin),
        rules,
        base.clone(),
        config.fallback_path.clone(),
    );

    let root = resolve(&base, &config.fallback_path)?;
    let gateway = NotificationGateway::new(
        Arc::clone(&lifecycle),
        config.manifest.clone(),
        config.notification_title.clone(),
        root,
    );

    let state = Arc::new(AppState { config, store, coordinator, gateway, lifecycle });

    http::run(state).await?;

    Ok(())
}
