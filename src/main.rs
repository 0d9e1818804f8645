use std::sync::Arc;

use follow_suggest::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, PgPolicySource, PgStore},
    routes::{create_router, AppState},
    services::{Collaborators, DelegateClient, FederatedResolver, Recommender},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "follow_suggest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let (cache, cache_handle) = Cache::connect(create_redis_client(&config.redis_url)?).await?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let delegate = DelegateClient::new(config.proxy.as_deref())?;

    let resolver = FederatedResolver::new(
        store.clone(),
        remote_http_client(&config)?,
        config.local_hostname.clone(),
        config.remote_scheme.clone(),
    )
    .with_cache(cache);

    let recommender = Recommender::new(
        Collaborators {
            policy: Arc::new(PgPolicySource::new(pool, config.local_hostname.clone())),
            directory: store.clone(),
            graph: store.clone(),
            hidden: store.clone(),
            resolver: Arc::new(resolver),
        },
        delegate,
        config.resolution_timeout(),
    );

    let state = Arc::new(AppState {
        recommender,
        directory: store,
    });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(
        address = %config.bind_address(),
        hostname = %config.local_hostname,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_handle.shutdown().await;
    Ok(())
}

/// Client for WebFinger and actor fetches, behind the same outbound proxy as
/// the engine client
fn remote_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(config.resolution_timeout());
    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
    }
    Ok(builder.build()?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
