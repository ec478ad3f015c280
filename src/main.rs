use std::sync::Arc;

use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use delivery_client::api::{ApiClient, TokenStore};
use delivery_client::config::Config;
use delivery_client::engine::tracking::{Tracker, TrackingSettings};
use delivery_client::error::AppError;
use delivery_client::fallback::FallbackCache;
use delivery_client::models::order::OrderStatus;
use delivery_client::models::tracking::{OrderSource, TrackingEvent};
use delivery_client::observability::metrics::Metrics;
use delivery_client::store::{FileStore, KeyValueStore};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.store_path).await?);
    let metrics = Arc::new(Metrics::new());
    let api = Arc::new(ApiClient::new(
        &config,
        TokenStore::new(store.clone()),
        metrics.clone(),
    )?);

    tracing::info!(api = %config.api_base_url, "tracking latest order");

    let tracker = Tracker::new(
        api,
        FallbackCache::new(store),
        TrackingSettings::from(&config),
    );
    let session = tracker.start();
    let mut updates = session.updates();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            update = updates.next() => match update {
                Some(Ok(event)) => report(&event),
                Some(Err(err)) => tracing::warn!(error = %err, "tracking updates lagged"),
                None => break,
            },
        }
    }

    session.stop().await;

    match metrics.encode() {
        Ok(text) => tracing::debug!(metrics = %text, "final client metrics"),
        Err(err) => tracing::warn!(error = %err, "failed to encode metrics"),
    }

    Ok(())
}

fn report(event: &TrackingEvent) {
    match event {
        TrackingEvent::OrderLoaded { order, source } => {
            let status = order.status();
            tracing::info!(
                order_id = order.id,
                status = %order.status,
                step = status.progress_step(),
                stale = matches!(source, OrderSource::Fallback),
                "order loaded"
            );
        }
        TrackingEvent::StatusChanged {
            order_id, status, ..
        } => {
            tracing::info!(
                order_id,
                status = %status,
                step = OrderStatus::parse(status).progress_step(),
                "order status changed"
            );
        }
        TrackingEvent::CourierMoved(position) => {
            tracing::info!(
                latitude = position.latitude,
                longitude = position.longitude,
                "courier moved"
            );
        }
        TrackingEvent::Unavailable(reason) => {
            tracing::warn!(reason = %reason, "order unavailable");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
