use std::sync::Arc;

use tracing::debug;

use crate::error::AppResult;
use crate::models::order::OrderSnapshot;
use crate::store::{KeyValueStore, get_json, keys, set_json};

/// Keeps a copy of the most recently submitted order for display when the live
/// API cannot be reached. Only one order is retained; it is never used for
/// retries or reconciliation, and a later live read does not delete it.
#[derive(Clone)]
pub struct FallbackCache {
    store: Arc<dyn KeyValueStore>,
}

impl FallbackCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn put(&self, order: &OrderSnapshot) -> AppResult<()> {
        set_json(self.store.as_ref(), keys::LAST_ORDER_FALLBACK, order).await?;
        debug!(order_id = order.id, "fallback order stored");
        Ok(())
    }

    pub async fn get(&self) -> AppResult<Option<OrderSnapshot>> {
        get_json(self.store.as_ref(), keys::LAST_ORDER_FALLBACK).await
    }
}
