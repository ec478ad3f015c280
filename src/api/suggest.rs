use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::api::client::ApiClient;
use crate::models::address::{AddressSuggestion, Coordinates};

/// Queries shorter than this never hit the network.
pub const MIN_QUERY_CHARS: usize = 2;

/// Address autocomplete where the most recent query wins: a response that
/// arrives after a newer query was issued is discarded.
pub struct AddressSuggester {
    api: Arc<ApiClient>,
    generation: AtomicU64,
}

impl AddressSuggester {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            generation: AtomicU64::new(0),
        }
    }

    /// Returns `None` when a newer query superseded this one while it was in
    /// flight. Lookup failures degrade to an empty list.
    pub async fn suggest(&self, query: &str) -> Option<Vec<AddressSuggestion>> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if query.trim().chars().count() < MIN_QUERY_CHARS {
            return Some(Vec::new());
        }

        let suggestions = match self.api.address_suggestions(query).await {
            Ok(suggestions) => suggestions,
            Err(err) => {
                warn!(error = %err, "address suggestions unavailable");
                Vec::new()
            }
        };

        if self.generation.load(Ordering::SeqCst) != ticket {
            debug!(query, "discarding stale address suggestions");
            return None;
        }

        Some(suggestions)
    }
}

/// Coordinates of the best autocomplete match, if the lookup succeeds and the
/// first candidate carries them.
pub async fn geocode(api: &ApiClient, address: &str) -> Option<Coordinates> {
    match api.address_suggestions(address).await {
        Ok(suggestions) => suggestions.first().and_then(AddressSuggestion::coordinates),
        Err(err) => {
            debug!(error = %err, "geocoding failed; submitting without coordinates");
            None
        }
    }
}
