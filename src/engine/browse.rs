//! Restaurant discovery for a selected address and menu loading.

use tracing::{debug, warn};

use crate::address::listing_city;
use crate::api::client::ApiClient;
use crate::error::AppResult;
use crate::models::catalog::FullCatalog;
use crate::models::partner::{PartnerId, PartnerSummary};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestaurantListing {
    pub city: String,
    pub restaurants: Vec<PartnerSummary>,
}

impl RestaurantListing {
    /// Distinct category names in listing order.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.restaurants.iter().filter_map(PartnerSummary::category_name) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn in_category(&self, category: Option<&str>) -> Vec<&PartnerSummary> {
        self.restaurants
            .iter()
            .filter(|restaurant| category.is_none_or(|name| restaurant.category_name() == Some(name)))
            .collect()
    }
}

/// Restaurants for the city named in `address`. `None` when no city can be
/// read from it; a failed lookup yields an empty listing.
pub async fn restaurants_near(api: &ApiClient, address: &str) -> Option<RestaurantListing> {
    let city = listing_city(address)?;

    let restaurants = match api.restaurants(&city).await {
        Ok(restaurants) => restaurants,
        Err(err) => {
            warn!(city = %city, error = %err, "restaurant listing unavailable");
            Vec::new()
        }
    };
    debug!(city = %city, count = restaurants.len(), "restaurants listed");

    Some(RestaurantListing { city, restaurants })
}

pub async fn load_menu(api: &ApiClient, partner_id: PartnerId) -> AppResult<FullCatalog> {
    let catalog = api.catalog(partner_id).await?;
    if catalog.is_empty() {
        debug!(partner_id, "partner has no menu");
    }
    Ok(catalog)
}
