use serde::Deserialize;

use crate::models::basket::{CatalogItemId, MenuItem};
use crate::models::lenient;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogItem {
    #[serde(deserialize_with = "lenient::i64_required")]
    pub id: CatalogItemId,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub price: i64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub image_url: Option<String>,
}

impl CatalogItem {
    pub fn menu_item(&self) -> MenuItem {
        MenuItem {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogCategory {
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::vec_skipping_invalid")]
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Catalog {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::vec_skipping_invalid")]
    pub categories: Vec<CatalogCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogPartner {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub min_order_value: Option<i64>,
}

/// Body of `GET partners/{id}/catalogs/full/`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FullCatalog {
    #[serde(default, deserialize_with = "lenient::opt_value")]
    pub partner: Option<CatalogPartner>,
    #[serde(default, deserialize_with = "lenient::vec_skipping_invalid")]
    pub catalogs: Vec<Catalog>,
}

impl FullCatalog {
    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    pub fn min_order_value(&self) -> Option<i64> {
        self.partner.as_ref().and_then(|partner| partner.min_order_value)
    }

    pub fn all_categories(&self) -> impl Iterator<Item = &CatalogCategory> {
        self.catalogs.iter().flat_map(|catalog| catalog.categories.iter())
    }

    /// Category tabs, one per distinct id in first-seen order.
    pub fn category_tabs(&self) -> Vec<(i64, String)> {
        let mut tabs: Vec<(i64, String)> = Vec::new();
        for category in self.all_categories() {
            if !tabs.iter().any(|(id, _)| *id == category.id) {
                tabs.push((category.id, category.name.clone()));
            }
        }
        tabs
    }

    /// Categories shown for a selected tab; `None` shows all of them.
    pub fn categories_in(&self, selected: Option<i64>) -> Vec<&CatalogCategory> {
        self.all_categories()
            .filter(|category| selected.is_none_or(|id| category.id == id))
            .collect()
    }

    pub fn item(&self, id: CatalogItemId) -> Option<&CatalogItem> {
        self.all_categories()
            .flat_map(|category| category.items.iter())
            .find(|item| item.id == id)
    }
}
