use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::address::prune_commas;
use crate::api::auth::SignUpRequest;
use crate::api::client::ApiClient;
use crate::clock::Clock;
use crate::error::AppResult;
use crate::models::basket::{Basket, BasketLine, CatalogItemId, DecrementOutcome, MenuItem};
use crate::models::order::CustomerInfo;
use crate::models::partner::PartnerId;
use crate::store::{KeyValueStore, get_json, keys, set_json};

pub const RECENT_ADDRESS_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Da,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Da => "da",
            Language::En => "en",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "da" => Some(Language::Da),
            "en" => Some(Language::En),
            _ => None,
        }
    }
}

/// Customer-side state that survives restarts: the basket, the selected
/// partner, saved addresses and the cached profile.
///
/// Every basket mutation is written through to the store before returning.
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    basket: Basket,
    partner_id: Option<PartnerId>,
}

impl Session {
    pub async fn load(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let lines: Vec<BasketLine> = get_json(store.as_ref(), keys::BASKET)
            .await?
            .unwrap_or_default();
        let notes: BTreeMap<CatalogItemId, String> = get_json(store.as_ref(), keys::NOTES)
            .await?
            .unwrap_or_default();
        let partner_id = store
            .get(keys::LAST_PARTNER_ID)
            .await?
            .and_then(|raw| raw.trim().parse().ok());

        let basket = Basket::from_parts(lines, notes);
        debug!(
            lines = basket.lines().len(),
            partner_id, "session restored"
        );

        Ok(Self {
            store,
            clock,
            basket,
            partner_id,
        })
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    pub fn basket(&self) -> &Basket {
        &self.basket
    }

    pub fn partner_id(&self) -> Option<PartnerId> {
        self.partner_id
    }

    /// Makes `partner_id` the active partner. Returns `true` when a basket
    /// belonging to a different partner was discarded.
    pub async fn select_partner(&mut self, partner_id: PartnerId) -> AppResult<bool> {
        let switched = matches!(self.partner_id, Some(previous) if previous != partner_id);
        if switched {
            info!(
                from = self.partner_id,
                to = partner_id,
                "partner changed; clearing basket"
            );
            self.basket.clear();
            self.persist_basket().await?;
        }

        self.partner_id = Some(partner_id);
        self.store
            .set(keys::LAST_PARTNER_ID, partner_id.to_string())
            .await?;
        Ok(switched)
    }

    pub async fn add_item(&mut self, item: &MenuItem) -> AppResult<u32> {
        let quantity = self.basket.add(item);
        self.persist_basket().await?;
        Ok(quantity)
    }

    pub async fn increment(&mut self, id: CatalogItemId) -> AppResult<Option<u32>> {
        let quantity = self.basket.increment(id);
        if quantity.is_some() {
            self.persist_basket().await?;
        }
        Ok(quantity)
    }

    pub async fn decrement(&mut self, id: CatalogItemId) -> AppResult<DecrementOutcome> {
        let outcome = self.basket.decrement(id);
        if matches!(outcome, DecrementOutcome::Decremented(_)) {
            self.persist_basket().await?;
        }
        Ok(outcome)
    }

    pub async fn remove_item(&mut self, id: CatalogItemId) -> AppResult<Option<BasketLine>> {
        let removed = self.basket.remove(id);
        if removed.is_some() {
            self.persist_basket().await?;
        }
        Ok(removed)
    }

    pub async fn set_note(&mut self, id: CatalogItemId, note: &str) -> AppResult<()> {
        self.basket.set_note(id, note);
        self.persist_basket().await
    }

    pub async fn clear_basket(&mut self) -> AppResult<()> {
        self.basket.clear();
        self.persist_basket().await
    }

    async fn persist_basket(&self) -> AppResult<()> {
        set_json(self.store.as_ref(), keys::BASKET, self.basket.lines()).await?;
        set_json(self.store.as_ref(), keys::NOTES, self.basket.notes()).await
    }

    pub async fn primary_address(&self) -> AppResult<Option<String>> {
        Ok(self
            .store
            .get(keys::PRIMARY_ADDRESS)
            .await?
            .filter(|address| !address.trim().is_empty()))
    }

    /// Saves the address used for delivery and moves it to the front of the
    /// recent list.
    pub async fn set_primary_address(&self, address: &str) -> AppResult<()> {
        let address = prune_commas(address);
        self.store
            .set(keys::PRIMARY_ADDRESS, address.clone())
            .await?;
        self.remember_address(&address).await
    }

    pub async fn recent_addresses(&self) -> AppResult<Vec<String>> {
        let mut recent: Vec<String> = get_json(self.store.as_ref(), keys::RECENT_ADDRESSES)
            .await?
            .unwrap_or_default();
        recent.truncate(RECENT_ADDRESS_LIMIT);
        Ok(recent)
    }

    pub async fn remember_address(&self, address: &str) -> AppResult<()> {
        let address = prune_commas(address);
        if address.is_empty() {
            return Ok(());
        }

        let mut recent: Vec<String> = get_json(self.store.as_ref(), keys::RECENT_ADDRESSES)
            .await?
            .unwrap_or_default();
        recent.retain(|existing| !existing.eq_ignore_ascii_case(&address));
        recent.insert(0, address);
        recent.truncate(RECENT_ADDRESS_LIMIT);

        set_json(self.store.as_ref(), keys::RECENT_ADDRESSES, &recent).await
    }

    pub async fn language(&self) -> AppResult<Language> {
        Ok(self
            .store
            .get(keys::LANGUAGE)
            .await?
            .and_then(|code| Language::from_code(&code))
            .unwrap_or_default())
    }

    pub async fn set_language(&self, language: Language) -> AppResult<()> {
        self.store
            .set(keys::LANGUAGE, language.code().to_string())
            .await
    }

    /// Customer details as last stored on this device. Missing keys are empty.
    pub async fn cached_customer(&self) -> AppResult<CustomerInfo> {
        Ok(CustomerInfo {
            first_name: self.read_or_empty(keys::FIRST_NAME).await?,
            last_name: self.read_or_empty(keys::LAST_NAME).await?,
            email: self.read_or_empty(keys::LOGGED_IN_EMAIL).await?,
            phone_number: self.read_or_empty(keys::PHONE).await?,
        })
    }

    pub async fn remember_customer(&self, customer: &CustomerInfo) -> AppResult<()> {
        let fields = [
            (keys::FIRST_NAME, &customer.first_name),
            (keys::LAST_NAME, &customer.last_name),
            (keys::LOGGED_IN_EMAIL, &customer.email),
            (keys::PHONE, &customer.phone_number),
        ];
        for (key, value) in fields {
            if !value.trim().is_empty() {
                self.store.set(key, value.clone()).await?;
            }
        }
        Ok(())
    }

    /// Drops the cached profile. Basket and addresses stay on the device.
    pub async fn forget_user(&self) -> AppResult<()> {
        for key in [
            keys::FIRST_NAME,
            keys::LAST_NAME,
            keys::LOGGED_IN_EMAIL,
            keys::PHONE,
        ] {
            self.store.remove(key).await?;
        }
        Ok(())
    }

    /// Signs in and caches whatever profile fields the server returned.
    pub async fn sign_in(&self, api: &ApiClient, email: &str, password: &str) -> AppResult<()> {
        let signed_in = api.sign_in(email, password).await?;
        self.remember_customer(&CustomerInfo {
            first_name: signed_in.first_name.unwrap_or_default(),
            last_name: signed_in.last_name.unwrap_or_default(),
            email: email.to_string(),
            phone_number: signed_in.phone_number.unwrap_or_default(),
        })
        .await
    }

    /// Creates the account and caches the returned name and phone. Signing in
    /// is a separate step.
    pub async fn sign_up(&self, api: &ApiClient, request: &SignUpRequest<'_>) -> AppResult<()> {
        let profile = api.sign_up(request).await?;
        self.remember_customer(&CustomerInfo {
            first_name: profile.first_name.unwrap_or_default(),
            last_name: profile.last_name.unwrap_or_default(),
            email: String::new(),
            phone_number: profile.phone_number.unwrap_or_default(),
        })
        .await
    }

    pub async fn sign_out(&self, api: &ApiClient) -> AppResult<()> {
        if let Err(err) = api.sign_out().await {
            warn!(error = %err, "could not clear tokens");
        }
        self.forget_user().await
    }

    async fn read_or_empty(&self, key: &str) -> AppResult<String> {
        Ok(self.store.get(key).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::DateTime;

    use super::{Language, RECENT_ADDRESS_LIMIT, Session};
    use crate::clock::FixedClock;
    use crate::models::basket::{DecrementOutcome, MenuItem};
    use crate::models::order::CustomerInfo;
    use crate::store::{KeyValueStore, MemoryStore, keys};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339("2025-06-02T11:07:30+02:00").unwrap(),
        ))
    }

    async fn session(store: Arc<MemoryStore>) -> Session {
        Session::load(store, clock()).await.unwrap()
    }

    fn pizza() -> MenuItem {
        MenuItem {
            id: 12,
            name: "Margherita".to_string(),
            price: 95,
        }
    }

    #[tokio::test]
    async fn basket_survives_reload() {
        let store = Arc::new(MemoryStore::new());
        let mut first = session(store.clone()).await;
        first.add_item(&pizza()).await.unwrap();
        first.add_item(&pizza()).await.unwrap();
        first.set_note(12, "extra basil please, lots").await.unwrap();

        let second = session(store).await;
        assert_eq!(second.basket().item_count(), 2);
        assert_eq!(second.basket().note(12), Some("extra basil please, "));
    }

    #[tokio::test]
    async fn decrement_stops_at_one() {
        let mut session = session(Arc::new(MemoryStore::new())).await;
        session.add_item(&pizza()).await.unwrap();
        session.increment(12).await.unwrap();

        assert_eq!(
            session.decrement(12).await.unwrap(),
            DecrementOutcome::Decremented(1)
        );
        assert_eq!(
            session.decrement(12).await.unwrap(),
            DecrementOutcome::NeedsRemovalConfirmation
        );
        assert!(session.remove_item(12).await.unwrap().is_some());
        assert!(session.basket().is_empty());
    }

    #[tokio::test]
    async fn switching_partner_clears_basket() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone()).await;

        assert!(!session.select_partner(3).await.unwrap());
        session.add_item(&pizza()).await.unwrap();

        assert!(!session.select_partner(3).await.unwrap());
        assert!(!session.basket().is_empty());

        assert!(session.select_partner(4).await.unwrap());
        assert!(session.basket().is_empty());
        assert_eq!(
            store.get(keys::LAST_PARTNER_ID).await.unwrap().as_deref(),
            Some("4")
        );
    }

    #[tokio::test]
    async fn recent_addresses_are_deduplicated_newest_first() {
        let session = session(Arc::new(MemoryStore::new())).await;
        for n in 1..=6 {
            session
                .remember_address(&format!("Vej {n}, 2100 København"))
                .await
                .unwrap();
        }
        session
            .set_primary_address("Vej 3 2100 København")
            .await
            .unwrap();

        let recent = session.recent_addresses().await.unwrap();
        assert_eq!(recent.len(), RECENT_ADDRESS_LIMIT);
        assert_eq!(recent[0], "Vej 3 2100 København");
        assert_eq!(
            recent.iter().filter(|a| a.as_str() == "Vej 3 2100 København").count(),
            1
        );
        assert_eq!(
            session.primary_address().await.unwrap().as_deref(),
            Some("Vej 3 2100 København")
        );
    }

    #[tokio::test]
    async fn language_defaults_to_danish() {
        let session = session(Arc::new(MemoryStore::new())).await;
        assert_eq!(session.language().await.unwrap(), Language::Da);

        session.set_language(Language::En).await.unwrap();
        assert_eq!(session.language().await.unwrap(), Language::En);
    }

    #[tokio::test]
    async fn forget_user_drops_cached_profile() {
        let session = session(Arc::new(MemoryStore::new())).await;
        session
            .remember_customer(&CustomerInfo {
                first_name: "Mette".to_string(),
                last_name: "Jensen".to_string(),
                email: "mette@example.dk".to_string(),
                phone_number: "12345678".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.cached_customer().await.unwrap().first_name, "Mette");

        session.forget_user().await.unwrap();
        assert_eq!(session.cached_customer().await.unwrap(), CustomerInfo::default());
    }
}
