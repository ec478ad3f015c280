//! The checkout pipeline: partner terms and slot options for the form, and
//! order submission with its side effects.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, info, warn};

use crate::address::parse_address;
use crate::api::client::ApiClient;
use crate::api::suggest::geocode;
use crate::config::Config;
use crate::engine::assembler::{
    CheckoutForm, OrderAssembler, Totals, snapshot_for, validate_checkout,
};
use crate::engine::slots::{SlotOptions, compute_slots, hours_for_today};
use crate::error::{AppError, AppResult};
use crate::fallback::FallbackCache;
use crate::models::order::{CustomerInfo, DeliveryType, OrderId, OrderSnapshot};
use crate::models::partner::{PartnerId, PartnerProfile};
use crate::state::Session;

#[async_trait]
pub trait PushTokenProvider: Send + Sync {
    async fn push_token(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartnerTerms {
    pub min_prep_minutes: i64,
    pub delivery_fee: i64,
    pub min_order_value: Option<i64>,
}

impl PartnerTerms {
    pub fn defaults(default_min_prep_minutes: i64) -> Self {
        Self {
            min_prep_minutes: default_min_prep_minutes,
            delivery_fee: 0,
            min_order_value: None,
        }
    }

    /// A preparation time of zero or less counts as unset.
    pub fn from_profile(profile: &PartnerProfile, default_min_prep_minutes: i64) -> Self {
        Self {
            min_prep_minutes: profile
                .min_preparation_time
                .filter(|minutes| *minutes > 0)
                .unwrap_or(default_min_prep_minutes),
            delivery_fee: profile.delivery_fee.unwrap_or(0).max(0),
            min_order_value: profile.min_order_value,
        }
    }

    pub fn fee_for(&self, delivery_type: DeliveryType) -> i64 {
        match delivery_type {
            DeliveryType::Pickup => 0,
            DeliveryType::Delivery => self.delivery_fee,
        }
    }

    /// How much more the basket needs to reach the partner's minimum order.
    pub fn missing_to_minimum(&self, items_total: i64) -> i64 {
        self.min_order_value
            .map(|minimum| (minimum - items_total).max(0))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub order_id: OrderId,
    pub totals: Totals,
    pub requested_at: DateTime<FixedOffset>,
    pub snapshot: OrderSnapshot,
}

pub struct CheckoutService {
    api: Arc<ApiClient>,
    fallback: FallbackCache,
    push_tokens: Option<Arc<dyn PushTokenProvider>>,
    country: String,
    default_min_prep_minutes: i64,
}

impl CheckoutService {
    pub fn new(api: Arc<ApiClient>, fallback: FallbackCache, config: &Config) -> Self {
        Self {
            api,
            fallback,
            push_tokens: None,
            country: config.country.clone(),
            default_min_prep_minutes: i64::from(config.default_min_prep_minutes),
        }
    }

    pub fn with_push_tokens(mut self, provider: Arc<dyn PushTokenProvider>) -> Self {
        self.push_tokens = Some(provider);
        self
    }

    /// Reads the partner profile. A failed lookup yields the default
    /// preparation time and no delivery fee.
    pub async fn partner_terms(&self, partner_id: PartnerId) -> PartnerTerms {
        match self.api.partner(partner_id).await {
            Ok(profile) => PartnerTerms::from_profile(&profile, self.default_min_prep_minutes),
            Err(err) => {
                warn!(partner_id, error = %err, "partner lookup failed; using defaults");
                PartnerTerms::defaults(self.default_min_prep_minutes)
            }
        }
    }

    /// Selectable slots for today. Unreadable opening hours leave only `ASAP`.
    pub async fn delivery_options(
        &self,
        partner_id: PartnerId,
        now: DateTime<FixedOffset>,
        min_prep_minutes: i64,
    ) -> SlotOptions {
        let hours = match self.api.partner_hours(partner_id).await {
            Ok(hours) => hours,
            Err(err) => {
                warn!(partner_id, error = %err, "opening hours unavailable; ASAP only");
                return SlotOptions::asap_only();
            }
        };

        let local = now.naive_local();
        compute_slots(local, hours_for_today(&hours, local), min_prep_minutes)
    }

    /// Customer details for pre-filling the form. Fields missing on the device
    /// are fetched from the profile endpoint and cached; a failed fetch leaves
    /// them empty.
    pub async fn load_customer(&self, session: &Session) -> AppResult<CustomerInfo> {
        let mut customer = session.cached_customer().await?;

        let complete = [
            &customer.first_name,
            &customer.last_name,
            &customer.phone_number,
        ]
        .iter()
        .all(|field| !field.trim().is_empty());
        if complete || customer.email.trim().is_empty() {
            return Ok(customer);
        }

        match self.api.user_profile(&customer.email).await {
            Ok(profile) => {
                fill_blank(&mut customer.first_name, profile.first_name);
                fill_blank(&mut customer.last_name, profile.last_name);
                fill_blank(&mut customer.phone_number, profile.phone_number);
                session.remember_customer(&customer).await?;
            }
            Err(err) => debug!(error = %err, "profile lookup failed"),
        }

        Ok(customer)
    }

    /// Validates, assembles and submits the order for the session's partner.
    ///
    /// Validation failures return before any request is made. After the API
    /// accepts the order, the push token is registered (best effort) and the
    /// order is written to the fallback cache.
    pub async fn submit(&self, session: &Session, form: &CheckoutForm) -> AppResult<SubmittedOrder> {
        let basket = session.basket();
        validate_checkout(form, basket)?;

        let partner_id = session
            .partner_id()
            .ok_or_else(|| AppError::Internal("no partner selected".to_string()))?;

        let terms = self.partner_terms(partner_id).await;
        let coordinates = geocode(&self.api, &form.address).await;
        let address = parse_address(&form.address).with_coordinates(coordinates);

        let assembler = OrderAssembler {
            partner_id,
            country: self.country.clone(),
            min_prep_minutes: terms.min_prep_minutes,
            delivery_fee: terms.delivery_fee,
        };
        let now = session.now();
        let assembled = assembler.assemble(form, basket, &address, now)?;

        let created = match self.api.submit_order(&assembled.payload).await {
            Ok(created) => created,
            Err(err) => {
                let outcome = match err {
                    AppError::OrderRejected { .. } => "rejected",
                    _ => "error",
                };
                self.count_submission(outcome);
                error!(partner_id, error = %err, "order submission failed");
                return Err(err);
            }
        };
        info!(order_id = created.id, partner_id, "order accepted");

        self.register_push_token().await;

        let snapshot = snapshot_for(created.id, &assembled, basket, now);
        if let Err(err) = self.fallback.put(&snapshot).await {
            error!(order_id = created.id, error = %err, "could not store fallback order");
        }

        if let Err(err) = session.set_primary_address(&form.address).await {
            warn!(error = %err, "could not save primary address");
        }

        self.count_submission("accepted");
        Ok(SubmittedOrder {
            order_id: created.id,
            totals: assembled.totals,
            requested_at: assembled.requested_at,
            snapshot,
        })
    }

    async fn register_push_token(&self) {
        let Some(provider) = &self.push_tokens else {
            return;
        };
        let Some(token) = provider.push_token().await else {
            debug!("no push token available");
            return;
        };

        if let Err(err) = self.api.register_push_token(&token).await {
            warn!(error = %err, "push token registration failed");
        }
    }

    fn count_submission(&self, outcome: &str) {
        self.api
            .metrics()
            .order_submissions_total
            .with_label_values(&[outcome])
            .inc();
    }
}

fn fill_blank(field: &mut String, value: Option<String>) {
    if field.trim().is_empty() {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            *field = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PartnerTerms, fill_blank};
    use crate::models::order::DeliveryType;
    use crate::models::partner::PartnerProfile;

    #[test]
    fn zero_or_negative_prep_time_falls_back_to_default() {
        for minutes in [Some(0), Some(-5), None] {
            let profile = PartnerProfile {
                min_preparation_time: minutes,
                ..PartnerProfile::default()
            };
            assert_eq!(PartnerTerms::from_profile(&profile, 30).min_prep_minutes, 30);
        }

        let profile = PartnerProfile {
            min_preparation_time: Some(45),
            delivery_fee: Some(-10),
            ..PartnerProfile::default()
        };
        let terms = PartnerTerms::from_profile(&profile, 30);
        assert_eq!(terms.min_prep_minutes, 45);
        assert_eq!(terms.delivery_fee, 0);
    }

    #[test]
    fn pickup_never_pays_delivery_fee() {
        let terms = PartnerTerms {
            min_prep_minutes: 30,
            delivery_fee: 39,
            min_order_value: Some(100),
        };
        assert_eq!(terms.fee_for(DeliveryType::Pickup), 0);
        assert_eq!(terms.fee_for(DeliveryType::Delivery), 39);
    }

    #[test]
    fn reports_shortfall_to_minimum_order() {
        let terms = PartnerTerms {
            min_prep_minutes: 30,
            delivery_fee: 0,
            min_order_value: Some(100),
        };
        assert_eq!(terms.missing_to_minimum(80), 20);
        assert_eq!(terms.missing_to_minimum(120), 0);

        let no_minimum = PartnerTerms {
            min_order_value: None,
            ..terms
        };
        assert_eq!(no_minimum.missing_to_minimum(0), 0);
    }

    #[test]
    fn fill_blank_keeps_existing_values() {
        let mut name = "Mette".to_string();
        fill_blank(&mut name, Some("Other".to_string()));
        assert_eq!(name, "Mette");

        let mut phone = String::new();
        fill_blank(&mut phone, Some("12345678".to_string()));
        assert_eq!(phone, "12345678");
    }
}
