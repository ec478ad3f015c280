use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};

use crate::address::is_valid_address;
use crate::engine::slots::{TimeSlot, round_up_to_slot};
use crate::error::{AppError, AppResult, MissingField};
use crate::models::address::{Address, DeliveryAddress};
use crate::models::basket::Basket;
use crate::models::order::{
    CustomerInfo, CustomerSection, DeliveryType, OrderId, OrderItemPayload, OrderPayload,
    OrderSection, OrderSnapshot, PaymentDetails, PaymentSection, PaymentSnapshot, SnapshotItem,
};
use crate::models::partner::PartnerId;

pub const TIP_PRESETS: [u8; 3] = [5, 10, 15];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tip {
    Percent(u8),
    Custom(i64),
}

impl Default for Tip {
    fn default() -> Self {
        Tip::Percent(TIP_PRESETS[0])
    }
}

impl Tip {
    /// Parses a user-entered flat tip. Blank or non-numeric input tips nothing.
    pub fn from_custom_input(input: &str) -> Self {
        let amount = input
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.round().max(0.0) as i64)
            .unwrap_or(0);
        Tip::Custom(amount)
    }

    pub fn amount(&self, items_total: i64) -> i64 {
        match *self {
            Tip::Percent(percent) => {
                let scaled = items_total.max(0) * i64::from(percent);
                (scaled + 50) / 100
            }
            Tip::Custom(amount) => amount.max(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub items_total: i64,
    pub tip_amount: i64,
    pub delivery_fee: i64,
    pub total_payable: i64,
}

impl Totals {
    pub fn compute(
        basket: &Basket,
        tip: Tip,
        delivery_type: DeliveryType,
        partner_delivery_fee: i64,
    ) -> Self {
        let items_total = basket.items_total();
        let tip_amount = tip.amount(items_total);
        let delivery_fee = match delivery_type {
            DeliveryType::Pickup => 0,
            DeliveryType::Delivery => partner_delivery_fee.max(0),
        };

        Self {
            items_total,
            tip_amount,
            delivery_fee,
            total_payable: items_total + tip_amount + delivery_fee,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    pub customer: CustomerInfo,
    pub address: String,
    pub payment: Option<PaymentDetails>,
    pub delivery_type: DeliveryType,
    pub slot: Option<TimeSlot>,
    pub tip: Tip,
    pub driver_note: String,
}

impl CheckoutForm {
    pub fn slot(&self) -> TimeSlot {
        self.slot.unwrap_or(TimeSlot::Asap)
    }
}

/// Presence-only checks; no format validation beyond the address gate.
pub fn missing_fields(form: &CheckoutForm, basket: &Basket) -> Vec<MissingField> {
    let mut missing = Vec::new();

    push_if_blank(&mut missing, &form.customer.first_name, MissingField::FirstName);
    push_if_blank(&mut missing, &form.customer.last_name, MissingField::LastName);
    push_if_blank(&mut missing, &form.customer.email, MissingField::Email);
    push_if_blank(&mut missing, &form.customer.phone_number, MissingField::Phone);
    push_if_blank(&mut missing, &form.address, MissingField::Address);
    if form.payment.is_none() {
        missing.push(MissingField::PaymentMethod);
    }
    if basket.is_empty() {
        missing.push(MissingField::Basket);
    }

    match &form.payment {
        Some(PaymentDetails::Card { number, expiry, cvc }) => {
            push_if_blank(&mut missing, number, MissingField::CardNumber);
            push_if_blank(&mut missing, expiry, MissingField::CardExpiry);
            push_if_blank(&mut missing, cvc, MissingField::CardCvc);
        }
        Some(PaymentDetails::MobilePay { phone }) => {
            push_if_blank(&mut missing, phone, MissingField::MobilePayPhone);
        }
        Some(PaymentDetails::Bank {
            registration,
            account,
            iban,
            swift,
        }) => {
            push_if_blank(&mut missing, registration, MissingField::BankRegistration);
            push_if_blank(&mut missing, account, MissingField::BankAccount);
            push_if_blank(&mut missing, iban, MissingField::Iban);
            push_if_blank(&mut missing, swift, MissingField::Swift);
        }
        None => {}
    }

    missing
}

fn push_if_blank(missing: &mut Vec<MissingField>, value: &str, field: MissingField) {
    if value.trim().is_empty() {
        missing.push(field);
    }
}

/// Resolves the chosen slot to the instant sent as `requested_delivery_time`.
///
/// `ASAP` is `now + min_prep_minutes` rounded up to the next quarter hour. An
/// explicit label is today at that time, moved to tomorrow if already past.
pub fn resolve_delivery_time(
    slot: TimeSlot,
    now: DateTime<FixedOffset>,
    min_prep_minutes: i64,
) -> AppResult<DateTime<FixedOffset>> {
    let offset = *now.offset();
    let local = now.naive_local();

    let target = match slot {
        TimeSlot::Asap => round_up_to_slot(local + Duration::minutes(min_prep_minutes)),
        TimeSlot::At(time) => {
            let candidate = local.date().and_time(time);
            if candidate < local {
                candidate + Duration::days(1)
            } else {
                candidate
            }
        }
    };

    target
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| AppError::Internal(format!("unrepresentable delivery time {target}")))
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2025-06-02T09:45:00.000Z`.
pub fn to_iso_utc(instant: DateTime<FixedOffset>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledOrder {
    pub payload: OrderPayload,
    pub totals: Totals,
    pub requested_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone)]
pub struct OrderAssembler {
    pub partner_id: PartnerId,
    pub country: String,
    pub min_prep_minutes: i64,
    pub delivery_fee: i64,
}

impl OrderAssembler {
    /// Runs the submission gate, then builds the payload. `address` is the
    /// parsed (and optionally geocoded) form of `form.address`.
    pub fn assemble(
        &self,
        form: &CheckoutForm,
        basket: &Basket,
        address: &Address,
        now: DateTime<FixedOffset>,
    ) -> AppResult<AssembledOrder> {
        self.validate(form, basket)?;

        let payment = form
            .payment
            .as_ref()
            .ok_or_else(|| AppError::MissingFields(vec![MissingField::PaymentMethod]))?;

        let requested_at = resolve_delivery_time(form.slot(), now, self.min_prep_minutes)?;
        let totals = Totals::compute(basket, form.tip, form.delivery_type, self.delivery_fee);

        let items = basket
            .lines()
            .iter()
            .map(|line| OrderItemPayload {
                catalog_item_id: line.catalog_item_id,
                quantity: line.quantity,
                note: basket
                    .note(line.catalog_item_id)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect();

        let payload = OrderPayload {
            customer: CustomerSection::new(
                &form.customer,
                DeliveryAddress::new(self.country.clone(), address),
            ),
            order: OrderSection {
                partner_id: self.partner_id,
                delivery_type: form.delivery_type,
                requested_delivery_time: to_iso_utc(requested_at),
                tip_amount: totals.tip_amount,
                note: form.driver_note.clone(),
                items,
            },
            payment: PaymentSection {
                method: payment.method(),
            },
        };

        Ok(AssembledOrder {
            payload,
            totals,
            requested_at,
        })
    }

    pub fn validate(&self, form: &CheckoutForm, basket: &Basket) -> AppResult<()> {
        validate_checkout(form, basket)
    }
}

/// The submission gate: every required field present, then an address that
/// passes the validator. Runs before any network call.
pub fn validate_checkout(form: &CheckoutForm, basket: &Basket) -> AppResult<()> {
    let missing = missing_fields(form, basket);
    if !missing.is_empty() {
        return Err(AppError::MissingFields(missing));
    }

    if !is_valid_address(&form.address) {
        return Err(AppError::InvalidAddress(form.address.clone()));
    }

    Ok(())
}

pub fn snapshot_for(
    order_id: OrderId,
    assembled: &AssembledOrder,
    basket: &Basket,
    now: DateTime<FixedOffset>,
) -> OrderSnapshot {
    let payload = &assembled.payload;
    let stamp = to_iso_utc(now);

    OrderSnapshot {
        id: order_id,
        partner_id: Some(payload.order.partner_id),
        customer: Some(payload.customer.clone()),
        delivery_type: Some(payload.order.delivery_type),
        status: "Pending".to_string(),
        status_timestamp: None,
        requested_delivery_time: Some(payload.order.requested_delivery_time.clone()),
        tip_amount: assembled.totals.tip_amount,
        total_amount: assembled.totals.total_payable,
        total_items: basket.item_count(),
        items: basket
            .lines()
            .iter()
            .map(|line| SnapshotItem {
                catalog_item_id: line.catalog_item_id,
                quantity: line.quantity,
                price: line.price,
                name: line.name.clone(),
            })
            .collect(),
        payment: Some(PaymentSnapshot {
            method: payload.payment.method.as_str().to_string(),
            status: Some("pending".to_string()),
        }),
        created_at: Some(stamp.clone()),
        updated_at: Some(stamp),
        delivery_fee: Some(assembled.totals.delivery_fee),
    }
}
