use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::address::DeliveryAddress;
use crate::models::basket::CatalogItemId;
use crate::models::lenient;
use crate::models::partner::PartnerId;

pub type OrderId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    #[default]
    Delivery,
    Pickup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "credit_card")]
    Card,
    #[serde(rename = "mobile_pay")]
    MobilePay,
    #[serde(rename = "bank")]
    Bank,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "credit_card",
            PaymentMethod::MobilePay => "mobile_pay",
            PaymentMethod::Bank => "bank",
        }
    }
}

/// Payment fields entered at checkout. They gate submission but are not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDetails {
    Card {
        number: String,
        expiry: String,
        cvc: String,
    },
    MobilePay {
        phone: String,
    },
    Bank {
        registration: String,
        account: String,
        iban: String,
        swift: String,
    },
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Card { .. } => PaymentMethod::Card,
            PaymentDetails::MobilePay { .. } => PaymentMethod::MobilePay,
            PaymentDetails::Bank { .. } => PaymentMethod::Bank,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerSection {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub first_name: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub last_name: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub phone_number: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub address: DeliveryAddress,
}

impl CustomerSection {
    pub fn new(info: &CustomerInfo, address: DeliveryAddress) -> Self {
        Self {
            first_name: info.first_name.clone(),
            last_name: info.last_name.clone(),
            email: info.email.clone(),
            phone_number: info.phone_number.clone(),
            address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemPayload {
    pub catalog_item_id: CatalogItemId,
    pub quantity: u32,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSection {
    pub partner_id: PartnerId,
    pub delivery_type: DeliveryType,
    /// ISO-8601, UTC.
    pub requested_delivery_time: String,
    pub tip_amount: i64,
    pub note: String,
    pub items: Vec<OrderItemPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSection {
    pub method: PaymentMethod,
}

/// Body of `POST orders/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub customer: CustomerSection,
    pub order: OrderSection,
    pub payment: PaymentSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub id: OrderId,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Dispatched,
    Delivered,
    Cancelled,
    Failed,
    Unknown,
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "preparing" => OrderStatus::Preparing,
            "ready" => OrderStatus::Ready,
            "dispatched" => OrderStatus::Dispatched,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            "failed" => OrderStatus::Failed,
            _ => OrderStatus::Unknown,
        }
    }

    /// Position on the four-step progress bar.
    pub fn progress_step(&self) -> u8 {
        match self {
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Unknown => 1,
            OrderStatus::Preparing => 2,
            OrderStatus::Ready | OrderStatus::Dispatched => 3,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSnapshotItem")]
pub struct SnapshotItem {
    pub catalog_item_id: CatalogItemId,
    pub quantity: u32,
    pub price: i64,
    pub name: String,
}

/// Live order lines name the catalog item `catalog_item_id` or just `id`.
#[derive(Deserialize)]
struct RawSnapshotItem {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    catalog_item_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::u32_or_zero")]
    quantity: u32,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    price: i64,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    name: String,
}

impl From<RawSnapshotItem> for SnapshotItem {
    fn from(raw: RawSnapshotItem) -> Self {
        Self {
            catalog_item_id: raw.catalog_item_id.or(raw.id).unwrap_or(0),
            quantity: raw.quantity,
            price: raw.price,
            name: raw.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub method: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
}

/// Denormalized order as shown on the tracking view. Live orders from the API
/// and the locally cached fallback copy share this shape.
///
/// Only `id` is required. Every other field degrades to empty when it is
/// missing, `null` or of an unexpected type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    #[serde(deserialize_with = "lenient::i64_required")]
    pub id: OrderId,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub partner_id: Option<PartnerId>,
    #[serde(default, deserialize_with = "lenient::opt_value")]
    pub customer: Option<CustomerSection>,
    #[serde(default, deserialize_with = "lenient::opt_value")]
    pub delivery_type: Option<DeliveryType>,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub requested_delivery_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub tip_amount: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub total_amount: i64,
    #[serde(default, deserialize_with = "lenient::u32_or_zero")]
    pub total_items: u32,
    #[serde(default, deserialize_with = "lenient::vec_skipping_invalid")]
    pub items: Vec<SnapshotItem>,
    #[serde(default, deserialize_with = "lenient::opt_value")]
    pub payment: Option<PaymentSnapshot>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub delivery_fee: Option<i64>,
}

impl OrderSnapshot {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::parse(&self.status)
    }

    /// `created_at` as an instant. Timestamps without an offset are UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|instant| instant.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
            })
            .ok()
    }

    /// Orders in the history list that open the tracking view when selected.
    pub fn opens_tracking(&self) -> bool {
        matches!(self.status(), OrderStatus::Pending | OrderStatus::Ready)
    }
}

/// Sorts by creation time, newest first. Orders without a readable
/// `created_at` go last.
pub fn sort_newest_first(orders: &mut [OrderSnapshot]) {
    orders.sort_by_key(|order| std::cmp::Reverse(order.created_at_utc()));
}

/// Order listings answer with a list, `{orders: [...]}` or `{results: [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OrderListResponse {
    List(Vec<OrderSnapshot>),
    Orders { orders: Vec<OrderSnapshot> },
    Results { results: Vec<OrderSnapshot> },
}

impl OrderListResponse {
    pub fn into_orders(self) -> Vec<OrderSnapshot> {
        match self {
            OrderListResponse::List(orders)
            | OrderListResponse::Orders { orders }
            | OrderListResponse::Results { results: orders } => orders,
        }
    }

    pub fn into_first(self) -> Option<OrderSnapshot> {
        self.into_orders().into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{OrderListResponse, OrderSnapshot, OrderStatus, PaymentMethod, sort_newest_first};

    #[test]
    fn payment_method_uses_wire_tags() {
        assert_eq!(
            serde_json::to_value(PaymentMethod::MobilePay).unwrap(),
            json!("mobile_pay")
        );
        assert_eq!(PaymentMethod::Card.as_str(), "credit_card");
    }

    #[test]
    fn progress_steps_group_statuses() {
        assert_eq!(OrderStatus::parse("Pending").progress_step(), 1);
        assert_eq!(OrderStatus::parse("preparing").progress_step(), 2);
        assert_eq!(OrderStatus::parse("dispatched").progress_step(), 3);
        assert_eq!(OrderStatus::parse("cancelled").progress_step(), 4);
        assert_eq!(OrderStatus::parse("weird").progress_step(), 1);
        assert!(OrderStatus::parse("delivered").is_terminal());
    }

    #[test]
    fn order_list_accepts_all_envelopes() {
        for body in [
            json!([{ "id": 4, "status": "pending" }]),
            json!({ "orders": [{ "id": 4, "status": "pending" }] }),
            json!({ "results": [{ "id": 4, "status": "pending" }] }),
        ] {
            let parsed: OrderListResponse = serde_json::from_value(body).unwrap();
            assert_eq!(parsed.into_first().unwrap().id, 4);
        }

        let empty: OrderListResponse = serde_json::from_value(json!([])).unwrap();
        assert!(empty.into_first().is_none());
    }

    #[test]
    fn live_order_with_null_address_detail_still_decodes() {
        let body = json!([{
            "id": 4,
            "status": "preparing",
            "customer": {
                "first_name": "Mette",
                "last_name": "Hansen",
                "email": "mette@example.dk",
                "phone_number": "12345678",
                "address": {
                    "country": "Denmark",
                    "city": "Aarhus",
                    "street": "Vestergade 12",
                    "postal_code": "8000",
                    "address_detail": null,
                    "longitude": null,
                    "latitude": null
                }
            }
        }]);

        let order = serde_json::from_value::<OrderListResponse>(body)
            .unwrap()
            .into_first()
            .unwrap();
        let customer = order.customer.unwrap();
        assert_eq!(customer.first_name, "Mette");
        assert_eq!(customer.address.city, "Aarhus");
        assert_eq!(customer.address.address_detail, "");
    }

    #[test]
    fn null_counts_and_status_default_to_empty() {
        let body = json!([{ "id": 4, "status": null, "total_items": null, "items": null }]);

        let order = serde_json::from_value::<OrderListResponse>(body)
            .unwrap()
            .into_first()
            .unwrap();
        assert_eq!(order.total_items, 0);
        assert_eq!(order.status, "");
        assert_eq!(order.status(), OrderStatus::Unknown);
        assert!(order.items.is_empty());
    }

    #[test]
    fn order_lines_keyed_by_id_with_decimal_prices() {
        let body = json!([{
            "id": "4",
            "status": "preparing",
            "items": [
                { "id": 1, "quantity": 2, "price": "50.00", "name": "Burger" },
                { "catalog_item_id": 9, "id": 77, "quantity": "1", "price": 25 },
                "garbage"
            ]
        }]);

        let order = serde_json::from_value::<OrderListResponse>(body)
            .unwrap()
            .into_first()
            .unwrap();
        assert_eq!(order.id, 4);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].catalog_item_id, 1);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[0].price, 50);
        assert_eq!(order.items[0].name, "Burger");
        assert_eq!(order.items[1].catalog_item_id, 9);
        assert_eq!(order.items[1].quantity, 1);
    }

    #[test]
    fn unknown_delivery_type_and_payment_shape_are_dropped() {
        let order: OrderSnapshot = serde_json::from_value(json!({
            "id": 4,
            "delivery_type": "drone",
            "payment": "paid",
            "customer": null
        }))
        .unwrap();

        assert_eq!(order.delivery_type, None);
        assert_eq!(order.payment, None);
        assert_eq!(order.customer, None);
    }

    #[test]
    fn order_without_id_is_rejected() {
        assert!(serde_json::from_value::<OrderSnapshot>(json!({ "status": "pending" })).is_err());
    }

    #[test]
    fn history_sorts_newest_first_with_undated_orders_last() {
        let mut orders = serde_json::from_value::<OrderListResponse>(json!({ "orders": [
            { "id": 1, "created_at": "2025-05-30T10:00:00Z" },
            { "id": 2, "created_at": null },
            { "id": 3, "created_at": "2025-06-01T08:15:00.123456" },
            { "id": 4, "created_at": "2025-05-31T12:00:00+02:00" }
        ]}))
        .unwrap()
        .into_orders();

        sort_newest_first(&mut orders);
        let ids: Vec<i64> = orders.iter().map(|order| order.id).collect();
        assert_eq!(ids, vec![3, 4, 1, 2]);
    }

    #[test]
    fn only_pending_and_ready_orders_open_tracking() {
        let order = |status: &str| OrderSnapshot {
            id: 1,
            status: status.to_string(),
            ..OrderSnapshot::default()
        };
        assert!(order("pending").opens_tracking());
        assert!(order("Ready").opens_tracking());
        assert!(!order("delivered").opens_tracking());
        assert!(!order("preparing").opens_tracking());
    }
}
