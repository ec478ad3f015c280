use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::lenient;

pub type PartnerId = i64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerProfile {
    #[serde(default)]
    pub id: Option<PartnerId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub min_preparation_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub delivery_fee: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub min_order_value: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NamedRef {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
}

/// A partner as listed by `GET partners/?city=`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PartnerSummary {
    #[serde(deserialize_with = "lenient::i64_required")]
    pub id: PartnerId,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_value")]
    pub business_type: Option<NamedRef>,
    #[serde(default, deserialize_with = "lenient::opt_value")]
    pub category: Option<NamedRef>,
}

impl PartnerSummary {
    pub fn is_restaurant(&self) -> bool {
        self.business_type
            .as_ref()
            .and_then(|kind| kind.name.as_deref())
            == Some("Restaurant")
    }

    pub fn category_name(&self) -> Option<&str> {
        self.category
            .as_ref()
            .and_then(|category| category.name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerListResponse {
    #[serde(default, deserialize_with = "lenient::vec_skipping_invalid")]
    pub partners: Vec<PartnerSummary>,
}

/// One weekday's opening window. `day_of_week` is 0 = Monday .. 6 = Sunday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub day_of_week: u8,
    #[serde(with = "wall_time")]
    pub opens_at: NaiveTime,
    #[serde(with = "wall_time")]
    pub closes_at: NaiveTime,
}

/// The hours endpoint answers with either a bare list or `{ "hours": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HoursResponse {
    List(Vec<OpeningHours>),
    Wrapped { hours: Vec<OpeningHours> },
}

impl HoursResponse {
    pub fn into_hours(self) -> Vec<OpeningHours> {
        match self {
            HoursResponse::List(hours) | HoursResponse::Wrapped { hours } => hours,
        }
    }
}

mod wall_time {
    use super::*;

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
            .map_err(|err| serde::de::Error::custom(format!("invalid time {raw:?}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;
    use serde_json::json;

    use super::{HoursResponse, PartnerListResponse, PartnerProfile};

    #[test]
    fn hours_accept_both_shapes() {
        let bare: HoursResponse = serde_json::from_value(json!([
            { "day_of_week": 0, "opens_at": "10:00", "closes_at": "21:30:00" }
        ]))
        .unwrap();
        let wrapped: HoursResponse = serde_json::from_value(json!({
            "hours": [{ "day_of_week": 0, "opens_at": "10:00:00", "closes_at": "21:30" }]
        }))
        .unwrap();

        let bare = bare.into_hours();
        assert_eq!(bare, wrapped.into_hours());
        assert_eq!(bare[0].closes_at, NaiveTime::from_hms_opt(21, 30, 0).unwrap());
    }

    #[test]
    fn profile_numbers_may_be_strings() {
        let profile: PartnerProfile = serde_json::from_value(json!({
            "id": 7,
            "min_preparation_time": "25",
            "delivery_fee": 39.0,
            "min_order_value": null
        }))
        .unwrap();

        assert_eq!(profile.min_preparation_time, Some(25));
        assert_eq!(profile.delivery_fee, Some(39));
        assert_eq!(profile.min_order_value, None);
    }

    #[test]
    fn partner_listing_reads_business_type_and_category() {
        let listing: PartnerListResponse = serde_json::from_value(json!({
            "partners": [
                { "id": 1, "name": "Burger Bar", "business_type": { "name": "Restaurant" },
                  "category": { "name": "Burgers" } },
                { "id": 2, "name": "Kiosk", "business_type": { "name": "Shop" }, "category": null },
                { "name": "no id" }
            ]
        }))
        .unwrap();

        assert_eq!(listing.partners.len(), 2);
        assert!(listing.partners[0].is_restaurant());
        assert_eq!(listing.partners[0].category_name(), Some("Burgers"));
        assert!(!listing.partners[1].is_restaurant());
        assert_eq!(listing.partners[1].category_name(), None);
    }
}
