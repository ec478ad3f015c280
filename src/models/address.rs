use serde::{Deserialize, Serialize};

use crate::models::lenient;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub address_detail: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl Address {
    pub fn with_coordinates(mut self, coords: Option<Coordinates>) -> Self {
        self.longitude = coords.map(|c| c.longitude);
        self.latitude = coords.map(|c| c.latitude);
        self
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// Address as sent inside the customer section of an order. Reading it back
/// from the API tolerates missing and `null` fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub street: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub postal_code: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub address_detail: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub latitude: Option<f64>,
}

impl DeliveryAddress {
    pub fn new(country: impl Into<String>, address: &Address) -> Self {
        Self {
            country: country.into(),
            city: address.city.clone(),
            street: address.street.clone(),
            postal_code: address.postal_code.clone(),
            address_detail: address.address_detail.clone(),
            longitude: address.longitude,
            latitude: address.latitude,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionData {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    #[serde(rename = "tekst", default)]
    pub text: String,
    #[serde(default)]
    pub data: Option<SuggestionData>,
}

impl AddressSuggestion {
    /// `x` is longitude and `y` is latitude.
    pub fn coordinates(&self) -> Option<Coordinates> {
        let data = self.data.as_ref()?;
        match (data.x, data.y) {
            (Some(x), Some(y)) => Some(Coordinates {
                latitude: y,
                longitude: x,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AddressSuggestion, DeliveryAddress};

    #[test]
    fn suggestion_maps_x_to_longitude() {
        let suggestion: AddressSuggestion = serde_json::from_value(json!({
            "tekst": "Fiolstræde 10, 1171 København K",
            "data": { "x": 12.5721, "y": 55.6796 }
        }))
        .unwrap();

        let coords = suggestion.coordinates().unwrap();
        assert_eq!(coords.longitude, 12.5721);
        assert_eq!(coords.latitude, 55.6796);
    }

    #[test]
    fn suggestion_without_data_has_no_coordinates() {
        let suggestion: AddressSuggestion =
            serde_json::from_value(json!({ "tekst": "Fiolstræde" })).unwrap();
        assert!(suggestion.coordinates().is_none());
    }

    #[test]
    fn delivery_address_tolerates_nulls_and_numeric_postal_codes() {
        let address: DeliveryAddress = serde_json::from_value(json!({
            "country": "Denmark",
            "city": "Aarhus",
            "street": "Vestergade 12",
            "postal_code": 8000,
            "address_detail": null,
            "latitude": "56.1572"
        }))
        .unwrap();

        assert_eq!(address.postal_code, "8000");
        assert_eq!(address.address_detail, "");
        assert_eq!(address.latitude, Some(56.1572));
        assert_eq!(address.longitude, None);
    }
}
