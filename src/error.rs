use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    FirstName,
    LastName,
    Email,
    Phone,
    Address,
    PaymentMethod,
    Basket,
    CardNumber,
    CardExpiry,
    CardCvc,
    MobilePayPhone,
    BankRegistration,
    BankAccount,
    Iban,
    Swift,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MissingField::FirstName => "first name",
            MissingField::LastName => "last name",
            MissingField::Email => "email",
            MissingField::Phone => "phone",
            MissingField::Address => "address",
            MissingField::PaymentMethod => "payment method",
            MissingField::Basket => "order",
            MissingField::CardNumber => "card number",
            MissingField::CardExpiry => "expiry",
            MissingField::CardCvc => "CVC",
            MissingField::MobilePayPhone => "MobilePay phone",
            MissingField::BankRegistration => "reg. nr.",
            MissingField::BankAccount => "account no.",
            MissingField::Iban => "IBAN",
            MissingField::Swift => "SWIFT/BIC",
        };
        f.write_str(label)
    }
}

fn join_fields(fields: &[MissingField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<MissingField>),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("not authenticated")]
    Unauthorized,

    #[error("api returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("order was not accepted (status {status})")]
    OrderRejected { status: u16 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation failures are reported before any network call and never retried.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::MissingFields(_) | AppError::InvalidAddress(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::{AppError, MissingField};

    #[test]
    fn missing_fields_message_lists_every_field() {
        let err = AppError::MissingFields(vec![MissingField::Email, MissingField::Iban]);
        assert_eq!(err.to_string(), "missing required fields: email, IBAN");
        assert!(err.is_validation());
    }

    #[test]
    fn transport_errors_are_not_validation() {
        let err = AppError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!err.is_validation());
    }
}
