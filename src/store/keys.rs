pub const PRIMARY_ADDRESS: &str = "primary_address";
pub const RECENT_ADDRESSES: &str = "recent_addresses";
pub const LAST_ORDER_FALLBACK: &str = "last_order_fallback";
pub const BASKET: &str = "basket";
pub const NOTES: &str = "notes";
pub const LAST_PARTNER_ID: &str = "lastPartnerId";
pub const LANGUAGE: &str = "app_language";
pub const LOGGED_IN_EMAIL: &str = "logged_in_email";
pub const FIRST_NAME: &str = "user_first_name";
pub const LAST_NAME: &str = "user_last_name";
pub const PHONE: &str = "user_phone";
pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
