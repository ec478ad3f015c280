use std::sync::LazyLock;

use regex::Regex;

use crate::models::address::Address;

static FULL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+([0-9]{4,5})\s+(.+)$").expect("valid full address pattern")
});

static POSTAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*?)([0-9]{4,5})\s*(.*)").expect("valid postal code pattern"));

static LISTING_CITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]{4}\s*([A-Za-zæøåÆØÅ\- ]+)").expect("valid listing city pattern")
});

static EDGE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[,\s]+|[,\s]+$").expect("valid edge separator pattern"));

static INNER_COMMAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("valid comma pattern"));

/// Splits a free-text address into street, postal code and city.
///
/// Never fails: input without a 4-5 digit run becomes all street.
pub fn parse_address(input: &str) -> Address {
    let clean = input.replace(',', "");
    let clean = clean.trim();

    let captures = FULL_ADDRESS
        .captures(clean)
        .or_else(|| POSTAL_RUN.captures(clean));

    match captures {
        Some(caps) => Address {
            street: caps[1].trim().to_string(),
            postal_code: caps[2].trim().to_string(),
            city: caps[3].trim().to_string(),
            ..Address::default()
        },
        None => Address {
            street: clean.to_string(),
            ..Address::default()
        },
    }
}

/// The city used to look up restaurants for a selected address: the first
/// word after a 4-digit postal code in the last comma-separated part, or
/// else the second word of that part.
pub fn listing_city(address: &str) -> Option<String> {
    let last_part = address.rsplit(',').next().unwrap_or_default().trim();

    let city = match LISTING_CITY.captures(last_part) {
        Some(caps) => caps.get(1).unwrap().as_str().trim().split(' ').next().unwrap_or_default(),
        None => last_part.split(' ').nth(1).unwrap_or(last_part),
    };

    let city = city.trim();
    (!city.is_empty()).then(|| city.to_string())
}

/// Drops leading/trailing separators and normalizes inner commas to single spaces.
pub fn prune_commas(input: &str) -> String {
    let trimmed = EDGE_SEPARATORS.replace_all(input, "");
    INNER_COMMAS.replace_all(&trimmed, " ").into_owned()
}
