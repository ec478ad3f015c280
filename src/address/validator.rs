use std::sync::LazyLock;

use regex::Regex;

struct AddressRules {
    house_number: Regex,
    street_name: Regex,
    postal_code: Regex,
    city: Regex,
}

static RULES: LazyLock<AddressRules> = LazyLock::new(|| AddressRules {
    house_number: Regex::new(r"[0-9]+").expect("valid house number pattern"),
    street_name: Regex::new(r"[A-Za-zæøåÆØÅ]{2,}").expect("valid street name pattern"),
    postal_code: Regex::new(r"(?-u:\b)[0-9]{4,5}(?-u:\b)").expect("valid postal code pattern"),
    city: Regex::new(r"[A-Za-zæøåÆØÅ]{2,}(?: [A-Za-zæøåÆØÅ0-9]{1,3})*$")
        .expect("valid city pattern"),
});

/// Client-side gate for address submission. Accepting an address says nothing
/// about whether it can be geocoded. Digits and word boundaries are ASCII-only.
pub fn is_valid_address(address: &str) -> bool {
    let rules = &*RULES;
    rules.house_number.is_match(address)
        && rules.street_name.is_match(address)
        && rules.city.is_match(address)
        && rules.postal_code.is_match(address)
}
