//! Free-text address handling: a submission gate and a heuristic parser.
//!
//! Both are tuned for Danish addresses (`<street> <house no.> <postal code> <city>`).
//! Multi-word city names and street names that contain digit runs are not
//! reliably split.

mod parser;
mod validator;

pub use parser::{listing_city, parse_address, prune_commas};
pub use validator::is_valid_address;
