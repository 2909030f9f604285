use std::sync::LazyLock;

use regex::Regex;

use crate::types::MarketRecord;

static RE_ZIPCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}\b").expect("invalid regex: zipcode"));

/// First standalone five digit token of an address. Not validated against any
/// ZIP database.
pub fn zipcode_from_address(address: &str) -> Option<String> {
    RE_ZIPCODE.find(address).map(|m| m.as_str().to_string())
}

pub fn resolve_zipcode(market: &MarketRecord) -> Option<String> {
    market.address.as_deref().and_then(zipcode_from_address)
}

pub fn assign_zipcodes(markets: &mut [MarketRecord]) {
    for market in markets.iter_mut() {
        market.zipcode = resolve_zipcode(market);
    }

    let resolved = markets.iter().filter(|m| m.zipcode.is_some()).count();
    log::info!(
        "Resolved ZIP codes for {} of {} markets",
        resolved,
        markets.len()
    );
}
