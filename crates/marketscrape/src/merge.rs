use std::collections::HashMap;

use crate::types::{DemographicRecord, MarketRecord, MergedRecord};

/// Read-only access to demographics by ZIP code.
pub trait DemographicLookup {
    fn lookup(&self, zipcode: &str) -> Option<&DemographicRecord>;
}

impl DemographicLookup for HashMap<String, DemographicRecord> {
    fn lookup(&self, zipcode: &str) -> Option<&DemographicRecord> {
        self.get(zipcode)
    }
}

/// Left join of markets with demographics on ZIP code.
///
/// Every market appears exactly once, in input order. Markets without a ZIP
/// code or without a census match keep empty demographic columns.
pub fn join<L>(markets: Vec<MarketRecord>, demographics: &L) -> Vec<MergedRecord>
where
    L: DemographicLookup + ?Sized,
{
    let merged: Vec<MergedRecord> = markets
        .into_iter()
        .map(|market| {
            let census = market
                .zipcode
                .as_deref()
                .and_then(|zip| demographics.lookup(zip));
            MergedRecord::new(market, census)
        })
        .collect();

    log::info!(
        "Merged {} market(s), {} with census data",
        merged.len(),
        merged.iter().filter(|m| m.is_matched()).count()
    );
    merged
}
