use std::collections::HashSet;

use crate::types::{Field, MergedRecord};

#[derive(Debug)]
pub struct MergeStats {
    pub total: usize,
    pub with_zipcode: usize,
    pub matched: usize,
    pub unique_zipcodes: usize,
    pub missing: Vec<(Field, usize)>,
}

impl MergeStats {
    pub fn from_merged(rows: &[MergedRecord]) -> MergeStats {
        let zipcodes: HashSet<&str> = rows.iter().filter_map(|r| r.zipcode.as_deref()).collect();

        MergeStats {
            total: rows.len(),
            with_zipcode: rows.iter().filter(|r| r.zipcode.is_some()).count(),
            matched: rows.iter().filter(|r| r.is_matched()).count(),
            unique_zipcodes: zipcodes.len(),
            missing: Field::ALL
                .iter()
                .map(|&field| {
                    let count = rows
                        .iter()
                        .filter(|r| r.market_field(field).is_none())
                        .count();
                    (field, count)
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for MergeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Markets:             {}", self.total)?;
        writeln!(f, "  With ZIP code:       {}", self.with_zipcode)?;
        writeln!(f, "  Unique ZIP codes:    {}", self.unique_zipcodes)?;
        writeln!(f, "  Matched with census: {}", self.matched)?;
        writeln!(f, "  Missing values:")?;
        for (field, count) in &self.missing {
            writeln!(f, "    {:<14} {}", field.column(), count)?;
        }
        Ok(())
    }
}
