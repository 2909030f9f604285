use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// One entry of the market directory. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub name: Option<String>,
    pub address: Option<String>,
    pub office_phone: Option<String>,
    pub home_phone: Option<String>,
    pub website: Option<String>,
    pub zipcode: Option<String>,
}

impl MarketRecord {
    /// True when none of the extracted fields were found in the cell.
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|field| self.get(*field).is_none())
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => self.name.as_deref(),
            Field::Address => self.address.as_deref(),
            Field::OfficePhone => self.office_phone.as_deref(),
            Field::HomePhone => self.home_phone.as_deref(),
            Field::Website => self.website.as_deref(),
        }
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Address => &mut self.address,
            Field::OfficePhone => &mut self.office_phone,
            Field::HomePhone => &mut self.home_phone,
            Field::Website => &mut self.website,
        };
        *slot = value;
    }
}

impl Display for MarketRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name.as_deref().unwrap_or("[unnamed market]"))?;
        if let Some(zip) = &self.zipcode {
            write!(f, " ({})", zip)?;
        }
        if let Some(address) = &self.address {
            write!(f, "\n     Address:      {}", address)?;
        }
        if let Some(phone) = &self.office_phone {
            write!(f, "\n     Office Phone: {}", phone)?;
        }
        if let Some(phone) = &self.home_phone {
            write!(f, "\n     Home Phone:   {}", phone)?;
        }
        if let Some(website) = &self.website {
            write!(f, "\n     Web Site:     {}", website)?;
        }
        Ok(())
    }
}

/// The directory fields the extractor knows how to find in a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Address,
    OfficePhone,
    HomePhone,
    Website,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::Address,
        Field::OfficePhone,
        Field::HomePhone,
        Field::Website,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Address => "address",
            Field::OfficePhone => "office_phone",
            Field::HomePhone => "home_phone",
            Field::Website => "website",
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Census statistics for a single ZIP code tabulation area. A statistic the
/// Census Bureau did not publish for this area is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicRecord {
    pub zipcode: String,
    pub total_population: Option<i64>,
    pub median_income: Option<i64>,
    pub pop_18_30: Option<i64>,
}

/// A market row left-joined with the demographics of its ZIP code.
///
/// Field order is the column order of the exported table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub name: Option<String>,
    pub address: Option<String>,
    pub office_phone: Option<String>,
    pub home_phone: Option<String>,
    pub website: Option<String>,
    pub zipcode: Option<String>,
    pub total_population: Option<i64>,
    pub median_income: Option<i64>,
    pub pop_18_30: Option<i64>,
}

impl MergedRecord {
    pub fn new(market: MarketRecord, demographics: Option<&DemographicRecord>) -> Self {
        Self {
            name: market.name,
            address: market.address,
            office_phone: market.office_phone,
            home_phone: market.home_phone,
            website: market.website,
            zipcode: market.zipcode,
            total_population: demographics.and_then(|d| d.total_population),
            median_income: demographics.and_then(|d| d.median_income),
            pop_18_30: demographics.and_then(|d| d.pop_18_30),
        }
    }

    /// True when at least one demographic value was joined onto the market.
    pub fn is_matched(&self) -> bool {
        self.total_population.is_some()
            || self.median_income.is_some()
            || self.pop_18_30.is_some()
    }

    pub fn market_field(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => self.name.as_deref(),
            Field::Address => self.address.as_deref(),
            Field::OfficePhone => self.office_phone.as_deref(),
            Field::HomePhone => self.home_phone.as_deref(),
            Field::Website => self.website.as_deref(),
        }
    }
}

impl Display for MergedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name.as_deref().unwrap_or("[unnamed market]"))?;
        match &self.zipcode {
            Some(zip) => write!(f, " · {}", zip)?,
            None => write!(f, " · no ZIP")?,
        }
        if !self.is_matched() {
            return write!(f, "\n     [no census match]");
        }
        write!(
            f,
            "\n     Population: {} · Median income: {} · Aged 18-30: {}",
            display_count(self.total_population),
            display_count(self.median_income),
            display_count(self.pop_18_30)
        )
    }
}

fn display_count(value: Option<i64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}
