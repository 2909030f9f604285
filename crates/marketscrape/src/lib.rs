pub mod census;
pub mod crawler;
pub mod fetcher;
pub mod merge;
pub mod output;
pub mod parser;
pub mod types;
pub mod utils;
pub mod zipcode;

pub use census::{CensusClient, CensusError, CensusQuery, DemographicTable};
pub use crawler::{CrawlConfig, Crawler};
pub use fetcher::{FetchError, HttpFetcher, PageFetcher};
pub use merge::{DemographicLookup, join};

/// Farmers' markets listed in the NC Farm Fresh directory.
pub const DIRECTORY_URL: &str =
    "https://www.ncfarmfresh.com/directory.asp?product=17&SearchType=farmmarkets";
