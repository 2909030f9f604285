use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::merge::DemographicLookup;
use crate::types::DemographicRecord;

const CENSUS_API_URL: &str = "https://api.census.gov/data";

const ZCTA_COLUMN: &str = "zip code tabulation area";

/// Total population.
pub const TOTAL_POPULATION: &str = "B01003_001E";
/// Median household income in the past 12 months.
pub const MEDIAN_INCOME: &str = "B19013_001E";
/// Male and female population bands covering ages 18 to 29.
pub const POP_18_30_BANDS: [&str; 10] = [
    "B01001_007E",
    "B01001_008E",
    "B01001_009E",
    "B01001_010E",
    "B01001_011E",
    "B01001_031E",
    "B01001_032E",
    "B01001_033E",
    "B01001_034E",
    "B01001_035E",
];

#[derive(Debug, thiserror::Error)]
pub enum CensusError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid census URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Invalid census response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Census response has no header row")]
    EmptyResponse,
    #[error("Census response is missing column: {0}")]
    MissingColumn(String),
}

/// ACS 5-year estimates for every ZIP code tabulation area of one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusQuery {
    pub year: u16,
    /// FIPS code of the state, e.g. "37" for North Carolina.
    pub state: String,
}

impl Default for CensusQuery {
    fn default() -> Self {
        Self {
            year: 2019,
            state: "37".to_string(),
        }
    }
}

impl CensusQuery {
    pub fn variables() -> Vec<&'static str> {
        let mut vars = vec![TOTAL_POPULATION, MEDIAN_INCOME];
        vars.extend(POP_18_30_BANDS);
        vars
    }

    pub fn request_url(&self, base_url: &str, api_key: Option<&str>) -> Result<Url, CensusError> {
        let endpoint = format!("{}/{}/acs/acs5", base_url, self.year);

        let mut params = vec![
            ("get", Self::variables().join(",")),
            ("for", format!("{}:*", ZCTA_COLUMN)),
            ("in", format!("state:{}", self.state)),
        ];
        if let Some(key) = api_key {
            params.push(("key", key.to_string()));
        }

        Ok(Url::parse_with_params(&endpoint, &params)?)
    }
}

#[derive(Debug, Clone)]
pub struct CensusClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CensusClient {
    pub fn new(api_key: Option<String>) -> Result<Self, CensusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: CENSUS_API_URL.to_string(),
            api_key,
        })
    }

    pub async fn fetch_demographics(
        &self,
        query: &CensusQuery,
    ) -> Result<DemographicTable, CensusError> {
        let url = query.request_url(&self.base_url, self.api_key.as_deref())?;
        log::info!(
            "Fetching census data for state {} ({} ACS 5-year)...",
            query.state,
            query.year
        );

        let body = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        let records = parse_census_response(&body)?;
        log::info!("Fetched census data for {} ZIP codes", records.len());
        Ok(DemographicTable::from_records(records))
    }
}

/// Positions of the columns we read in a census response.
struct CensusColumns {
    zipcode: usize,
    total_population: usize,
    median_income: usize,
    pop_18_30: Vec<usize>,
}

impl CensusColumns {
    fn from_header(header: &[Option<String>]) -> Result<Self, CensusError> {
        let column = |name: &str| {
            header
                .iter()
                .position(|h| h.as_deref() == Some(name))
                .ok_or_else(|| CensusError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            zipcode: column(ZCTA_COLUMN)?,
            total_population: column(TOTAL_POPULATION)?,
            median_income: column(MEDIAN_INCOME)?,
            pop_18_30: POP_18_30_BANDS
                .iter()
                .map(|&name| column(name))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    /// Only the ZIP code is required. A `null` or non numeric statistic is
    /// `None`, and so is `pop_18_30` when any of its bands is.
    fn record(&self, row: &[Option<String>]) -> Option<DemographicRecord> {
        Some(DemographicRecord {
            zipcode: row.get(self.zipcode)?.clone()?,
            total_population: cell_i64(row, self.total_population),
            median_income: cell_i64(row, self.median_income),
            pop_18_30: self
                .pop_18_30
                .iter()
                .map(|&col| cell_i64(row, col))
                .sum::<Option<i64>>(),
        })
    }
}

fn cell_i64(row: &[Option<String>], col: usize) -> Option<i64> {
    row.get(col)?.as_deref()?.trim().parse().ok()
}

/// Parses the Census API table format: a JSON array of rows whose first row
/// names the columns. Rows without a ZIP code are skipped.
pub fn parse_census_response(body: &str) -> Result<Vec<DemographicRecord>, CensusError> {
    let rows: Vec<Vec<Option<String>>> = serde_json::from_str(body)?;
    let mut rows = rows.into_iter();
    let header = rows.next().ok_or(CensusError::EmptyResponse)?;
    let columns = CensusColumns::from_header(&header)?;

    let mut records = Vec::new();
    for row in rows {
        match columns.record(&row) {
            Some(record) => {
                if record.total_population.is_none()
                    || record.median_income.is_none()
                    || record.pop_18_30.is_none()
                {
                    log::debug!("Census row with missing values: {:?}", row);
                }
                records.push(record);
            }
            None => log::warn!("Skipping census row without a ZIP code: {:?}", row),
        }
    }

    Ok(records)
}

/// Demographics indexed by ZIP code. The first row seen for a ZIP code wins.
#[derive(Debug, Clone, Default)]
pub struct DemographicTable {
    records: Vec<DemographicRecord>,
    index: HashMap<String, usize>,
}

impl DemographicTable {
    pub fn from_records(records: impl IntoIterator<Item = DemographicRecord>) -> Self {
        let mut table = Self::default();
        let mut duplicates = 0;

        for record in records {
            if table.index.contains_key(&record.zipcode) {
                duplicates += 1;
                continue;
            }
            table
                .index
                .insert(record.zipcode.clone(), table.records.len());
            table.records.push(record);
        }

        if duplicates > 0 {
            log::warn!("Ignored {} duplicate census row(s)", duplicates);
        }
        table
    }

    /// Reads a table with the columns `zipcode,total_population,median_income,pop_18_30`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CensusError> {
        let records = csv::Reader::from_reader(reader)
            .deserialize()
            .collect::<Result<Vec<DemographicRecord>, _>>()?;
        Ok(Self::from_records(records))
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, CensusError> {
        let records = csv::Reader::from_path(path)?
            .deserialize()
            .collect::<Result<Vec<DemographicRecord>, _>>()?;
        Ok(Self::from_records(records))
    }

    pub fn records(&self) -> &[DemographicRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DemographicLookup for DemographicTable {
    fn lookup(&self, zipcode: &str) -> Option<&DemographicRecord> {
        self.index.get(zipcode).map(|&i| &self.records[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"[
        ["B01003_001E","B19013_001E","B01001_007E","B01001_008E","B01001_009E","B01001_010E","B01001_011E","B01001_031E","B01001_032E","B01001_033E","B01001_034E","B01001_035E","state","zip code tabulation area"],
        ["23000","51000","100","50","40","200","300","90","60","30","210","320","37","27603"],
        ["4100","-666666666","10","5","4","20","30","9","6","3","21","32","37","28607"],
        ["700",null,"1","1","1","1","1","1","1","1","1","1","37","27510"],
        ["1200","45000","1","1","1","1","1","1","1","1","1","1","37","27603"],
        ["90","n/a","1",null,"1","1","1","1","1","1","1","1","37","27999"],
        ["50","40000","1","1","1","1","1","1","1","1","1","1","37",null]
    ]"#;

    #[test]
    fn test_parse_census_response() {
        let records = parse_census_response(SAMPLE_RESPONSE).expect("Failed to parse census");

        assert_eq!(records.len(), 5, "only the row without a ZIP code is skipped");

        let raleigh = &records[0];
        assert_eq!(raleigh.zipcode, "27603");
        assert_eq!(raleigh.total_population, Some(23_000));
        assert_eq!(raleigh.median_income, Some(51_000));
        assert_eq!(raleigh.pop_18_30, Some(1_400));

        let boone = &records[1];
        assert_eq!(boone.zipcode, "28607");
        assert_eq!(boone.median_income, Some(-666_666_666));
        assert_eq!(boone.pop_18_30, Some(140));
    }

    #[test]
    fn test_parse_census_response_keeps_rows_with_missing_values() {
        let records = parse_census_response(SAMPLE_RESPONSE).expect("Failed to parse census");

        let carrboro = &records[2];
        assert_eq!(carrboro.zipcode, "27510");
        assert_eq!(carrboro.total_population, Some(700));
        assert!(carrboro.median_income.is_none());
        assert_eq!(carrboro.pop_18_30, Some(10));

        let partial = &records[4];
        assert_eq!(partial.zipcode, "27999");
        assert_eq!(partial.total_population, Some(90));
        assert!(partial.median_income.is_none(), "non numeric income");
        assert!(partial.pop_18_30.is_none(), "one age band is null");
    }

    #[test]
    fn test_parse_census_response_errors() {
        assert!(matches!(
            parse_census_response("[]"),
            Err(CensusError::EmptyResponse)
        ));
        assert!(matches!(
            parse_census_response(r#"[["B01003_001E","state"]]"#),
            Err(CensusError::MissingColumn(col)) if col == ZCTA_COLUMN
        ));
        assert!(matches!(
            parse_census_response("<html>Invalid Key</html>"),
            Err(CensusError::Json(_))
        ));
    }

    #[test]
    fn test_table_keeps_first_row_per_zipcode() {
        let records = parse_census_response(SAMPLE_RESPONSE).expect("Failed to parse census");
        let table = DemographicTable::from_records(records);

        assert_eq!(table.len(), 4);
        let raleigh = table.lookup("27603").expect("Should find 27603");
        assert_eq!(raleigh.total_population, Some(23_000));
        let carrboro = table.lookup("27510").expect("Should find 27510");
        assert_eq!(carrboro.total_population, Some(700));
        assert!(table.lookup("99999").is_none());
    }

    #[test]
    fn test_table_from_csv() {
        let csv = "zipcode,total_population,median_income,pop_18_30\n\
                   27603,23000,51000,1400\n\
                   02134,8000,60000,3000\n\
                   27510,700,,10\n";

        let table = DemographicTable::from_csv_reader(csv.as_bytes()).expect("Failed to read CSV");

        assert_eq!(table.len(), 3);
        let boston = table.lookup("02134").expect("leading zero is kept");
        assert_eq!(boston.pop_18_30, Some(3_000));
        let carrboro = table.lookup("27510").expect("Should find 27510");
        assert!(carrboro.median_income.is_none());
    }

    #[test]
    fn test_table_from_bad_csv() {
        let csv = "zipcode,total_population,median_income,pop_18_30\n27603,lots,51000,1400\n";

        assert!(matches!(
            DemographicTable::from_csv_reader(csv.as_bytes()),
            Err(CensusError::Csv(_))
        ));
    }

    #[test]
    fn test_request_url() {
        let url = CensusQuery::default()
            .request_url(CENSUS_API_URL, Some("secret"))
            .expect("Failed to build URL");

        assert_eq!(url.path(), "/data/2019/acs/acs5");

        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["for"], "zip code tabulation area:*");
        assert_eq!(params["in"], "state:37");
        assert_eq!(params["key"], "secret");
        assert!(params["get"].starts_with("B01003_001E,B19013_001E,B01001_007E"));
        assert_eq!(params["get"].split(',').count(), 12);

        let anonymous = CensusQuery {
            year: 2018,
            state: "45".to_string(),
        }
        .request_url(CENSUS_API_URL, None)
        .expect("Failed to build URL");
        assert_eq!(anonymous.path(), "/data/2018/acs/acs5");
        assert!(!anonymous.query_pairs().any(|(k, _)| k == "key"));
    }
}
