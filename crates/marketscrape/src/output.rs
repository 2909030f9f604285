use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::types::{DemographicRecord, MarketRecord, MergedRecord};

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rows with a fixed column layout. The header is written even for an empty
/// table.
pub trait Tabular: Serialize {
    const COLUMNS: &'static [&'static str];
}

impl Tabular for MarketRecord {
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "address",
        "office_phone",
        "home_phone",
        "website",
        "zipcode",
    ];
}

impl Tabular for MergedRecord {
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "address",
        "office_phone",
        "home_phone",
        "website",
        "zipcode",
        "total_population",
        "median_income",
        "pop_18_30",
    ];
}

impl Tabular for DemographicRecord {
    const COLUMNS: &'static [&'static str] =
        &["zipcode", "total_population", "median_income", "pop_18_30"];
}

pub fn write_csv<T: Tabular, W: Write>(rows: &[T], writer: W) -> Result<(), OutputError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize, W: Write>(rows: &[T], mut writer: W) -> Result<(), OutputError> {
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_csv_file<T: Tabular>(rows: &[T], path: impl AsRef<Path>) -> Result<(), OutputError> {
    let path = path.as_ref();
    write_csv(rows, BufWriter::new(File::create(path)?))?;
    log::info!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_json_file<T: Serialize>(rows: &[T], path: impl AsRef<Path>) -> Result<(), OutputError> {
    let path = path.as_ref();
    write_json(rows, BufWriter::new(File::create(path)?))?;
    log::info!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(())
}
