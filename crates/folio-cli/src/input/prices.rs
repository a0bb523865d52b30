use chrono::NaiveDate;
use folio_core::market_data::{PriceHistory, PriceObservation, PriceSource};
use folio_core::{FolioError, FolioResult};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

use crate::input::file;

/// Price table stored as CSV: header `date,<asset>,...`, ISO dates, one row
/// per date. An empty cell is a missing quote.
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn open(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            path: file::resolve_path(path)?,
        })
    }
}

impl PriceSource for CsvPriceSource {
    fn load(&self) -> FolioResult<PriceHistory> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| csv_error(&self.path, e))?;

        let headers = reader.headers().map_err(|e| csv_error(&self.path, e))?.clone();
        let mut columns = headers.iter();
        match columns.next() {
            Some(first) if first.trim().eq_ignore_ascii_case("date") => {}
            _ => return Err(invalid("header", "First column must be 'date'")),
        }
        let assets: Vec<String> = columns.map(|h| h.trim().to_string()).collect();

        let mut observations = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| csv_error(&self.path, e))?;
            let row = format!("row {}", i + 1);

            let raw_date = record.get(0).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
                .map_err(|e| invalid(&row, format!("Bad date '{}': {}", raw_date, e)))?;

            let prices = record
                .iter()
                .skip(1)
                .map(|cell| parse_price(cell.trim(), &row))
                .collect::<FolioResult<Vec<_>>>()?;
            observations.push(PriceObservation { date, prices });
        }

        debug!(
            path = %self.path.display(),
            assets = assets.len(),
            rows = observations.len(),
            "read price csv"
        );
        PriceHistory::new(assets, observations)
    }
}

fn parse_price(cell: &str, row: &str) -> FolioResult<Option<Decimal>> {
    if cell.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(cell)
        .map(Some)
        .map_err(|e| invalid(row, format!("Bad price '{}': {}", cell, e)))
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> FolioError {
    FolioError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

fn csv_error(path: &std::path::Path, e: csv::Error) -> FolioError {
    invalid("prices", format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        write!(std::fs::File::create(&path).unwrap(), "{}", contents).unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    #[test]
    fn test_reads_prices_with_gaps() {
        let (_dir, path) = write_csv(
            "date,SPY,TLT\n2024-01-02,470.5,98.1\n2024-01-03,,98.4\n2024-01-04,472.0,97.9\n",
        );
        let history = CsvPriceSource::open(&path).unwrap().load().unwrap();
        assert_eq!(history.assets(), &["SPY".to_string(), "TLT".to_string()]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.observations()[1].prices[0], None);
        assert_eq!(
            history.observations()[2].prices[0],
            Some(Decimal::from_str("472.0").unwrap())
        );
    }

    #[test]
    fn test_bad_date_names_row() {
        let (_dir, path) = write_csv("date,SPY\n2024-01-02,1\n01/03/2024,2\n");
        match CsvPriceSource::open(&path).unwrap().load().unwrap_err() {
            FolioError::InvalidInput { field, .. } => assert_eq!(field, "row 2"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_header_must_start_with_date() {
        let (_dir, path) = write_csv("ticker,SPY\n2024-01-02,1\n2024-01-03,2\n");
        assert!(matches!(
            CsvPriceSource::open(&path).unwrap().load(),
            Err(FolioError::InvalidInput { .. })
        ));
    }
}
