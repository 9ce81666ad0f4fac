use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A VAT percentage valid for a region within a date window (end exclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatRate {
    pub region: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub basis_points: u32,
}

impl VatRate {
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.start <= date && self.end.map_or(true, |end| date < end)
    }

    pub fn percentage(&self) -> f64 {
        f64::from(self.basis_points) / 100.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VatError {
    #[error("failed to read VAT table: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse VAT table: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: '{value}' is not a YYYY-MM-DD date")]
    InvalidDate { row: usize, value: String },
    #[error("row {row}: '{value}' is not a percentage between 0 and 100")]
    InvalidPercentage { row: usize, value: String },
    #[error("row {row}: window ends before it starts")]
    InvalidWindow { row: usize },
}

#[derive(Debug, Deserialize)]
struct VatRow {
    region: String,
    start: String,
    end: Option<String>,
    percent: String,
}

/// Date-ranged VAT percentages by region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VatTable {
    rates: Vec<VatRate>,
}

impl VatTable {
    pub fn new(rates: Vec<VatRate>) -> Self {
        Self { rates }
    }

    /// Built-in rates for the regions the marketplace pays out in.
    pub fn standard() -> Self {
        let rate = |region: &str, start: (i32, u32, u32), end: Option<(i32, u32, u32)>, bps| {
            VatRate {
                region: region.to_string(),
                start: ymd(start),
                end: end.map(ymd),
                basis_points: bps,
            }
        };

        Self::new(vec![
            rate("GB", (2011, 1, 4), None, 2_000),
            rate("DE", (2007, 1, 1), Some((2020, 7, 1)), 1_900),
            rate("DE", (2020, 7, 1), Some((2021, 1, 1)), 1_600),
            rate("DE", (2021, 1, 1), None, 1_900),
            rate("FR", (2014, 1, 1), None, 2_000),
            rate("IE", (2012, 1, 1), Some((2020, 9, 1)), 2_300),
            rate("IE", (2020, 9, 1), Some((2021, 3, 1)), 2_100),
            rate("IE", (2021, 3, 1), None, 2_300),
            rate("NL", (2012, 10, 1), None, 2_100),
            rate("AU", (2000, 7, 1), None, 1_000),
            rate("ZA", (2018, 4, 1), None, 1_500),
        ])
    }

    /// Parse `region,start,end,percent` rows; an empty `end` leaves the window open.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, VatError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rates = Vec::new();
        for (index, row) in csv_reader.deserialize::<VatRow>().enumerate() {
            let row = row?;
            let line = index + 2;

            let start = parse_date(&row.start, line)?;
            let end = match row.end.as_deref().filter(|value| !value.is_empty()) {
                Some(value) => Some(parse_date(value, line)?),
                None => None,
            };
            if end.is_some_and(|end| end <= start) {
                return Err(VatError::InvalidWindow { row: line });
            }

            let percent: f64 = row
                .percent
                .trim_end_matches('%')
                .parse()
                .map_err(|_| VatError::InvalidPercentage {
                    row: line,
                    value: row.percent.clone(),
                })?;
            if !(0.0..=100.0).contains(&percent) {
                return Err(VatError::InvalidPercentage {
                    row: line,
                    value: row.percent,
                });
            }

            rates.push(VatRate {
                region: row.region.to_ascii_uppercase(),
                start,
                end,
                basis_points: (percent * 100.0).round() as u32,
            });
        }

        Ok(Self::new(rates))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, VatError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Rate in force for the region on the date; the latest-starting window wins on overlap.
    pub fn rate(&self, region: &str, date: NaiveDate) -> Option<&VatRate> {
        self.rates
            .iter()
            .filter(|rate| rate.region.eq_ignore_ascii_case(region) && rate.applies_on(date))
            .max_by_key(|rate| rate.start)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

fn ymd((year, month, day): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

fn parse_date(value: &str, row: usize) -> Result<NaiveDate, VatError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| VatError::InvalidDate {
        row,
        value: value.to_string(),
    })
}
