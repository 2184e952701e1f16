use std::{fmt, str::FromStr, sync::LazyLock};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::KpiError;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9]+").expect("digit pattern compiles"));

pub const STORE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Pulls the first contiguous run of ASCII digits out of an identifier such
/// as `CUST-0042` and parses it.
pub fn extract_identifier(raw: &str, field: &'static str) -> Result<i64, KpiError> {
    let malformed = || KpiError::MalformedIdentifier {
        field,
        raw: raw.to_string(),
    };
    let digits = DIGIT_RUN.find(raw).ok_or_else(malformed)?;
    digits.as_str().parse::<i64>().map_err(|_| malformed())
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    let value = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    // Offsets are dropped; the wall-clock reading is what gets bucketed.
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_local());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn format_store_datetime(value: &NaiveDateTime) -> String {
    value.format(STORE_DATETIME_FORMAT).to_string()
}

/// Monetary amount as read from the source. Unparseable text is retained so
/// that the KPIs needing the value can report it instead of treating it as 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    Valid(Decimal),
    Invalid(String),
}

impl Amount {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed)) {
            Ok(value) => Amount::Valid(value),
            Err(_) => Amount::Invalid(trimmed.to_string()),
        }
    }

    pub fn value(&self, order_id: i64) -> Result<Decimal, KpiError> {
        match self {
            Amount::Valid(value) => Ok(*value),
            Amount::Invalid(raw) => Err(KpiError::InvalidAmount {
                order_id,
                raw: raw.clone(),
            }),
        }
    }
}

pub fn format_amount(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp(decimals);
    format!("{rounded:.prec$}", prec = decimals as usize)
}

/// Calendar month bucket (`YYYY-MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(timestamp: &NaiveDateTime) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let (year, month) = value
            .split_once('-')
            .ok_or_else(|| anyhow!("Failed to parse '{value}' as year-month"))?;
        let year: i32 = year.parse()?;
        let month: u32 = month.parse()?;
        if !(1..=12).contains(&month) {
            return Err(anyhow!("Month out of range in '{value}'"));
        }
        Ok(Self { year, month })
    }
}

/// Trims a field and maps empty text to `None`.
pub fn clean_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
