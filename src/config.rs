//! Run configuration.
//!
//! A [`PipelineConfig`] is built once per process (YAML file, then CLI
//! overrides) and handed to every component that needs it. Every field has a
//! default, so an empty or absent file is valid.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::kpi::{AggregateOptions, DEFAULT_TOP_N};

const MAX_AMOUNT_DECIMALS: u32 = 28;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub customers_file: PathBuf,
    pub default_orders_file: PathBuf,
    pub orders_file_prefix: String,
    pub database: PathBuf,
    pub store_enabled: bool,
    pub top_n: usize,
    pub trailing_days: u64,
    pub amount_decimals: u32,
    pub input_encoding: Option<String>,
    /// Delimiter spelling accepted by `--delimiter` (`,`, `tab`, `;`, ...).
    pub delimiter: Option<String>,
    pub log_dir: Option<PathBuf>,
    /// Pins the run date; defaults to today in local time.
    pub as_of: Option<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("outputs"),
            customers_file: PathBuf::from("task_DE_new_customers.csv"),
            default_orders_file: PathBuf::from("task_DE_new_orders.xml"),
            orders_file_prefix: "orders_".to_string(),
            database: PathBuf::from("data").join("pipeline.db"),
            store_enabled: true,
            top_n: DEFAULT_TOP_N,
            trailing_days: 30,
            amount_decimals: 2,
            input_encoding: None,
            delimiter: None,
            log_dir: None,
            as_of: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.amount_decimals <= MAX_AMOUNT_DECIMALS,
            "amount_decimals must be <= {MAX_AMOUNT_DECIMALS}"
        );
        ensure!(self.trailing_days > 0, "trailing_days must be positive");
        if let Some(delimiter) = &self.delimiter {
            crate::cli::parse_delimiter(delimiter)
                .map_err(|err| anyhow::anyhow!("Invalid delimiter '{delimiter}': {err}"))?;
        }
        Ok(())
    }

    pub fn customers_path(&self) -> PathBuf {
        self.data_dir.join(&self.customers_file)
    }

    pub fn delimiter_byte(&self) -> Option<u8> {
        self.delimiter
            .as_deref()
            .and_then(|d| crate::cli::parse_delimiter(d).ok())
    }

    pub fn clock(&self) -> RunClock {
        match self.as_of {
            Some(date) => RunClock::end_of(date),
            None => RunClock::at(Local::now().naive_local()),
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            top_n: self.top_n,
            amount_decimals: self.amount_decimals,
            since: None,
        }
    }
}

/// The instant a run treats as "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    pub run_date: NaiveDate,
    pub reference_time: NaiveDateTime,
}

impl RunClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            run_date: now.date(),
            reference_time: now,
        }
    }

    /// A clock pinned to a calendar day; the reference instant is the end of
    /// that day so every order dated on it is in range.
    pub fn end_of(date: NaiveDate) -> Self {
        let next_midnight = date
            .checked_add_days(Days::new(1))
            .unwrap_or(date)
            .and_time(NaiveTime::MIN);
        Self {
            run_date: date,
            reference_time: next_midnight,
        }
    }

    pub fn yesterday(&self) -> NaiveDate {
        self.run_date.pred_opt().unwrap_or(self.run_date)
    }

    pub fn trailing_start(&self, days: u64) -> NaiveDateTime {
        self.reference_time
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDateTime::MIN)
    }
}
