use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::PipelineConfig;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load customer and order files and compute daily KPIs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the daily pipeline: resolve inputs, upsert into the store, and write every KPI
    Run(RunArgs),
    /// Compute the in-memory KPIs for explicit input files without touching the store
    Kpis(KpisArgs),
    /// Normalize the input files and upsert them into the store
    Load(LoadArgs),
}

/// Options shared by every subcommand; each one overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory holding the customers file and daily orders files
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,
    /// Directory receiving one CSV per KPI
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// SQLite database file
    #[arg(long, env = "ORDER_KPIS_DATABASE")]
    pub database: Option<PathBuf>,
    /// Treat this date (YYYY-MM-DD) as the run date
    #[arg(long = "as-of")]
    pub as_of: Option<NaiveDate>,
    /// Number of customers kept in top-spender outputs
    #[arg(long)]
    pub top: Option<usize>,
    /// Append log records to pipeline_YYYYMMDD.log in this directory
    #[arg(long = "log-dir")]
    pub log_dir: Option<PathBuf>,
    /// Customers file delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = validate_delimiter)]
    pub delimiter: Option<String>,
    /// Character encoding of the customers file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Loading configuration from {path:?}"))?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(db) = &self.database {
            config.database = db.clone();
        }
        if let Some(date) = self.as_of {
            config.as_of = Some(date);
        }
        if let Some(top) = self.top {
            config.top_n = top;
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if let Some(delimiter) = &self.delimiter {
            config.delimiter = Some(delimiter.clone());
        }
        if let Some(label) = &self.input_encoding {
            config.input_encoding = Some(label.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
    /// Skip persistence and the store-backed KPIs
    #[arg(long = "no-store")]
    pub no_store: bool,
}

#[derive(Debug, Args)]
pub struct KpisArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
    /// Customers CSV file
    #[arg(long)]
    pub customers: PathBuf,
    /// Orders XML file
    #[arg(long)]
    pub orders: PathBuf,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
    /// Customers CSV file (defaults to the configured file in the data dir)
    #[arg(long)]
    pub customers: Option<PathBuf>,
    /// Orders XML file (defaults to the daily file resolution)
    #[arg(long)]
    pub orders: Option<PathBuf>,
}

fn validate_delimiter(value: &str) -> Result<String, String> {
    parse_delimiter(value).map(|_| value.to_string())
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
