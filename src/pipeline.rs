//! End-of-day orchestration.
//!
//! Stages run in order: resolve inputs, read and normalize, persist to the
//! store, store-backed KPIs, in-memory KPIs. A stage error aborts the stages
//! after it; KPI files written before the failure stay in place and every
//! other KPI file left from an earlier run is removed. An invalid amount
//! fails only the KPI that needed it, but still marks the run failed.
//! The start and finish markers are logged whatever happens.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};

use crate::{
    config::{PipelineConfig, RunClock},
    error::KpiError,
    ingest,
    io_utils,
    join::enrich_orders,
    kpi::{self, AggregateOptions, KpiOutput, KpiTable},
    model::{CustomerRecord, OrderRecord},
    normalize::{self, Normalized},
    sink::{CsvDirectorySink, KpiSink},
    store::Store,
};

/// What a run produced. Returned on success and logged on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub orders_file: Option<PathBuf>,
    pub customers_loaded: usize,
    pub orders_loaded: usize,
    pub rows_rejected: usize,
    pub outputs: Vec<PathBuf>,
    pub failed_kpis: Vec<KpiOutput>,
}

/// Normalized inputs of one run.
#[derive(Debug, Clone, Default)]
pub struct LoadedInputs {
    pub customers: Normalized<CustomerRecord>,
    pub orders: Normalized<OrderRecord>,
}

/// Picks the orders file for a run: `<prefix>YYYYMMDD.xml` for the day
/// before the run date, else the configured default.
pub fn resolve_orders_file(config: &PipelineConfig, clock: &RunClock) -> Result<PathBuf, KpiError> {
    let dated = config.data_dir.join(format!(
        "{}{}.xml",
        config.orders_file_prefix,
        clock.yesterday().format("%Y%m%d")
    ));
    if dated.is_file() {
        info!("Found yesterday's orders file: {dated:?}");
        return Ok(dated);
    }
    let fallback = config.data_dir.join(&config.default_orders_file);
    if fallback.is_file() {
        warn!("Using fallback orders file: {fallback:?}");
        return Ok(fallback);
    }
    Err(KpiError::NoInputFile {
        candidates: vec![dated, fallback],
    })
}

pub fn load_inputs(
    config: &PipelineConfig,
    customers_path: &Path,
    orders_path: &Path,
) -> Result<LoadedInputs> {
    if !customers_path.is_file() {
        return Err(KpiError::NoInputFile {
            candidates: vec![customers_path.to_path_buf()],
        }
        .into());
    }
    let encoding = io_utils::resolve_encoding(config.input_encoding.as_deref())?;
    let delimiter = io_utils::resolve_input_delimiter(customers_path, config.delimiter_byte());

    let raw_customers = ingest::read_customers(customers_path, delimiter, encoding)
        .with_context(|| format!("Loading customers from {customers_path:?}"))?;
    let raw_orders = ingest::read_orders(orders_path)
        .with_context(|| format!("Loading orders from {orders_path:?}"))?;

    let customers = normalize::normalize_customers(&raw_customers);
    let orders = normalize::normalize_orders(&raw_orders);
    info!(
        "Normalized {} customer(s) (rejected: {}) and {} order(s) (rejected: {})",
        customers.records.len(),
        customers.rejected.summary(),
        orders.records.len(),
        orders.rejected.summary()
    );
    Ok(LoadedInputs { customers, orders })
}

/// Opens the run's single store connection, creating the parent directory of
/// the database file when needed.
pub fn open_store(config: &PipelineConfig) -> Result<Store> {
    if let Some(parent) = config.database.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating store directory {parent:?}"))?;
    }
    Ok(Store::open(&config.database)?)
}

/// Upserts the loaded records; returns the number of rows rejected by the
/// store.
pub fn persist(store: &Store, inputs: &LoadedInputs) -> Result<usize> {
    let customers = store
        .upsert_customers(&inputs.customers.records)
        .context("Upserting customers")?;
    let orders = store
        .upsert_orders(&inputs.orders.records)
        .context("Upserting orders")?;
    Ok(customers.rejected.total() + orders.rejected.total())
}

/// Runs the SQL-backed KPIs and writes each one as it completes.
pub fn write_store_kpis(
    store: &Store,
    sink: &mut dyn KpiSink,
    config: &PipelineConfig,
    clock: &RunClock,
) -> Result<Vec<PathBuf>> {
    let decimals = config.amount_decimals;
    let since = clock.trailing_start(config.trailing_days);
    let mut written = Vec::with_capacity(KpiOutput::STORE.len());
    for output in KpiOutput::STORE {
        let table = match output {
            KpiOutput::StoreRepeatCustomers => {
                KpiTable::repeat_customers(output, &store.repeat_customers()?)
            }
            KpiOutput::StoreMonthlyTrends => {
                KpiTable::monthly_trends(output, &store.monthly_trends()?, decimals)
            }
            KpiOutput::StoreRegionalRevenue => {
                KpiTable::regional_revenue(output, &store.regional_revenue()?, decimals)
            }
            KpiOutput::TopSpenders30d => KpiTable::top_spenders(
                output,
                &store.top_spenders_since(since, config.top_n)?,
                decimals,
            ),
            KpiOutput::RepeatCustomers
            | KpiOutput::MonthlyTrends
            | KpiOutput::RegionalRevenue
            | KpiOutput::TopCustomers => continue,
        };
        written.push(sink.write_table(&table)?);
    }
    Ok(written)
}

/// Computes the in-memory KPIs and writes the ones that succeeded; a failed
/// KPI has its previous output removed. Returns the written paths and the
/// KPIs that failed.
pub fn write_in_memory_kpis(
    inputs: &LoadedInputs,
    sink: &mut dyn KpiSink,
    options: &AggregateOptions,
) -> Result<(Vec<PathBuf>, Vec<KpiOutput>)> {
    let view = enrich_orders(&inputs.orders.records, &inputs.customers.records);
    let mut written = Vec::new();
    let mut failed = Vec::new();
    for (output, table) in kpi::compute_tables(&view, options) {
        match table {
            Ok(table) => written.push(sink.write_table(&table)?),
            Err(_) => {
                sink.discard(output)?;
                failed.push(output);
            }
        }
    }
    Ok((written, failed))
}

pub struct Pipeline {
    config: PipelineConfig,
    clock: RunClock,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let clock = config.clock();
        Self { config, clock }
    }

    pub fn with_clock(config: PipelineConfig, clock: RunClock) -> Self {
        Self { config, clock }
    }

    /// Full daily run. Always logs the start and finish markers; any failure
    /// comes back as `Err` after being logged.
    pub fn run(&self) -> Result<RunReport> {
        info!("=== Pipeline started (run date {}) ===", self.clock.run_date);
        let mut report = RunReport::default();
        let outcome = self.run_stages(&mut report);
        match &outcome {
            Ok(()) => info!(
                "Pipeline succeeded: {} output(s) written, {} row(s) rejected",
                report.outputs.len(),
                report.rows_rejected
            ),
            Err(err) => {
                error!(
                    "Pipeline failed after writing {} output(s): {err:#}",
                    report.outputs.len()
                );
                if let Err(cleanup) = self.discard_unwritten(&report) {
                    error!("Could not discard stale outputs: {cleanup:#}");
                }
            }
        }
        info!("=== Pipeline finished ===");
        outcome.map(|()| report)
    }

    /// Removes previous KPI files this failed run did not rewrite.
    fn discard_unwritten(&self, report: &RunReport) -> Result<()> {
        if !self.config.output_dir.is_dir() {
            return Ok(());
        }
        let mut sink = CsvDirectorySink::create(&self.config.output_dir)?;
        for output in KpiOutput::IN_MEMORY.into_iter().chain(KpiOutput::STORE) {
            let path = sink.dir().join(output.file_name());
            if !report.outputs.contains(&path) {
                sink.discard(output)?;
            }
        }
        Ok(())
    }

    fn run_stages(&self, report: &mut RunReport) -> Result<()> {
        let orders_path = resolve_orders_file(&self.config, &self.clock)?;
        report.orders_file = Some(orders_path.clone());

        info!("Starting loaders...");
        let inputs = load_inputs(&self.config, &self.config.customers_path(), &orders_path)?;
        report.customers_loaded = inputs.customers.records.len();
        report.orders_loaded = inputs.orders.records.len();
        report.rows_rejected = inputs.customers.rejected.total() + inputs.orders.rejected.total();

        let mut sink = CsvDirectorySink::create(&self.config.output_dir)?;

        if self.config.store_enabled {
            let store = open_store(&self.config)?;
            info!("Persisting to store {:?}...", store.location());
            report.rows_rejected += persist(&store, &inputs).context("Store upsert stage")?;
            info!("Executing store KPI queries...");
            let written = write_store_kpis(&store, &mut sink, &self.config, &self.clock)
                .context("Store KPI stage")?;
            report.outputs.extend(written);
        } else {
            info!("Store disabled; skipping persistence and store KPIs");
        }

        info!("Running in-memory KPI computations...");
        let (written, failed) =
            write_in_memory_kpis(&inputs, &mut sink, &self.config.aggregate_options())
                .context("In-memory KPI stage")?;
        report.outputs.extend(written);
        report.failed_kpis = failed;
        if !report.failed_kpis.is_empty() {
            let names: Vec<_> = report.failed_kpis.iter().map(|k| k.file_name()).collect();
            return Err(anyhow!("{} KPI(s) failed: {}", names.len(), names.join(", ")));
        }
        Ok(())
    }
}
