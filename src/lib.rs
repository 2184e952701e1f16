pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod ingest;
pub mod io_utils;
pub mod join;
pub mod kpi;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod store;

use std::{env, fs::OpenOptions};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    config::PipelineConfig,
    pipeline::Pipeline,
    sink::CsvDirectorySink,
};

/// Installs the process logger. Records go to stderr, or are appended to
/// `pipeline_YYYYMMDD.log` when a log directory is configured.
fn init_logging(config: &PipelineConfig) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if env::var("RUST_LOG").is_err() {
        builder.filter_module("order_kpis", LevelFilter::Info);
    }
    builder.format_timestamp_millis();
    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Creating log directory {dir:?}"))?;
        let path = dir.join(format!(
            "pipeline_{}.log",
            config.clock().run_date.format("%Y%m%d")
        ));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Opening log file {path:?}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    // A logger installed earlier in the process (tests) stays in place.
    let _ = builder.try_init();
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(&args),
        Commands::Kpis(args) => handle_kpis(&args),
        Commands::Load(args) => handle_load(&args),
    }
}

fn handle_run(args: &cli::RunArgs) -> Result<()> {
    let mut config = args.common.resolve()?;
    if args.no_store {
        config.store_enabled = false;
    }
    init_logging(&config)?;
    let report = Pipeline::new(config).run()?;
    info!(
        "Loaded {} customer(s) and {} order(s) from {:?}; wrote {} KPI file(s)",
        report.customers_loaded,
        report.orders_loaded,
        report.orders_file,
        report.outputs.len()
    );
    Ok(())
}

fn handle_kpis(args: &cli::KpisArgs) -> Result<()> {
    let config = args.common.resolve()?;
    init_logging(&config)?;
    info!(
        "Computing KPIs for {:?} and {:?}",
        args.customers, args.orders
    );
    let inputs = pipeline::load_inputs(&config, &args.customers, &args.orders)?;
    let mut sink = CsvDirectorySink::create(&config.output_dir)?;
    let (written, failed) =
        pipeline::write_in_memory_kpis(&inputs, &mut sink, &config.aggregate_options())?;
    info!("Wrote {} KPI file(s) to {:?}", written.len(), sink.dir());
    if !failed.is_empty() {
        let names: Vec<_> = failed.iter().map(|k| k.file_name()).collect();
        return Err(anyhow!("{} KPI(s) failed: {}", names.len(), names.join(", ")));
    }
    Ok(())
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    let config = args.common.resolve()?;
    init_logging(&config)?;
    let clock = config.clock();
    let customers_path = args
        .customers
        .clone()
        .unwrap_or_else(|| config.customers_path());
    let orders_path = match &args.orders {
        Some(path) => path.clone(),
        None => pipeline::resolve_orders_file(&config, &clock)?,
    };
    let inputs = pipeline::load_inputs(&config, &customers_path, &orders_path)?;
    let store = pipeline::open_store(&config)?;
    let rejected = pipeline::persist(&store, &inputs)?;
    info!(
        "Store {:?} now holds {} customer(s) and {} order(s); {} row(s) rejected on upsert",
        store.location(),
        store.customer_count()?,
        store.order_count()?,
        rejected
    );
    Ok(())
}
