//! Output sink for rendered KPI tables.
//!
//! [`CsvDirectorySink`] writes one CSV per KPI into a directory, header row
//! first and no row-number column. Each file is written to a `.partial`
//! sibling and renamed over the previous output, so an interrupted run
//! leaves either the previous file or none, never a truncated one. A KPI
//! that failed has its previous output discarded, so a missing file means
//! the run did not produce it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    io_utils,
    kpi::{KpiOutput, KpiTable},
};

pub trait KpiSink {
    /// Persists `table`, replacing any previous output of the same KPI.
    fn write_table(&mut self, table: &KpiTable) -> Result<PathBuf>;

    /// Removes any previous output of `output`.
    fn discard(&mut self, output: KpiOutput) -> Result<()>;
}

pub struct CsvDirectorySink {
    dir: PathBuf,
}

impl CsvDirectorySink {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KpiSink for CsvDirectorySink {
    fn write_table(&mut self, table: &KpiTable) -> Result<PathBuf> {
        let target = self.dir.join(table.output.file_name());
        let staging = target.with_extension("csv.partial");
        if let Err(err) = write_staged(table, &staging, &target) {
            if staging.exists() {
                let _ = fs::remove_file(&staging);
            }
            return Err(err);
        }
        info!("Saved {} row(s) to {:?}", table.rows.len(), target);
        Ok(target)
    }

    fn discard(&mut self, output: KpiOutput) -> Result<()> {
        let target = self.dir.join(output.file_name());
        if target.is_file() {
            fs::remove_file(&target)
                .with_context(|| format!("Removing stale output {target:?}"))?;
            warn!("Removed previous {target:?}; this run did not produce it");
        }
        Ok(())
    }
}

fn write_staged(table: &KpiTable, staging: &Path, target: &Path) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(staging)?;
    writer
        .write_record(table.output.headers())
        .with_context(|| format!("Writing headers to {staging:?}"))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .with_context(|| format!("Writing row to {staging:?}"))?;
    }
    writer
        .flush()
        .with_context(|| format!("Flushing {staging:?}"))?;
    drop(writer);
    fs::rename(staging, target)
        .with_context(|| format!("Moving {staging:?} into place at {target:?}"))
}
