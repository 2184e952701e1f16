//! KPI aggregation over the enriched order view.
//!
//! Four independent reducers: [`repeat`], [`monthly`], [`regional`], and
//! [`top`]. Each returns typed rows; [`KpiTable`] renders them into the
//! tabular shape written by the sink. The store-backed queries in
//! [`crate::store`] produce the same typed rows so both paths share
//! rendering.

pub mod monthly;
pub mod regional;
pub mod repeat;
pub mod top;

use chrono::NaiveDateTime;
use log::{error, info};

use crate::{error::KpiError, model::EnrichedOrder};

pub use monthly::{MonthlyTrend, monthly_trends};
pub use regional::{RegionalRevenue, regional_revenue};
pub use repeat::{RepeatCustomer, repeat_customers};
pub use top::{TopSpender, top_spenders};

pub const DEFAULT_TOP_N: usize = 10;

/// Named KPI outputs, each with a fixed file name and header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KpiOutput {
    RepeatCustomers,
    MonthlyTrends,
    RegionalRevenue,
    TopCustomers,
    StoreRepeatCustomers,
    StoreMonthlyTrends,
    StoreRegionalRevenue,
    TopSpenders30d,
}

impl KpiOutput {
    pub const IN_MEMORY: [KpiOutput; 4] = [
        KpiOutput::RepeatCustomers,
        KpiOutput::MonthlyTrends,
        KpiOutput::RegionalRevenue,
        KpiOutput::TopCustomers,
    ];

    pub const STORE: [KpiOutput; 4] = [
        KpiOutput::StoreRepeatCustomers,
        KpiOutput::StoreMonthlyTrends,
        KpiOutput::StoreRegionalRevenue,
        KpiOutput::TopSpenders30d,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            KpiOutput::RepeatCustomers => "repeat_customers.csv",
            KpiOutput::MonthlyTrends => "monthly_trends.csv",
            KpiOutput::RegionalRevenue => "regional_revenue.csv",
            KpiOutput::TopCustomers => "top_customers.csv",
            KpiOutput::StoreRepeatCustomers => "store_repeat_customers.csv",
            KpiOutput::StoreMonthlyTrends => "store_monthly_trends.csv",
            KpiOutput::StoreRegionalRevenue => "store_regional_revenue.csv",
            KpiOutput::TopSpenders30d => "top_spenders_30d.csv",
        }
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            KpiOutput::RepeatCustomers | KpiOutput::StoreRepeatCustomers => {
                &["customer_id", "customer_name", "mobile_number"]
            }
            KpiOutput::MonthlyTrends => &["month", "total_amount"],
            KpiOutput::StoreMonthlyTrends => &["month", "order_count", "revenue"],
            KpiOutput::RegionalRevenue => &["region", "total_amount"],
            KpiOutput::StoreRegionalRevenue => &["region", "revenue"],
            KpiOutput::TopCustomers => &["customer_id", "customer_name", "total_amount"],
            KpiOutput::TopSpenders30d => &["customer_id", "customer_name", "total_spend"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiTable {
    pub output: KpiOutput,
    pub rows: Vec<Vec<String>>,
}

impl KpiTable {
    pub fn repeat_customers(output: KpiOutput, rows: &[RepeatCustomer]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    optional_cell(row.customer_id),
                    row.customer_name.clone().unwrap_or_default(),
                    row.mobile_number.clone(),
                ]
            })
            .collect();
        Self { output, rows }
    }

    /// `(month, total_amount)`, or `(month, order_count, revenue)` for the
    /// store variant.
    pub fn monthly_trends(output: KpiOutput, rows: &[MonthlyTrend], decimals: u32) -> Self {
        let with_counts = output == KpiOutput::StoreMonthlyTrends;
        let rows = rows
            .iter()
            .map(|row| {
                let mut cells = vec![row.month.to_string()];
                if with_counts {
                    cells.push(row.order_count.to_string());
                }
                cells.push(crate::data::format_amount(row.revenue, decimals));
                cells
            })
            .collect();
        Self { output, rows }
    }

    pub fn regional_revenue(output: KpiOutput, rows: &[RegionalRevenue], decimals: u32) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    row.region.clone().unwrap_or_default(),
                    crate::data::format_amount(row.revenue, decimals),
                ]
            })
            .collect();
        Self { output, rows }
    }

    pub fn top_spenders(output: KpiOutput, rows: &[TopSpender], decimals: u32) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    row.customer_id.to_string(),
                    row.customer_name.clone(),
                    crate::data::format_amount(row.total_amount, decimals),
                ]
            })
            .collect();
        Self { output, rows }
    }
}

fn optional_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub top_n: usize,
    pub amount_decimals: u32,
    /// Lower bound on `order_date_time` for top spenders; `None` keeps all.
    pub since: Option<NaiveDateTime>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            amount_decimals: 2,
            since: None,
        }
    }
}

/// Runs the four in-memory aggregators. A failure in one KPI is reported in
/// its slot and does not stop the others.
pub fn compute_tables(
    view: &[EnrichedOrder],
    options: &AggregateOptions,
) -> Vec<(KpiOutput, Result<KpiTable, KpiError>)> {
    KpiOutput::IN_MEMORY
        .into_iter()
        .filter_map(|output| {
            let table = compute_table(output, view, options)?;
            match &table {
                Ok(table) => info!("Computed {} row(s) for {}", table.rows.len(), output.file_name()),
                Err(err) => error!("KPI {} failed: {err}", output.file_name()),
            }
            Some((output, table))
        })
        .collect()
}

/// Computes one in-memory KPI. Store-backed outputs have no in-memory
/// reducer and yield `None`.
pub fn compute_table(
    output: KpiOutput,
    view: &[EnrichedOrder],
    options: &AggregateOptions,
) -> Option<Result<KpiTable, KpiError>> {
    let decimals = options.amount_decimals;
    let table = match output {
        KpiOutput::RepeatCustomers => Ok(KpiTable::repeat_customers(
            output,
            &repeat_customers(view),
        )),
        KpiOutput::MonthlyTrends => {
            monthly_trends(view).map(|rows| KpiTable::monthly_trends(output, &rows, decimals))
        }
        KpiOutput::RegionalRevenue => regional_revenue(view)
            .map(|rows| KpiTable::regional_revenue(output, &rows, decimals)),
        KpiOutput::TopCustomers => top_spenders(view, options.top_n, options.since)
            .map(|rows| KpiTable::top_spenders(output, &rows, decimals)),
        KpiOutput::StoreRepeatCustomers
        | KpiOutput::StoreMonthlyTrends
        | KpiOutput::StoreRegionalRevenue
        | KpiOutput::TopSpenders30d => return None,
    };
    Some(table)
}
