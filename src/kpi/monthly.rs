use std::collections::BTreeMap;

use log::warn;
use rust_decimal::Decimal;

use crate::{data::YearMonth, error::KpiError, model::EnrichedOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyTrend {
    pub month: YearMonth,
    pub order_count: usize,
    pub revenue: Decimal,
}

/// Buckets orders by calendar month of the naive `order_date_time` and sums
/// their amounts, ascending by month.
///
/// Every amount is checked, including those of orders without a timestamp,
/// which then belong to no bucket.
pub fn monthly_trends(view: &[EnrichedOrder]) -> Result<Vec<MonthlyTrend>, KpiError> {
    let mut buckets: BTreeMap<YearMonth, (usize, Decimal)> = BTreeMap::new();
    let mut undated = 0usize;
    for row in view {
        let amount = row.order.total_amount.value(row.order.order_id)?;
        let Some(timestamp) = row.order.order_date_time else {
            undated += 1;
            continue;
        };
        let bucket = buckets
            .entry(YearMonth::of(&timestamp))
            .or_insert((0, Decimal::ZERO));
        bucket.0 += 1;
        bucket.1 += amount;
    }
    if undated > 0 {
        warn!("{undated} order(s) without a parseable timestamp left out of monthly trends");
    }
    Ok(buckets
        .into_iter()
        .map(|(month, (order_count, revenue))| MonthlyTrend {
            month,
            order_count,
            revenue,
        })
        .collect())
}
