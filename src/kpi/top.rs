use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::{error::KpiError, model::EnrichedOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopSpender {
    pub customer_id: i64,
    pub customer_name: String,
    pub total_amount: Decimal,
}

/// Highest-spending customers, grouped by `(customer_id, customer_name)`.
///
/// Sorted by total descending; equal totals keep the order in which their
/// groups first appeared. Orders without a matched customer are not
/// attributed. With `since`, only orders dated at or after the bound count.
pub fn top_spenders(
    view: &[EnrichedOrder],
    limit: usize,
    since: Option<NaiveDateTime>,
) -> Result<Vec<TopSpender>, KpiError> {
    let mut slots: HashMap<(i64, &str), usize> = HashMap::new();
    let mut groups: Vec<TopSpender> = Vec::new();
    for row in view {
        let Some(customer) = row.customer.as_ref() else {
            continue;
        };
        if let Some(bound) = since
            && !row.order.order_date_time.is_some_and(|ts| ts >= bound)
        {
            continue;
        }
        let amount = row.order.total_amount.value(row.order.order_id)?;
        let key = (customer.customer_id, customer.customer_name.as_str());
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(TopSpender {
                customer_id: customer.customer_id,
                customer_name: customer.customer_name.clone(),
                total_amount: Decimal::ZERO,
            });
            groups.len() - 1
        });
        groups[slot].total_amount += amount;
    }
    groups.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
    groups.truncate(limit);
    Ok(groups)
}
