use std::collections::HashMap;

use itertools::Itertools;

use crate::model::EnrichedOrder;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepeatCustomer {
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub mobile_number: String,
}

/// Customers with more than one order, grouped by mobile number.
///
/// Output is the distinct `(customer_id, customer_name, mobile_number)`
/// tuples of qualifying orders in first-seen order. Unmatched numbers still
/// qualify and carry absent customer fields.
pub fn repeat_customers(view: &[EnrichedOrder]) -> Vec<RepeatCustomer> {
    let mut order_counts: HashMap<&str, usize> = HashMap::new();
    for row in view {
        *order_counts.entry(row.order.mobile_number.as_str()).or_insert(0) += 1;
    }
    view.iter()
        .filter(|row| order_counts[row.order.mobile_number.as_str()] > 1)
        .map(|row| RepeatCustomer {
            customer_id: row.customer_id(),
            customer_name: row.customer_name().map(str::to_string),
            mobile_number: row.order.mobile_number.clone(),
        })
        .unique()
        .collect()
}
