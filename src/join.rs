use std::collections::HashMap;

use log::{info, warn};

use crate::model::{CustomerRecord, EnrichedOrder, OrderRecord};

/// Hash index of customers keyed by mobile number.
///
/// Each key maps to exactly one customer. When two distinct customer ids share
/// a number, the one processed last wins and a warning names both.
pub struct CustomerLookup<'a> {
    by_mobile: HashMap<&'a str, &'a CustomerRecord>,
}

impl<'a> CustomerLookup<'a> {
    pub fn build(customers: &'a [CustomerRecord]) -> Self {
        let mut by_mobile: HashMap<&'a str, &'a CustomerRecord> =
            HashMap::with_capacity(customers.len());
        for customer in customers {
            let key = customer.mobile_number.trim();
            if let Some(previous) = by_mobile.insert(key, customer)
                && previous.customer_id != customer.customer_id
            {
                warn!(
                    "Mobile number '{key}' is shared by customers {} and {}; using {}",
                    previous.customer_id, customer.customer_id, customer.customer_id
                );
            }
        }
        Self { by_mobile }
    }

    pub fn get(&self, mobile_number: &str) -> Option<&'a CustomerRecord> {
        self.by_mobile.get(mobile_number.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_mobile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mobile.is_empty()
    }
}

/// Left-joins orders to customers on mobile number. Every order appears
/// exactly once in the output, in input order.
pub fn enrich_orders(orders: &[OrderRecord], customers: &[CustomerRecord]) -> Vec<EnrichedOrder> {
    let lookup = CustomerLookup::build(customers);
    let mut matched_rows = 0usize;
    let enriched: Vec<EnrichedOrder> = orders
        .iter()
        .map(|order| {
            let customer = lookup.get(&order.mobile_number).cloned();
            if customer.is_some() {
                matched_rows += 1;
            }
            EnrichedOrder {
                order: order.clone(),
                customer,
            }
        })
        .collect();
    info!(
        "Join complete: {} order row(s), {} matched to {} customer key(s)",
        enriched.len(),
        matched_rows,
        lookup.len()
    );
    enriched
}
