//! Raw and normalized record types flowing through the pipeline.

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::data::Amount;

/// Customer row as read from the tabular source, before any cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCustomer {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub mobile_number: Option<String>,
    pub region: Option<String>,
}

/// `<order>` element as read from the hierarchical source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawOrder {
    pub order_id: Option<String>,
    pub mobile_number: Option<String>,
    pub order_date_time: Option<String>,
    pub sku_id: Option<String>,
    pub sku_count: Option<String>,
    pub total_amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRecord {
    pub customer_id: i64,
    pub customer_name: String,
    pub mobile_number: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_id: i64,
    pub mobile_number: String,
    /// `None` when the source text did not parse; see `order_date_time_raw`.
    pub order_date_time: Option<NaiveDateTime>,
    pub order_date_time_raw: String,
    pub sku_id: String,
    pub sku_count: i64,
    pub total_amount: Amount,
}

/// An order with the attributes of its matched customer, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedOrder {
    pub order: OrderRecord,
    pub customer: Option<CustomerRecord>,
}

impl EnrichedOrder {
    pub fn customer_id(&self) -> Option<i64> {
        self.customer.as_ref().map(|c| c.customer_id)
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer.as_ref().map(|c| c.customer_name.as_str())
    }

    pub fn region(&self) -> Option<&str> {
        self.customer.as_ref().and_then(|c| c.region.as_deref())
    }
}
