//! Record normalization: trimming, identifier extraction, type coercion, and
//! join-key filtering.
//!
//! Rejected rows never abort the batch. Each rejection is logged at `warn`
//! and tallied by reason in the returned [`Normalized`] value.

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};

use crate::{
    data::{Amount, clean_field, extract_identifier, parse_naive_datetime},
    error::KpiError,
    model::{CustomerRecord, OrderRecord, RawCustomer, RawOrder},
};

/// Rejected-row counts keyed by [`KpiError::reason`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionTally {
    counts: BTreeMap<&'static str, usize>,
}

impl RejectionTally {
    pub fn record(&mut self, error: &KpiError) {
        *self.counts.entry(error.reason()).or_insert(0) += 1;
    }

    pub fn count(&self, reason: &str) -> usize {
        self.counts.get(reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn summary(&self) -> String {
        if self.counts.is_empty() {
            return "none".to_string();
        }
        self.counts
            .iter()
            .map(|(reason, count)| format!("{reason}={count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub rejected: RejectionTally,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: RejectionTally::default(),
        }
    }
}

pub fn normalize_customer(raw: &RawCustomer, row: usize) -> Result<CustomerRecord, KpiError> {
    let mobile_number = clean_field(raw.mobile_number.as_deref()).ok_or(KpiError::MissingJoinKey {
        kind: "customer",
        row,
    })?;
    let customer_id = extract_identifier(
        raw.customer_id.as_deref().unwrap_or_default(),
        "customer_id",
    )?;
    Ok(CustomerRecord {
        customer_id,
        customer_name: raw
            .customer_name
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        mobile_number,
        region: clean_field(raw.region.as_deref()),
    })
}

/// Cleans customer rows and collapses duplicate ids. The surviving record for
/// an id is its last occurrence, kept at that occurrence's position.
pub fn normalize_customers(rows: &[RawCustomer]) -> Normalized<CustomerRecord> {
    let mut out = Normalized::default();
    let mut cleaned: Vec<CustomerRecord> = Vec::with_capacity(rows.len());
    for (idx, raw) in rows.iter().enumerate() {
        match normalize_customer(raw, idx + 1) {
            Ok(record) => cleaned.push(record),
            Err(err) => {
                warn!("Skipping customer row {}: {err}", idx + 1);
                out.rejected.record(&err);
            }
        }
    }

    let mut last_seen: HashMap<i64, usize> = HashMap::with_capacity(cleaned.len());
    for (pos, record) in cleaned.iter().enumerate() {
        last_seen.insert(record.customer_id, pos);
    }
    let duplicates = cleaned.len() - last_seen.len();
    out.records = cleaned
        .into_iter()
        .enumerate()
        .filter(|(pos, record)| last_seen.get(&record.customer_id) == Some(pos))
        .map(|(_, record)| record)
        .collect();
    if duplicates > 0 {
        info!("Collapsed {duplicates} duplicate customer id(s), keeping the last occurrence");
    }
    out
}

pub fn normalize_order(raw: &RawOrder, row: usize) -> Result<OrderRecord, KpiError> {
    let mobile_number = clean_field(raw.mobile_number.as_deref()).ok_or(KpiError::MissingJoinKey {
        kind: "order",
        row,
    })?;
    let order_id = extract_identifier(raw.order_id.as_deref().unwrap_or_default(), "order_id")?;
    let sku_count_raw = raw.sku_count.as_deref().unwrap_or_default().trim();
    let sku_count = sku_count_raw
        .parse::<i64>()
        .map_err(|_| KpiError::InvalidField {
            field: "sku_count",
            raw: sku_count_raw.to_string(),
        })?;
    let order_date_time_raw = raw
        .order_date_time
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let order_date_time = parse_naive_datetime(&order_date_time_raw).ok();
    if order_date_time.is_none() {
        warn!("Order {order_id} has unparseable order_date_time '{order_date_time_raw}'");
    }
    Ok(OrderRecord {
        order_id,
        mobile_number,
        order_date_time,
        order_date_time_raw,
        sku_id: raw
            .sku_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        sku_count,
        total_amount: Amount::parse(raw.total_amount.as_deref().unwrap_or_default()),
    })
}

/// Cleans order rows. Orders are not deduplicated here; the store upsert
/// collapses repeated ids.
pub fn normalize_orders(rows: &[RawOrder]) -> Normalized<OrderRecord> {
    let mut out = Normalized::default();
    for (idx, raw) in rows.iter().enumerate() {
        match normalize_order(raw, idx + 1) {
            Ok(record) => out.records.push(record),
            Err(err) => {
                warn!("Skipping order row {}: {err}", idx + 1);
                out.rejected.record(&err);
            }
        }
    }
    out
}
