//! SQLite-backed relational store.
//!
//! One [`Store`] wraps one connection for the whole run; every statement runs
//! serially on it. Upserts are issued one row per statement, so each row is
//! atomic on its own and a failed row never undoes its neighbours.
//!
//! Primary keys are declared `BIGINT` rather than `INTEGER` so they do not
//! alias `rowid`; `rowid` then records first-insertion order, which the KPI
//! queries use. Every customer upsert, insert or update, stamps the row with
//! the next `upsert_seq`. Orders join to a single linked customer per mobile
//! number, the one upserted last, which matches the in-memory join where the
//! customer processed last wins. Top-spender totals are compared at the
//! rounding scale used for rendering, and ties fall back to the insertion
//! order of each customer's first order.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use rusqlite::{Connection, params};
use rust_decimal::{Decimal, prelude::FromPrimitive};

use crate::{
    data::{YearMonth, format_store_datetime},
    error::KpiError,
    kpi::{MonthlyTrend, RegionalRevenue, RepeatCustomer, TopSpender},
    model::{CustomerRecord, OrderRecord},
    normalize::RejectionTally,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    customer_id   BIGINT NOT NULL PRIMARY KEY,
    customer_name TEXT NOT NULL,
    mobile_number TEXT NOT NULL,
    region        TEXT,
    upsert_seq    INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_customers_mobile ON customers(mobile_number);

CREATE TABLE IF NOT EXISTS orders (
    order_id        BIGINT NOT NULL PRIMARY KEY,
    mobile_number   TEXT NOT NULL,
    order_date_time TEXT NOT NULL,
    sku_id          TEXT NOT NULL,
    sku_count       INTEGER NOT NULL,
    total_amount    NUMERIC NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orders_mobile ON orders(mobile_number);
"#;

const UPSERT_CUSTOMER: &str = r#"
INSERT INTO customers (customer_id, customer_name, mobile_number, region, upsert_seq)
VALUES (?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(upsert_seq), 0) + 1 FROM customers))
ON CONFLICT(customer_id) DO UPDATE SET
    customer_name = excluded.customer_name,
    mobile_number = excluded.mobile_number,
    region = excluded.region,
    upsert_seq = excluded.upsert_seq
"#;

const UPSERT_ORDER: &str = r#"
INSERT INTO orders (order_id, mobile_number, order_date_time, sku_id, sku_count, total_amount)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(order_id) DO UPDATE SET
    mobile_number = excluded.mobile_number,
    order_date_time = excluded.order_date_time,
    sku_id = excluded.sku_id,
    sku_count = excluded.sku_count,
    total_amount = excluded.total_amount
"#;

const LINKED_CUSTOMERS: &str = r#"
linked AS (
    SELECT c.customer_id, c.customer_name, c.mobile_number, c.region
    FROM customers c
    WHERE c.upsert_seq = (
        SELECT MAX(c2.upsert_seq) FROM customers c2 WHERE c2.mobile_number = c.mobile_number
    )
)
"#;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub written: usize,
    pub rejected: RejectionTally,
}

pub struct Store {
    conn: Connection,
    location: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the database file and ensures the schema.
    /// The parent directory must already exist.
    pub fn open(path: &Path) -> Result<Self, KpiError> {
        let conn = Connection::open(path).map_err(|source| KpiError::ConnectionFailure {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn, path.to_path_buf())
    }

    pub fn open_in_memory() -> Result<Self, KpiError> {
        let location = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| KpiError::ConnectionFailure {
            path: location.clone(),
            source,
        })?;
        Self::with_connection(conn, location)
    }

    fn with_connection(conn: Connection, location: PathBuf) -> Result<Self, KpiError> {
        conn.execute_batch(SCHEMA)
            .map_err(|source| KpiError::ConnectionFailure {
                path: location.clone(),
                source,
            })?;
        debug!("Store schema ready at {location:?}");
        Ok(Self { conn, location })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn upsert_customers(&self, customers: &[CustomerRecord]) -> Result<UpsertSummary, KpiError> {
        let mut stmt = self.conn.prepare_cached(UPSERT_CUSTOMER)?;
        let mut summary = UpsertSummary::default();
        for customer in customers {
            stmt.execute(params![
                customer.customer_id,
                customer.customer_name,
                customer.mobile_number,
                customer.region,
            ])?;
            summary.written += 1;
        }
        info!(
            "Upserted {} customer row(s) into {:?}",
            summary.written, self.location
        );
        Ok(summary)
    }

    /// Upserts orders. An order without a parseable timestamp or with a
    /// non-numeric amount is rejected on its own; statement failures abort.
    pub fn upsert_orders(&self, orders: &[OrderRecord]) -> Result<UpsertSummary, KpiError> {
        let mut stmt = self.conn.prepare_cached(UPSERT_ORDER)?;
        let mut summary = UpsertSummary::default();
        for order in orders {
            let row = order_params(order);
            let (timestamp, amount) = match row {
                Ok(values) => values,
                Err(err) => {
                    warn!("Skipping order {} for store: {err}", order.order_id);
                    summary.rejected.record(&err);
                    continue;
                }
            };
            stmt.execute(params![
                order.order_id,
                order.mobile_number,
                timestamp,
                order.sku_id,
                order.sku_count,
                amount,
            ])?;
            summary.written += 1;
        }
        info!(
            "Upserted {} order row(s) into {:?}, rejected {}",
            summary.written,
            self.location,
            summary.rejected.total()
        );
        Ok(summary)
    }

    pub fn customer_count(&self) -> Result<usize, KpiError> {
        self.count("SELECT COUNT(*) FROM customers")
    }

    pub fn order_count(&self) -> Result<usize, KpiError> {
        self.count("SELECT COUNT(*) FROM orders")
    }

    fn count(&self, sql: &str) -> Result<usize, KpiError> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn repeat_customers(&self) -> Result<Vec<RepeatCustomer>, KpiError> {
        let sql = format!(
            r#"
            WITH {LINKED_CUSTOMERS},
            repeat AS (
                SELECT mobile_number, MIN(rowid) AS first_seen
                FROM orders
                GROUP BY mobile_number
                HAVING COUNT(order_id) > 1
            )
            SELECT l.customer_id, l.customer_name, r.mobile_number
            FROM repeat r
            LEFT JOIN linked l ON l.mobile_number = r.mobile_number
            ORDER BY r.first_seen
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RepeatCustomer {
                    customer_id: row.get(0)?,
                    customer_name: row.get(1)?,
                    mobile_number: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn monthly_trends(&self) -> Result<Vec<MonthlyTrend>, KpiError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT strftime('%Y-%m', order_date_time) AS month,
                   COUNT(*) AS order_count,
                   SUM(total_amount) AS revenue
            FROM orders
            GROUP BY month
            ORDER BY month
            "#,
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(month, count, revenue)| {
                let month: YearMonth = month.parse().map_err(|_| KpiError::InvalidField {
                    field: "order_date_time",
                    raw: month.clone(),
                })?;
                Ok(MonthlyTrend {
                    month,
                    order_count: usize::try_from(count).unwrap_or_default(),
                    revenue: decimal_from_sum(revenue),
                })
            })
            .collect()
    }

    pub fn regional_revenue(&self) -> Result<Vec<RegionalRevenue>, KpiError> {
        let sql = format!(
            r#"
            WITH {LINKED_CUSTOMERS}
            SELECT l.region, SUM(o.total_amount) AS revenue
            FROM orders o
            LEFT JOIN linked l ON l.mobile_number = o.mobile_number
            GROUP BY l.region
            ORDER BY l.region IS NULL, l.region
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RegionalRevenue {
                    region: row.get(0)?,
                    revenue: decimal_from_sum(row.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Top spenders over orders dated at or after `since`.
    pub fn top_spenders_since(
        &self,
        since: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<TopSpender>, KpiError> {
        let sql = format!(
            r#"
            WITH {LINKED_CUSTOMERS}
            SELECT l.customer_id, l.customer_name, SUM(o.total_amount) AS total_spend
            FROM orders o
            JOIN linked l ON l.mobile_number = o.mobile_number
            WHERE o.order_date_time >= ?1
            GROUP BY l.customer_id, l.customer_name
            ORDER BY ROUND(SUM(o.total_amount), {SUM_SCALE}) DESC, MIN(o.rowid)
            LIMIT ?2
            "#
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![format_store_datetime(&since), limit], |row| {
                Ok(TopSpender {
                    customer_id: row.get(0)?,
                    customer_name: row.get(1)?,
                    total_amount: decimal_from_sum(row.get(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn order_params(order: &OrderRecord) -> Result<(String, String), KpiError> {
    let timestamp = order
        .order_date_time
        .as_ref()
        .map(format_store_datetime)
        .ok_or_else(|| KpiError::InvalidTimestamp {
            order_id: order.order_id,
            raw: order.order_date_time_raw.clone(),
        })?;
    let amount = order.total_amount.value(order.order_id)?;
    Ok((timestamp, amount.to_string()))
}

/// SQLite sums NUMERIC columns in floating point; rounding to the maximum
/// scale an amount can carry removes the representation noise.
fn decimal_from_sum(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(SUM_SCALE).normalize())
        .unwrap_or_default()
}

const SUM_SCALE: u32 = 6;
