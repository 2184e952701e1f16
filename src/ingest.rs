//! Readers for the two source files.
//!
//! Customers arrive as delimited text with a header row; orders arrive as an
//! XML document of repeated `<order>` elements. Both readers return raw,
//! untyped rows so that every cleaning rule lives in
//! [`crate::normalize`].

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::debug;
use serde::Deserialize;

use crate::{
    error::KpiError,
    io_utils,
    model::{RawCustomer, RawOrder},
};

const CUSTOMER_ID: &str = "customer_id";
const CUSTOMER_NAME: &str = "customer_name";
const MOBILE_NUMBER: &str = "mobile_number";
const REGION: &str = "region";

#[derive(Debug, Default, Deserialize)]
struct OrdersDocument {
    #[serde(rename = "order", default)]
    orders: Vec<RawOrder>,
}

struct CustomerColumns {
    customer_id: usize,
    customer_name: usize,
    mobile_number: usize,
    region: Option<usize>,
}

impl CustomerColumns {
    fn resolve(headers: &[String], path: &Path) -> Result<Self, KpiError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &'static str| {
            find(name).ok_or_else(|| KpiError::MissingColumn {
                column: name,
                path: path.to_path_buf(),
            })
        };
        Ok(Self {
            customer_id: require(CUSTOMER_ID)?,
            customer_name: require(CUSTOMER_NAME)?,
            mobile_number: require(MOBILE_NUMBER)?,
            region: find(REGION),
        })
    }

    fn extract(&self, record: &[String]) -> RawCustomer {
        let cell = |idx: usize| record.get(idx).cloned();
        RawCustomer {
            customer_id: cell(self.customer_id),
            customer_name: cell(self.customer_name),
            mobile_number: cell(self.mobile_number),
            region: self.region.and_then(cell),
        }
    }
}

pub fn read_customers(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<RawCustomer>> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    let columns = CustomerColumns::resolve(&headers, path)?;

    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", row_idx + 2))?;
        rows.push(columns.extract(&decoded));
    }
    debug!("Read {} customer row(s) from {path:?}", rows.len());
    Ok(rows)
}

pub fn read_orders(path: &Path) -> Result<Vec<RawOrder>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let document: OrdersDocument = quick_xml::de::from_reader(BufReader::new(file))
        .with_context(|| format!("Parsing orders document {path:?}"))?;
    debug!(
        "Read {} order element(s) from {path:?}",
        document.orders.len()
    );
    Ok(document.orders)
}
