#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// One `<order>` element for [`orders_xml`].
pub struct OrderSpec<'a> {
    pub order_id: &'a str,
    pub mobile_number: &'a str,
    pub order_date_time: &'a str,
    pub total_amount: &'a str,
}

pub fn order<'a>(
    order_id: &'a str,
    mobile_number: &'a str,
    order_date_time: &'a str,
    total_amount: &'a str,
) -> OrderSpec<'a> {
    OrderSpec {
        order_id,
        mobile_number,
        order_date_time,
        total_amount,
    }
}

pub fn orders_xml(orders: &[OrderSpec<'_>]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<orders>\n");
    for o in orders {
        xml.push_str(&format!(
            "  <order><order_id>{}</order_id><mobile_number>{}</mobile_number>\
             <order_date_time>{}</order_date_time><sku_id>SKU</sku_id>\
             <sku_count>1</sku_count><total_amount>{}</total_amount></order>\n",
            o.order_id, o.mobile_number, o.order_date_time, o.total_amount
        ));
    }
    xml.push_str("</orders>\n");
    xml
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Copies a `tests/data` fixture into the workspace under `name`.
    pub fn copy_fixture(&self, fixture: &str, name: &str) -> PathBuf {
        let contents = fs::read_to_string(fixture_path(fixture)).expect("read fixture");
        self.write(name, &contents)
    }

    /// Lays out the worked-example inputs as a data directory whose orders
    /// file is dated the day before `2024-02-20`.
    pub fn worked_example(&self) -> PathBuf {
        self.copy_fixture("customers.csv", "data/task_DE_new_customers.csv");
        self.copy_fixture("orders.xml", "data/orders_20240219.xml");
        self.path().join("data")
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path().join(relative))
            .unwrap_or_else(|err| panic!("read {relative}: {err}"))
    }
}
