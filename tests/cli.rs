mod common;

use std::fs;

use assert_cmd::Command;
use common::{TestWorkspace, fixture_path};
use predicates::str::contains;

fn order_kpis() -> Command {
    let mut cmd = Command::cargo_bin("order-kpis").expect("binary exists");
    cmd.env_remove("ORDER_KPIS_DATABASE").env_remove("RUST_LOG");
    cmd
}

#[test]
fn run_writes_all_outputs_and_a_dated_log() {
    let workspace = TestWorkspace::new();
    let data_dir = workspace.worked_example();
    let output_dir = workspace.path().join("outputs");
    let database = workspace.path().join("pipeline.db");
    let log_dir = workspace.path().join("logs");

    order_kpis()
        .args([
            "run",
            "--data-dir",
            data_dir.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
            "--database",
            database.to_str().unwrap(),
            "--log-dir",
            log_dir.to_str().unwrap(),
            "--as-of",
            "2024-02-20",
        ])
        .assert()
        .success();

    assert_eq!(fs::read_dir(&output_dir).expect("outputs").count(), 8);
    assert!(database.is_file());
    let log = fs::read_to_string(log_dir.join("pipeline_20240220.log")).expect("log file");
    assert!(log.contains("=== Pipeline started"));
    assert!(log.contains("=== Pipeline finished ==="));
}

#[test]
fn run_without_inputs_exits_non_zero() {
    let workspace = TestWorkspace::new();
    let output_dir = workspace.path().join("outputs");
    order_kpis()
        .args([
            "run",
            "--data-dir",
            workspace.path().to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
            "--no-store",
            "--as-of",
            "2024-02-20",
        ])
        .assert()
        .failure()
        .stderr(contains("error:"))
        .stderr(contains("orders_20240219.xml"));
    assert!(!output_dir.exists());
}

#[test]
fn kpis_command_reads_explicit_files_without_a_store() {
    let workspace = TestWorkspace::new();
    let output_dir = workspace.path().join("out");
    order_kpis()
        .current_dir(workspace.path())
        .args([
            "kpis",
            "--customers",
            fixture_path("customers.csv").to_str().unwrap(),
            "--orders",
            fixture_path("orders.xml").to_str().unwrap(),
            "-o",
            output_dir.to_str().unwrap(),
            "--top",
            "1",
        ])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(output_dir.join("top_customers.csv")).expect("top customers"),
        "customer_id,customer_name,total_amount\n1,Alice,25.00\n"
    );
    assert!(!output_dir.join("store_monthly_trends.csv").exists());
    assert!(!workspace.path().join("data").exists());
}

#[test]
fn load_command_populates_the_store_from_a_config_file() {
    let workspace = TestWorkspace::new();
    let data_dir = workspace.worked_example();
    let database = workspace.path().join("store").join("kpis.db");
    let config = workspace.write(
        "pipeline.yml",
        &format!(
            "data_dir: {}\ndatabase: {}\nas_of: 2024-02-20\n",
            data_dir.display(),
            database.display()
        ),
    );

    order_kpis()
        .args(["load", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stderr(contains("1 customer(s) and 2 order(s)"));
    assert!(database.is_file());
}

#[test]
fn database_path_can_come_from_the_environment() {
    let workspace = TestWorkspace::new();
    let data_dir = workspace.worked_example();
    let database = workspace.path().join("env.db");
    order_kpis()
        .env("ORDER_KPIS_DATABASE", &database)
        .args([
            "load",
            "--data-dir",
            data_dir.to_str().unwrap(),
            "--as-of",
            "2024-02-20",
        ])
        .assert()
        .success();
    assert!(database.is_file());
}

#[test]
fn invalid_delimiter_is_rejected_by_argument_parsing() {
    order_kpis()
        .args(["run", "--delimiter", "ab"])
        .assert()
        .failure()
        .stderr(contains("Delimiter must be a single character"));
}
