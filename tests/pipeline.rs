mod common;

use chrono::NaiveDate;
use common::{TestWorkspace, order, orders_xml};
use order_kpis::{config::PipelineConfig, error::KpiError, kpi::KpiOutput, pipeline::Pipeline};

fn config_for(workspace: &TestWorkspace) -> PipelineConfig {
    PipelineConfig {
        data_dir: workspace.path().join("data"),
        output_dir: workspace.path().join("outputs"),
        database: workspace.path().join("db").join("pipeline.db"),
        as_of: NaiveDate::from_ymd_opt(2024, 2, 20),
        ..PipelineConfig::default()
    }
}

#[test]
fn worked_example_produces_every_kpi() {
    let workspace = TestWorkspace::new();
    workspace.worked_example();
    let report = Pipeline::new(config_for(&workspace)).run().expect("pipeline run");

    assert_eq!(report.customers_loaded, 1);
    assert_eq!(report.orders_loaded, 2);
    assert_eq!(report.rows_rejected, 0);
    assert_eq!(report.outputs.len(), 8);
    assert!(report.failed_kpis.is_empty());

    assert_eq!(
        workspace.read("outputs/repeat_customers.csv"),
        "customer_id,customer_name,mobile_number\n1,Alice,555-1\n"
    );
    assert_eq!(
        workspace.read("outputs/monthly_trends.csv"),
        "month,total_amount\n2024-01,20.00\n2024-02,5.00\n"
    );
    assert_eq!(
        workspace.read("outputs/regional_revenue.csv"),
        "region,total_amount\nWest,25.00\n"
    );
    assert_eq!(
        workspace.read("outputs/top_customers.csv"),
        "customer_id,customer_name,total_amount\n1,Alice,25.00\n"
    );
    assert_eq!(
        workspace.read("outputs/store_repeat_customers.csv"),
        "customer_id,customer_name,mobile_number\n1,Alice,555-1\n"
    );
    assert_eq!(
        workspace.read("outputs/store_monthly_trends.csv"),
        "month,order_count,revenue\n2024-01,1,20.00\n2024-02,1,5.00\n"
    );
    assert_eq!(
        workspace.read("outputs/store_regional_revenue.csv"),
        "region,revenue\nWest,25.00\n"
    );
    // Only the February order falls inside the trailing 30 days.
    assert_eq!(
        workspace.read("outputs/top_spenders_30d.csv"),
        "customer_id,customer_name,total_spend\n1,Alice,5.00\n"
    );
}

#[test]
fn rerunning_on_the_same_inputs_is_byte_identical() {
    let workspace = TestWorkspace::new();
    workspace.worked_example();
    let config = config_for(&workspace);

    Pipeline::new(config.clone()).run().expect("first run");
    let first: Vec<String> = KpiOutput::IN_MEMORY
        .iter()
        .chain(KpiOutput::STORE.iter())
        .map(|k| workspace.read(&format!("outputs/{}", k.file_name())))
        .collect();

    Pipeline::new(config).run().expect("second run");
    let second: Vec<String> = KpiOutput::IN_MEMORY
        .iter()
        .chain(KpiOutput::STORE.iter())
        .map(|k| workspace.read(&format!("outputs/{}", k.file_name())))
        .collect();

    assert_eq!(first, second);
}

#[test]
fn malformed_customer_id_rejects_only_that_row() {
    let workspace = TestWorkspace::new();
    workspace.write(
        "data/task_DE_new_customers.csv",
        "customer_id,customer_name,mobile_number,region\n\
         1,Alice,555-1,West\n\
         ABC,Bob,555-2,East\n",
    );
    workspace.write(
        "data/orders_20240219.xml",
        &orders_xml(&[
            order("10", "555-1", "2024-01-05 10:00:00", "20.00"),
            order("11", "555-1", "2024-02-10 18:30:00", "5.00"),
            order("12", "555-2", "2024-02-01 09:00:00", "7.50"),
        ]),
    );
    let report = Pipeline::new(config_for(&workspace)).run().expect("pipeline run");

    assert_eq!(report.customers_loaded, 1);
    assert_eq!(report.orders_loaded, 3);
    assert_eq!(report.rows_rejected, 1);
    // Bob's order survives the join without a region.
    assert_eq!(
        workspace.read("outputs/regional_revenue.csv"),
        "region,total_amount\nWest,25.00\n,7.50\n"
    );
    assert_eq!(
        workspace.read("outputs/store_regional_revenue.csv"),
        "region,revenue\nWest,25.00\n,7.50\n"
    );
    assert_eq!(
        workspace.read("outputs/top_customers.csv"),
        "customer_id,customer_name,total_amount\n1,Alice,25.00\n"
    );
}

#[test]
fn invalid_amount_fails_the_run_but_keeps_unaffected_outputs() {
    let workspace = TestWorkspace::new();
    workspace.copy_fixture("customers.csv", "data/task_DE_new_customers.csv");
    workspace.write(
        "data/orders_20240219.xml",
        &orders_xml(&[
            order("10", "555-1", "2024-01-05 10:00:00", "20.00"),
            order("11", "555-1", "2024-02-10 18:30:00", "N/A"),
        ]),
    );
    let err = Pipeline::new(config_for(&workspace))
        .run()
        .expect_err("amount failure surfaces");
    assert!(err.to_string().contains("monthly_trends.csv"));

    let outputs = workspace.path().join("outputs");
    assert!(outputs.join("repeat_customers.csv").is_file());
    assert!(!outputs.join("monthly_trends.csv").exists());
    assert!(!outputs.join("regional_revenue.csv").exists());
    assert!(!outputs.join("top_customers.csv").exists());
    // The store rejected the bad row and still answered its queries.
    assert_eq!(
        workspace.read("outputs/store_regional_revenue.csv"),
        "region,revenue\nWest,20.00\n"
    );
}

#[test]
fn store_can_be_disabled() {
    let workspace = TestWorkspace::new();
    workspace.worked_example();
    let config = PipelineConfig {
        store_enabled: false,
        ..config_for(&workspace)
    };
    let report = Pipeline::new(config).run().expect("pipeline run");
    assert_eq!(report.outputs.len(), 4);
    assert!(!workspace.path().join("db").exists());
    assert!(!workspace.path().join("outputs/store_monthly_trends.csv").exists());
}

#[test]
fn fallback_orders_file_is_used_when_the_dated_one_is_missing() {
    let workspace = TestWorkspace::new();
    workspace.copy_fixture("customers.csv", "data/task_DE_new_customers.csv");
    workspace.copy_fixture("orders.xml", "data/task_DE_new_orders.xml");
    let report = Pipeline::new(config_for(&workspace)).run().expect("pipeline run");
    let used = report.orders_file.expect("orders file recorded");
    assert_eq!(used.file_name().unwrap(), "task_DE_new_orders.xml");
}

#[test]
fn missing_customers_file_is_reported() {
    let workspace = TestWorkspace::new();
    workspace.copy_fixture("orders.xml", "data/orders_20240219.xml");
    let err = Pipeline::new(config_for(&workspace))
        .run()
        .expect_err("missing customers");
    assert!(matches!(
        err.downcast_ref::<KpiError>(),
        Some(KpiError::NoInputFile { .. })
    ));
    assert!(!workspace.path().join("outputs").exists());
}

#[test]
fn failed_kpi_does_not_leave_the_previous_runs_file() {
    let workspace = TestWorkspace::new();
    workspace.worked_example();
    let config = config_for(&workspace);
    Pipeline::new(config.clone()).run().expect("first run");
    assert!(workspace.path().join("outputs/monthly_trends.csv").is_file());

    workspace.write(
        "data/orders_20240219.xml",
        &orders_xml(&[
            order("10", "555-1", "2024-01-05 10:00:00", "20.00"),
            order("11", "555-1", "2024-02-10 18:30:00", "N/A"),
        ]),
    );
    Pipeline::new(config).run().expect_err("second run fails");

    let outputs = workspace.path().join("outputs");
    for name in ["monthly_trends.csv", "regional_revenue.csv", "top_customers.csv"] {
        assert!(!outputs.join(name).exists(), "{name} should be gone");
    }
    assert_eq!(
        workspace.read("outputs/repeat_customers.csv"),
        "customer_id,customer_name,mobile_number\n1,Alice,555-1\n"
    );
}

#[test]
fn aborted_run_removes_every_earlier_output() {
    let workspace = TestWorkspace::new();
    let data_dir = workspace.worked_example();
    let config = config_for(&workspace);
    Pipeline::new(config.clone()).run().expect("first run");

    std::fs::remove_file(data_dir.join("orders_20240219.xml")).expect("remove orders");
    Pipeline::new(config).run().expect_err("no orders file");

    let remaining = std::fs::read_dir(workspace.path().join("outputs"))
        .expect("outputs dir")
        .count();
    assert_eq!(remaining, 0);
}
