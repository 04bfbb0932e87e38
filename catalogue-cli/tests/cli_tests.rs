use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_table(data_dir: &Path, layer: &str, table: &str, content: &str) {
    let dir = data_dir.join(layer);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{}.csv", table)), content).unwrap();
}

fn healthy_warehouse() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_table(
        dir.path(),
        "gold",
        "dim_customer",
        "customer_id,email,status\nCUST-0001,a@example.com,active\nCUST-0002,b@example.com,active\nCUST-0003,c@example.com,closed\n",
    );
    write_table(
        dir.path(),
        "bronze",
        "core_banking_customers",
        "CIF_NUM,CUST_NAME\nCIF-0001,ALICE\nCIF-0002,BOB\n",
    );
    dir
}

fn catalogue() -> Command {
    let mut cmd = Command::cargo_bin("catalogue").unwrap();
    cmd.env_remove("CATALOGUE_OUTPUT_DIR")
        .env_remove("CATALOGUE_THREADS")
        .env_remove("CATALOGUE_LOG_FORMAT");
    cmd
}

#[test]
fn test_run_writes_catalogue() {
    let data = healthy_warehouse();
    let out = TempDir::new().unwrap();

    catalogue()
        .arg("run")
        .arg("--data-dir")
        .arg(data.path())
        .arg("--output")
        .arg(out.path())
        .arg("--threads")
        .arg("2")
        .arg("--as-of")
        .arg("2024-06-01T00:00:00Z")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tables profiled: 2/2"));

    for doc in [
        "dim_customer_profile.json",
        "core_banking_customers_profile.json",
        "master_catalogue.json",
        "quality_report.json",
        "lineage_map.json",
        "business_glossary.json",
        "run_summary.json",
    ] {
        assert!(out.path().join(doc).exists(), "missing {}", doc);
    }

    let profile: serde_json::Value =
        serde_json::from_slice(&fs::read(out.path().join("dim_customer_profile.json")).unwrap())
            .unwrap();
    assert_eq!(profile["tableName"], "dim_customer");
    assert_eq!(profile["layer"], "gold");
    assert_eq!(profile["profiledAt"], "2024-06-01T00:00:00Z");
    let email = profile["columns"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "email")
        .unwrap();
    assert_eq!(email["sensitivity"], "PII");
    assert_eq!(email["type"], "email");
}

#[test]
fn test_empty_table_gives_nonzero_exit() {
    let data = healthy_warehouse();
    write_table(data.path(), "realtime", "hourly_metrics", "hour,events\n");
    let out = TempDir::new().unwrap();

    catalogue()
        .arg("run")
        .arg("--data-dir")
        .arg(data.path())
        .arg("--output")
        .arg(out.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("hourly_metrics"));

    // Siblings are still published
    assert!(out.path().join("dim_customer_profile.json").exists());
    assert!(!out.path().join("hourly_metrics_profile.json").exists());

    let summary: serde_json::Value =
        serde_json::from_slice(&fs::read(out.path().join("run_summary.json")).unwrap()).unwrap();
    assert_eq!(summary["failures"][0]["kind"], "SourceReadError");
    assert_eq!(summary["exitCode"], 1);
}

#[test]
fn test_dangling_lineage_exit_code() {
    let data = healthy_warehouse();
    let out = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    let config = config_dir.path().join("catalogue.yaml");
    fs::write(
        &config,
        "lineage:\n  edges:\n    - from: Salesforce CRM\n      to: dim_customer\n",
    )
    .unwrap();

    catalogue()
        .arg("run")
        .arg("--data-dir")
        .arg(data.path())
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(out.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("lineage withheld"));

    assert!(!out.path().join("lineage_map.json").exists());
    assert!(out.path().join("quality_report.json").exists());
}

#[test]
fn test_validate_command() {
    let data = healthy_warehouse();
    let config_dir = TempDir::new().unwrap();
    let config = config_dir.path().join("catalogue.yaml");
    fs::write(
        &config,
        "lineage:\n  sources:\n    - id: Oracle Core Banking DB\n  edges:\n    - from: Oracle Core Banking DB\n      to: core_banking_customers\n    - from: core_banking_customers\n      to: dim_customer\n",
    )
    .unwrap();

    catalogue()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 lineage edges"));
}

#[test]
fn test_invalid_config_fails() {
    let config_dir = TempDir::new().unwrap();
    let config = config_dir.path().join("catalogue.yaml");
    fs::write(&config, "lexicon:\n  - class: PII\n    patterns: ['(unclosed']\n").unwrap();

    catalogue()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure();
}

#[test]
fn test_missing_data_dir_fails() {
    let out = TempDir::new().unwrap();
    catalogue()
        .arg("run")
        .arg("--data-dir")
        .arg(out.path().join("does-not-exist"))
        .arg("--output")
        .arg(out.path())
        .assert()
        .failure();
}

#[test]
fn test_example_config_is_valid() {
    let config = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/catalogue.example.yaml");
    let data = TempDir::new().unwrap();
    write_table(data.path(), "bronze", "core_banking_customers", "CIF_NUM\nCIF-0001\n");
    write_table(data.path(), "bronze", "crm_contacts", "contact_id\nC-1\n");

    catalogue()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("4 lineage edges"));

    // Without the bronze tables the edges dangle
    catalogue()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2);
}
