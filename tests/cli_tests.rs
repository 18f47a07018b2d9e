//! End-to-end CLI tests using `assert_cmd`.
//!
//! These tests invoke the compiled binary and check exit codes and output.
//! None of them need Document AI, Google Drive or tesseract: extraction runs
//! through the local backend on plain-text dumps.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const DUMP: &str = "\
Extracted Text:
CBC panel

Extracted Entities:
TestTypeandResult: WBC
5.1
TestTypeandResult: Hemoglobin
13.2
dateoftest: 2024-07-18
";

fn cmd() -> Command {
    Command::cargo_bin("labextract").unwrap()
}

/// A config that selects the local backend so nothing reaches the network.
fn write_local_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, "default_backend = \"local\"\n\n[ocr]\nenabled = false\n").unwrap();
    path
}

// ─── Help / version ─────────────────────────────────────────────────────

#[test]
fn test_help_shows_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("drive"))
        .stdout(predicate::str::contains("ocr-batch"));
}

#[test]
fn test_version_shows_semver() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("labextract"));
}

// ─── Argument validation ────────────────────────────────────────────────

#[test]
fn test_process_help() {
    cmd()
        .args(["process", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PATH"))
        .stdout(predicate::str::contains("--backend"))
        .stdout(predicate::str::contains("--layout"))
        .stdout(predicate::str::contains("--keep-dumps"));
}

#[test]
fn test_parse_requires_dump() {
    cmd()
        .arg("parse")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DUMP"));
}

#[test]
fn test_invalid_layout_rejected() {
    cmd()
        .args(["parse", "dump.txt", "--layout", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_invalid_backend_rejected() {
    cmd()
        .args(["extract", "report.pdf", "--backend", "openai"])
        .env_remove("LABEXTRACT_BACKEND")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_dump_file_fails() {
    let dir = tempdir().unwrap();
    cmd()
        .arg("parse")
        .arg(dir.path().join("missing.txt"))
        .assert()
        .failure();
}

// ─── init ───────────────────────────────────────────────────────────────

#[test]
fn test_init_writes_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("nested").join("config.toml");

    cmd()
        .arg("init")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration"));

    let content = fs::read_to_string(&config).unwrap();
    assert!(content.contains("[documentai]"));
    assert!(content.contains("${LABEXTRACT_PASSWORD}"));
}

#[test]
fn test_init_keeps_existing_config_without_force() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "# mine\n").unwrap();

    cmd()
        .arg("init")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config).unwrap(), "# mine\n");
}

// ─── parse ──────────────────────────────────────────────────────────────

#[test]
fn test_parse_prints_csv() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("report.txt");
    fs::write(&dump, DUMP).unwrap();

    cmd()
        .arg("parse")
        .arg(&dump)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("TestType,2024-07-18"))
        .stdout(predicate::str::contains("WBC,5.1"))
        .stdout(predicate::str::contains("Hemoglobin,13.2"));
}

#[test]
fn test_parse_writes_date_column_layout() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("report.txt");
    let output = dir.path().join("results.csv");
    fs::write(&dump, DUMP).unwrap();

    cmd()
        .arg("parse")
        .arg(&dump)
        .arg("-o")
        .arg(&output)
        .args(["--layout", "date-column"])
        .assert()
        .success();

    let csv = fs::read_to_string(&output).unwrap();
    assert!(csv.starts_with("TestType,Result,Date"));
    assert!(csv.contains("WBC,5.1,2024-07-18"));
}

#[test]
fn test_parse_writes_json_by_extension() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("report.txt");
    let output = dir.path().join("results.json");
    fs::write(&dump, DUMP).unwrap();

    cmd().arg("parse").arg(&dump).arg("-o").arg(&output).assert().success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["headers"][1], "2024-07-18");
    assert_eq!(json["rows"][0][0], "WBC");
}

// ─── process ────────────────────────────────────────────────────────────

#[test]
fn test_process_single_dump_with_local_backend() {
    let dir = tempdir().unwrap();
    let config = write_local_config(dir.path());
    let dump = dir.path().join("report.txt");
    let output = dir.path().join("out.csv");
    fs::write(&dump, DUMP).unwrap();

    cmd()
        .arg("process")
        .arg(&dump)
        .arg("--config")
        .arg(&config)
        .arg("-o")
        .arg(&output)
        .env_remove("LABEXTRACT_BACKEND")
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed"));

    let csv = fs::read_to_string(&output).unwrap();
    assert!(csv.starts_with("TestType,2024-07-18"));
    assert!(csv.contains("Hemoglobin,13.2"));
}

#[test]
fn test_process_empty_directory() {
    let dir = tempdir().unwrap();
    let config = write_local_config(dir.path());
    let reports = dir.path().join("reports");
    fs::create_dir(&reports).unwrap();

    cmd()
        .arg("process")
        .arg(&reports)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No supported documents"));
}

#[test]
fn test_process_rejects_unknown_configured_backend() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "default_backend = \"openai\"\n").unwrap();
    let dump = dir.path().join("report.txt");
    fs::write(&dump, DUMP).unwrap();

    cmd()
        .arg("process")
        .arg(&dump)
        .arg("--config")
        .arg(&config)
        .env_remove("LABEXTRACT_BACKEND")
        .assert()
        .failure()
        .stderr(predicate::str::contains("openai"));
}

#[test]
fn test_process_keep_dumps_keeps_same_named_reports_apart() {
    use std::io::Write;

    let dir = tempdir().unwrap();
    let config = write_local_config(dir.path());
    let bundle = dir.path().join("bundle.zip");
    let mut writer = zip::ZipWriter::new(fs::File::create(&bundle).unwrap());
    for (name, date) in [("jan/report.txt", "2024-01-10"), ("feb/report.txt", "2024-02-14")] {
        writer
            .start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        write!(writer, "TestTypeandResult: WBC\n5.1\ndateoftest: {}\n", date).unwrap();
    }
    writer.finish().unwrap();

    let out_dir = dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();

    cmd()
        .arg("process")
        .arg(&bundle)
        .arg("--config")
        .arg(&config)
        .arg("-o")
        .arg(out_dir.join("merged.csv"))
        .arg("--keep-dumps")
        .env_remove("LABEXTRACT_BACKEND")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 entity dumps"));

    let jan = fs::read_to_string(out_dir.join("bundle.zip_jan_report.txt")).unwrap();
    let feb = fs::read_to_string(out_dir.join("bundle.zip_feb_report.txt")).unwrap();
    assert!(jan.contains("2024-01-10"));
    assert!(feb.contains("2024-02-14"));
}

// ─── drive ──────────────────────────────────────────────────────────────

#[test]
fn test_drive_requires_folder() {
    let dir = tempdir().unwrap();
    let config = write_local_config(dir.path());

    cmd()
        .arg("drive")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--folder"));
}
