//! CLI test cases.
//!
//! These run entirely against the canned `fixture` OCR engine, which replays
//! captured OCR responses stored in place of the image bytes. No network
//! access or real API key is needed.

use std::{fs, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

/// Directory of canned identity-document captures.
static FIXTURE_DIR: &str = "tests/fixtures/ids";

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("idfields").unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_extract_fixture_directory() {
    let out_dir = tempfile::tempdir().unwrap();
    let out_path = out_dir.path().join("records.jsonl");
    cmd()
        .arg("extract")
        .arg(FIXTURE_DIR)
        .args(["--engine", "fixture"])
        .arg("--out")
        .arg(&out_path)
        .assert()
        .success();

    let output = fs::read_to_string(&out_path).unwrap();
    let records: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 4);

    // Records come back in filename order, regardless of how the platform
    // iterates the directory.
    let names: Vec<&str> = records
        .iter()
        .map(|record| {
            record["path"]
                .as_str()
                .unwrap()
                .rsplit('/')
                .next()
                .unwrap()
        })
        .collect();
    assert_eq!(
        names,
        [
            "aadhar-card.png",
            "blank.png",
            "driving-license.jpg",
            "passport.jpeg"
        ]
    );

    // An unlabeled Aadhar number is found on its own.
    assert_eq!(records[0]["status"], "ok");
    assert_eq!(records[0]["fields"]["aadhar_number"], "1234 5678 9012");
    assert_eq!(records[0]["fields"]["name"], Value::Null);

    // An image with no text yields a record with every field null, and the
    // batch keeps going.
    assert_eq!(records[1]["status"], "incomplete");
    for (key, value) in records[1]["fields"].as_object().unwrap() {
        assert_eq!(value, &Value::Null, "expected null field: {key}");
    }

    // A fully labeled driving license.
    assert_eq!(records[2]["status"], "ok");
    assert_eq!(records[2]["fields"]["name"], "John Smith");
    assert_eq!(records[2]["fields"]["sex"], "M");
    assert_eq!(records[2]["fields"]["date_of_birth"], "15/06/1990");
    assert_eq!(records[2]["fields"]["license_number"], "MH14201100628");

    // A passport with no name label: the name comes from token geometry.
    assert_eq!(records[3]["status"], "ok");
    assert_eq!(records[3]["fields"]["passport_number"], "A1234567");
    assert_eq!(records[3]["fields"]["name"], "Priya Sharma");
}

#[test]
fn test_extract_writes_to_stdout_by_default() {
    cmd()
        .arg("extract")
        .arg(FIXTURE_DIR)
        .args(["--engine", "fixture"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name":"John Smith""#));
}

#[test]
fn test_min_name_height_is_configurable() {
    // With a threshold taller than every token on the passport capture, the
    // geometric fallback finds nothing.
    cmd()
        .arg("extract")
        .arg(FIXTURE_DIR)
        .args(["--engine", "fixture", "--min-name-height", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Priya Sharma").not());
}

#[test]
fn test_extract_vision_requires_credentials() {
    cmd()
        .env_remove("VISION_API_KEY")
        .arg("extract")
        .arg(FIXTURE_DIR)
        .assert()
        .failure()
        .stderr(predicate::str::contains("authenticate"));
}

#[test]
fn test_schema() {
    cmd()
        .args(["schema", "FileOutput"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"properties\""));
}
