//! Integration tests for the RCT CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.
//! The authoritative warehouse is never contacted: tests run under the
//! `manual` strategy (mirror-side matching against an empty mirror) or
//! verify that live matching degrades cleanly when unconfigured.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to get an rct command bound to a temp database
fn rct(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rct").unwrap();
    cmd.current_dir(tmp.path())
        .env("RCT_DATABASE", tmp.path().join("roster.db"))
        .env("RCT_CACHE_STRATEGY", "manual")
        .env_remove("RCT_NETWORK_URL")
        .env_remove("RCT_NETWORK_NPI_SQL");
    cmd
}

fn write_roster(tmp: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn upload(tmp: &TempDir, file: &Path) {
    rct(tmp)
        .args(["list", "upload"])
        .arg(file)
        .assert()
        .success();
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    Command::cargo_bin("rct")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("target lists"));
}

#[test]
fn test_version_displays() {
    Command::cargo_bin("rct")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rct"));
}

#[test]
fn test_completions_generate() {
    Command::cargo_bin("rct")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rct"));
}

// ============================================================================
// Upload / ingest
// ============================================================================

#[test]
fn test_upload_reports_counts() {
    let tmp = TempDir::new().unwrap();
    let file = write_roster(
        &tmp,
        "roster.csv",
        "npi,Specialty\n1234567890,Cardiology\n123-456-7890,Oncology\n9876543210,Oncology\n",
    );

    // Duplicate after normalization: 3 rows, 2 unique
    rct(&tmp)
        .args(["list", "upload"])
        .arg(&file)
        .args(["--name", "Q3 Roster", "--client", "Acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 rows"))
        .stdout(predicate::str::contains("2 unique"));
}

#[test]
fn test_upload_empty_file_fails() {
    let tmp = TempDir::new().unwrap();
    let file = write_roster(&tmp, "empty.csv", "npi\n");

    rct(&tmp)
        .args(["list", "upload"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no data rows"));
}

#[test]
fn test_upload_detects_npi_column_heuristically() {
    let tmp = TempDir::new().unwrap();
    let file = write_roster(
        &tmp,
        "noheader.csv",
        "Name,Provider Number\nDr. A,1234567890\nDr. B,9876543210\n",
    );

    rct(&tmp)
        .args(["list", "upload"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 unique"));
}

#[test]
fn test_live_match_degrades_to_zero_without_source() {
    let tmp = TempDir::new().unwrap();
    let file = write_roster(&tmp, "roster.csv", "npi\n1234567890\n");

    rct(&tmp)
        .env("RCT_CACHE_STRATEGY", "live")
        .args(["list", "upload"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 in network"))
        .stderr(predicate::str::contains("network match skipped"));
}

#[test]
fn test_unknown_strategy_is_rejected() {
    let tmp = TempDir::new().unwrap();
    rct(&tmp)
        .env("RCT_CACHE_STRATEGY", "eventually")
        .args(["list", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown cache strategy"));
}

// ============================================================================
// Inspection
// ============================================================================

#[test]
fn test_ls_shows_uploaded_list() {
    let tmp = TempDir::new().unwrap();
    let file = write_roster(&tmp, "roster.csv", "npi\n1234567890\n");
    rct(&tmp)
        .args(["list", "upload"])
        .arg(&file)
        .args(["--name", "My Roster"])
        .assert()
        .success();

    rct(&tmp)
        .args(["list", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("My Roster"));
}

#[test]
fn test_show_json_caps_payload_at_thirty_keys() {
    let tmp = TempDir::new().unwrap();

    let mut header = String::from("npi");
    let mut row = String::from("1234567890");
    for i in 1..=40 {
        header.push_str(&format!(",c{i}"));
        row.push_str(&format!(",v{i}"));
    }
    let file = write_roster(&tmp, "wide.csv", &format!("{header}\n{row}\n"));
    upload(&tmp, &file);

    let output = rct(&tmp)
        .args(["list", "show", "1", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let extra = &parsed["summary"]["sample"][0]["extra"];
    let keys = extra.as_object().unwrap();
    assert_eq!(keys.len(), 30);
    assert!(keys.contains_key("c1"));
    assert!(keys.contains_key("c30"));
    assert!(!keys.contains_key("c31"));
}

#[test]
fn test_show_json_reports_facets_and_percentiles() {
    let tmp = TempDir::new().unwrap();

    let mut roster = String::from("npi,Specialty,Score\n");
    for i in 0..10 {
        roster.push_str(&format!("{:010},Cardiology,{}\n", 1_000_000_000u64 + i, i + 1));
    }
    let file = write_roster(&tmp, "scored.csv", &roster);
    upload(&tmp, &file);

    let output = rct(&tmp)
        .args(["list", "show", "1", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let facets = parsed["summary"]["facets"].as_array().unwrap();
    let specialty = facets.iter().find(|f| f["key"] == "Specialty").unwrap();
    assert_eq!(specialty["top"][0][0], "Cardiology");
    assert_eq!(specialty["top"][0][1], 10);

    let numerics = parsed["summary"]["numerics"].as_array().unwrap();
    let score = numerics.iter().find(|n| n["key"] == "Score").unwrap();
    assert_eq!(score["count"], 10);
    assert_eq!(score["p50"], 6.0);
    assert_eq!(score["p90"], 9.0);
}

#[test]
fn test_show_missing_list_fails() {
    let tmp = TempDir::new().unwrap();
    rct(&tmp)
        .args(["list", "show", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// ============================================================================
// Match / edit / delete
// ============================================================================

#[test]
fn test_match_against_empty_mirror_is_zero() {
    let tmp = TempDir::new().unwrap();
    let file = write_roster(&tmp, "roster.csv", "npi\n1234567890\n");
    upload(&tmp, &file);

    rct(&tmp)
        .args(["list", "match", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 NPIs in network"));
}

#[test]
fn test_edit_updates_metadata() {
    let tmp = TempDir::new().unwrap();
    let file = write_roster(&tmp, "roster.csv", "npi\n1234567890\n");
    upload(&tmp, &file);

    rct(&tmp)
        .args(["list", "edit", "1", "--name", "Renamed", "--notes", "updated"])
        .assert()
        .success();

    rct(&tmp)
        .args(["list", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed"));
}

#[test]
fn test_rm_deletes_list() {
    let tmp = TempDir::new().unwrap();
    let file = write_roster(&tmp, "roster.csv", "npi\n1234567890\n");
    upload(&tmp, &file);

    rct(&tmp).args(["list", "rm", "1"]).assert().success();
    rct(&tmp)
        .args(["list", "show", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// ============================================================================
// Network mirror
// ============================================================================

#[test]
fn test_network_status_shows_strategy_and_empty_mirror() {
    let tmp = TempDir::new().unwrap();
    rct(&tmp)
        .args(["network", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("manual"))
        .stdout(predicate::str::contains("not configured"))
        .stdout(predicate::str::contains("never"));
}

#[test]
fn test_manual_refresh_without_source_fails_loudly() {
    let tmp = TempDir::new().unwrap();
    rct(&tmp)
        .args(["network", "refresh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}
