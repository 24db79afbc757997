// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::process::Command;

fn write_manifest(tag: &str, yaml: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("mc68k-cli-{}-{}.yaml", tag, std::process::id()));
    std::fs::write(&path, yaml).unwrap();
    path
}

fn mc68k() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mc68k"))
}

#[test]
fn test_map_json() {
    let manifest = write_manifest(
        "map",
        r#"
name: "evb"
cpu: cpu32
memory:
  - id: rom
    base: 0x0
    size: "0x10000"
    read_only: true
  - id: ram
    base: 0x100000
    size: "4KiB"
"#,
    );

    let output = mc68k()
        .args(["--system", manifest.to_str().unwrap(), "--json", "map"])
        .output()
        .expect("Failed to execute command");
    std::fs::remove_file(&manifest).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).expect("Failed to parse JSON");

    assert_eq!(json["name"], "evb");
    assert_eq!(json["cpu"], "cpu32");
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[1]["name"], "ram");
    assert_eq!(entries[1]["size"], 4096);
    assert_eq!(entries[4]["name"], "qsm");
}

#[test]
fn test_probe_json_default_system() {
    let output = mc68k()
        .args(["probe", "0xFFFA00", "--word", "--json"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).expect("Failed to parse JSON");
    assert_eq!(json["claimant"], "sim");
    assert_eq!(json["width"], 16);
    // SIMCR reset value
    assert_eq!(json["value"], 0x00CF);
}

#[test]
fn test_probe_text_unmapped() {
    let output = mc68k()
        .args(["probe", "0xFFFB00"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unmapped"), "stdout: {}", stdout);
}

#[test]
fn test_invalid_manifest_is_config_error() {
    let manifest = write_manifest(
        "bad",
        r#"
schema_version: "2.0"
name: "future"
"#,
    );

    let output = mc68k()
        .args(["--system", manifest.to_str().unwrap(), "map"])
        .output()
        .expect("Failed to execute command");
    std::fs::remove_file(&manifest).ok();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_manifest_is_config_error() {
    let output = mc68k()
        .args(["--system", "/nonexistent/mc68k.yaml", "map"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(2));
}
