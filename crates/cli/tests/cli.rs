// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use assert_cmd::Command;
use predicates::prelude::*;
use rfctl_core::boot::image::{lut_block_addr, EepromImage, MIN_IMAGE_LEN};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const CONFIG: &str = r#"
schema_version: "1.0"
name: cli-bench
device_address: 0x12
clock_hz: 1000000
boot:
  auto_boot: false
peripherals:
  i2c_latency_cycles: 1
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[allow(deprecated)]
fn rfctl() -> Command {
    Command::cargo_bin("rfctl").unwrap()
}

fn run(config: &Path, script: &Path) -> Command {
    let mut cmd = rfctl();
    cmd.arg("run")
        .arg("--config")
        .arg(config)
        .arg("--script")
        .arg(script);
    cmd
}

fn image(dir: &TempDir) -> PathBuf {
    let bytes = EepromImage::new()
        .with_lut(0, (0..256u32).collect())
        .unwrap()
        .build(MIN_IMAGE_LEN)
        .unwrap();
    let path = dir.path().join("eeprom.bin");
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_run_passing_session() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "bench.yaml", CONFIG);
    let script = write(
        &dir,
        "session.yaml",
        r#"
steps:
  - write: { addr: 0x06, value: 0xABCD }
  - read: { addr: 0x06, expect: 0xABCD }
  - set_inputs: { temperature: 42 }
  - read: { addr: 0x10, expect: 0x2A00, mask: 0xFF00 }
"#,
    );
    run(&config, &script)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS write"))
        .stdout(predicate::str::contains("PASS: 4 step(s)"));
}

#[test]
fn test_failed_expectation_exits_one() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "bench.yaml", CONFIG);
    let script = write(
        &dir,
        "session.yaml",
        r#"
steps:
  - write: { addr: 0x06, value: 1 }
  - read: { addr: 0x06, expect: 2 }
"#,
    );
    run(&config, &script)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL read"));
}

#[test]
fn test_json_report() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "bench.yaml", CONFIG);
    let script = write(
        &dir,
        "session.yaml",
        r#"
steps:
  - read: { addr: 0x1C }
  - wait_ticks: 100
"#,
    );
    let output = run(&config, &script).arg("--json").output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "pass");
    assert_eq!(report["steps"].as_array().unwrap().len(), 2);
    assert_eq!(report["bytes_received"], 12);
    assert_eq!(report["bytes_sent"], 10);
}

#[test]
fn test_bad_config_exits_two() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "bench.yaml", "schema_version: \"9\"\n");
    let script = write(&dir, "session.yaml", "steps: []\n");
    run(&config, &script).assert().code(2);
}

#[test]
fn test_missing_script_exits_two() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "bench.yaml", CONFIG);
    run(&config, &dir.path().join("missing.yaml"))
        .assert()
        .code(2);
}

#[test]
fn test_exhausted_budget_exits_three() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "bench.yaml", CONFIG);
    let script = write(
        &dir,
        "session.yaml",
        r#"
max_ticks: 50
steps:
  - wait_ticks: 100
"#,
    );
    run(&config, &script).assert().code(3);
}

#[test]
fn test_silent_target_exits_three() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "bench.yaml", CONFIG);
    let script = write(
        &dir,
        "session.yaml",
        r#"
max_ticks: 20000
target_address: 0x33
steps:
  - read: { addr: 0x00 }
"#,
    );
    run(&config, &script).assert().code(3);
}

#[test]
fn test_manual_boot_from_image() {
    let dir = tempdir().unwrap();
    image(&dir);
    let config = write(
        &dir,
        "bench.yaml",
        &format!("{}eeprom:\n  image: eeprom.bin\n", CONFIG),
    );
    let script = write(
        &dir,
        "session.yaml",
        r#"
steps:
  - write: { addr: 0x30, value: 1 }
  - wait_boot: 100000
  - read: { addr: 0x30, expect: 0x00FF0011, mask: 0x00FFFFFF }
  - write: { addr: 0x31, value: 0x8000000500000000 }
  - read: { addr: 0x31, expect: 0x0000000500000005 }
"#,
    );
    run(&config, &script)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS wait_boot"));
}

#[test]
fn test_snapshot_written() {
    let dir = tempdir().unwrap();
    let config = write(&dir, "bench.yaml", CONFIG);
    let script = write(&dir, "session.yaml", "steps:\n  - wait_ticks: 10\n");
    let snapshot = dir.path().join("out/snapshot.json");
    run(&config, &script)
        .arg("--snapshot")
        .arg(&snapshot)
        .assert()
        .success();
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(value["timestamp"], 10);
    assert!(value["components"]["dispatcher"].is_object());
}

#[test]
fn test_inspect_valid_image() {
    let dir = tempdir().unwrap();
    let path = image(&dir);
    rfctl()
        .arg("inspect")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("magic LFPG"))
        .stdout(predicate::str::contains("VALID"));
}

#[test]
fn test_inspect_corrupt_table() {
    let dir = tempdir().unwrap();
    let path = image(&dir);
    let mut bytes = fs::read(&path).unwrap();
    bytes[lut_block_addr(0) as usize + 3] ^= 0x80;
    fs::write(&path, bytes).unwrap();
    rfctl()
        .arg("inspect")
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("MISMATCH"));
}

#[test]
fn test_inspect_rejects_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.bin");
    fs::write(&path, [0u8; 64]).unwrap();
    rfctl().arg("inspect").arg(&path).assert().code(2);
}
