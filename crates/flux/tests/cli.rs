#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::Command;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "fluxcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn flux() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_flux"));
    command
        .env_remove("FLUX_STOMP")
        .env_remove("FLUX_DEVICE")
        .env_remove("FLUX_BAUD");
    command
}

#[test]
fn effects_lists_builtin_catalog() {
    let output = flux()
        .arg("--format")
        .arg("json")
        .arg("effects")
        .output()
        .expect("effects should run");

    assert!(output.status.success());
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("effects should emit json");
    let verbs: Vec<&str> = payload
        .as_array()
        .expect("catalog should be an array")
        .iter()
        .filter_map(|effect| effect.get("verb").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(verbs, ["BLINK", "FADE", "OFF", "PULSE", "RAINBOW", "SOLID"]);

    let fade = &payload[1];
    assert_eq!(fade["kind"], "single-shot");
}

#[test]
fn replay_of_capture_exits_zero() {
    let dir = unique_temp_dir("replay");
    let capture = dir.join("capture.bin");
    std::fs::write(
        &capture,
        b"SOLID\nchannel:front\ncolor:red\nreceipt:1\n\n\0UNKNOWN\n\n\0PULSE\nchannel:back\ncolor:blue\n\n\0",
    )
    .expect("capture should be writable");

    let output = flux()
        .arg("--format")
        .arg("json")
        .arg("replay")
        .arg(&capture)
        .arg("--tick")
        .arg("5ms")
        .arg("--gap-ticks")
        .arg("3")
        .output()
        .expect("replay should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("replay should emit json");
    assert_eq!(summary["frames"], 3);
    assert_eq!(summary["dispatched"], 2);
    assert_eq!(summary["rejected"], 1);
    assert_eq!(summary["acks"], 2);
    assert_eq!(summary["exit"], "connection-lost");

    let channels = summary["channels"].as_array().expect("channels array");
    let front = channels
        .iter()
        .find(|c| c["channel"] == "front")
        .expect("front channel should be recorded");
    assert_eq!(front["last_lit"], "#ff0000@255");
    assert_eq!(front["output"], "#000000@0");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn replay_of_missing_file_fails() {
    let output = flux()
        .arg("replay")
        .arg("/nonexistent/flux-capture.bin")
        .output()
        .expect("replay should run");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn run_with_inaccessible_device_exits_one() {
    let output = flux()
        .arg("run")
        .arg("--stomp")
        .arg("--device")
        .arg(format!("/dev/flux-missing-{}", std::process::id()))
        .output()
        .expect("run should start");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("serial session failed"), "stderr: {stderr}");
}

#[test]
fn unwritable_log_path_exits_one() {
    let output = flux()
        .arg("--log")
        .arg("/nonexistent-dir/flux.log")
        .arg("effects")
        .output()
        .expect("effects should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot open log file"), "stderr: {stderr}");
}

#[test]
fn log_file_receives_events() {
    let dir = unique_temp_dir("logfile");
    let log = dir.join("flux.log");
    std::fs::write(&log, "stale line\n").expect("log should be writable");
    let capture = dir.join("capture.bin");
    std::fs::write(&capture, b"SOLID\ncolor:red\n\n\0").expect("capture should be writable");

    let output = flux()
        .arg("--log")
        .arg(&log)
        .arg("--debug")
        .arg("--format")
        .arg("pretty")
        .arg("replay")
        .arg(&capture)
        .output()
        .expect("replay should run");
    assert!(output.status.success());

    let contents = std::fs::read_to_string(&log).expect("log should be readable");
    assert!(!contents.contains("stale line"));
    assert!(contents.contains("session started"));
    assert!(contents.contains("command dispatched"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_writes_framed_command_to_stdout() {
    let output = flux()
        .arg("send")
        .arg("--verb")
        .arg("SOLID")
        .arg("-H")
        .arg("color=red")
        .output()
        .expect("send should run");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"SOLID\ncolor:red\n\n\0");
}

#[test]
fn send_with_bad_header_is_usage_error() {
    let output = flux()
        .arg("send")
        .arg("--verb")
        .arg("SOLID")
        .arg("--header")
        .arg("color")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn startup_failure_is_logged() {
    let dir = unique_temp_dir("fatal");
    let log = dir.join("flux.log");

    let output = flux()
        .arg("--log")
        .arg(&log)
        .arg("run")
        .arg("--stomp")
        .arg("--device")
        .arg(format!("/dev/flux-missing-{}", std::process::id()))
        .output()
        .expect("run should start");
    assert_eq!(output.status.code(), Some(1));

    let contents = std::fs::read_to_string(&log).expect("log should be readable");
    assert!(contents.contains("flux started"), "log: {contents}");
    let fatal = contents
        .lines()
        .find(|line| line.contains("fatal error; exiting"))
        .expect("fatal error should be logged");
    assert!(fatal.contains("ERROR"), "line: {fatal}");
    assert!(fatal.contains("serial session failed"), "line: {fatal}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn oversized_duration_is_usage_error() {
    let dir = unique_temp_dir("duration");
    let capture = dir.join("capture.bin");
    std::fs::write(&capture, b"SOLID\ncolor:red\n\n\0").expect("capture should be writable");

    let output = flux()
        .arg("replay")
        .arg(&capture)
        .arg("--stop-timeout")
        .arg("18446744073709551615s")
        .output()
        .expect("replay should run");
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}
