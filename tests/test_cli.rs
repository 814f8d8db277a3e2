// CLI integration tests for callwire
// Tests the command-line interface functionality

use std::io::Write;
use std::net::TcpListener;
use std::process::Command;

/// Test that --help flag shows help message with program description
#[test]
fn test_help_flag_shows_help_message() {
    let output = Command::new(env!("CARGO_BIN_EXE_callwire"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Help should exit with success");
    assert!(
        stdout.contains("callwire"),
        "Help should contain program name. Got: {}",
        stdout
    );
    assert!(
        stdout.contains("call") && stdout.contains("operations"),
        "Help should list subcommands. Got: {}",
        stdout
    );
}

/// Test that `operations` lists the catalog with outcome events
#[test]
fn test_operations_lists_catalog() {
    let output = Command::new(env!("CARGO_BIN_EXE_callwire"))
        .arg("operations")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(
        stdout
            .lines()
            .any(|line| line == "create_project\tcreate_project_success\tcreate_project_error"),
        "create_project should be listed. Got: {}",
        stdout
    );
}

/// Test that an unknown operation without explicit events is rejected
#[test]
fn test_call_unknown_operation_shows_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_callwire"))
        .args(["call", "no_such_operation"])
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(
        stderr.contains("unknown operation"),
        "Should explain the failure. Got: {}",
        stderr
    );
}

/// Test that --success without --error is rejected by argument parsing
#[test]
fn test_call_requires_both_outcome_events() {
    let output = Command::new(env!("CARGO_BIN_EXE_callwire"))
        .args(["call", "custom", "--success", "custom_done"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
}

/// Test that an unreachable backend produces a connectivity error
#[test]
fn test_call_unreachable_backend_fails() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let output = Command::new(env!("CARGO_BIN_EXE_callwire"))
        .args([
            "call",
            "status",
            "--endpoint",
            &format!("http://127.0.0.1:{}", port),
            "--timeout-ms",
            "2000",
        ])
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("callwire-cli-test"))
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(
        stderr.contains("connectivity error"),
        "Should report connectivity. Got: {}",
        stderr
    );
}

/// Test a full exchange against a one-shot backend
#[test]
fn test_call_prints_success_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let backend = std::thread::spawn(move || {
        use std::io::{BufRead, BufReader};

        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let frame: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(frame["event"], "fetch_logs");

        let mut writer = stream;
        writer
            .write_all(b"{\"event\":\"fetch_logs_response\",\"payload\":{\"logs\":[\"started\"]}}\n")
            .unwrap();
        // Wait for the client to hang up.
        let mut rest = String::new();
        let _ = reader.read_line(&mut rest);
    });

    let output = Command::new(env!("CARGO_BIN_EXE_callwire"))
        .args([
            "call",
            "fetch_logs",
            "--endpoint",
            &format!("127.0.0.1:{}", port),
        ])
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("callwire-cli-test"))
        .env_remove("CALLWIRE_ENDPOINT")
        .output()
        .expect("Failed to execute command");

    backend.join().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let printed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(printed, serde_json::json!({"logs": ["started"]}));
}
