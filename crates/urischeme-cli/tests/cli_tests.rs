//! Integration tests for the urischeme binary.
//!
//! Each test drives the built binary against a file-backed store inside a
//! temp directory and checks the JSON printed on stdout and the exit code.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Temp directory with hive files and a fake handler executable.
struct TestEnv {
    dir: TempDir,
    exe: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let exe = dir.path().join("demo-handler");
        std::fs::write(&exe, b"").unwrap();
        Self { dir, exe }
    }

    fn user_store(&self) -> PathBuf {
        self.dir.path().join("store").join("user.json")
    }

    fn machine_store(&self) -> PathBuf {
        self.dir.path().join("store").join("machine.json")
    }

    /// Run the binary and return (exit code, parsed stdout).
    fn run(&self, args: &[&str]) -> (i32, Value) {
        let output = Command::new(env!("CARGO_BIN_EXE_urischeme"))
            .arg("--user-store")
            .arg(self.user_store())
            .arg("--machine-store")
            .arg(self.machine_store())
            .args(args)
            .output()
            .expect("Failed to run urischeme");

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json: Value = serde_json::from_str(stdout.trim()).unwrap_or_else(|e| {
            panic!(
                "stdout is not JSON ({}): {}\nstderr: {}",
                e,
                stdout,
                String::from_utf8_lossy(&output.stderr)
            )
        });
        (output.status.code().unwrap_or(-1), json)
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_register_exists_show_unregister() {
    let env = TestEnv::new();
    let exe = path_arg(&env.exe);

    let (code, json) = env.run(&["register", "demo://", "--exe", &exe, "--positional", "1"]);
    assert_eq!(code, 0, "{}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["handler"], "demo");
    assert!(env.user_store().exists());

    let (code, json) = env.run(&["exists", "demo"]);
    assert_eq!(code, 0);
    assert_eq!(json["exists"], true);

    let (_, json) = env.run(&["exists", "demo", "--scope", "machine"]);
    assert_eq!(json["exists"], false);

    let (code, json) = env.run(&["show", "demo"]);
    assert_eq!(code, 0);
    assert_eq!(json["record"]["scheme"], "demo");
    assert_eq!(json["record"]["executable_path"], exe.as_str());
    assert_eq!(json["record"]["arguments"]["kind"], "positional_count");
    assert_eq!(json["record"]["arguments"]["value"], 1);

    let (code, _) = env.run(&["unregister", "demo"]);
    assert_eq!(code, 0);
    let (_, json) = env.run(&["exists", "demo"]);
    assert_eq!(json["exists"], false);
}

#[test]
fn test_missing_executable_exit_code() {
    let env = TestEnv::new();
    let missing = path_arg(&env.dir.path().join("missing"));

    let (code, json) = env.run(&["register", "demo", "--exe", &missing]);
    assert_eq!(code, 4);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], 4);
    assert!(json["error"].as_str().unwrap().contains("Couldn't locate file"));
    assert!(!env.user_store().exists());
}

#[test]
fn test_unregister_missing_and_swallow_errors() {
    let env = TestEnv::new();

    let (code, json) = env.run(&["unregister", "demo"]);
    assert_eq!(code, 7);
    assert_eq!(json["success"], false);

    let (code, json) = env.run(&["--swallow-errors", "unregister", "demo"]);
    assert_eq!(code, 0);
    assert_eq!(json["success"], true);
}

#[test]
fn test_invalid_scope_is_configuration_error() {
    let env = TestEnv::new();
    let exe = path_arg(&env.exe);

    let (code, json) = env.run(&["register", "demo", "--exe", &exe, "--scope", "everyone"]);
    assert_eq!(code, 5);
    assert_eq!(json["success"], false);
}

#[test]
fn test_update_with_named_handler() {
    let env = TestEnv::new();
    let exe = path_arg(&env.exe);
    let icon = env.dir.path().join("demo.ico");
    std::fs::write(&icon, b"").unwrap();
    let icon = path_arg(&icon);

    let (code, json) = env.run(&[
        "register", "demo", "--exe", &exe, "--name", "DemoApp", "--icon", &icon, "--icon-index",
        "2", "--scope", "machine",
    ]);
    assert_eq!(code, 0, "{}", json);

    let (code, json) = env.run(&[
        "update", "demo", "--name", "DemoApp", "--literal", "--open", "--scope", "machine",
    ]);
    assert_eq!(code, 0, "{}", json);

    let (_, json) = env.run(&["show", "DemoApp", "--scope", "machine"]);
    assert_eq!(json["record"]["arguments"]["kind"], "literal");
    assert_eq!(json["record"]["arguments"]["value"], "--open");
    assert_eq!(json["record"]["icon"]["index"], 2);
    assert!(env.machine_store().exists());
}

#[test]
fn test_parse_skips_non_uris() {
    let env = TestEnv::new();
    let exe = path_arg(&env.exe);

    let (code, json) = env.run(&[
        "parse",
        "--exe",
        &exe,
        "--",
        "--verbose",
        "demo://host:81/path?x=1",
        "C:\\Users\\demo",
    ]);
    assert_eq!(code, 0, "{}", json);

    let uris = json["uris"].as_array().unwrap();
    assert_eq!(uris.len(), 1);
    assert_eq!(uris[0]["scheme"], "demo");
    assert_eq!(uris[0]["port"], 81);
    assert_eq!(json["records"][0]["port"], 81);
}
