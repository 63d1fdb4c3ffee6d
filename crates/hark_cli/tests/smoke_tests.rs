//! CLI smoke tests: verify basic binary behavior.

use std::process::Command;

fn cli_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hark"))
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("--host"));
    assert!(stdout.contains("--audio"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("hark_cli"),
        "Expected crate name in --version output"
    );
}

#[test]
fn test_invalid_config_does_not_panic() {
    // A missing config file with --help still exits cleanly
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_hark_config_12345.toml")
        .arg("--help")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
}

#[test]
fn test_missing_api_key_is_rejected_before_prompting() {
    let dir = std::env::temp_dir().join(format!("hark-smoke-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = dir.join("config.toml");
    std::fs::write(&config, "[llm]\nprovider = \"openai\"\napi_key = \"\"\n").unwrap();

    let output = cli_bin()
        .current_dir(&dir)
        .env_remove("OPENAI_API_KEY")
        .env_remove("HARK_API_KEY")
        .env_remove("LLM_PROVIDER")
        .arg("--config")
        .arg(&config)
        .arg("--text")
        .arg("list files")
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("api_key"), "stderr was: {stderr}");
}

#[test]
fn test_conflicting_inputs_rejected() {
    let output = cli_bin()
        .args(["--text", "list files", "--audio", "cmd.wav"])
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
}
