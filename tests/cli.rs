use std::fs;
use std::process::{Command, Stdio};

fn jobnote() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_jobnote"));
    cmd.env_remove("JOBNOTE_CONFIG")
        .env_remove("RUST_LOG")
        .env_remove("JOBNOTE_LOG_FILE")
        .stdin(Stdio::null());
    cmd
}

#[test]
fn test_bad_config_fails_before_url_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("jobnote.yaml");
    fs::write(&config, "save_path: /notes\nunknown_key: 1\n").unwrap();

    let output = jobnote()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr);
    assert!(stderr.contains("error [environment]"), "stderr: {}", stderr);
    assert!(!stderr.contains("Job posting URL"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_file_is_environment_error() {
    let dir = tempfile::tempdir().unwrap();

    let output = jobnote()
        .current_dir(dir.path())
        .args(["--config", "absent.yaml", "https://jobs.example/1"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}
