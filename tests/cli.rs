// The demo binary end to end
use std::process::{Command, Output};

fn schedsim(args: &[&str], rust_log: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_schedsim"));
    cmd.args(args);
    match rust_log {
        Some(filter) => cmd.env("RUST_LOG", filter),
        None => cmd.env_remove("RUST_LOG"),
    };
    cmd.output().unwrap()
}

#[test]
fn short_memory_skips_ipc_demos_instead_of_failing() {
    let out = schedsim(&["--total-memory", "300", "--cycles", "3"], None);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("created process 1"));
    assert!(!stdout.contains("created process 2"));
    assert!(String::from_utf8_lossy(&out.stderr).contains("skipping the IPC demos"));
}

#[test]
fn ipc_demos_use_the_created_processes() {
    // 512 MB for the first demo process does not fit, so the pair is 1 and 2
    // of the ones that did
    let out = schedsim(&["--total-memory", "400", "--cycles", "1"], None);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("process 1 registered as producer"));
    assert!(stdout.contains("process 2 registered as consumer"));
}

#[test]
fn unknown_algorithm_is_a_hard_failure() {
    let out = schedsim(&["--algorithm", "lottery"], None);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid simulator configuration"));
}

#[test]
fn rust_log_is_honoured_without_verbose_flags() {
    let out = schedsim(&["--cycles", "2"], Some("debug"));
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("DEBUG"), "{}", stderr);
    assert!(stderr.contains("INFO"), "{}", stderr);
}

#[test]
fn quiet_by_default_and_verbose_on_request() {
    let quiet = schedsim(&["--cycles", "2"], None);
    assert!(!String::from_utf8_lossy(&quiet.stderr).contains("INFO"));

    let verbose = schedsim(&["--cycles", "2", "-v"], Some("error"));
    assert!(String::from_utf8_lossy(&verbose.stderr).contains("INFO"));
}

#[test]
fn json_mode_prints_one_object_per_line() {
    let out = schedsim(&["--json", "--cycles", "4", "--algorithm", "round_robin"], None);
    assert!(out.status.success());
    for line in String::from_utf8_lossy(&out.stdout).lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.is_object(), "{}", line);
    }
}
