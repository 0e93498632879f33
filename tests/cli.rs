//! Integration tests: run the yap binary end-to-end against a scratch
//! project directory and check exit codes and output.

use std::path::Path;
use std::process::Command;

fn yap() -> Command {
    Command::new(env!("CARGO_BIN_EXE_yap"))
}

fn yap_in(dir: &Path) -> Command {
    let mut cmd = yap();
    cmd.current_dir(dir);
    cmd.env("YAP_QUIET", "1");
    cmd
}

#[test]
fn help_lists_all_subcommands() {
    let out = yap().arg("--help").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("install"));
    assert!(stdout.contains("list"));
    assert!(stdout.contains("add"));
    assert!(stdout.contains("config"));
}

#[test]
fn no_args_exits_nonzero_with_help() {
    let out = yap().output().unwrap();
    assert!(!out.status.success());
}

#[test]
fn install_with_no_package_json_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = yap_in(dir.path()).arg("install").output().unwrap();
    assert!(!out.status.success(), "install with no package.json should fail");
}

#[test]
fn install_with_no_dependencies_succeeds_and_writes_empty_lockfile() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("package.json"), "{}").unwrap();

    let out = yap_in(dir.path())
        .env("YAP_STORE_DIR", dir.path().join("store"))
        .env("YAP_INSTALL_WORKERS", "4")
        .arg("install")
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(dir.path().join("yap.lockb").is_file());
}

#[test]
fn list_with_no_lockfile_does_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = yap_in(dir.path()).arg("list").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("yap install"));
}

#[test]
fn list_json_with_no_lockfile_prints_null() {
    let dir = tempfile::tempdir().unwrap();
    let out = yap_in(dir.path()).args(["list", "--json"]).output().unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "null");
}

#[test]
fn config_set_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let config_home = dir.path().join("home");
    std::fs::create_dir_all(&config_home).unwrap();

    let set_out = yap_in(dir.path())
        .env("HOME", &config_home)
        .args(["config", "set", "registry", "https://example.com"])
        .output()
        .unwrap();
    assert!(set_out.status.success(), "stderr: {}", String::from_utf8_lossy(&set_out.stderr));

    let get_out = yap_in(dir.path())
        .env("HOME", &config_home)
        .args(["config", "get", "registry"])
        .output()
        .unwrap();
    assert!(get_out.status.success());
    assert_eq!(String::from_utf8_lossy(&get_out.stdout).trim(), "https://example.com");
}

#[test]
fn config_get_unknown_key_still_exits_success() {
    let dir = tempfile::tempdir().unwrap();
    let config_home = dir.path().join("home");
    std::fs::create_dir_all(&config_home).unwrap();

    let out = yap_in(dir.path())
        .env("HOME", &config_home)
        .args(["config", "get", "bogus"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("unknown config key"));
}
