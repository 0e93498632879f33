//! Timestamped logging to `~/.yap_store/yap.log`, plus quiet-mode gating for stdout.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::paths;

static LOG_LOCK: Mutex<()> = Mutex::new(());

/// True when `YAP_QUIET` is set to a truthy value.
pub fn is_quiet() -> bool {
    std::env::var("YAP_QUIET").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn log_file_path() -> Option<std::path::PathBuf> {
    paths::store_dir().ok().map(|d| d.join("yap.log"))
}

fn append_line(line: &str) {
    let Some(path) = log_file_path() else { return };
    let _guard = LOG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&path) {
        let _ = writeln!(f, "{line}");
    }
}

/// Informational log line; also printed to stdout unless quiet.
pub fn log(message: &str) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    append_line(&format!("[{timestamp}] {message}"));
    if !is_quiet() {
        println!("{message}");
    }
}

/// Error log line; printed to stderr regardless of quiet mode.
pub fn log_error(message: &str) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    append_line(&format!("[{timestamp}] ERROR: {message}"));
    eprintln!("{message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_detection_honors_env() {
        std::env::remove_var("YAP_QUIET");
        assert!(!is_quiet());
        std::env::set_var("YAP_QUIET", "1");
        assert!(is_quiet());
        std::env::remove_var("YAP_QUIET");
    }
}
