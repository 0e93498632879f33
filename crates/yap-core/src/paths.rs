//! Derives the four well-known directories from the user's home, and the
//! package-name sanitizer used to turn scoped names into filesystem keys.

use std::path::PathBuf;

use crate::error::{Result, YapError};

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| YapError::Filesystem {
        operation: "home_dir".to_string(),
        path: None,
        detail: "could not determine user home directory".to_string(),
    })
}

/// `~/.yap_store` — content-addressed store root. Overridable with `YAP_STORE_DIR`.
pub fn store_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("YAP_STORE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(home_dir()?.join(".yap_store"))
}

/// `~/.yap_store/.yap_cache` — binary metadata cache. Overridable with `YAP_CACHE_DIR`.
pub fn cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("YAP_CACHE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(store_dir()?.join(".yap_cache"))
}

/// `~/.yap_config` — binary global config file.
pub fn config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".yap_config"))
}

/// `<project>/node_modules/.yap/` — materialization root for one project.
pub fn dot_yap_dir(project_root: &std::path::Path) -> PathBuf {
    project_root.join("node_modules").join(".yap")
}

/// Replaces every `/` in a package name with `-`, so scoped names like
/// `@babel/core` become `@babel-core` for use as a filesystem key.
///
/// Idempotent and injective over inputs that contain no literal `-` standing
/// in for a `/` — collisions between e.g. `@a/b` and `@a-b` are a known,
/// accepted limitation (see the design notes on sanitization hazards).
pub fn sanitize(name: &str) -> String {
    name.replace('/', "-")
}
