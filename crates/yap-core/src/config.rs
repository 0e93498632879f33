//! Loads the effective client configuration: the binary `~/.yap_config`
//! overridden by `.npmrc`-style key/value files (global, then local).
//!
//! Mirrors the recovered upstream's `LoadConfigurations`/`ExtractAuthToken`
//! pair, with the binary `~/.yap_config` layered underneath as the
//! persisted base (the distilled spec's addition over the Go source, which
//! only reads `.npmrc` and never persists a resolved config).

use std::collections::HashMap;
use std::path::Path;

use crate::codec;
use crate::error::{Result, YapError};
use crate::paths;
use crate::types::Config;

/// Parses `key=value` lines from an `.npmrc`-style file. Blank lines and
/// lines starting with `;` or `#` are ignored. Missing files yield an empty
/// map rather than an error — `.npmrc` is always optional.
pub fn parse_npmrc(path: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(content) = std::fs::read_to_string(path) else {
        return map;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

/// Loads `~/.npmrc` then `./.npmrc`, with local keys overriding global ones.
pub fn load_npmrc(project_root: &Path) -> HashMap<String, String> {
    let mut merged = HashMap::new();
    if let Ok(home) = std::env::var("HOME").map(std::path::PathBuf::from).or_else(|_| {
        dirs::home_dir().ok_or(std::env::VarError::NotPresent)
    }) {
        merged.extend(parse_npmrc(&home.join(".npmrc")));
    }
    merged.extend(parse_npmrc(&project_root.join(".npmrc")));
    merged
}

/// The first key ending in `_authToken` or `_auth`, npm's convention for
/// scoping a bearer token to a registry host.
pub fn extract_auth_token(npmrc: &HashMap<String, String>) -> Option<String> {
    npmrc
        .iter()
        .find(|(k, _)| k.ends_with("_authToken") || k.ends_with("_auth"))
        .map(|(_, v)| v.clone())
}

/// Reads `~/.yap_config`, creating it with defaults on first use, then
/// layers `.npmrc`'s `registry` and auth-token keys on top.
pub fn load_config(project_root: &Path) -> Result<Config> {
    let mut config = read_or_init_global_config()?;

    let npmrc = load_npmrc(project_root);
    if let Some(registry) = npmrc.get("registry") {
        config.registry = registry.trim_end_matches('/').to_string();
    }
    if let Some(token) = extract_auth_token(&npmrc) {
        config.auth_token = Some(token);
    }

    Ok(config)
}

fn read_or_init_global_config() -> Result<Config> {
    let path = paths::config_path()?;
    if path.exists() {
        let bytes = std::fs::read(&path)
            .map_err(|e| YapError::filesystem("read_config", Some(&path.to_string_lossy()), e))?;
        let mut cursor = std::io::Cursor::new(bytes);
        return codec::read_config(&mut cursor);
    }

    let config = Config::default();
    write_global_config(&config)?;
    Ok(config)
}

/// Overwrites `~/.yap_config` with the given configuration (used by `config set`).
pub fn write_global_config(config: &Config) -> Result<()> {
    let path = paths::config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| YapError::filesystem("write_config", Some(&parent.to_string_lossy()), e))?;
    }
    let mut buf = Vec::new();
    codec::write_config(&mut buf, config)
        .map_err(|e| YapError::filesystem("write_config", Some(&path.to_string_lossy()), e))?;
    std::fs::write(&path, buf)
        .map_err(|e| YapError::filesystem("write_config", Some(&path.to_string_lossy()), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_and_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".npmrc");
        std::fs::write(
            &path,
            "; a comment\n# another\n\nregistry=https://example.com\nfoo_authToken=abc123\n",
        )
        .unwrap();
        let map = parse_npmrc(&path);
        assert_eq!(map.get("registry").unwrap(), "https://example.com");
        assert_eq!(map.get("foo_authToken").unwrap(), "abc123");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn missing_npmrc_yields_empty_map() {
        let map = parse_npmrc(Path::new("/nonexistent/.npmrc"));
        assert!(map.is_empty());
    }

    #[test]
    fn extract_auth_token_matches_auth_suffix_too() {
        let mut map = HashMap::new();
        map.insert("//registry.npmjs.org/:_authToken".to_string(), "tok".to_string());
        assert_eq!(extract_auth_token(&map), Some("tok".to_string()));

        let mut map2 = HashMap::new();
        map2.insert("_auth".to_string(), "legacy".to_string());
        assert_eq!(extract_auth_token(&map2), Some("legacy".to_string()));
    }

    #[test]
    fn extract_auth_token_none_when_absent() {
        let map = HashMap::new();
        assert_eq!(extract_auth_token(&map), None);
    }
}
