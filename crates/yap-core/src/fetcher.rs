//! Registry metadata fetching: HTTP GET with a binary on-disk cache keyed
//! by the sanitized package name, plus version-spec resolution against the
//! fetched packument.
//!
//! Grounded on the recovered upstream's `src/metadata/metadata.go` and
//! `src/fetcher/fetcher.go` (cache-then-network, content keyed by package
//! name), using `ureq` for the blocking HTTP client the way the teacher
//! crate's optional `http-reqwest` feature gate implies a sync-first default.

use std::io::Cursor;
use std::sync::OnceLock;
use std::time::Duration;

use crate::codec;
use crate::error::{Result, YapError};
use crate::paths;
use crate::semver_engine;
use crate::types::{Config, Metadata, PackageRef, VersionMetadata};

const ACCEPT_HEADER: &str =
    "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8, */*";
const REQUEST_TIMEOUT_SECS: u64 = 30;

fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
    })
}

fn cache_file_for(name: &str) -> Result<std::path::PathBuf> {
    Ok(paths::cache_dir()?.join(paths::sanitize(name)))
}

/// Fetches a package's registry packument, using the on-disk binary cache
/// unless `force` is set or the cache is empty/stale.
pub fn fetch_metadata(name: &str, config: &Config, force: bool) -> Result<Metadata> {
    let cache_file = cache_file_for(name)?;

    if !force && cache_file.is_file() {
        if let Ok(bytes) = std::fs::read(&cache_file) {
            let mut cursor = Cursor::new(bytes);
            if let Ok(metadata) = codec::read_metadata(&mut cursor) {
                return Ok(metadata);
            }
            // Cache file is present but corrupt: fall through to a network refetch.
        }
    }

    let metadata = fetch_metadata_over_network(name, config)?;
    write_cache(&cache_file, &metadata)?;
    Ok(metadata)
}

fn fetch_metadata_over_network(name: &str, config: &Config) -> Result<Metadata> {
    let url = format!("{}/{name}", config.registry);
    let mut request = agent().get(&url).set("Accept", ACCEPT_HEADER);
    if let Some(token) = &config.auth_token {
        if !token.is_empty() {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
    }

    let response = request.call().map_err(|e| match e {
        ureq::Error::Status(status, _) => YapError::HttpStatus {
            operation: "fetch_metadata".to_string(),
            url: Some(url.clone()),
            status,
        },
        ureq::Error::Transport(t) => {
            YapError::network("fetch_metadata", Some(&url), t.to_string())
        }
    })?;

    let body = response
        .into_string()
        .map_err(|e| YapError::network("fetch_metadata", Some(&url), e.to_string()))?;

    serde_json::from_str(&body).map_err(|e| YapError::decode("fetch_metadata", e.to_string()))
}

fn write_cache(cache_file: &std::path::Path, metadata: &Metadata) -> Result<()> {
    if let Some(parent) = cache_file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| YapError::filesystem("write_metadata_cache", Some(&parent.to_string_lossy()), e))?;
    }
    let mut buf = Vec::new();
    codec::write_metadata(&mut buf, &metadata.name, &metadata.dist_tags, &metadata.versions)
        .map_err(|e| YapError::filesystem("write_metadata_cache", Some(&cache_file.to_string_lossy()), e))?;

    // Atomic: write to a sibling temp file, then rename into place.
    let tmp = cache_file.with_extension("tmp");
    std::fs::write(&tmp, &buf)
        .map_err(|e| YapError::filesystem("write_metadata_cache", Some(&tmp.to_string_lossy()), e))?;
    std::fs::rename(&tmp, cache_file)
        .map_err(|e| YapError::filesystem("write_metadata_cache", Some(&cache_file.to_string_lossy()), e))
}

/// Resolves `pkg`'s version-spec against its packument and returns the
/// concrete `VersionMetadata`. Retries once with `force=true` if resolution
/// fails against a (possibly stale) cached packument.
pub fn fetch_version_metadata(pkg: &PackageRef, config: &Config, force: bool) -> Result<VersionMetadata> {
    let metadata = fetch_metadata(&pkg.name, config, force)?;

    let resolved = match semver_engine::resolve_version(&pkg.name, &pkg.spec, &metadata) {
        Ok(v) => v,
        Err(YapError::UnsupportedSpec { package, spec }) => {
            return Err(YapError::UnsupportedSpec { package, spec });
        }
        Err(_) if !force => {
            let metadata = fetch_metadata(&pkg.name, config, true)?;
            semver_engine::resolve_version(&pkg.name, &pkg.spec, &metadata)?
        }
        Err(e) => return Err(e),
    };

    metadata
        .versions
        .get(&resolved)
        .cloned()
        .ok_or_else(|| YapError::ResolutionFailed {
            package: pkg.name.clone(),
            spec: pkg.spec.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dist, VersionMetadata};
    use std::collections::HashMap;

    fn sample_metadata() -> Metadata {
        let mut versions = HashMap::new();
        versions.insert(
            "1.0.0".to_string(),
            VersionMetadata {
                name: "pkg".to_string(),
                version: "1.0.0".to_string(),
                dependencies: HashMap::new(),
                dev_dependencies: HashMap::new(),
                peer_dependencies: HashMap::new(),
                dist: Dist {
                    shasum: "abc".to_string(),
                    tarball: "https://example.com/pkg-1.0.0.tgz".to_string(),
                    file_count: None,
                },
            },
        );
        let mut dist_tags = HashMap::new();
        dist_tags.insert("latest".to_string(), "1.0.0".to_string());
        Metadata {
            name: "pkg".to_string(),
            dist_tags,
            versions,
        }
    }

    #[test]
    fn cache_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("YAP_CACHE_DIR", dir.path());
        let metadata = sample_metadata();
        let cache_file = cache_file_for("pkg").unwrap();
        write_cache(&cache_file, &metadata).unwrap();

        let bytes = std::fs::read(&cache_file).unwrap();
        let mut cursor = Cursor::new(bytes);
        let decoded = codec::read_metadata(&mut cursor).unwrap();
        assert_eq!(decoded.name, "pkg");
        assert_eq!(decoded.dist_tags.get("latest").unwrap(), "1.0.0");
        std::env::remove_var("YAP_CACHE_DIR");
    }

    #[test]
    fn fetch_version_metadata_resolves_tag_without_network_when_cached() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("YAP_CACHE_DIR", dir.path());
        let metadata = sample_metadata();
        let cache_file = cache_file_for("pkg").unwrap();
        write_cache(&cache_file, &metadata).unwrap();

        let config = Config::default();
        let pkg = PackageRef::new("pkg", "latest");
        let vmd = fetch_version_metadata(&pkg, &config, false).unwrap();
        assert_eq!(vmd.version, "1.0.0");
        std::env::remove_var("YAP_CACHE_DIR");
    }

    #[test]
    fn unsupported_spec_short_circuits_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("YAP_CACHE_DIR", dir.path());
        let metadata = sample_metadata();
        let cache_file = cache_file_for("pkg").unwrap();
        write_cache(&cache_file, &metadata).unwrap();

        let config = Config::default();
        let pkg = PackageRef::new("pkg", "git+https://example.com/pkg.git");
        let err = fetch_version_metadata(&pkg, &config, false).unwrap_err();
        assert!(matches!(err, YapError::UnsupportedSpec { .. }));
        std::env::remove_var("YAP_CACHE_DIR");
    }
}
