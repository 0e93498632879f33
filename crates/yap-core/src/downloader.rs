//! Downloads a package tarball and extracts it into the content-addressed
//! store, stripping the archive's top-level directory.
//!
//! Grounded on the recovered upstream's `src/downloader/downloader.go`
//! (`DownloadTarballAndExtract`/`extractTarball`): buffer the whole body,
//! gunzip, walk tar entries, and special-case the first directory entry
//! containing `@` as the archive's top-level prefix, defaulting to the
//! canonical `package` prefix otherwise.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use flate2::read::GzDecoder;

use crate::error::{Result, YapError};
use crate::paths;
use crate::types::Config;

const REQUEST_TIMEOUT_SECS: u64 = 30;

fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
    })
}

/// The per-(name, version) directory under the store, e.g.
/// `~/.yap_store/@babel-core@7.2.0/`.
pub fn package_store_dir(name: &str, version: &str) -> Result<PathBuf> {
    Ok(paths::store_dir()?.join(paths::sanitize(&format!("{name}@{version}"))))
}

/// Downloads `tarball_url` and extracts it into the store, unless the
/// destination already exists and `force` is false (the store is content-
/// addressed by name+version, so a present directory means "already done").
pub fn download_package(
    name: &str,
    version: &str,
    tarball_url: &str,
    config: &Config,
    force: bool,
) -> Result<()> {
    let dest = package_store_dir(name, version)?;
    if !force && dest.is_dir() {
        return Ok(());
    }

    let body = fetch_tarball_bytes(tarball_url, config)?;
    extract_tarball(&body, name, version, &dest)
}

fn fetch_tarball_bytes(tarball_url: &str, config: &Config) -> Result<Vec<u8>> {
    let mut request = agent().get(tarball_url);
    if let Some(token) = &config.auth_token {
        if !token.is_empty() {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
    }

    let response = request.call().map_err(|e| match e {
        ureq::Error::Status(status, _) => YapError::HttpStatus {
            operation: "download_package".to_string(),
            url: Some(tarball_url.to_string()),
            status,
        },
        ureq::Error::Transport(t) => {
            YapError::network("download_package", Some(tarball_url), t.to_string())
        }
    })?;

    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| YapError::network("download_package", Some(tarball_url), e.to_string()))?;
    Ok(body)
}

/// Extracts gzip+tar bytes into `dest`, stripping the archive's top-level
/// directory from every entry's path.
fn extract_tarball(bytes: &[u8], name: &str, version: &str, dest: &Path) -> Result<()> {
    let archive_err = |detail: String| YapError::Archive {
        package: name.to_string(),
        version: version.to_string(),
        detail,
    };

    std::fs::create_dir_all(dest)
        .map_err(|e| YapError::filesystem("extract_tarball", Some(&dest.to_string_lossy()), e))?;

    let gz = GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(gz);

    let mut top_level: Option<String> = None;
    let entries = archive
        .entries()
        .map_err(|e| archive_err(format!("reading tar entries: {e}")))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_err(format!("reading tar entry: {e}")))?;
        let header_path = entry
            .path()
            .map_err(|e| archive_err(format!("reading entry path: {e}")))?
            .to_string_lossy()
            .into_owned();

        if top_level.is_none() {
            let is_dir = entry.header().entry_type().is_dir();
            top_level = Some(if is_dir && header_path.contains('@') {
                header_path.clone()
            } else {
                "package".to_string()
            });
        }
        let prefix = top_level.as_deref().unwrap_or("package");

        let relative = strip_top_level(&header_path, prefix);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&relative);

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                std::fs::create_dir_all(&target)
                    .map_err(|e| YapError::filesystem("extract_tarball", Some(&target.to_string_lossy()), e))?;
            }
            tar::EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| YapError::filesystem("extract_tarball", Some(&parent.to_string_lossy()), e))?;
                }
                let mut file = std::fs::File::create(&target)
                    .map_err(|e| YapError::filesystem("extract_tarball", Some(&target.to_string_lossy()), e))?;
                std::io::copy(&mut entry, &mut file)
                    .map_err(|e| YapError::filesystem("extract_tarball", Some(&target.to_string_lossy()), e))?;
            }
            other => {
                crate::log::log(&format!(
                    "[TARBALL] skipping unsupported entry type {other:?}: {header_path}"
                ));
            }
        }
    }

    Ok(())
}

fn strip_top_level(path: &str, prefix: &str) -> PathBuf {
    let stripped = path
        .strip_prefix(prefix)
        .map(|s| s.trim_start_matches('/'))
        .unwrap_or(path);
    PathBuf::from(stripped)
}
