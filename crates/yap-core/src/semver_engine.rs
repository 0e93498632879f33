//! Version constraint resolution: picks the highest published version that
//! satisfies a requested spec against a packument's dist-tags and version list.
//!
//! Built on the `semver` crate's `Version`/`VersionReq` rather than hand-rolled
//! tilde/caret/wildcard matching; npm's `||` union syntax isn't natively
//! understood by `VersionReq`, so it's split into alternatives evaluated
//! independently and unioned.

use std::collections::HashMap;

use semver::{Version, VersionReq};

use crate::error::{Result, YapError};

/// True when a spec names something yap-core does not resolve: a URL, a
/// git remote, an npm-alias, or a github `owner/repo` shorthand.
pub fn is_unsupported_spec(spec: &str) -> bool {
    let s = spec.trim();
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("git+")
        || s.starts_with("git://")
        || s.starts_with("github:")
        || s.starts_with("npm:")
        || s.starts_with("file:")
        || (s.contains('/') && !s.starts_with('@'))
}

/// Resolves `spec` against `metadata`'s dist-tags and published versions,
/// returning the highest version that satisfies it.
pub fn resolve_version(package: &str, spec: &str, metadata: &crate::types::Metadata) -> Result<String> {
    if is_unsupported_spec(spec) {
        return Err(YapError::UnsupportedSpec {
            package: package.to_string(),
            spec: spec.to_string(),
        });
    }

    let trimmed = spec.trim();

    if trimmed.is_empty() || trimmed == "latest" || trimmed == "*" {
        if let Some(v) = metadata.dist_tags.get("latest") {
            return Ok(v.clone());
        }
        return highest_published(package, spec, &metadata.versions);
    }

    if let Some(v) = metadata.dist_tags.get(trimmed) {
        return Ok(v.clone());
    }

    best_satisfying(package, trimmed, &metadata.versions)
}

fn highest_published(
    package: &str,
    spec: &str,
    versions: &HashMap<String, crate::types::VersionMetadata>,
) -> Result<String> {
    versions
        .keys()
        .filter_map(|v| Version::parse(v).ok().map(|parsed| (parsed, v.clone())))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, v)| v)
        .ok_or_else(|| YapError::ResolutionFailed {
            package: package.to_string(),
            spec: spec.to_string(),
        })
}

/// Evaluates each `||`-separated alternative of `spec` as an independent
/// `VersionReq` and returns the highest version satisfying any of them.
fn best_satisfying(
    package: &str,
    spec: &str,
    versions: &HashMap<String, crate::types::VersionMetadata>,
) -> Result<String> {
    let alternatives: Vec<&str> = spec.split("||").map(str::trim).collect();
    let reqs: Vec<VersionReq> = alternatives
        .iter()
        .filter_map(|alt| parse_req(alt).ok())
        .collect();

    if reqs.is_empty() {
        return Err(YapError::ResolutionFailed {
            package: package.to_string(),
            spec: spec.to_string(),
        });
    }

    versions
        .keys()
        .filter_map(|v| Version::parse(v).ok().map(|parsed| (parsed, v.clone())))
        .filter(|(parsed, _)| reqs.iter().any(|req| req.matches(parsed)))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, v)| v)
        .ok_or_else(|| YapError::ResolutionFailed {
            package: package.to_string(),
            spec: spec.to_string(),
        })
}

/// `semver::VersionReq` already understands caret, tilde, wildcard and
/// comparator ranges; a bare `1.2.3` needs an explicit `=` since the crate
/// otherwise treats it as caret-by-default only through `VersionReq::parse`
/// of the literal string, which is in fact already caret-compatible — kept
/// here as the single parse entry point so alternate spec dialects can be
/// normalized in one place later.
fn parse_req(spec: &str) -> std::result::Result<VersionReq, semver::Error> {
    VersionReq::parse(spec)
}
