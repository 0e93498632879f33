//! The package data model: registry packuments, resolved version metadata,
//! the in-memory dependency graph node (`MPackage`), and the on-disk lockfile.

use std::collections::HashMap;

use serde::Deserialize;

/// One entry of a package's `dist` object in the registry packument.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Dist {
    pub shasum: String,
    pub tarball: String,
    #[serde(rename = "fileCount")]
    pub file_count: Option<u64>,
}

/// A single version's packument entry: `name`, `version`, its three
/// dependency maps, and `dist`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VersionMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default)]
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: HashMap<String, String>,
    #[serde(default)]
    #[serde(rename = "peerDependencies")]
    pub peer_dependencies: HashMap<String, String>,
    pub dist: Dist,
}

/// The full packument returned by the registry for a package name: every
/// published version plus the `dist-tags` map (`latest`, `next`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(rename = "dist-tags")]
    pub dist_tags: HashMap<String, String>,
    pub versions: HashMap<String, VersionMetadata>,
}

/// One resolved node in the dependency graph: a concrete name@version plus
/// its own resolved dependencies, recursively. Mirrors the recovered
/// upstream's recursive encoding rather than a flat adjacency list.
#[derive(Debug, Clone, PartialEq)]
pub struct MPackage {
    pub name: String,
    pub version: String,
    pub dist: Dist,
    pub dependencies: Vec<MPackage>,
}

impl MPackage {
    pub fn sanitized_key(&self) -> String {
        crate::paths::sanitize(&format!("{}@{}", self.name, self.version))
    }
}

/// The on-disk lockfile: the declared top-level requirements plus the
/// resolved graph. `resolutions` holds one `MPackage` per package the
/// install pipeline materialized; each node's `dependencies` is left empty
/// (see DESIGN.md) rather than nested into a tree, matching what the
/// recovered upstream's own install path actually produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lockfile {
    pub core_dependencies: Vec<PackageRef>,
    pub resolutions: Vec<MPackage>,
}

/// A requested dependency as read from `package.json`, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
    pub name: String,
    pub spec: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, spec: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: spec.into(),
        }
    }
}

/// Resolved client configuration: registry URL, auth token, log level.
#[derive(Debug, Clone)]
pub struct Config {
    pub registry: String,
    pub auth_token: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registry: "https://registry.npmjs.org".to_string(),
            auth_token: None,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_packument_with_missing_dependency_maps() {
        let json = r#"{
            "name": "tiny",
            "version": "1.0.0",
            "dist": {"shasum": "abc123", "tarball": "https://example.com/tiny-1.0.0.tgz"}
        }"#;
        let v: VersionMetadata = serde_json::from_str(json).unwrap();
        assert!(v.dependencies.is_empty());
        assert!(v.dev_dependencies.is_empty());
        assert!(v.peer_dependencies.is_empty());
        assert_eq!(v.dist.shasum, "abc123");
    }

    #[test]
    fn sanitized_key_joins_name_and_version() {
        let pkg = MPackage {
            name: "@babel/core".to_string(),
            version: "7.2.0".to_string(),
            dist: Dist {
                shasum: "x".to_string(),
                tarball: "https://example.com/x.tgz".to_string(),
                file_count: None,
            },
            dependencies: vec![],
        };
        assert_eq!(pkg.sanitized_key(), "@babel-core@7.2.0");
    }
}
