//! Reads `package.json` and merges its three dependency maps into the
//! flat list of core requirements the install pipeline starts from.
//!
//! Mirrors the recovered upstream's `packagejson.ParsePackageJSON` /
//! `GetAllDependencies`: all of `dependencies`, `devDependencies`, and
//! `peerDependencies` are merged with no priority between them (a name that
//! appears in more than one map resolves to whichever entry is folded in
//! last — an accepted, documented tie-break, not a deliberate precedence).

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, YapError};
use crate::types::PackageRef;

#[derive(Debug, Default, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: HashMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    pub peer_dependencies: HashMap<String, String>,
}

/// Reads and parses `<project_root>/package.json`. A missing or malformed
/// manifest is a fatal `YapError::Manifest` — this is a startup-phase check.
pub fn read_package_json(project_root: &Path) -> Result<PackageJson> {
    let path = project_root.join("package.json");
    let content = std::fs::read_to_string(&path).map_err(|e| YapError::Manifest {
        operation: "read_package_json".to_string(),
        detail: format!("{}: {e}", path.display()),
    })?;
    serde_json::from_str(&content).map_err(|e| YapError::Manifest {
        operation: "parse_package_json".to_string(),
        detail: e.to_string(),
    })
}

/// Merges `dependencies`, `devDependencies`, and `peerDependencies` into one
/// flat, deduplicated list of core requirements.
pub fn merged_dependencies(pkg: &PackageJson) -> Vec<PackageRef> {
    let mut merged: HashMap<String, String> = HashMap::new();
    merged.extend(pkg.dependencies.clone());
    merged.extend(pkg.dev_dependencies.clone());
    merged.extend(pkg.peer_dependencies.clone());
    merged
        .into_iter()
        .map(|(name, spec)| PackageRef::new(name, spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_all_three_maps() {
        let mut pkg = PackageJson::default();
        pkg.dependencies.insert("is-odd".to_string(), "3.0.1".to_string());
        pkg.dev_dependencies.insert("typescript".to_string(), "latest".to_string());
        pkg.peer_dependencies.insert("react".to_string(), "^18.0.0".to_string());

        let merged = merged_dependencies(&pkg);
        assert_eq!(merged.len(), 3);
        assert!(merged.iter().any(|p| p.name == "is-odd" && p.spec == "3.0.1"));
        assert!(merged.iter().any(|p| p.name == "typescript" && p.spec == "latest"));
        assert!(merged.iter().any(|p| p.name == "react" && p.spec == "^18.0.0"));
    }

    #[test]
    fn missing_package_json_is_a_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_package_json(dir.path()).unwrap_err();
        assert!(matches!(err, YapError::Manifest { .. }));
    }

    #[test]
    fn malformed_package_json_is_a_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{ not json").unwrap();
        let err = read_package_json(dir.path()).unwrap_err();
        assert!(matches!(err, YapError::Manifest { .. }));
    }

    #[test]
    fn empty_dependencies_yields_empty_list() {
        let pkg = PackageJson::default();
        assert!(merged_dependencies(&pkg).is_empty());
    }
}
