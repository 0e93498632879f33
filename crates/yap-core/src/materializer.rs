//! Materializes a stored package into a project's `node_modules/.yap/` by
//! hardlinking every file from the store, falling back to a byte copy when
//! hardlinking isn't possible (e.g. store and project live on different
//! filesystems).
//!
//! Grounded on the recovered upstream's `src/ship/ship.go` and its
//! `utils.HardLinkOrCopyRecursively` helper: walk the store's per-version
//! directory, hardlink each file into the destination, skip "already
//! exists", copy on any other error.

use std::path::Path;

use crate::downloader::package_store_dir;
use crate::error::{Result, YapError};
use crate::paths;

/// Hardlinks (falling back to copy) `~/.yap_store/<name@version>/` into
/// `<project_root>/node_modules/.yap/<name@version>/`. A no-op if the
/// destination already exists.
pub fn install_to_project(name: &str, version: &str, project_root: &Path) -> Result<()> {
    let dest = paths::dot_yap_dir(project_root).join(paths::sanitize(&format!("{name}@{version}")));
    if dest.is_dir() {
        return Ok(());
    }

    let source = package_store_dir(name, version)?;
    std::fs::create_dir_all(&dest)
        .map_err(|e| YapError::filesystem("install_to_project", Some(&dest.to_string_lossy()), e))?;

    hardlink_or_copy_recursively(&source, &dest)
}

fn hardlink_or_copy_recursively(source: &Path, dest: &Path) -> Result<()> {
    for entry in walk_files(source)? {
        let relative = entry
            .strip_prefix(source)
            .expect("walked entries are always under source");
        let target = dest.join(relative);

        if entry.is_dir() {
            let mode = entry
                .metadata()
                .map_err(|e| YapError::filesystem("install_to_project", Some(&entry.to_string_lossy()), e))?
                .permissions();
            std::fs::create_dir_all(&target)
                .map_err(|e| YapError::filesystem("install_to_project", Some(&target.to_string_lossy()), e))?;
            let _ = std::fs::set_permissions(&target, mode);
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| YapError::filesystem("install_to_project", Some(&parent.to_string_lossy()), e))?;
        }

        match std::fs::hard_link(&entry, &target) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(_) => copy_with_mode(&entry, &target)?,
        }
    }
    Ok(())
}

fn copy_with_mode(source: &Path, target: &Path) -> Result<()> {
    std::fs::copy(source, target)
        .map_err(|e| YapError::filesystem("install_to_project", Some(&target.to_string_lossy()), e))?;
    if let Ok(metadata) = source.metadata() {
        let _ = std::fs::set_permissions(target, metadata.permissions());
    }
    Ok(())
}

/// Depth-first walk of `root`, yielding every directory and file under it
/// (not including `root` itself).
fn walk_files(root: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let read_dir = std::fs::read_dir(&dir)
            .map_err(|e| YapError::filesystem("install_to_project", Some(&dir.to_string_lossy()), e))?;
        for entry in read_dir {
            let entry = entry.map_err(|e| YapError::filesystem("install_to_project", None, e))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materializes_hardlinked_tree_matching_store_contents() {
        let store_root = tempfile::tempdir().unwrap();
        let project_root = tempfile::tempdir().unwrap();
        std::env::set_var("YAP_STORE_DIR", store_root.path());

        let pkg_dir = package_store_dir("lodash", "4.17.21").unwrap();
        std::fs::create_dir_all(pkg_dir.join("lib")).unwrap();
        std::fs::write(pkg_dir.join("package.json"), "{}").unwrap();
        std::fs::write(pkg_dir.join("lib/index.js"), "module.exports = {};").unwrap();

        install_to_project("lodash", "4.17.21", project_root.path()).unwrap();

        let dest = paths::dot_yap_dir(project_root.path()).join("lodash@4.17.21");
        assert_eq!(
            std::fs::read(dest.join("package.json")).unwrap(),
            std::fs::read(pkg_dir.join("package.json")).unwrap()
        );
        assert_eq!(
            std::fs::read(dest.join("lib/index.js")).unwrap(),
            std::fs::read(pkg_dir.join("lib/index.js")).unwrap()
        );

        std::env::remove_var("YAP_STORE_DIR");
    }

    #[test]
    fn is_a_noop_when_already_materialized() {
        let store_root = tempfile::tempdir().unwrap();
        let project_root = tempfile::tempdir().unwrap();
        std::env::set_var("YAP_STORE_DIR", store_root.path());

        let dest = paths::dot_yap_dir(project_root.path()).join("x@1.0.0");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("marker"), "keep-me").unwrap();

        // Store has nothing for x@1.0.0; if this weren't a no-op it would error
        // trying to walk a nonexistent source directory.
        install_to_project("x", "1.0.0", project_root.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("marker")).unwrap(), "keep-me");

        std::env::remove_var("YAP_STORE_DIR");
    }
}
