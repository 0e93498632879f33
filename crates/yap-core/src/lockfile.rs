//! Reads and writes `yap.lockb`, the binary lockfile, via the codec.
//!
//! The recovered upstream's `src/utils/lock.go::ReadLock` inverts the
//! existence check (`os.Stat` succeeding is treated as the error branch) —
//! per SPEC_FULL.md's explicit instruction, that inversion is *not*
//! replicated here. A present lockfile is the normal, happy path for the
//! install fast-path; an absent one is the normal trigger for a fresh
//! resolve, not an error either way.

use std::io::Cursor;
use std::path::Path;

use crate::codec;
use crate::error::{Result, YapError};
use crate::types::Lockfile;

pub const LOCKFILE_NAME: &str = "yap.lockb";

/// Reads and decodes `<project_root>/yap.lockb`, or `None` if it doesn't exist.
pub fn read_lockfile(project_root: &Path) -> Result<Option<Lockfile>> {
    let path = project_root.join(LOCKFILE_NAME);
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)
        .map_err(|e| YapError::filesystem("read_lockfile", Some(&path.to_string_lossy()), e))?;
    let mut cursor = Cursor::new(bytes);
    codec::read_lockfile(&mut cursor).map(Some)
}

/// Encodes and atomically overwrites `<project_root>/yap.lockb`.
pub fn write_lockfile(project_root: &Path, lockfile: &Lockfile) -> Result<()> {
    let path = project_root.join(LOCKFILE_NAME);
    let mut buf = Vec::new();
    codec::write_lockfile(&mut buf, lockfile)
        .map_err(|e| YapError::filesystem("write_lockfile", Some(&path.to_string_lossy()), e))?;

    let tmp = path.with_extension("lockb.tmp");
    std::fs::write(&tmp, &buf)
        .map_err(|e| YapError::filesystem("write_lockfile", Some(&tmp.to_string_lossy()), e))?;
    std::fs::rename(&tmp, &path)
        .map_err(|e| YapError::filesystem("write_lockfile", Some(&path.to_string_lossy()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dist, MPackage, PackageRef};

    #[test]
    fn missing_lockfile_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_lockfile(dir.path()).unwrap().is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let lockfile = Lockfile {
            core_dependencies: vec![PackageRef::new("is-odd", "3.0.1")],
            resolutions: vec![MPackage {
                name: "is-odd".to_string(),
                version: "3.0.1".to_string(),
                dist: Dist {
                    shasum: "abc".to_string(),
                    tarball: "https://example.com/is-odd-3.0.1.tgz".to_string(),
                    file_count: Some(3),
                },
                dependencies: vec![],
            }],
        };
        write_lockfile(dir.path(), &lockfile).unwrap();
        let decoded = read_lockfile(dir.path()).unwrap().unwrap();
        assert_eq!(decoded, lockfile);
    }

    #[test]
    fn write_is_atomic_no_leftover_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        write_lockfile(dir.path(), &Lockfile::default()).unwrap();
        assert!(!dir.path().join("yap.lockb.tmp").exists());
        assert!(dir.path().join(LOCKFILE_NAME).exists());
    }
}
