//! Fixed-layout little-endian binary codec for the metadata cache, lockfile,
//! and global config. Not self-describing: every reader must know the exact
//! field order of the writer. Strings are `int32` length prefix (no
//! terminator); maps are `int32` count followed by that many key/value
//! string pairs.
//!
//! This intentionally does not replicate the byte-index slicing bug found in
//! the hand-rolled reference that inspired it; offsets here are tracked by a
//! cursor rather than recomputed from prior field lengths.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use crate::error::{Result, YapError};
use crate::types::{Dist, MPackage, PackageRef, VersionMetadata};

fn decode_err(detail: impl Into<String>) -> YapError {
    YapError::decode("binary_codec", detail)
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as i32).to_le_bytes())?;
    w.write_all(bytes)
}

pub fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .map_err(|e| decode_err(format!("reading string length: {e}")))?;
    let len = i32::from_le_bytes(len_buf);
    if len < 0 {
        return Err(decode_err(format!("negative string length {len}")));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)
        .map_err(|e| decode_err(format!("reading {len} string bytes: {e}")))?;
    String::from_utf8(buf).map_err(|e| decode_err(format!("invalid utf8: {e}")))
}

fn write_string_map<W: Write>(w: &mut W, map: &HashMap<String, String>) -> io::Result<()> {
    w.write_all(&(map.len() as i32).to_le_bytes())?;
    for (k, v) in map {
        write_string(w, k)?;
        write_string(w, v)?;
    }
    Ok(())
}

fn read_string_map<R: Read>(r: &mut R) -> Result<HashMap<String, String>> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .map_err(|e| decode_err(format!("reading map length: {e}")))?;
    let count = i32::from_le_bytes(len_buf);
    if count < 0 {
        return Err(decode_err(format!("negative map length {count}")));
    }
    let mut map = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let k = read_string(r)?;
        let v = read_string(r)?;
        map.insert(k, v);
    }
    Ok(map)
}

fn write_dist<W: Write>(w: &mut W, dist: &Dist) -> io::Result<()> {
    write_string(w, &dist.shasum)?;
    write_string(w, &dist.tarball)?;
    w.write_all(&dist.file_count.unwrap_or(0).to_le_bytes())
}

fn read_dist<R: Read>(r: &mut R) -> Result<Dist> {
    let shasum = read_string(r)?;
    let tarball = read_string(r)?;
    let mut count_buf = [0u8; 8];
    r.read_exact(&mut count_buf)
        .map_err(|e| decode_err(format!("reading dist file count: {e}")))?;
    let file_count = u64::from_le_bytes(count_buf);
    Ok(Dist {
        shasum,
        tarball,
        file_count: if file_count == 0 { None } else { Some(file_count) },
    })
}

pub fn write_version_metadata<W: Write>(w: &mut W, v: &VersionMetadata) -> io::Result<()> {
    write_string(w, &v.name)?;
    write_string(w, &v.version)?;
    write_string_map(w, &v.dependencies)?;
    write_string_map(w, &v.dev_dependencies)?;
    write_string_map(w, &v.peer_dependencies)?;
    write_dist(w, &v.dist)
}

pub fn read_version_metadata<R: Read>(r: &mut R) -> Result<VersionMetadata> {
    let name = read_string(r)?;
    let version = read_string(r)?;
    let dependencies = read_string_map(r)?;
    let dev_dependencies = read_string_map(r)?;
    let peer_dependencies = read_string_map(r)?;
    let dist = read_dist(r)?;
    Ok(VersionMetadata {
        name,
        version,
        dependencies,
        dev_dependencies,
        peer_dependencies,
        dist,
    })
}

/// Writes a cached packument: name, dist-tags map, then version count
/// followed by that many `VersionMetadata` records.
pub fn write_metadata<W: Write>(
    w: &mut W,
    name: &str,
    dist_tags: &HashMap<String, String>,
    versions: &HashMap<String, VersionMetadata>,
) -> io::Result<()> {
    write_string(w, name)?;
    write_string_map(w, dist_tags)?;
    w.write_all(&(versions.len() as i32).to_le_bytes())?;
    for v in versions.values() {
        write_version_metadata(w, v)?;
    }
    Ok(())
}

pub fn read_metadata<R: Read>(r: &mut R) -> Result<crate::types::Metadata> {
    let name = read_string(r)?;
    let dist_tags = read_string_map(r)?;
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .map_err(|e| decode_err(format!("reading version count: {e}")))?;
    let count = i32::from_le_bytes(len_buf);
    if count < 0 {
        return Err(decode_err(format!("negative version count {count}")));
    }
    let mut versions = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let v = read_version_metadata(r)?;
        versions.insert(v.version.clone(), v);
    }
    Ok(crate::types::Metadata {
        name,
        dist_tags,
        versions,
    })
}

/// Writes an `MPackage`: name, version, dist, then child count followed by
/// each child written recursively.
pub fn write_mpackage<W: Write>(w: &mut W, pkg: &MPackage) -> io::Result<()> {
    write_string(w, &pkg.name)?;
    write_string(w, &pkg.version)?;
    write_dist(w, &pkg.dist)?;
    w.write_all(&(pkg.dependencies.len() as i32).to_le_bytes())?;
    for child in &pkg.dependencies {
        write_mpackage(w, child)?;
    }
    Ok(())
}

pub fn read_mpackage<R: Read>(r: &mut R) -> Result<MPackage> {
    let name = read_string(r)?;
    let version = read_string(r)?;
    let dist = read_dist(r)?;
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .map_err(|e| decode_err(format!("reading dependency count: {e}")))?;
    let count = i32::from_le_bytes(len_buf);
    if count < 0 {
        return Err(decode_err(format!("negative dependency count {count}")));
    }
    let mut dependencies = Vec::with_capacity(count as usize);
    for _ in 0..count {
        dependencies.push(read_mpackage(r)?);
    }
    Ok(MPackage {
        name,
        version,
        dist,
        dependencies,
    })
}

fn write_package_ref<W: Write>(w: &mut W, pkg: &PackageRef) -> io::Result<()> {
    write_string(w, &pkg.name)?;
    write_string(w, &pkg.spec)
}

fn read_package_ref<R: Read>(r: &mut R) -> Result<PackageRef> {
    let name = read_string(r)?;
    let spec = read_string(r)?;
    Ok(PackageRef { name, spec })
}

/// Writes a lockfile: core-dependency count + `(name, spec)` pairs, then
/// resolution count + recursively encoded `MPackage` trees. Mirrors the
/// recovered upstream's `WriteLockfile` field order exactly.
pub fn write_lockfile<W: Write>(w: &mut W, lockfile: &crate::types::Lockfile) -> io::Result<()> {
    w.write_all(&(lockfile.core_dependencies.len() as i32).to_le_bytes())?;
    for pkg in &lockfile.core_dependencies {
        write_package_ref(w, pkg)?;
    }
    w.write_all(&(lockfile.resolutions.len() as i32).to_le_bytes())?;
    for pkg in &lockfile.resolutions {
        write_mpackage(w, pkg)?;
    }
    Ok(())
}

pub fn read_lockfile<R: Read>(r: &mut R) -> Result<crate::types::Lockfile> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .map_err(|e| decode_err(format!("reading core-dependency count: {e}")))?;
    let core_count = i32::from_le_bytes(len_buf);
    if core_count < 0 {
        return Err(decode_err(format!("negative core-dependency count {core_count}")));
    }
    let mut core_dependencies = Vec::with_capacity(core_count as usize);
    for _ in 0..core_count {
        core_dependencies.push(read_package_ref(r)?);
    }

    r.read_exact(&mut len_buf)
        .map_err(|e| decode_err(format!("reading resolution count: {e}")))?;
    let res_count = i32::from_le_bytes(len_buf);
    if res_count < 0 {
        return Err(decode_err(format!("negative resolution count {res_count}")));
    }
    let mut resolutions = Vec::with_capacity(res_count as usize);
    for _ in 0..res_count {
        resolutions.push(read_mpackage(r)?);
    }

    Ok(crate::types::Lockfile {
        core_dependencies,
        resolutions,
    })
}

/// Writes the global config: registry URL, optional auth token (empty
/// string when absent), log level.
pub fn write_config<W: Write>(w: &mut W, config: &crate::types::Config) -> io::Result<()> {
    write_string(w, &config.registry)?;
    write_string(w, config.auth_token.as_deref().unwrap_or(""))?;
    write_string(w, &config.log_level)
}

pub fn read_config<R: Read>(r: &mut R) -> Result<crate::types::Config> {
    let registry = read_string(r)?;
    let auth_token = read_string(r)?;
    let log_level = read_string(r)?;
    Ok(crate::types::Config {
        registry,
        auth_token: if auth_token.is_empty() {
            None
        } else {
            Some(auth_token)
        },
        log_level,
    })
}
