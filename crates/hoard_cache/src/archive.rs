//! Artifact bundles exchanged with the remote cache.
//!
//! A bundle is a 4-byte little-endian header length, a bincode-encoded
//! [`ArchiveHeader`], and a gzip-compressed bincode payload listing every
//! file, directory, and symlink of the bundled artifacts. The header carries
//! magic bytes, the format version, and a checksum of the payload, all of
//! which are validated before anything is written to disk.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hoard_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying a hoard artifact bundle.
const ARCHIVE_MAGIC: [u8; 4] = *b"HORD";

/// Current bundle format version. Increment on breaking changes to the
/// header or payload format.
const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// Header prepended to every bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveHeader {
    /// Magic bytes: must be `b"HORD"`.
    pub magic: [u8; 4],
    /// Bundle format version.
    pub format_version: u32,
    /// Version of hoard that produced the bundle.
    pub producer_version: String,
    /// Content hash of the compressed payload.
    pub checksum: ContentHash,
}

/// One entry of a bundle, with a `/`-separated relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum ArchiveEntry {
    Dir {
        path: String,
    },
    File {
        path: String,
        data: Vec<u8>,
        executable: bool,
    },
    Symlink {
        path: String,
        target: String,
    },
}

/// Bundles `paths` (files or directory trees) into one archive.
///
/// Each path is stored under its own file name, so unpacking into a
/// directory recreates `dir/<file name>` for every input.
pub fn pack(paths: &[PathBuf]) -> Result<Vec<u8>, CacheError> {
    let mut entries = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CacheError::InvalidArchive {
                reason: format!("cannot bundle {}: no file name", path.display()),
            })?;
        collect(path, name.to_string(), &mut entries)?;
    }

    let encoded = bincode::serde::encode_to_vec(&entries, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
    let compress_err = |e: std::io::Error| CacheError::Serialization {
        reason: format!("compression failed: {e}"),
    };
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&encoded).map_err(compress_err)?;
    let payload = encoder.finish().map_err(compress_err)?;

    let header = ArchiveHeader {
        magic: ARCHIVE_MAGIC,
        format_version: ARCHIVE_FORMAT_VERSION,
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

impl ArchiveEntry {
    fn path(&self) -> &str {
        match self {
            Self::Dir { path } | Self::File { path, .. } | Self::Symlink { path, .. } => path,
        }
    }
}

/// Validates `bytes` and recreates the bundled entries under `dest`.
///
/// Rejects bundles with a wrong magic, version, or checksum. Every entry is
/// checked before anything is written: paths must stay inside `dest`, symlink
/// targets must resolve inside `dest`, and no entry may live below a bundled
/// symlink. Symlinks are created after all files and directories.
pub fn unpack(bytes: &[u8], dest: &Path) -> Result<(), CacheError> {
    let (header, payload) = split(bytes)?;
    if header.magic != ARCHIVE_MAGIC {
        return Err(invalid("bad magic bytes"));
    }
    if header.format_version != ARCHIVE_FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            expected: ARCHIVE_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(CacheError::ChecksumMismatch {
            expected: header.checksum.to_hex(),
            actual: actual.to_hex(),
        });
    }

    let mut decoded = Vec::new();
    GzDecoder::new(payload)
        .read_to_end(&mut decoded)
        .map_err(|e| invalid(&format!("corrupt payload: {e}")))?;
    let (entries, _): (Vec<ArchiveEntry>, usize) =
        bincode::serde::decode_from_slice(&decoded, bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })?;

    let links = check_entries(&entries)?;

    for entry in &entries {
        match entry {
            ArchiveEntry::Dir { path } => {
                let target = safe_join(dest, path)?;
                std::fs::create_dir_all(&target).map_err(|e| CacheError::io(&target, e))?;
            }
            ArchiveEntry::File {
                path,
                data,
                executable,
            } => {
                let target = safe_join(dest, path)?;
                ensure_parent(&target)?;
                std::fs::write(&target, data).map_err(|e| CacheError::io(&target, e))?;
                if *executable {
                    set_executable(&target)?;
                }
            }
            ArchiveEntry::Symlink { .. } => {}
        }
    }
    for (path, target) in links {
        let link = dest.join(path);
        ensure_parent(&link)?;
        make_symlink(Path::new(target), &link)?;
    }
    Ok(())
}

/// Validates every entry path and symlink target, returning the symlinks to
/// create as `(relative path, target)`.
fn check_entries(entries: &[ArchiveEntry]) -> Result<Vec<(PathBuf, &str)>, CacheError> {
    let mut links = Vec::new();
    for entry in entries {
        if let ArchiveEntry::Symlink { path, target } = entry {
            links.push((relative(path)?, target.as_str()));
        }
    }
    let link_paths: BTreeSet<PathBuf> = links.iter().map(|(rel, _)| rel.clone()).collect();

    for entry in entries {
        let rel = relative(entry.path())?;
        if rel.ancestors().skip(1).any(|parent| link_paths.contains(parent)) {
            return Err(invalid(&format!(
                "entry '{}' lies below a symlink",
                entry.path()
            )));
        }
    }
    for (rel, target) in &links {
        check_link_target(rel, target, &link_paths)?;
    }
    Ok(links)
}

/// Resolves `target` lexically from the directory holding `rel`. Refuses
/// targets that are absolute, climb above the unpack root, or step through
/// another bundled symlink on the way.
fn check_link_target(rel: &Path, target: &str, links: &BTreeSet<PathBuf>) -> Result<(), CacheError> {
    let shown = rel.display();
    let mut current: Vec<&OsStr> = rel.iter().collect();
    current.pop();

    let components: Vec<Component<'_>> = Path::new(target).components().collect();
    for (index, component) in components.iter().enumerate() {
        match component {
            Component::Normal(part) => {
                current.push(*part);
                let through = index + 1 < components.len()
                    && links.contains(&current.iter().collect::<PathBuf>());
                if through {
                    return Err(invalid(&format!(
                        "symlink '{shown}' resolves through another symlink"
                    )));
                }
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if current.pop().is_none() {
                    return Err(invalid(&format!("symlink '{shown}' points outside the bundle")));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid(&format!("absolute symlink target in '{shown}'")));
            }
        }
    }
    Ok(())
}

/// Normalizes a bundle-relative path, refusing absolute and `..` components.
fn relative(rel: &str) -> Result<PathBuf, CacheError> {
    let mut out = PathBuf::new();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(invalid(&format!("path traversal in entry '{rel}'"))),
        }
    }
    if out.as_os_str().is_empty() {
        return Err(invalid("empty entry path"));
    }
    Ok(out)
}

/// Joins a bundle-relative path onto `dest`, refusing traversal.
fn safe_join(dest: &Path, rel: &str) -> Result<PathBuf, CacheError> {
    Ok(dest.join(relative(rel)?))
}

fn ensure_parent(path: &Path) -> Result<(), CacheError> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e)),
        None => Ok(()),
    }
}

fn invalid(reason: &str) -> CacheError {
    CacheError::InvalidArchive {
        reason: reason.to_string(),
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), CacheError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| CacheError::io(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), CacheError> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> Result<(), CacheError> {
    std::os::unix::fs::symlink(target, link).map_err(|e| CacheError::io(link, e))
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, link: &Path) -> Result<(), CacheError> {
    Err(invalid(&format!(
        "symlinks are not supported on this platform ({})",
        link.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framework(root: &Path) -> PathBuf {
        let fw = root.join("Core.xcframework");
        std::fs::create_dir_all(fw.join("ios-arm64/Core.framework/Headers")).unwrap();
        std::fs::write(fw.join("Info.plist"), "plist").unwrap();
        std::fs::write(fw.join("ios-arm64/Core.framework/Core"), "binary").unwrap();
        std::fs::write(fw.join("ios-arm64/Core.framework/Headers/Core.h"), "header").unwrap();
        fw
    }

    fn encode_entries(entries: &[ArchiveEntry]) -> Vec<u8> {
        let encoded = bincode::serde::encode_to_vec(entries, bincode::config::standard()).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded).unwrap();
        let payload = encoder.finish().unwrap();
        let header = ArchiveHeader {
            magic: ARCHIVE_MAGIC,
            format_version: ARCHIVE_FORMAT_VERSION,
            producer_version: "test".into(),
            checksum: ContentHash::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let mut out = (header_bytes.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn unpack_recreates_tree() {
        let src = tempfile::tempdir().unwrap();
        let bytes = pack(&[framework(src.path())]).unwrap();

        let dest = tempfile::tempdir().unwrap();
        unpack(&bytes, dest.path()).unwrap();
        let fw = dest.path().join("Core.xcframework");
        assert_eq!(std::fs::read_to_string(fw.join("Info.plist")).unwrap(), "plist");
        assert_eq!(
            std::fs::read_to_string(fw.join("ios-arm64/Core.framework/Headers/Core.h")).unwrap(),
            "header"
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_and_modes_survive() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let fw = framework(src.path());
        let binary = fw.join("ios-arm64/Core.framework/Core");
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("Core.framework", fw.join("ios-arm64/Current")).unwrap();

        let dest = tempfile::tempdir().unwrap();
        unpack(&pack(&[fw]).unwrap(), dest.path()).unwrap();
        let out = dest.path().join("Core.xcframework/ios-arm64");
        assert_eq!(
            std::fs::read_link(out.join("Current")).unwrap(),
            PathBuf::from("Core.framework")
        );
        let mode = std::fs::metadata(out.join("Core.framework/Core"))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0);
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let src = tempfile::tempdir().unwrap();
        let mut bytes = pack(&[framework(src.path())]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let dest = tempfile::tempdir().unwrap();
        assert!(matches!(
            unpack(&bytes, dest.path()),
            Err(CacheError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn truncated_or_foreign_bytes_rejected() {
        let dest = tempfile::tempdir().unwrap();
        assert!(matches!(
            unpack(&[1, 2], dest.path()),
            Err(CacheError::InvalidArchive { .. })
        ));
        assert!(matches!(
            unpack(b"\xff\xff\xff\x00garbage", dest.path()),
            Err(CacheError::InvalidArchive { .. })
        ));
    }

    #[test]
    fn traversal_rejected() {
        let dest = tempfile::tempdir().unwrap();
        let bytes = encode_entries(&[ArchiveEntry::File {
            path: "../escape".into(),
            data: b"x".to_vec(),
            executable: false,
        }]);
        assert!(matches!(
            unpack(&bytes, &dest.path().join("inner")),
            Err(CacheError::InvalidArchive { .. })
        ));
        assert!(!dest.path().join("escape").exists());

        let bytes = encode_entries(&[ArchiveEntry::Dir {
            path: "/etc/hoard".into(),
        }]);
        assert!(unpack(&bytes, dest.path()).is_err());
    }

    #[test]
    fn absolute_symlink_target_rejected() {
        let dest = tempfile::tempdir().unwrap();
        let bytes = encode_entries(&[ArchiveEntry::Symlink {
            path: "link".into(),
            target: "/etc/passwd".into(),
        }]);
        assert!(matches!(
            unpack(&bytes, dest.path()),
            Err(CacheError::InvalidArchive { .. })
        ));
    }

    #[test]
    fn symlink_climbing_out_is_rejected_before_writing() {
        let work = tempfile::tempdir().unwrap();
        let dest = work.path().join("downloads/dest");
        let bytes = encode_entries(&[
            ArchiveEntry::Dir { path: "a".into() },
            ArchiveEntry::Symlink {
                path: "a/esc".into(),
                target: "../..".into(),
            },
            ArchiveEntry::File {
                path: "a/esc/pwned".into(),
                data: b"x".to_vec(),
                executable: false,
            },
        ]);
        assert!(matches!(
            unpack(&bytes, &dest),
            Err(CacheError::InvalidArchive { .. })
        ));
        assert!(!work.path().join("downloads/pwned").exists());
        assert!(!dest.join("a").exists());
    }

    #[test]
    fn entries_below_a_symlink_are_rejected() {
        let dest = tempfile::tempdir().unwrap();
        let bytes = encode_entries(&[
            ArchiveEntry::Symlink {
                path: "a".into(),
                target: ".".into(),
            },
            ArchiveEntry::Symlink {
                path: "a/esc".into(),
                target: "../x".into(),
            },
        ]);
        assert!(matches!(
            unpack(&bytes, &dest.path().join("inner")),
            Err(CacheError::InvalidArchive { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_listed_before_its_target_still_resolves() {
        let dest = tempfile::tempdir().unwrap();
        let bytes = encode_entries(&[
            ArchiveEntry::Symlink {
                path: "fw/Current".into(),
                target: "A".into(),
            },
            ArchiveEntry::Dir {
                path: "fw/A".into(),
            },
            ArchiveEntry::File {
                path: "fw/A/Core".into(),
                data: b"bin".to_vec(),
                executable: false,
            },
        ]);
        unpack(&bytes, dest.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(dest.path().join("fw/Current/Core")).unwrap(),
            "bin"
        );
    }

    #[test]
    fn symlink_resolving_through_another_symlink_is_rejected() {
        let dest = tempfile::tempdir().unwrap();
        let bytes = encode_entries(&[
            ArchiveEntry::Symlink {
                path: "here".into(),
                target: ".".into(),
            },
            ArchiveEntry::Symlink {
                path: "up".into(),
                target: "here/..".into(),
            },
        ]);
        assert!(matches!(
            unpack(&bytes, &dest.path().join("inner")),
            Err(CacheError::InvalidArchive { .. })
        ));
    }

    #[test]
    fn missing_input_is_io_error() {
        let src = tempfile::tempdir().unwrap();
        assert!(matches!(
            pack(&[src.path().join("missing")]),
            Err(CacheError::Io { .. })
        ));
    }
}
