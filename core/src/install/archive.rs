use crate::error::{InstallError, Result};
use flate2::read::GzDecoder;
use std::path::{Component, Path, PathBuf};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Unpacks a gzip tarball into `dest`. Every entry is checked before it is
/// written: absolute paths, `..` components and link entries are rejected.
pub fn extract_tar_gz(slug: &str, bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let entries = archive.entries().map_err(|e| InstallError::fs(dest, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| InstallError::fs(dest, e))?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_pax_global_extensions() || entry_type.is_pax_local_extensions() {
            continue;
        }

        let raw_path = entry
            .path()
            .map_err(|e| InstallError::fs(dest, e))?
            .into_owned();
        let relative = safe_relative_path(slug, &raw_path)?;

        if !(entry_type.is_file() || entry_type.is_dir()) {
            return Err(InstallError::UnsafeArchiveEntry {
                slug: slug.to_string(),
                entry: format!("{} ({:?})", raw_path.display(), entry_type),
            });
        }

        let Some(relative) = relative else {
            continue;
        };
        let target = dest.join(&relative);

        if entry_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| InstallError::fs(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InstallError::fs(parent, e))?;
        }
        entry
            .unpack(&target)
            .map_err(|e| InstallError::fs(&target, e))?;
    }

    Ok(())
}

/// `Ok(None)` for the archive root itself (`./`).
fn safe_relative_path(slug: &str, path: &Path) -> Result<Option<PathBuf>> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(InstallError::UnsafeArchiveEntry {
                    slug: slug.to_string(),
                    entry: path.display().to_string(),
                });
            }
        }
    }

    if out.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(out))
    }
}
