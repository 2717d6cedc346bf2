use super::archive;
use crate::error::{InstallError, Result};
use crate::manifest::SkillArtifact;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File name used when the payload is a bare skill document.
pub const SKILL_FILE: &str = "SKILL.md";

/// Writes `artifact` to `install_dir/<slug>` atomically and returns the
/// number of bytes written.
///
/// Content is assembled in a hidden sibling directory and renamed into place.
/// An existing install is moved aside first and restored if the swap fails,
/// so the destination is always either the old content or the new one.
pub fn commit_artifact(
    install_dir: &Path,
    artifact: &SkillArtifact,
    overwrite: bool,
) -> Result<u64> {
    std::fs::create_dir_all(install_dir).map_err(|e| InstallError::fs(install_dir, e))?;

    let dest = install_dir.join(&artifact.slug);
    let staging = install_dir.join(format!(
        ".{}.staging-{}",
        artifact.slug,
        uuid::Uuid::new_v4()
    ));

    let result = populate(&staging, artifact).and_then(|root| {
        let bytes = count_bytes(&root);
        swap_into_place(&root, &dest, overwrite)?;
        Ok(bytes)
    });

    if staging.exists()
        && let Err(e) = std::fs::remove_dir_all(&staging)
    {
        warn!(path = %staging.display(), "Failed to clean up staging directory: {}", e);
    }

    result
}

/// Fills `staging` and returns the directory that should become the install.
fn populate(staging: &Path, artifact: &SkillArtifact) -> Result<PathBuf> {
    std::fs::create_dir_all(staging).map_err(|e| InstallError::fs(staging, e))?;

    if archive::is_archive(&artifact.bytes) {
        archive::extract_tar_gz(&artifact.slug, &artifact.bytes, staging)?;
        Ok(hoist_single_root(staging))
    } else {
        let path = staging.join(SKILL_FILE);
        std::fs::write(&path, &artifact.bytes).map_err(|e| InstallError::fs(&path, e))?;
        Ok(staging.to_path_buf())
    }
}

/// Archives packed as `<name>/SKILL.md` install without the extra level.
fn hoist_single_root(staging: &Path) -> PathBuf {
    if staging.join(SKILL_FILE).exists() {
        return staging.to_path_buf();
    }

    let Ok(entries) = std::fs::read_dir(staging) else {
        return staging.to_path_buf();
    };
    let entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();

    match entries.as_slice() {
        [only] if only.path().is_dir() => only.path(),
        _ => staging.to_path_buf(),
    }
}

fn count_bytes(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn swap_into_place(root: &Path, dest: &Path, overwrite: bool) -> Result<()> {
    if !dest.exists() {
        return std::fs::rename(root, dest).map_err(|e| InstallError::fs(dest, e));
    }

    if !overwrite {
        return Err(InstallError::fs(
            dest,
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "destination exists and overwrite is not set",
            ),
        ));
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup = dest.with_file_name(format!(".{}.old-{}", file_name, uuid::Uuid::new_v4()));

    std::fs::rename(dest, &backup).map_err(|e| InstallError::fs(dest, e))?;

    if let Err(e) = std::fs::rename(root, dest) {
        if let Err(restore) = std::fs::rename(&backup, dest) {
            warn!(
                path = %dest.display(),
                backup = %backup.display(),
                "Failed to restore previous install: {}",
                restore
            );
        }
        return Err(InstallError::fs(dest, e));
    }

    let removed = if backup.is_dir() {
        std::fs::remove_dir_all(&backup)
    } else {
        std::fs::remove_file(&backup)
    };
    if let Err(e) = removed {
        warn!(path = %backup.display(), "Failed to remove replaced install: {}", e);
    }

    debug!(path = %dest.display(), "Replaced existing install");
    Ok(())
}
