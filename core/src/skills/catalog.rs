use super::{InstalledSkill, load_skill};
use crate::registry::validate_slug;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Skills currently present in an install directory, keyed by slug.
#[derive(Debug, Clone, Default)]
pub struct InstalledSkills {
    skills: BTreeMap<String, InstalledSkill>,
}

impl InstalledSkills {
    /// A missing directory is an empty catalog. Hidden entries (staging
    /// leftovers), names that are not valid slugs and directories without a
    /// readable `SKILL.md` are skipped.
    pub fn scan(install_dir: &Path) -> Result<Self> {
        let mut catalog = Self::default();

        if !install_dir.exists() {
            tracing::debug!("Install directory does not exist: {}", install_dir.display());
            return Ok(catalog);
        }

        let entries = fs::read_dir(install_dir).with_context(|| {
            format!("Failed to read install directory: {}", install_dir.display())
        })?;

        let mut skipped = 0;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if validate_slug(&name).is_err() {
                tracing::warn!("Skipping unsafe skill directory: {}", name);
                skipped += 1;
                continue;
            }

            match load_skill(&path) {
                Ok(skill) => {
                    catalog.skills.insert(skill.slug.clone(), skill);
                }
                Err(e) => {
                    tracing::warn!("Failed to load skill '{}': {}", name, e);
                    skipped += 1;
                }
            }
        }

        tracing::debug!(
            loaded = catalog.len(),
            skipped,
            path = %install_dir.display(),
            "Scanned installed skills"
        );
        Ok(catalog)
    }

    /// Sorted by slug.
    pub fn list(&self) -> impl Iterator<Item = &InstalledSkill> {
        self.skills.values()
    }

    pub fn get(&self, slug: &str) -> Option<&InstalledSkill> {
        self.skills.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.skills.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
