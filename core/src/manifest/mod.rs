pub mod keys;
pub mod verify;

pub use keys::{TrustedKey, TrustedKeys};
pub use verify::{
    ContentHash, ManifestVerifier, SignatureCheck, SkillArtifact, VerifiedManifest,
    verify_content_hash,
};

use crate::error::{InstallError, Result};
use crate::registry::validate_slug;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One installable skill referenced by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillEntry {
    pub slug: String,
    pub download_url: String,
    pub content_hash: String,
    #[serde(default)]
    pub size_bytes: u64,
}

/// Wire shape of `GET /plugins/{slug}/manifest`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument {
    plugin_slug: String,
    #[serde(default)]
    skills: Vec<SkillEntry>,
    signature: String,
    key_id: String,
}

/// Signed bytes: compact JSON with fields in declaration order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalManifest<'a> {
    plugin_slug: &'a str,
    key_id: &'a str,
    skills: &'a [SkillEntry],
}

/// A shape-validated manifest. Whether it is trusted is decided by
/// [`ManifestVerifier`]; nothing downstream accepts a manifest that failed
/// that check.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub plugin_slug: String,
    pub skills: Vec<SkillEntry>,
    pub signature: Vec<u8>,
    pub key_id: String,
}

impl Manifest {
    pub fn new(
        plugin_slug: impl Into<String>,
        key_id: impl Into<String>,
        skills: Vec<SkillEntry>,
    ) -> Self {
        Self {
            plugin_slug: plugin_slug.into(),
            skills,
            signature: Vec::new(),
            key_id: key_id.into(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<Vec<u8>>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn from_json(body: &[u8]) -> Result<Self> {
        let document: ManifestDocument = serde_json::from_slice(body)
            .map_err(|e| InstallError::MalformedManifest(e.to_string()))?;

        let signature = STANDARD
            .decode(document.signature.trim())
            .map_err(|e| InstallError::MalformedManifest(format!("signature: {e}")))?;

        let manifest = Self {
            plugin_slug: document.plugin_slug,
            skills: document.skills,
            signature,
            key_id: document.key_id,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let document = ManifestDocument {
            plugin_slug: self.plugin_slug.clone(),
            skills: self.skills.clone(),
            signature: STANDARD.encode(&self.signature),
            key_id: self.key_id.clone(),
        };
        serde_json::to_vec(&document).map_err(|e| InstallError::MalformedManifest(e.to_string()))
    }

    /// Bytes covered by the signature; the signature itself is excluded.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let canonical = CanonicalManifest {
            plugin_slug: &self.plugin_slug,
            key_id: &self.key_id,
            skills: &self.skills,
        };
        serde_json::to_vec(&canonical).map_err(|e| InstallError::MalformedManifest(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        validate_slug(&self.plugin_slug)
            .map_err(|e| InstallError::MalformedManifest(format!("plugin slug: {e}")))?;

        if self.key_id.trim().is_empty() {
            return Err(InstallError::MalformedManifest("missing keyId".to_string()));
        }
        if self.skills.is_empty() {
            return Err(InstallError::MalformedManifest(
                "manifest lists no skills".to_string(),
            ));
        }

        // Install dirs may live on a case-insensitive filesystem.
        let mut seen = HashSet::new();
        for entry in &self.skills {
            validate_slug(&entry.slug)
                .map_err(|e| InstallError::MalformedManifest(format!("skill slug: {e}")))?;
            if !seen.insert(entry.slug.to_ascii_lowercase()) {
                return Err(InstallError::MalformedManifest(format!(
                    "duplicate skill slug {}",
                    entry.slug
                )));
            }
            if entry.download_url.trim().is_empty() {
                return Err(InstallError::MalformedManifest(format!(
                    "skill {} has no downloadUrl",
                    entry.slug
                )));
            }
            ContentHash::parse(&entry.content_hash).map_err(|e| {
                InstallError::MalformedManifest(format!("skill {}: {e}", entry.slug))
            })?;
        }

        Ok(())
    }
}
