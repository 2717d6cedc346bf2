use super::{Manifest, SkillEntry, TrustedKeys};
use crate::config::Config;
use crate::error::{InstallError, Result};
use bytes::Bytes;
use ring::digest;
use ring::signature::{ED25519, UnparsedPublicKey};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

const SHA256_PREFIX: &str = "sha256:";

/// A SHA-256 digest, written as `sha256:<hex>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = digest::digest(&digest::SHA256, bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(digest.as_ref());
        Self(out)
    }

    /// Accepts `sha256:<hex>` or a bare 64-character hex digest.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.trim();
        let hex_part = match raw.split_once(':') {
            Some((algo, rest)) if algo.eq_ignore_ascii_case("sha256") => rest,
            Some((algo, _)) => return Err(format!("unsupported hash algorithm {algo}")),
            None => raw,
        };

        let mut out = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut out)
            .map_err(|e| format!("invalid sha256 digest: {e}"))?;
        Ok(Self(out))
    }

    pub fn ct_eq(&self, other: &ContentHash) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", SHA256_PREFIX, hex::encode(self.0))
    }
}

/// Downloaded bytes for one [`SkillEntry`], tagged with the digest actually
/// computed from them.
#[derive(Debug, Clone)]
pub struct SkillArtifact {
    pub slug: String,
    pub bytes: Bytes,
    pub computed_hash: ContentHash,
    pub hash_verified: bool,
}

/// Outcome of the manifest-level trust check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    Verified { key_id: String },
    Skipped,
}

impl SignatureCheck {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// A manifest that passed [`ManifestVerifier::check_manifest`]. Only the
/// verifier constructs it, so the download path cannot see an unchecked
/// manifest.
#[derive(Debug, Clone)]
pub struct VerifiedManifest {
    manifest: Manifest,
    signature: SignatureCheck,
}

impl VerifiedManifest {
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn signature(&self) -> &SignatureCheck {
        &self.signature
    }
}

pub struct ManifestVerifier {
    keys: TrustedKeys,
    skip_verify: bool,
    skip_hash_verify: bool,
}

impl ManifestVerifier {
    pub fn new(keys: TrustedKeys) -> Self {
        Self {
            keys,
            skip_verify: false,
            skip_hash_verify: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            keys: TrustedKeys::from_config(config),
            skip_verify: config.skip_verify,
            skip_hash_verify: config.skip_hash_verify,
        }
    }

    pub fn with_skip_verify(mut self, skip: bool) -> Self {
        self.skip_verify = skip;
        self
    }

    pub fn with_skip_hash_verify(mut self, skip: bool) -> Self {
        self.skip_hash_verify = skip;
        self
    }

    /// Signature check honouring `skip_verify`. A bypass is never silent: it
    /// is logged here and carried on the summary by the caller.
    pub fn check_manifest(&self, manifest: Manifest) -> Result<VerifiedManifest> {
        let signature = if self.skip_verify {
            warn!(
                plugin = %manifest.plugin_slug,
                key_id = %manifest.key_id,
                "Signature verification skipped by request"
            );
            SignatureCheck::Skipped
        } else {
            self.verify_signature(&manifest)?;
            SignatureCheck::Verified {
                key_id: manifest.key_id.clone(),
            }
        };

        Ok(VerifiedManifest {
            manifest,
            signature,
        })
    }

    pub fn verify_signature(&self, manifest: &Manifest) -> Result<()> {
        let key = self.keys.find(&manifest.key_id).ok_or_else(|| {
            InstallError::ManifestSignature(format!("unknown signing key {:?}", manifest.key_id))
        })?;

        let message = manifest.canonical_bytes()?;
        UnparsedPublicKey::new(&ED25519, &key.public_key)
            .verify(&message, &manifest.signature)
            .map_err(|_| {
                InstallError::ManifestSignature(format!(
                    "signature does not match key {:?}",
                    manifest.key_id
                ))
            })?;

        debug!(
            plugin = %manifest.plugin_slug,
            key_id = %manifest.key_id,
            "Manifest signature verified"
        );
        Ok(())
    }

    /// Independent of `skip_verify`; only `skip_hash_verify` bypasses it.
    pub fn verify_artifact(&self, entry: &SkillEntry, bytes: Bytes) -> Result<SkillArtifact> {
        let computed_hash = ContentHash::of(&bytes);

        let hash_verified = if self.skip_hash_verify {
            warn!(skill = %entry.slug, "Content hash verification skipped by request");
            false
        } else {
            check_hash(entry, &computed_hash)?;
            true
        };

        Ok(SkillArtifact {
            slug: entry.slug.clone(),
            bytes,
            computed_hash,
            hash_verified,
        })
    }
}

/// Constant-time comparison of `bytes` against the entry's declared digest.
pub fn verify_content_hash(entry: &SkillEntry, bytes: &[u8]) -> Result<()> {
    check_hash(entry, &ContentHash::of(bytes))
}

fn check_hash(entry: &SkillEntry, computed: &ContentHash) -> Result<()> {
    let declared = ContentHash::parse(&entry.content_hash).map_err(|_| {
        InstallError::ContentHashMismatch {
            slug: entry.slug.clone(),
            expected: entry.content_hash.clone(),
            actual: computed.to_string(),
        }
    })?;

    if declared.ct_eq(computed) {
        Ok(())
    } else {
        Err(InstallError::ContentHashMismatch {
            slug: entry.slug.clone(),
            expected: declared.to_string(),
            actual: computed.to_string(),
        })
    }
}
