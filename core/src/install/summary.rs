use crate::error::InstallError;
use crate::manifest::SignatureCheck;
use serde::Serialize;
use std::time::Duration;

pub const EXIT_OK: i32 = 0;
/// Nothing installed, or the manifest itself was rejected.
pub const EXIT_FAILED: i32 = 1;
/// Some artifacts installed, some failed.
pub const EXIT_PARTIAL: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Installed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub slug: String,
    pub status: InstallStatus,
    pub bytes_written: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub dry_run: bool,
    pub hash_verified: bool,
}

impl InstallResult {
    pub fn installed(slug: &str, bytes_written: u64, hash_verified: bool) -> Self {
        Self {
            slug: slug.to_string(),
            status: InstallStatus::Installed,
            bytes_written,
            error: None,
            reason: None,
            dry_run: false,
            hash_verified,
        }
    }

    /// Verified but not written.
    pub fn dry_run(slug: &str, hash_verified: bool) -> Self {
        Self {
            dry_run: true,
            reason: Some("dry run".to_string()),
            ..Self::installed(slug, 0, hash_verified)
        }
    }

    pub fn skipped(slug: &str, reason: impl Into<String>) -> Self {
        Self {
            slug: slug.to_string(),
            status: InstallStatus::Skipped,
            bytes_written: 0,
            error: None,
            reason: Some(reason.into()),
            dry_run: false,
            hash_verified: false,
        }
    }

    pub fn failed(slug: &str, error: impl ToString) -> Self {
        Self {
            slug: slug.to_string(),
            status: InstallStatus::Failed,
            bytes_written: 0,
            error: Some(error.to_string()),
            reason: None,
            dry_run: false,
            hash_verified: false,
        }
    }
}

/// Per-artifact results in manifest order plus aggregate counts.
#[derive(Debug, Clone)]
pub struct InstallationSummary {
    pub plugin_slug: String,
    pub results: Vec<InstallResult>,
    pub installed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub signature: SignatureCheck,
    pub dry_run: bool,
    pub elapsed: Duration,
}

impl InstallationSummary {
    pub fn new(
        plugin_slug: impl Into<String>,
        results: Vec<InstallResult>,
        signature: SignatureCheck,
        dry_run: bool,
        elapsed: Duration,
    ) -> Self {
        let count = |status: InstallStatus| results.iter().filter(|r| r.status == status).count();
        let installed = count(InstallStatus::Installed);
        let skipped = count(InstallStatus::Skipped);
        let failed = count(InstallStatus::Failed);

        Self {
            plugin_slug: plugin_slug.into(),
            results,
            installed,
            skipped,
            failed,
            signature,
            dry_run,
            elapsed,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn verification_skipped(&self) -> bool {
        self.signature.is_skipped()
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstallResult> {
        self.results
            .iter()
            .filter(|r| r.status == InstallStatus::Failed)
    }

    pub fn slugs_with(&self, status: InstallStatus) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.slug.clone())
            .collect()
    }

    /// Zero installs with at least one failure. An all-skipped run is an
    /// idempotent re-install, not a failure.
    pub fn is_total_failure(&self) -> bool {
        self.installed == 0 && self.failed > 0
    }

    pub fn exit_code(&self) -> i32 {
        self.failure().map_or(EXIT_OK, |e| e.exit_code())
    }

    /// `Err(PartialInstall)` when any artifact failed.
    pub fn into_result(self) -> Result<Self, InstallError> {
        match self.failure() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    fn failure(&self) -> Option<InstallError> {
        (self.failed > 0).then(|| InstallError::PartialInstall {
            installed: self.installed,
            failed: self.failed,
            total: self.total(),
        })
    }
}
