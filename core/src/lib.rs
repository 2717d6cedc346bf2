pub mod config;
pub mod error;
pub mod install;
pub mod installer;
pub mod manifest;
pub mod registry;
pub mod report;
pub mod skills;
pub mod traits;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigOverrides, ConfigResolver};
pub use error::{ConfigError, InstallError, Result};
pub use install::{
    ArtifactState, DownloadManager, InstallResult, InstallStatus, InstallationSummary, ProgressFn,
};
pub use installer::Installer;
pub use manifest::{Manifest, ManifestVerifier, SignatureCheck, SkillEntry, VerifiedManifest};
pub use registry::RegistryClient;
pub use report::InstallationReporter;
pub use skills::{InstalledSkill, InstalledSkills};
pub use traits::{ArtifactSource, ReportSink};
