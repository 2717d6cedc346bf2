//! Concurrent download, verification and atomic installation of the
//! artifacts named by a verified manifest.

mod archive;
mod manager;
mod stage;
mod state;
mod summary;

pub use manager::DownloadManager;
pub use stage::SKILL_FILE;
pub use state::{ArtifactState, ProgressFn};
pub use summary::{
    EXIT_FAILED, EXIT_OK, EXIT_PARTIAL, InstallResult, InstallStatus, InstallationSummary,
};
