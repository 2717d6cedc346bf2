use crate::install::{EXIT_FAILED, EXIT_PARTIAL};
use std::path::PathBuf;
use thiserror::Error;

/// Malformed explicit configuration. Raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid api base url {0:?}: {1}")]
    InvalidUrl(String, String),

    #[error("invalid trusted key: {0}")]
    InvalidTrustedKey(String),

    #[error("invalid slug {0:?}: only letters, digits, '.', '_' and '-' are allowed")]
    InvalidSlug(String),

    #[error("failed to read config file {path}: {reason}")]
    File { path: PathBuf, reason: String },

    #[error("could not determine the home directory")]
    NoHomeDir,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("network error for {url}: {message}")]
    Network {
        url: String,
        message: String,
        timed_out: bool,
    },

    #[error("registry returned {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("manifest signature invalid, refusing to install: {0}")]
    ManifestSignature(String),

    #[error("content hash mismatch for {slug}: expected {expected}, got {actual}")]
    ContentHashMismatch {
        slug: String,
        expected: String,
        actual: String,
    },

    #[error("filesystem error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsafe archive entry {entry:?} in {slug}")]
    UnsafeArchiveEntry { slug: String, entry: String },

    #[error("{failed} of {total} artifacts failed to install")]
    PartialInstall {
        installed: usize,
        failed: usize,
        total: usize,
    },
}

impl InstallError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }

    /// Process exit code for a run that ended in this error. A partial
    /// install with nothing written counts as a total failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PartialInstall { installed, .. } if *installed > 0 => EXIT_PARTIAL,
            _ => EXIT_FAILED,
        }
    }

    /// Network failures are the only ones worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

pub type Result<T, E = InstallError> = std::result::Result<T, E>;
