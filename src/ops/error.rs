//! Domain-specific errors for the install pipeline.

use thiserror::Error;

use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;
use crate::manifest::ManifestError;
use crate::types::{PackageName, Version};

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("download failed: {0}")]
    Download(DownloadError),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("binary '{0}' not found in extracted archive")]
    BinaryNotFound(std::path::PathBuf),

    #[error("install IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl From<DownloadError> for InstallError {
    fn from(err: DownloadError) -> Self {
        // Mismatches carry their own severity and exit code.
        match err {
            DownloadError::HashMismatch { expected, actual } => {
                Self::ChecksumMismatch { expected, actual }
            }
            other => Self::Download(other),
        }
    }
}

impl InstallError {
    /// Process exit code, one per failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedArchitecture(_) => 2,
            Self::Manifest(ManifestError::Template(_)) => 3,
            Self::Download(_) => 4,
            Self::ChecksumMismatch { .. } => 5,
            Self::BinaryNotFound(_) => 6,
            Self::Io(_) | Self::Extract(_) => 7,
            Self::Manifest(_) => 8,
        }
    }
}

/// An [`InstallError`] tagged with the manifest it belongs to.
///
/// Every failure that leaves the pipeline names the token (and version,
/// once known) so batch installs never report an anonymous error.
#[derive(Error, Debug)]
#[error("{}: {error}", subject(.token, .version))]
pub struct InstallFailure {
    pub token: PackageName,
    pub version: Option<Version>,
    pub error: InstallError,
}

fn subject(token: &PackageName, version: &Option<Version>) -> String {
    match version {
        Some(v) => format!("{token}@{v}"),
        None => token.to_string(),
    }
}

impl InstallFailure {
    pub fn new(
        token: PackageName,
        version: Option<Version>,
        error: impl Into<InstallError>,
    ) -> Self {
        Self {
            token,
            version,
            error: error.into(),
        }
    }
}
