//! keg - manifest-driven installer for prebuilt macOS CLI binaries.
//!
//! # Overview
//!
//! keg reads declarative TOML manifests ("casks" in spirit): one record per
//! package per version, carrying per-architecture checksums, a templated
//! download URL, and the archive-relative path of the executable. Installing
//! a package resolves the host architecture, fetches the archive, verifies
//! its SHA-256 checksum, extracts into a scoped temp dir, and renames the
//! binary into the install directory.
//!
//! # Architecture
//!
//! - **Typestate pipeline**: `InstallRequest` -> `ResolvedInstall` ->
//!   `FetchedArchive` enforces resolve-before-fetch and verify-before-install
//!   at compile time.
//! - **Newtypes**: `PackageName`, `Version`, and `Sha256Hash` keep identifiers
//!   and checksums from degenerating into bare strings.
//! - **No state**: manifests are parsed at install time and discarded; the
//!   filesystem layout under the install dir is the only output.

pub mod io;
pub mod manifest;
pub mod ops;
pub mod types;

pub use manifest::{Manifest, ManifestError};
pub use ops::{InstallError, InstallFailure, InstallOptions, InstallRequest};
pub use types::{Arch, PackageName, Sha256Hash, Version};

use std::path::PathBuf;

/// Returns the configuration directory, or None if the user's home cannot
/// be resolved. `KEG_HOME` overrides the default `~/.keg`.
pub fn try_keg_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("KEG_HOME") {
        return Some(PathBuf::from(val));
    }
    dirs::home_dir().map(|h| h.join(".keg"))
}

/// Returns the canonical keg home directory (`~/.keg`).
///
/// # Panics
/// Panics if the home directory cannot be determined.
pub fn keg_home() -> PathBuf {
    try_keg_home().expect("Could not determine home directory")
}

/// Manifest directory: ~/.keg/manifests
pub fn manifest_dir() -> PathBuf {
    keg_home().join("manifests")
}

/// Install target: ~/.keg/bin
pub fn install_dir() -> PathBuf {
    keg_home().join("bin")
}

/// Extract the filename from a URL.
///
/// # Example
///
/// ```
/// use keg::filename_from_url;
///
/// assert_eq!(filename_from_url("https://example.com/path/to/file.tar.gz"), "file.tar.gz");
/// assert_eq!(filename_from_url(""), "");
/// ```
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}
