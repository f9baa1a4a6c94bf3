//! Install pipeline typestate.
//!
//! Models one install as a series of explicit state transitions:
//! `InstallRequest` -> `ResolvedInstall` -> `FetchedArchive` -> installed path.
//!
//! You cannot fetch before the manifest and architecture are resolved, and
//! you cannot install bytes that have not passed checksum verification.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::io::{download, extract};
use crate::manifest::{self, Manifest};
use crate::ops::InstallError;
use crate::types::{Arch, PackageName, Sha256Hash, Version};

/// Step 1: what the user asked for.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub token: PackageName,
    pub version: Option<Version>,
    pub arch: Option<Arch>,
}

/// Step 2: the manifest is loaded and the architecture, URL, checksum, and
/// archive-relative binary path are fixed.
#[derive(Debug)]
pub struct ResolvedInstall {
    pub manifest: Manifest,
    pub arch: Arch,
    pub url: String,
    pub expected: Sha256Hash,
    pub binary_rel: PathBuf,
}

/// Step 3: the archive is on disk in a scoped temp dir and its checksum
/// has been verified.
pub struct FetchedArchive {
    pub resolved: ResolvedInstall,
    archive_path: PathBuf,
    temp_dir: TempDir,
}

impl InstallRequest {
    pub fn new(token: PackageName, version: Option<Version>, arch: Option<Arch>) -> Self {
        Self { token, version, arch }
    }

    /// Load the manifest and pin everything architecture-dependent.
    pub fn resolve(self, manifest_dir: &Path) -> Result<ResolvedInstall, InstallError> {
        let manifest = manifest::load(manifest_dir, &self.token, self.version.as_ref())?;

        let arch = match self.arch {
            Some(arch) => arch,
            None => Arch::detect().ok_or_else(|| {
                InstallError::UnsupportedArchitecture(std::env::consts::ARCH.to_string())
            })?,
        };
        if !manifest.supports(arch) {
            return Err(InstallError::UnsupportedArchitecture(format!(
                "manifest '{}' has no binary for '{arch}'",
                manifest.token
            )));
        }

        let url = manifest.download_url(arch)?;
        let binary_rel = manifest.binary_path(arch)?;
        // supports() guarantees the entry exists.
        let expected = manifest
            .checksum(arch)
            .cloned()
            .ok_or_else(|| InstallError::UnsupportedArchitecture(arch.to_string()))?;

        Ok(ResolvedInstall {
            manifest,
            arch,
            url,
            expected,
            binary_rel,
        })
    }
}

impl ResolvedInstall {
    /// Download the archive into a scoped temp dir and verify its checksum.
    ///
    /// The temp dir travels with the returned state and is removed when it
    /// drops, on success and failure alike.
    pub async fn fetch(
        self,
        client: &Client,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<FetchedArchive, InstallError> {
        let temp_dir = TempDir::new()?;
        let filename = crate::filename_from_url(&self.url);
        let filename = if filename.is_empty() { "download" } else { filename };
        let archive_path = temp_dir.path().join(filename);

        download::fetch_verified(
            client,
            &self.url,
            &archive_path,
            &self.expected,
            max_attempts,
            cancel,
        )
        .await?;

        Ok(FetchedArchive {
            resolved: self,
            archive_path,
            temp_dir,
        })
    }
}

impl FetchedArchive {
    /// Extract the verified archive and move the binary into `install_dir`.
    ///
    /// The binary is staged next to its final location and renamed into
    /// place, so concurrent readers never observe a partial write. Blocking;
    /// callers on the async runtime wrap this in `spawn_blocking`.
    pub fn install(self, install_dir: &Path) -> Result<PathBuf, InstallError> {
        let extract_dir = self.temp_dir.path().join("extracted");
        extract::extract_auto(&self.archive_path, &extract_dir)?;

        let source = extract_dir.join(&self.resolved.binary_rel);
        if !source.is_file() {
            return Err(InstallError::BinaryNotFound(
                self.resolved.binary_rel.clone(),
            ));
        }

        let target = install_dir.join(&self.resolved.binary_rel);
        let parent = target
            .parent()
            .ok_or_else(|| InstallError::Io(std::io::Error::other("install path has no parent")))?;
        std::fs::create_dir_all(parent)?;

        // Stage in the destination directory so the final rename stays on
        // one filesystem and is atomic.
        let file_name = target
            .file_name()
            .ok_or_else(|| InstallError::BinaryNotFound(self.resolved.binary_rel.clone()))?;
        let staged = parent.join(format!(".{}.keg-stage", file_name.to_string_lossy()));
        if let Err(e) = stage_into_place(&source, &staged, &target) {
            std::fs::remove_file(&staged).ok();
            return Err(InstallError::Io(e));
        }

        // temp_dir drops here, removing the archive and extraction area.
        Ok(target)
    }
}

/// Copy into the staging path, set the executable mode, and rename into
/// place. The caller removes the staged file when any step fails.
fn stage_into_place(source: &Path, staged: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::copy(source, staged)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(staged, std::fs::Permissions::from_mode(0o755))?;
    }

    std::fs::rename(staged, target)
}
