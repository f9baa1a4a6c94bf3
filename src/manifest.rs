//! TOML manifest parsing.
//!
//! One manifest describes one installable version of one package: where to
//! download it, how to verify it, and which file inside the archive is the
//! executable. Manifests are immutable once loaded and discarded after the
//! install completes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::types::{Arch, PackageName, Sha256Hash, Version};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no manifest for '{token}' under {}", dir.display())]
    NotFound { token: PackageName, dir: PathBuf },

    #[error("invalid manifest: {0}")]
    Invalid(String),

    #[error("invalid template: {0}")]
    Template(String),
}

/// Declarative description of one installable package version.
///
/// Field-for-field this mirrors a Homebrew-style cask stanza: a token, a
/// display name, a version, per-architecture path segments and checksums,
/// a templated download URL, the archive-relative binary path, and a
/// caveat message printed verbatim after install.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Unique package identifier, e.g. `gcn`.
    pub token: PackageName,
    /// Human-readable name, e.g. `Graal Cloud Native`.
    pub name: String,
    #[serde(default)]
    pub homepage: String,
    pub version: Version,
    /// Download URL template; `{version}` and `{arch}` are substituted.
    pub url: String,
    /// Path of the executable relative to the extracted archive root.
    pub binary: String,
    /// Free-form text shown to the user after a successful install.
    #[serde(default)]
    pub caveats: String,
    /// Logical architecture tag to platform path segment, e.g. arm = "aarch64".
    pub arch: BTreeMap<Arch, String>,
    /// Logical architecture tag to expected archive checksum.
    pub sha256: BTreeMap<Arch, Sha256Hash>,
}

impl Manifest {
    /// Parse and validate a manifest from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a manifest from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the manifest invariants.
    ///
    /// Every architecture tag must carry a checksum, the version must be
    /// non-empty, and the templates may only reference declared variables.
    fn validate(&self) -> Result<(), ManifestError> {
        if self.version.is_empty() {
            return Err(ManifestError::Invalid(format!(
                "manifest '{}' has an empty version",
                self.token
            )));
        }
        if self.arch.is_empty() {
            return Err(ManifestError::Invalid(format!(
                "manifest '{}' declares no architectures",
                self.token
            )));
        }
        for tag in self.arch.keys() {
            if !self.sha256.contains_key(tag) {
                return Err(ManifestError::Invalid(format!(
                    "manifest '{}' declares architecture '{tag}' without a sha256 entry",
                    self.token
                )));
            }
        }
        check_template(&self.url)?;
        check_template(&self.binary)?;
        Ok(())
    }

    /// Whether this manifest supports the given architecture tag.
    pub fn supports(&self, arch: Arch) -> bool {
        self.arch.contains_key(&arch) && self.sha256.contains_key(&arch)
    }

    /// Resolve the download URL for an architecture.
    ///
    /// Pure substitution: the same manifest and tag always yield the same URL.
    pub fn download_url(&self, arch: Arch) -> Result<String, ManifestError> {
        substitute(&self.url, &self.version, self.segment(arch)?)
    }

    /// Resolve the archive-relative path of the executable for an architecture.
    pub fn binary_path(&self, arch: Arch) -> Result<PathBuf, ManifestError> {
        substitute(&self.binary, &self.version, self.segment(arch)?).map(PathBuf::from)
    }

    /// Expected archive checksum for an architecture.
    pub fn checksum(&self, arch: Arch) -> Option<&Sha256Hash> {
        self.sha256.get(&arch)
    }

    fn segment(&self, arch: Arch) -> Result<&str, ManifestError> {
        self.arch
            .get(&arch)
            .map(String::as_str)
            .ok_or_else(|| {
                ManifestError::Invalid(format!(
                    "manifest '{}' has no mapping for architecture '{arch}'",
                    self.token
                ))
            })
    }
}

/// Locate and load the manifest for a token, optionally pinned to a version.
///
/// Layout in the manifest directory: `<token>.toml` for the current version
/// and `<token>@<version>.toml` for pinned variants. When a version is
/// requested, the pinned file wins; an unpinned file whose version matches
/// is accepted as a fallback.
pub fn load(
    dir: &Path,
    token: &PackageName,
    version: Option<&Version>,
) -> Result<Manifest, ManifestError> {
    let not_found = || ManifestError::NotFound {
        token: token.clone(),
        dir: dir.to_path_buf(),
    };

    let unpinned = dir.join(format!("{token}.toml"));
    let candidate = match version {
        Some(v) => {
            let pinned = dir.join(format!("{token}@{v}.toml"));
            if pinned.exists() { pinned } else { unpinned }
        }
        None => unpinned,
    };

    if !candidate.exists() {
        return Err(not_found());
    }

    let manifest = Manifest::from_file(&candidate)?;
    if manifest.token != *token {
        return Err(ManifestError::Invalid(format!(
            "manifest '{}' declares token '{}', expected '{token}'",
            candidate.display(),
            manifest.token
        )));
    }
    if let Some(v) = version {
        if manifest.version != *v {
            return Err(not_found());
        }
    }
    Ok(manifest)
}

/// Reject templates that reference anything but `{version}` and `{arch}`.
fn check_template(template: &str) -> Result<(), ManifestError> {
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let tail = &rest[start + 1..];
        let end = tail.find('}').ok_or_else(|| {
            ManifestError::Template(format!("unterminated placeholder in '{template}'"))
        })?;
        match &tail[..end] {
            "version" | "arch" => {}
            other => {
                return Err(ManifestError::Template(format!(
                    "undeclared substitution variable '{{{other}}}' in '{template}'"
                )));
            }
        }
        rest = &tail[end + 1..];
    }
    Ok(())
}

fn substitute(template: &str, version: &str, segment: &str) -> Result<String, ManifestError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let end = tail.find('}').ok_or_else(|| {
            ManifestError::Template(format!("unterminated placeholder in '{template}'"))
        })?;
        match &tail[..end] {
            "version" => out.push_str(version),
            "arch" => out.push_str(segment),
            other => {
                return Err(ManifestError::Template(format!(
                    "undeclared substitution variable '{{{other}}}' in '{template}'"
                )));
            }
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GCN: &str = r#"
token = "gcn"
name = "Graal Cloud Native"
homepage = "https://www.graal.cloud/gcn/"
version = "4.0.7"
url = "https://github.com/oracle/gcn/releases/download/{version}/gcn-cli-{version}-macos-{arch}.tar.gz"
binary = "gcn-cli-{version}-macos-{arch}/gcn"
caveats = """
Graal Cloud Native is licensed under the Apache License Version 2.0:
  https://github.com/oracle/gcn/blob/main/LICENSE.txt
"""

[arch]
arm = "aarch64"
intel = "amd64"

[sha256]
arm = "1acfc2b7a7537e6956603f72ae7c39c95e3b9c7a1574684f63b2cc315e9d770d"
intel = "fc1cc35749be9a9ffd2c9e57bfd0665fb6651e9de6ea416f3df00ace4b04109b"
"#;

    #[test]
    fn parses_full_manifest() {
        let m = Manifest::parse(GCN).unwrap();
        assert_eq!(m.token.as_str(), "gcn");
        assert_eq!(m.version.as_str(), "4.0.7");
        assert_eq!(m.arch[&Arch::Arm], "aarch64");
        assert!(m.supports(Arch::Intel));
        assert!(m.caveats.contains("Apache License"));
    }

    #[test]
    fn url_substitution_is_pure() {
        let m = Manifest::parse(GCN).unwrap();
        let expected =
            "https://github.com/oracle/gcn/releases/download/4.0.7/gcn-cli-4.0.7-macos-aarch64.tar.gz";
        assert_eq!(m.download_url(Arch::Arm).unwrap(), expected);
        assert_eq!(m.download_url(Arch::Arm).unwrap(), expected);
        assert_eq!(
            m.download_url(Arch::Intel).unwrap(),
            "https://github.com/oracle/gcn/releases/download/4.0.7/gcn-cli-4.0.7-macos-amd64.tar.gz"
        );
    }

    #[test]
    fn binary_path_substitution() {
        let m = Manifest::parse(GCN).unwrap();
        assert_eq!(
            m.binary_path(Arch::Arm).unwrap(),
            PathBuf::from("gcn-cli-4.0.7-macos-aarch64/gcn")
        );
    }

    #[test]
    fn rejects_arch_without_checksum() {
        let toml = GCN.replace(
            "intel = \"fc1cc35749be9a9ffd2c9e57bfd0665fb6651e9de6ea416f3df00ace4b04109b\"",
            "",
        );
        let err = Manifest::parse(&toml).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)), "{err}");
    }

    #[test]
    fn rejects_empty_version() {
        let toml = GCN.replace("version = \"4.0.7\"", "version = \"\"");
        assert!(matches!(
            Manifest::parse(&toml).unwrap_err(),
            ManifestError::Invalid(_)
        ));
    }

    #[test]
    fn rejects_undeclared_placeholder() {
        let toml = GCN.replace("{version}/gcn-cli", "{tag}/gcn-cli");
        assert!(matches!(
            Manifest::parse(&toml).unwrap_err(),
            ManifestError::Template(_)
        ));
    }

    #[test]
    fn rejects_unterminated_placeholder() {
        let toml = GCN.replace("binary = \"gcn-cli-{version}", "binary = \"gcn-cli-{version");
        assert!(matches!(
            Manifest::parse(&toml).unwrap_err(),
            ManifestError::Template(_)
        ));
    }

    #[test]
    fn rejects_bad_checksum_hex() {
        let toml = GCN.replace(
            "1acfc2b7a7537e6956603f72ae7c39c95e3b9c7a1574684f63b2cc315e9d770d",
            "not-a-checksum",
        );
        assert!(matches!(
            Manifest::parse(&toml).unwrap_err(),
            ManifestError::Parse(_)
        ));
    }

    #[test]
    fn locates_pinned_and_unpinned_manifests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gcn.toml"), GCN).unwrap();
        let pinned = GCN.replace("4.0.7", "4.0.4");
        std::fs::write(dir.path().join("gcn@4.0.4.toml"), &pinned).unwrap();

        let token = PackageName::new("gcn");
        let latest = load(dir.path(), &token, None).unwrap();
        assert_eq!(latest.version.as_str(), "4.0.7");

        let old = load(dir.path(), &token, Some(&Version::new("4.0.4"))).unwrap();
        assert_eq!(old.version.as_str(), "4.0.4");

        // Unpinned fallback satisfies a matching version request.
        let same = load(dir.path(), &token, Some(&Version::new("4.0.7"))).unwrap();
        assert_eq!(same.version.as_str(), "4.0.7");

        let missing = load(dir.path(), &token, Some(&Version::new("9.9.9")));
        assert!(matches!(missing, Err(ManifestError::NotFound { .. })));

        let unknown = load(dir.path(), &PackageName::new("gdk"), None);
        assert!(matches!(unknown, Err(ManifestError::NotFound { .. })));
    }
}
