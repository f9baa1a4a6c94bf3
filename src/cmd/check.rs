//! Manifest validation command (for manifest authors).

use std::path::Path;

use anyhow::{Context, Result};

use keg::Manifest;

/// Parse and validate a manifest file, then report what it resolves to.
pub fn check(path: &Path) -> Result<()> {
    let manifest = Manifest::from_file(path)
        .with_context(|| format!("invalid manifest: {}", path.display()))?;

    println!("✔ {} ({} {})", path.display(), manifest.token, manifest.version);
    for (&arch, segment) in &manifest.arch {
        let url = manifest.download_url(arch)?;
        let binary = manifest.binary_path(arch)?;
        println!("  {arch} ({segment}):");
        println!("    url:    {url}");
        println!("    binary: {}", binary.display());
    }
    Ok(())
}
