//! Install orchestration.
//!
//! One logical operation per manifest: resolve -> fetch -> verify ->
//! extract -> rename into place. Batch installs run each pipeline as an
//! independent unit of work; the only shared state is the HTTP client's
//! connection pool and the cancellation token.

use std::path::PathBuf;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::ops::flow::InstallRequest;
use crate::ops::{InstallError, InstallFailure};
use crate::types::{PackageName, Version};

/// Everything the caller needs to report a successful install.
#[derive(Debug)]
pub struct InstallOutcome {
    pub token: PackageName,
    pub version: Version,
    pub installed_path: PathBuf,
    pub size_bytes: u64,
    pub caveats: String,
}

/// Knobs shared by every pipeline in one invocation.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub manifest_dir: PathBuf,
    pub install_dir: PathBuf,
    pub max_attempts: u32,
    pub dry_run: bool,
}

/// Run the full pipeline for one request.
pub async fn install_package(
    client: &Client,
    request: InstallRequest,
    opts: &InstallOptions,
    cancel: &CancellationToken,
) -> Result<InstallOutcome, InstallFailure> {
    let token = request.token.clone();
    let requested = request.version.clone();
    let fail = |version: Option<Version>, error: InstallError| {
        InstallFailure::new(token.clone(), version, error)
    };

    let resolved = request
        .resolve(&opts.manifest_dir)
        .map_err(|e| fail(requested.clone(), e))?;
    let version = resolved.manifest.version.clone();

    if opts.dry_run {
        return Ok(InstallOutcome {
            token,
            version,
            installed_path: opts.install_dir.join(&resolved.binary_rel),
            size_bytes: 0,
            caveats: String::new(),
        });
    }

    tracing::info!(token = %token, version = %version, url = %resolved.url, "fetching archive");
    let caveats = resolved.manifest.caveats.clone();

    let fetched = resolved
        .fetch(client, opts.max_attempts, cancel)
        .await
        .map_err(|e| fail(Some(version.clone()), e))?;

    let install_dir = opts.install_dir.clone();
    let installed_path = tokio::task::spawn_blocking(move || fetched.install(&install_dir))
        .await
        .map_err(|e| fail(Some(version.clone()), InstallError::Io(std::io::Error::other(e))))?
        .map_err(|e| fail(Some(version.clone()), e))?;

    let size_bytes = std::fs::metadata(&installed_path).map(|m| m.len()).unwrap_or(0);
    tracing::info!(token = %token, version = %version, path = %installed_path.display(), "installed");

    Ok(InstallOutcome {
        token,
        version,
        installed_path,
        size_bytes,
        caveats,
    })
}

/// Install several packages concurrently.
///
/// Each request gets its own pipeline and temp dir; results come back in
/// completion order. The reqwest connection pool bounds the real parallelism.
pub async fn install_packages(
    client: &Client,
    requests: Vec<InstallRequest>,
    opts: &InstallOptions,
    cancel: &CancellationToken,
) -> Vec<Result<InstallOutcome, InstallFailure>> {
    let mut set: tokio::task::JoinSet<Result<InstallOutcome, InstallFailure>> =
        tokio::task::JoinSet::new();

    for request in requests {
        let client = client.clone();
        let opts = opts.clone();
        let cancel = cancel.clone();
        set.spawn(async move { install_package(&client, request, &opts, &cancel).await });
    }

    let mut results = Vec::new();
    while let Some(res) = set.join_next().await {
        match res {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!("install task panicked: {e}"),
        }
    }
    results
}

/// Post-install sanity checks: PATH membership and shadowing.
///
/// Installed binaries live under versioned directories, so the shell only
/// finds them once that directory is on PATH; a same-named binary earlier in
/// PATH silently wins. Never fatal.
pub fn perform_ux_checks(outcomes: &[&InstallOutcome]) {
    let path_env = std::env::var_os("PATH").unwrap_or_default();

    for outcome in outcomes {
        let Some(bin_dir) = outcome.installed_path.parent() else {
            continue;
        };
        let on_path = std::env::split_paths(&path_env).any(|p| p == bin_dir);
        if !on_path {
            tracing::warn!(
                "{} is not in your PATH; add: export PATH=\"{}:$PATH\"",
                bin_dir.display(),
                bin_dir.display()
            );
        }

        if let Some(name) = outcome.installed_path.file_name() {
            if let Ok(found) = which::which(name) {
                if found != outcome.installed_path {
                    tracing::warn!(
                        "'{}' is shadowed by {}",
                        name.to_string_lossy(),
                        found.display()
                    );
                }
            }
        }
    }
}
