//! Install command.

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use keg::ops::{self, InstallFailure, InstallOptions, InstallRequest};
use keg::types::{Arch, PackageName, Version};

/// Install one or more packages (parallel pipelines, one temp dir each).
///
/// On failure returns the first `InstallFailure` so the caller can map it
/// to a per-kind exit code; all failures are printed regardless.
pub async fn install(
    tokens: &[String],
    version: Option<&str>,
    arch: Option<Arch>,
    opts: InstallOptions,
) -> Result<(), InstallFailure> {
    let requests: Vec<InstallRequest> = tokens
        .iter()
        .map(|t| {
            InstallRequest::new(
                PackageName::new(t),
                version.map(Version::new),
                arch,
            )
        })
        .collect();

    let client = Client::builder()
        .tcp_nodelay(true)
        .pool_max_idle_per_host(20)
        .build()
        .map_err(|e| {
            InstallFailure::new(
                PackageName::new(tokens.first().map(String::as_str).unwrap_or("")),
                None,
                keg::io::download::DownloadError::Http(e),
            )
        })?;

    // Ctrl-C cancels in-flight downloads; partial temp files are removed.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let dry_run = opts.dry_run;
    let results = ops::install_packages(&client, requests, &opts, &cancel).await;

    let mut first_failure: Option<InstallFailure> = None;
    let mut installed = Vec::new();

    for result in results {
        match result {
            Ok(outcome) => {
                if dry_run {
                    println!(
                        "  would install {} {} -> {}",
                        outcome.token,
                        outcome.version,
                        outcome.installed_path.display()
                    );
                } else {
                    println!(
                        "  ✔ {} {} ({}) -> {}",
                        outcome.token,
                        outcome.version,
                        format_size(outcome.size_bytes),
                        outcome.installed_path.display()
                    );
                    if !outcome.caveats.is_empty() {
                        println!();
                        for line in outcome.caveats.lines() {
                            println!("  {line}");
                        }
                    }
                    installed.push(outcome);
                }
            }
            Err(failure) => {
                eprintln!("  ✘ {failure}");
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
            }
        }
    }

    let outcome_refs: Vec<&ops::InstallOutcome> = installed.iter().collect();
    ops::install::perform_ux_checks(&outcome_refs);

    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}

/// Format bytes as human readable.
fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;

    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
