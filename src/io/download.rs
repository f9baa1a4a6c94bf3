//! Archive download with streaming SHA-256 verification.
//!
//! The response body is hashed while it is written to disk, so verification
//! costs no second pass. Transient network failures are retried with bounded
//! exponential backoff; checksum mismatches are integrity failures and are
//! never retried.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::types::Sha256Hash;

/// Default retry budget for transient network failures.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const USER_AGENT: &str = concat!("keg/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("download cancelled")]
    Cancelled,

    #[error("download failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl DownloadError {
    /// Whether retrying could plausibly succeed.
    ///
    /// Connection failures, timeouts, and 5xx responses are transient;
    /// checksum mismatches, cancellation, and client errors are not.
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Io(_) | Self::HashMismatch { .. } | Self::Cancelled | Self::Exhausted { .. } => {
                false
            }
        }
    }
}

/// Download `url` to `dest`, verifying the SHA-256 checksum of the bytes.
///
/// Retries transient failures up to `max_attempts` times with exponential
/// backoff. A checksum mismatch removes the file and fails immediately,
/// without retrying.
pub async fn fetch_verified(
    client: &Client,
    url: &str,
    dest: &Path,
    expected: &Sha256Hash,
    max_attempts: u32,
    cancel: &CancellationToken,
) -> Result<(), DownloadError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetch_once(client, url, dest, expected, cancel).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() => {
                if attempt >= max_attempts {
                    return Err(DownloadError::Exhausted {
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                let backoff = backoff_for(attempt);
                tracing::warn!(
                    url,
                    attempt,
                    max_attempts,
                    "transient download failure, retrying in {backoff:?}: {e}"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exponential backoff before the next attempt, capped so the exponent
/// never overflows the shift however large the retry budget is.
fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(500u64 << (attempt - 1).min(10))
}

async fn fetch_once(
    client: &Client,
    url: &str,
    dest: &Path,
    expected: &Sha256Hash,
    cancel: &CancellationToken,
) -> Result<(), DownloadError> {
    let send = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send();

    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
        resp = send => resp?.error_for_status()?,
    };

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                drop(file);
                tokio::fs::remove_file(dest).await.ok();
                return Err(DownloadError::Cancelled);
            }
            chunk = stream.next() => chunk,
        };
        match chunk {
            Some(chunk) => {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                hasher.update(&chunk);
            }
            None => break,
        }
    }

    file.flush().await?;
    let digest = hasher.finalize();

    if !expected.matches(&digest) {
        let actual = hex::encode(digest);
        tracing::error!(
            url,
            expected = %expected,
            actual,
            "checksum mismatch: archive integrity cannot be verified, refusing to install"
        );
        tokio::fs::remove_file(dest).await.ok();
        return Err(DownloadError::HashMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn hash_of(bytes: &[u8]) -> Sha256Hash {
        Sha256Hash::from_str(&hex::encode(Sha256::digest(bytes))).unwrap()
    }

    #[test]
    fn backoff_grows_then_caps() {
        assert_eq!(backoff_for(1), Duration::from_millis(500));
        assert_eq!(backoff_for(3), Duration::from_millis(2000));
        assert_eq!(backoff_for(11), Duration::from_millis(500 << 10));
        // Huge retry budgets must not overflow the shift.
        assert_eq!(backoff_for(1000), backoff_for(11));
    }

    #[tokio::test]
    async fn downloads_and_verifies() {
        let mut server = mockito::Server::new_async().await;
        let body = b"prebuilt binary bytes".to_vec();
        let mock = server
            .mock("GET", "/pkg.tar.gz")
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg.tar.gz");
        let client = Client::new();
        let cancel = CancellationToken::new();

        fetch_verified(
            &client,
            &format!("{}/pkg.tar.gz", server.url()),
            &dest,
            &hash_of(&body),
            DEFAULT_MAX_ATTEMPTS,
            &cancel,
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let body = b"eventually fine".to_vec();
        let failures = server
            .mock("GET", "/pkg.tar.gz")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;
        let success = server
            .mock("GET", "/pkg.tar.gz")
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg.tar.gz");
        let cancel = CancellationToken::new();

        fetch_verified(
            &Client::new(),
            &format!("{}/pkg.tar.gz", server.url()),
            &dest,
            &hash_of(&body),
            3,
            &cancel,
        )
        .await
        .unwrap();

        failures.assert_async().await;
        success.assert_async().await;
    }

    #[tokio::test]
    async fn exhausts_retry_budget() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pkg.tar.gz")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg.tar.gz");
        let cancel = CancellationToken::new();

        let err = fetch_verified(
            &Client::new(),
            &format!("{}/pkg.tar.gz", server.url()),
            &dest,
            &hash_of(b"irrelevant"),
            3,
            &cancel,
        )
        .await
        .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, DownloadError::Exhausted { attempts: 3, .. }), "{err}");
    }

    #[tokio::test]
    async fn checksum_mismatch_is_fatal_and_never_retried() {
        let mut server = mockito::Server::new_async().await;
        // Exactly one request: a mismatch must not trigger the retry loop.
        let mock = server
            .mock("GET", "/pkg.tar.gz")
            .with_body(b"tampered bytes")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg.tar.gz");
        let cancel = CancellationToken::new();

        let err = fetch_verified(
            &Client::new(),
            &format!("{}/pkg.tar.gz", server.url()),
            &dest,
            &hash_of(b"expected bytes"),
            3,
            &cancel,
        )
        .await
        .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, DownloadError::HashMismatch { .. }), "{err}");
        assert!(!dest.exists(), "partial download must be removed");
    }

    #[tokio::test]
    async fn cancellation_cleans_up() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/pkg.tar.gz")
            .with_body(b"never read")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg.tar.gz");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetch_verified(
            &Client::new(),
            &format!("{}/pkg.tar.gz", server.url()),
            &dest,
            &hash_of(b"never read"),
            3,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::Cancelled), "{err}");
        assert!(!dest.exists());
    }
}
