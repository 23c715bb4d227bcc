//! File downloader (spec.md §4.4, first bullet).
//!
//! Streams an artifact URL to a destination file while hashing it in the
//! same pass (`px_cache::streaming_hash_and_copy`), so the store's
//! fingerprint-mismatch check never has to re-read the file from disk.

use std::fs::File;
use std::path::{Path, PathBuf};

use px_cache::streaming_hash_and_copy;
use px_domain::Fingerprint;
use url::Url;

use crate::netrc::PasswordDatabase;
use crate::network::NetworkConfig;

#[derive(Debug, thiserror::Error)]
pub enum FileDownloadError {
    #[error("invalid artifact URL `{0}`")]
    InvalidUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] crate::network::NetworkConfigError),
    #[error("transport error fetching `{url}`: {source}")]
    Transport { url: String, source: reqwest::Error },
    #[error("`{url}` returned status {status}")]
    Status { url: String, status: u16 },
    #[error("I/O error writing `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("hashing error: {0}")]
    Hash(#[from] px_cache::HashError),
}

/// Downloads `url` into `dest_dir/filename`, retrying transport failures up
/// to `config.retries` times, and returns the fingerprint computed while
/// streaming the response body to disk. Basic-auth credentials are looked
/// up in `passwords` by the URL's host.
pub fn download_file(
    url: &str,
    filename: &str,
    dest_dir: &Path,
    algorithm: &str,
    config: &NetworkConfig,
    passwords: &PasswordDatabase,
) -> Result<Fingerprint, FileDownloadError> {
    let parsed = Url::parse(url).map_err(|_| FileDownloadError::InvalidUrl(url.to_string()))?;
    let client = config.build_client()?;
    let dest_path = dest_dir.join(filename);

    let mut last_err = None;
    // `retries` additional attempts beyond the first, per spec.md §6.
    for _ in 0..=config.retries {
        match attempt_download(&client, &parsed, &dest_path, algorithm, passwords) {
            Ok(fingerprint) => return Ok(fingerprint),
            Err(err) => {
                tracing::debug!(url, error = %err, "file_download_attempt_failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| FileDownloadError::Status {
        url: url.to_string(),
        status: 0,
    }))
}

fn attempt_download(
    client: &reqwest::blocking::Client,
    url: &Url,
    dest_path: &Path,
    algorithm: &str,
    passwords: &PasswordDatabase,
) -> Result<Fingerprint, FileDownloadError> {
    let mut request = client.get(url.clone());
    if let Some(host) = url.host_str() {
        if let Some(entry) = passwords.find(host) {
            request = request.basic_auth(&entry.username, Some(&entry.password));
        }
    }

    let response = request.send().map_err(|source| FileDownloadError::Transport {
        url: url.to_string(),
        source,
    })?;
    if !response.status().is_success() {
        return Err(FileDownloadError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let mut dest = File::create(dest_path).map_err(|source| FileDownloadError::Io {
        path: dest_path.to_path_buf(),
        source,
    })?;
    let mut reader = response;
    let fingerprint = streaming_hash_and_copy(&mut reader, &mut dest, algorithm)?;
    Ok(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_file(
            "not-a-url",
            "pkg.whl",
            dir.path(),
            "sha256",
            &NetworkConfig::default(),
            &PasswordDatabase::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FileDownloadError::InvalidUrl(_)));
    }

    #[test]
    fn connection_failure_exhausts_retries_and_surfaces_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = NetworkConfig {
            retries: 1,
            timeout_seconds: 2,
            ..NetworkConfig::default()
        };
        let err = download_file(
            "http://127.0.0.1:1/pkg.whl",
            "pkg.whl",
            dir.path(),
            "sha256",
            &config,
            &PasswordDatabase::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FileDownloadError::Transport { .. }));
    }
}
