//! Network configuration (spec.md §6) and the HTTP client built from it.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default bound on redirect depth for the File downloader. Not part of
/// spec.md §6's `NetworkConfig` fields (those are `retries`/`timeout_seconds`/
/// `proxy`/`ca_bundle`/`client_cert`); pex's `pip/tool.py` bounds redirects
/// separately from retry count, so we do too (§C of SPEC_FULL.md).
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// `{ retries, timeout_seconds, proxy?, ca_bundle?, client_cert? }` per
/// spec.md §6.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub retries: u32,
    pub timeout_seconds: u64,
    pub proxy: Option<Url>,
    pub ca_bundle: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub max_redirects: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            timeout_seconds: 60,
            proxy: None,
            ca_bundle: None,
            client_cert: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkConfigError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("failed to read CA bundle `{path}`: {source}")]
    CaBundle {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CA bundle `{path}`: {source}")]
    CaBundleParse {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read client certificate `{path}`: {source}")]
    ClientCert {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid client certificate `{path}`: {source}")]
    ClientCertParse {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },
}

impl NetworkConfig {
    /// Builds a blocking client honoring retries-via-timeout, redirect bound,
    /// proxy, CA bundle and client certificate, matching the teacher's
    /// `http_client()` builder pattern (reqwest blocking + explicit timeout).
    pub fn build_client(&self) -> Result<reqwest::blocking::Client, NetworkConfigError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects));

        if let Some(proxy_url) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy_url.clone()).map_err(NetworkConfigError::ClientBuild)?;
            builder = builder.proxy(proxy);
        }

        if let Some(ca_bundle) = &self.ca_bundle {
            let bytes = std::fs::read(ca_bundle).map_err(|source| NetworkConfigError::CaBundle {
                path: ca_bundle.clone(),
                source,
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes).map_err(|source| NetworkConfigError::CaBundleParse {
                path: ca_bundle.clone(),
                source,
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(client_cert) = &self.client_cert {
            let bytes = std::fs::read(client_cert).map_err(|source| NetworkConfigError::ClientCert {
                path: client_cert.clone(),
                source,
            })?;
            let identity = reqwest::Identity::from_pem(&bytes).map_err(|source| NetworkConfigError::ClientCertParse {
                path: client_cert.clone(),
                source,
            })?;
            builder = builder.identity(identity);
        }

        builder.build().map_err(NetworkConfigError::ClientBuild)
    }
}
