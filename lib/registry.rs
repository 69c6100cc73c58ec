//! Registry client.
//!
//! The runner talks to the registry through [`RegistryGateway`] so the cache
//! flow can be driven by a fake in tests.

use crate::error::{PakError, PakResult};
use crate::platform::Platform;
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// API version prefix.
const API_PREFIX: &str = "/v1";

/// Request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A bundle the registry has resolved for a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBundle {
    /// Artifact download URL.
    pub url: String,
    /// Concrete version ("latest" resolved).
    pub version: String,
    /// Platform the artifact targets.
    pub platform: Platform,
    /// Artifact size in bytes, when known.
    pub size: Option<u64>,
    /// Hex sha256 of the artifact, when known.
    pub sha256: Option<String>,
}

/// Access to the bundle registry.
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    /// Resolve `version` (or `"latest"`) of `name` for `platform`.
    async fn resolve(
        &self,
        name: &str,
        version: &str,
        platform: Platform,
    ) -> PakResult<ResolvedBundle>;

    /// Download the artifact to `dest`, returning the number of bytes written.
    async fn download(&self, bundle: &ResolvedBundle, dest: &Path) -> PakResult<u64>;
}

/// HTTP client for the registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Registry URL.
    url: String,

    /// HTTP client.
    http: Client,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    url: String,
    bundle: BundleInfo,
}

#[derive(Debug, Deserialize)]
struct BundleInfo {
    #[allow(dead_code)]
    name: String,
    version: String,
    platform: Platform,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "error")]
    message: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RegistryClient {
    /// Create a client for the registry at `url`.
    pub fn new(url: impl Into<String>) -> PakResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("pak/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// URL of the download-resolution endpoint for a package.
    pub fn download_endpoint(&self, name: &str, version: &str) -> PakResult<String> {
        let (scope, bare) = name
            .strip_prefix('@')
            .and_then(|n| n.split_once('/'))
            .ok_or_else(|| {
                PakError::Generic(format!(
                    "Invalid package name '{}'. Expected @scope/name",
                    name
                ))
            })?;

        Ok(format!(
            "{}{}/bundles/{}/{}/versions/{}/download",
            self.url,
            API_PREFIX,
            urlencoding::encode(scope),
            urlencoding::encode(bare),
            urlencoding::encode(version)
        ))
    }

    /// Turn a non-success response into a registry error.
    async fn error_from(response: reqwest::Response) -> PakError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    "no response body".to_string()
                } else {
                    body
                }
            });
        PakError::Registry { status, message }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl RegistryGateway for RegistryClient {
    async fn resolve(
        &self,
        name: &str,
        version: &str,
        platform: Platform,
    ) -> PakResult<ResolvedBundle> {
        let url = self.download_endpoint(name, version)?;
        tracing::debug!(url = %url, "resolving bundle");

        let response = self
            .http
            .get(&url)
            .query(&[("os", platform.os.as_str()), ("arch", platform.arch.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: DownloadResponse = response.json().await?;
        Ok(ResolvedBundle {
            url: body.url,
            version: body.bundle.version,
            platform: body.bundle.platform,
            size: body.bundle.size,
            sha256: body.bundle.sha256,
        })
    }

    async fn download(&self, bundle: &ResolvedBundle, dest: &Path) -> PakResult<u64> {
        let response = self.http.get(&bundle.url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let total = bundle.size.or(response.content_length()).unwrap_or(0);
        let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  [{bar:40.cyan/dim}] {bytes}/{total_bytes} {bytes_per_sec}")
        {
            pb.set_style(style.progress_chars("█░░"));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e.into());
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            pb.set_position(written);
        }

        file.flush().await?;
        pb.finish_and_clear();

        Ok(written)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Hex sha256 of a file.
pub fn sha256_file(path: &Path) -> PakResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a downloaded artifact against the checksum the registry reported.
pub fn verify_checksum(path: &Path, expected: &str, name: &str) -> PakResult<()> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(PakError::ChecksumMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
