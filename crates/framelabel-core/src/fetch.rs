//! Image retrieval.
//!
//! The fetcher turns an `ImageSource` into raw bytes plus a MIME type. It does
//! not decode image content, cache, or retry.

use crate::error::FetchError;
use crate::types::ImageSource;
use base64::Engine;
use std::path::Path;
use std::time::Duration;

/// Base64-encoded image ready to send to a vision-language API.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8], media_type: &str) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Raw bytes retrieved for one image.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl FetchedImage {
    pub fn to_payload(&self) -> ImagePayload {
        ImagePayload::from_bytes(&self.bytes, &self.media_type)
    }
}

/// Retrieves image bytes from URLs, local files, or in-memory uploads.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn fetch(&self, source: &ImageSource) -> Result<FetchedImage, FetchError> {
        match source {
            ImageSource::Url(url) => self.fetch_url(url).await,
            ImageSource::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| FetchError::Read {
                    path: path.clone(),
                    cause: e.to_string(),
                })?;
                Ok(FetchedImage {
                    bytes,
                    media_type: media_type_for_path(path).to_string(),
                })
            }
            ImageSource::Bytes { name, data } => Ok(FetchedImage {
                bytes: data.to_vec(),
                media_type: media_type_for_path(Path::new(name)).to_string(),
            }),
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                cause: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let header_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"));

        let bytes = resp.bytes().await.map_err(|e| FetchError::Network {
            cause: e.to_string(),
        })?;

        let media_type = header_type.unwrap_or_else(|| {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            media_type_for_path(Path::new(path)).to_string()
        });

        tracing::debug!("Fetched {} bytes ({media_type}) from {url}", bytes.len());

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            media_type,
        })
    }
}

/// Guess a MIME type from a file extension, defaulting to JPEG.
fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
