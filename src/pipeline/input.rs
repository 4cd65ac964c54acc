//! Input resolution: turn a user-supplied path or URL into image bytes.
//!
//! The whole image is held in memory; order photos are a few MB at most and
//! every later stage wants the bytes anyway. The magic bytes are checked
//! here so a PDF or HEIC gets a clear error instead of a confusing model
//! reply.

use crate::error::Order2XlsxError;
use image::ImageFormat;
use std::path::PathBuf;
use tracing::{debug, info};

/// An image ready for encoding.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// File name or URL, for messages only.
    pub name: String,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageUpload {
    /// Validate in-memory bytes as JPEG or PNG.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, Order2XlsxError> {
        let name = name.into();
        let format = sniff_format(&name, &bytes)?;
        Ok(Self {
            name,
            bytes,
            format,
        })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to image bytes.
///
/// URLs are downloaded; anything else is read as a local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ImageUpload, Order2XlsxError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Sniff the format from magic bytes; only JPEG and PNG are accepted.
pub fn sniff_format(name: &str, bytes: &[u8]) -> Result<ImageFormat, Order2XlsxError> {
    match image::guess_format(bytes) {
        Ok(fmt @ (ImageFormat::Jpeg | ImageFormat::Png)) => Ok(fmt),
        _ => Err(Order2XlsxError::UnsupportedImage {
            source_name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        }),
    }
}

async fn read_local(path_str: &str) -> Result<ImageUpload, Order2XlsxError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Order2XlsxError::PermissionDenied { path });
        }
        Err(_) => return Err(Order2XlsxError::FileNotFound { path }),
    };

    let upload = ImageUpload::from_bytes(path_str, bytes)?;
    debug!(
        "Read local image: {} ({} bytes, {:?})",
        path.display(),
        upload.bytes.len(),
        upload.format
    );
    Ok(upload)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ImageUpload, Order2XlsxError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Order2XlsxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Order2XlsxError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Order2XlsxError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Order2XlsxError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Order2XlsxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    ImageUpload::from_bytes(url, bytes.to_vec())
}
