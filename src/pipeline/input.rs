//! Input resolution: turn a user-supplied path or URL into image bytes.
//!
//! The engine is fed from memory, so a downloaded image never touches the
//! disk. Format checks are left to the preprocessor, which reports corrupt
//! data as an `InvalidImage` failure rather than a caller error.

use crate::error::Img2TableError;
use crate::pipeline::preprocess::RawImage;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to the raw image it names.
///
/// If the input is a URL, download it; otherwise read the local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<RawImage, Img2TableError> {
    if input.trim().is_empty() {
        return Err(Img2TableError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<RawImage, Img2TableError> {
    let path = PathBuf::from(path_str);

    if path.is_dir() {
        return Err(Img2TableError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Img2TableError::PermissionDenied { path });
        }
        Err(_) => return Err(Img2TableError::FileNotFound { path }),
    };

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(RawImage::from_bytes(bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<RawImage, Img2TableError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Img2TableError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Img2TableError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Img2TableError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(Img2TableError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_err)?;
    info!("Downloaded {} bytes", bytes.len());

    Ok(RawImage::from_bytes(bytes.to_vec()))
}
