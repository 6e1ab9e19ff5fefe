use std::io::Cursor;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageOutputFormat;
use log::{debug, warn};

/// Largest download accepted, in bytes.
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;
pub const MAX_IMAGE_WIDTH: u32 = 800;
pub const MAX_IMAGE_HEIGHT: u32 = 600;

/// Supplies image bytes for `image` content items.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetches `url` and returns PNG bytes that fit the size box, or `None` on
    /// any failure. Never errors.
    async fn fetch_and_resize(&self, url: &str) -> Option<Vec<u8>>;
}

/// Downloads images over HTTP(S).
pub struct HttpImageSource {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            max_bytes: MAX_IMAGE_BYTES,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                bail!("image is {} bytes, limit is {}", len, self.max_bytes);
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > self.max_bytes {
            bail!("image is {} bytes, limit is {}", bytes.len(), self.max_bytes);
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch_and_resize(&self, url: &str) -> Option<Vec<u8>> {
        let bytes = match self.download(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to fetch image {}: {}", url, e);
                return None;
            }
        };

        match resize_to_fit(&bytes, MAX_IMAGE_WIDTH, MAX_IMAGE_HEIGHT) {
            Ok(png) => {
                debug!("Fetched image {} ({} bytes in, {} bytes out)", url, bytes.len(), png.len());
                Some(png)
            }
            Err(e) => {
                warn!("Failed to decode image {}: {}", url, e);
                None
            }
        }
    }
}

/// Never supplies an image; every image item renders as a placeholder.
pub struct NoImages;

#[async_trait]
impl ImageSource for NoImages {
    async fn fetch_and_resize(&self, _url: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Decodes `bytes`, scales the image down to fit within `max_width` x
/// `max_height` keeping its aspect ratio, and re-encodes it as PNG. Smaller
/// images are never enlarged.
pub fn resize_to_fit(bytes: &[u8], max_width: u32, max_height: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let img = if img.width() > max_width || img.height() > max_height {
        img.resize(max_width, max_height, FilterType::Lanczos3)
    } else {
        img
    };

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}
