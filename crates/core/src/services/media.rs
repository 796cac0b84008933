//! Media service: image validation and storage for post attachments.

use std::sync::Arc;

use quill_common::{AppError, AppResult, StorageBackend, generate_storage_key};
use serde::{Deserialize, Serialize};

/// Message shown when an upload does not decode as an image.
pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG format
    Jpeg,
    /// PNG format
    Png,
    /// WebP format
    WebP,
    /// GIF format
    Gif,
}

impl ImageFormat {
    /// Get MIME type for this format.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Get file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
        }
    }

    const fn from_image_crate(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::WebP => Some(Self::WebP),
            image::ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    const fn to_image_crate(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::WebP => image::ImageFormat::WebP,
            Self::Gif => image::ImageFormat::Gif,
        }
    }
}

/// Image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Validate that `data` is a complete image in a supported format.
///
/// The content is sniffed and then fully decoded, so truncated files and
/// files that merely carry an image extension are rejected.
pub fn validate_image(data: &[u8]) -> AppResult<(ImageFormat, ImageDimensions)> {
    let invalid = || AppError::Validation(INVALID_IMAGE_MESSAGE.to_string());

    if data.is_empty() {
        return Err(invalid());
    }

    let format = image::guess_format(data)
        .ok()
        .and_then(ImageFormat::from_image_crate)
        .ok_or_else(invalid)?;

    let decoded = image::load_from_memory_with_format(data, format.to_image_crate())
        .map_err(|_| invalid())?;

    Ok((
        format,
        ImageDimensions {
            width: decoded.width(),
            height: decoded.height(),
        },
    ))
}

/// Media service for post images.
#[derive(Clone)]
pub struct MediaService {
    storage: Arc<dyn StorageBackend>,
}

impl MediaService {
    /// Create a new media service.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Validate and store an image uploaded by `user_id`, returning its storage key.
    pub async fn store_post_image(&self, user_id: &str, data: &[u8]) -> AppResult<String> {
        let (format, dimensions) = validate_image(data).inspect_err(|_| {
            tracing::warn!(user_id = %user_id, size = data.len(), "Rejected non-image upload");
        })?;

        let key = generate_storage_key(user_id, format.extension());
        self.storage
            .upload(&key, data, format.mime_type())
            .await?;

        tracing::debug!(
            user_id = %user_id,
            key = %key,
            width = dimensions.width,
            height = dimensions.height,
            "Stored post image"
        );

        Ok(key)
    }

    /// Remove a stored image. Missing files are ignored.
    pub async fn remove(&self, key: &str) -> AppResult<()> {
        self.storage.delete(key).await
    }

    /// Public URL of a stored image.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        self.storage.public_url(key)
    }
}
