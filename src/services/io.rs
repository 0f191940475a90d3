//! Image file input/output
//!
//! Keeps filesystem access out of the workflow so the authoring core only ever
//! sees decoded payloads.

use crate::error::{InpaintError, Result};
use crate::mask::MaskRaster;
use crate::types::{ImagePayload, ResultImage};
use std::path::Path;

/// Service for reading uploads and writing results
pub struct ImageIOService;

impl ImageIOService {
    /// Validate and decode an uploaded image
    ///
    /// `declared_mime` is the type reported by the picker, if any; it must be an
    /// `image/*` type. Uploads larger than `max_bytes` are rejected before
    /// decoding.
    ///
    /// # Errors
    /// - Declared type is not an image
    /// - Upload exceeds the size limit
    /// - Content is not a decodable image
    pub fn decode_upload(
        bytes: Vec<u8>,
        declared_mime: Option<&str>,
        max_bytes: u64,
    ) -> Result<ImagePayload> {
        if let Some(mime) = declared_mime {
            if !mime.starts_with("image/") {
                return Err(InpaintError::decode(format!(
                    "Unsupported file type '{}'; please upload an image",
                    mime
                )));
            }
        }
        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(InpaintError::decode(format!(
                "Image is {} bytes; uploads are limited to {} bytes",
                size, max_bytes
            )));
        }
        ImagePayload::from_bytes(bytes)
    }

    /// Read and decode an image file
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_inpaint::services::ImageIOService;
    ///
    /// let payload = ImageIOService::load_upload("photo.jpg", 10 * 1024 * 1024)?;
    /// println!("{}x{}", payload.dimensions().0, payload.dimensions().1);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_upload<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<ImagePayload> {
        let path_ref = path.as_ref();
        let metadata = std::fs::metadata(path_ref)
            .map_err(|e| InpaintError::file_io_error("read image file", path_ref, &e))?;
        if metadata.len() > max_bytes {
            return Err(InpaintError::decode(format!(
                "{} is {} bytes; uploads are limited to {} bytes",
                path_ref.display(),
                metadata.len(),
                max_bytes
            )));
        }

        let bytes = std::fs::read(path_ref)
            .map_err(|e| InpaintError::file_io_error("read image data", path_ref, &e))?;
        log::debug!("Read {} bytes from {}", bytes.len(), path_ref.display());
        Self::decode_upload(bytes, None, max_bytes)
    }

    /// Write a result image, creating the parent directory if needed
    pub fn save_result<P: AsRef<Path>>(result: &ResultImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        Self::ensure_parent(path_ref)?;
        result.save(path_ref)?;
        log::info!("Saved result to {}", path_ref.display());
        Ok(())
    }

    /// Write a mask as PNG, creating the parent directory if needed
    pub fn save_mask<P: AsRef<Path>>(mask: &MaskRaster, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        Self::ensure_parent(path_ref)?;
        mask.save_png(path_ref)?;
        log::info!("Saved mask to {}", path_ref.display());
        Ok(())
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
                .map_err(|e| InpaintError::file_io_error("create output directory", parent, &e)),
            _ => Ok(()),
        }
    }
}
