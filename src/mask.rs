//! Binary mask encoding
//!
//! The remote service and saved history rely on every mask pixel being exactly
//! opaque white (reconstruct) or opaque black (keep). There is no feathering.

use crate::error::{InpaintError, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Mask pixel for a region the service should reconstruct
pub const MASK_MARKED: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Mask pixel for a region the service should keep
pub const MASK_UNMARKED: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Whether a canvas pixel carries the saturated red marker
///
/// Fixed thresholds rather than an exact color match so that compositing
/// rounding over arbitrary image content still classifies.
#[inline]
#[must_use]
pub fn is_marker_pixel(pixel: &Rgba<u8>) -> bool {
    let [r, g, b, _] = pixel.0;
    r > 200 && g < 100 && b < 100
}

/// Strict two-color mask raster with at least one marked pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskRaster {
    raster: RgbaImage,
    marked_pixels: u64,
}

impl MaskRaster {
    /// Validate an arbitrary raster as a strict mask
    ///
    /// Returns `Ok(None)` when no pixel is marked.
    pub fn from_raster(raster: RgbaImage) -> Result<Option<Self>> {
        let mut marked_pixels = 0u64;
        for (x, y, pixel) in raster.enumerate_pixels() {
            if *pixel == MASK_MARKED {
                marked_pixels += 1;
            } else if *pixel != MASK_UNMARKED {
                return Err(InpaintError::decode(format!(
                    "Mask pixel ({}, {}) is {:?}; only opaque white or opaque black is allowed",
                    x, y, pixel.0
                )));
            }
        }
        if marked_pixels == 0 {
            return Ok(None);
        }
        Ok(Some(Self {
            raster,
            marked_pixels,
        }))
    }

    /// Decode a PNG mask, re-validating strictness
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Option<Self>> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| InpaintError::decode(format!("Failed to decode mask: {}", e)))?;
        Self::from_raster(image.to_rgba8())
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// Number of white pixels
    #[must_use]
    pub fn marked_pixels(&self) -> u64 {
        self.marked_pixels
    }

    /// Whether `(x, y)` is marked; out-of-bounds positions are not
    #[must_use]
    pub fn is_marked(&self, x: u32, y: u32) -> bool {
        self.raster
            .get_pixel_checked(x, y)
            .is_some_and(|p| *p == MASK_MARKED)
    }

    #[must_use]
    pub fn as_raster(&self) -> &RgbaImage {
        &self.raster
    }

    /// Encode as PNG, the format the service expects for the `mask` attachment
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.raster
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.raster.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Converts a composited canvas surface into a [`MaskRaster`]
pub struct MaskEncoder;

impl MaskEncoder {
    /// Classify every pixel of `surface` and build the mask
    ///
    /// Returns `None` when no pixel carries the marker, which keeps the workflow
    /// in the mark stage.
    #[must_use]
    pub fn encode(surface: &RgbaImage) -> Option<MaskRaster> {
        let (width, height) = surface.dimensions();
        let mut raster = RgbaImage::new(width, height);
        let mut marked_pixels = 0u64;

        for (src, dst) in surface.pixels().zip(raster.pixels_mut()) {
            if is_marker_pixel(src) {
                *dst = MASK_MARKED;
                marked_pixels += 1;
            } else {
                *dst = MASK_UNMARKED;
            }
        }

        tracing::trace!(width, height, marked_pixels, "Mask encoded");

        if marked_pixels == 0 {
            None
        } else {
            Some(MaskRaster {
                raster,
                marked_pixels,
            })
        }
    }
}
