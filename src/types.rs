//! Core value types shared by the authoring core and the remote client

use crate::error::{InpaintError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// An encoded source image together with its decoded pixels
///
/// Immutable once created. A session replaces the payload wholesale when a new
/// image is loaded; it is shared by reference with history entries.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime: String,
    format: ImageFormat,
    image: DynamicImage,
}

impl ImagePayload {
    /// Decode an encoded image, sniffing its format from the content
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)
            .map_err(|e| InpaintError::decode(format!("Unrecognized image format: {}", e)))?;
        let image = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| InpaintError::decode(format!("Failed to decode image: {}", e)))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(InpaintError::decode("Image has zero width or height"));
        }

        Ok(Self {
            mime: format.to_mime_type().to_string(),
            bytes,
            format,
            image,
        })
    }

    /// Encoded bytes exactly as uploaded
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// File extension matching the encoded format (used for the upload file name)
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }

    /// Decoded pixels at native resolution
    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Native pixel dimensions of the decoded image
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// An encoded result image returned by the inpainting service
///
/// Exposed as an encoded payload so that an export collaborator can download it
/// or put it on the clipboard without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultImage {
    bytes: Vec<u8>,
    mime: String,
}

impl ResultImage {
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Parse the `result_image` field of a service response
    ///
    /// Accepts a `data:<mime>;base64,<payload>` URL or a bare base64 string. For
    /// bare payloads the MIME type is sniffed from the decoded bytes.
    pub fn from_service_field(field: &str) -> Result<Self> {
        let field = field.trim();
        let (declared_mime, encoded) = match field.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    InpaintError::submission("Malformed data URL in result_image")
                })?;
                let mime = header.split(';').next().unwrap_or_default();
                if !header.ends_with(";base64") {
                    return Err(InpaintError::submission(
                        "result_image data URL is not base64 encoded",
                    ));
                }
                (Some(mime.to_string()), payload)
            },
            None => (None, field),
        };

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| InpaintError::submission(format!("Invalid base64 in result_image: {}", e)))?;
        if bytes.is_empty() {
            return Err(InpaintError::submission("result_image is empty"));
        }

        let mime = match declared_mime.filter(|m| !m.is_empty()) {
            Some(mime) => mime,
            None => image::guess_format(&bytes)
                .map(|f| f.to_mime_type().to_string())
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
        };

        Ok(Self { bytes, mime })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Encode as a data URL suitable for direct display
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Decode the result into pixels
    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.bytes)
            .map_err(|e| InpaintError::decode(format!("Failed to decode result image: {}", e)))
    }

    /// Write the encoded payload unchanged to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        std::fs::write(path_ref, &self.bytes)
            .map_err(|e| InpaintError::file_io_error("write result image", path_ref, &e))
    }

    /// Suggested download file name, e.g. `inpainted-result-1700000000000.png`
    #[must_use]
    pub fn suggested_file_name(&self, at: DateTime<Utc>) -> String {
        let extension = ImageFormat::from_mime_type(&self.mime)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png");
        format!("inpainted-result-{}.{}", at.timestamp_millis(), extension)
    }
}

/// Number of refinement passes requested from the service, always within 1-5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct IterationCount(u8);

impl IterationCount {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;
    pub const DEFAULT: u8 = 2;

    /// Create an iteration count, clamping out-of-range values
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn increment(self) -> Self {
        Self::new(self.0.saturating_add(1))
    }

    #[must_use]
    pub fn decrement(self) -> Self {
        Self::new(self.0.saturating_sub(1))
    }

    /// Short quality label shown next to the slider
    #[must_use]
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Quick",
            2 => "Balanced",
            3 => "Detailed",
            4 => "Enhanced",
            _ => "Ultra",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self.0 {
            1 => "Fastest processing, basic refinement",
            2 => "Good balance of speed and quality",
            3 => "Recommended for most cases",
            4 => "Higher quality, slower processing",
            _ => "Maximum quality, slowest processing",
        }
    }
}

impl Default for IterationCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<u8> for IterationCount {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<IterationCount> for u8 {
    fn from(value: IterationCount) -> Self {
        value.0
    }
}

impl fmt::Display for IterationCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Brush radius in canvas pixels, always within 5-100
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrushRadius(u32);

impl BrushRadius {
    pub const MIN: u32 = 5;
    pub const MAX: u32 = 100;
    pub const STEP: u32 = 5;
    pub const DEFAULT: u32 = 30;

    /// Create a radius, clamping out-of-range values
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_f32(self) -> f32 {
        self.0 as f32
    }

    #[must_use]
    pub fn increased(self) -> Self {
        Self::new(self.0.saturating_add(Self::STEP))
    }

    #[must_use]
    pub fn decreased(self) -> Self {
        Self::new(self.0.saturating_sub(Self::STEP))
    }
}

impl Default for BrushRadius {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for BrushRadius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}

/// Authoring tool applied by strokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    /// Paints the translucent red marker over regions to remove
    #[default]
    Mark,
    /// Removes previously painted marker, restoring the image underneath
    Erase,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mark => write!(f, "mark"),
            Self::Erase => write!(f, "erase"),
        }
    }
}

/// Identifier of a completed remote job, also used as the history entry id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier derived from a timestamp, used when the service omits one
    #[must_use]
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 20, 30, 255]),
        ));
        let mut buffer = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_payload_decodes_and_sniffs_mime() {
        let payload = ImagePayload::from_bytes(png_bytes(12, 7)).unwrap();
        assert_eq!(payload.dimensions(), (12, 7));
        assert_eq!(payload.mime(), "image/png");
        assert_eq!(payload.extension(), "png");
    }

    #[test]
    fn test_payload_rejects_garbage() {
        let err = ImagePayload::from_bytes(b"definitely not an image".to_vec()).unwrap_err();
        assert!(matches!(err, InpaintError::Decode(_)));
    }

    #[test]
    fn test_result_image_from_data_url() {
        let bytes = png_bytes(3, 3);
        let field = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));
        let result = ResultImage::from_service_field(&field).unwrap();
        assert_eq!(result.mime(), "image/png");
        assert_eq!(result.bytes(), bytes.as_slice());
        assert_eq!(result.to_data_url(), field);
        assert_eq!(result.decode().unwrap().dimensions(), (3, 3));
    }

    #[test]
    fn test_result_image_from_bare_base64_sniffs_mime() {
        let bytes = png_bytes(2, 2);
        let result = ResultImage::from_service_field(&STANDARD.encode(&bytes)).unwrap();
        assert_eq!(result.mime(), "image/png");
    }

    #[test]
    fn test_result_image_rejects_malformed_fields() {
        assert!(ResultImage::from_service_field("data:image/png;base64").is_err());
        assert!(ResultImage::from_service_field("data:image/png,abcd").is_err());
        assert!(ResultImage::from_service_field("!!!").is_err());
        assert!(ResultImage::from_service_field("").is_err());
    }

    #[test]
    fn test_suggested_file_name() {
        let result = ResultImage::new(vec![1, 2, 3], "image/jpeg");
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(
            result.suggested_file_name(at),
            "inpainted-result-1700000000000.jpg"
        );
    }

    #[test]
    fn test_iteration_count_clamps() {
        assert_eq!(IterationCount::new(0).get(), 1);
        assert_eq!(IterationCount::new(9).get(), 5);
        assert_eq!(IterationCount::default().get(), 2);
        assert_eq!(IterationCount::new(5).increment().get(), 5);
        assert_eq!(IterationCount::new(1).decrement().get(), 1);
        assert_eq!(IterationCount::new(3).label(), "Detailed");
        assert_eq!(IterationCount::new(1).description(), "Fastest processing, basic refinement");
    }

    #[test]
    fn test_iteration_count_serde_clamps() {
        let count: IterationCount = serde_json::from_str("12").unwrap();
        assert_eq!(count.get(), 5);
        assert_eq!(serde_json::to_string(&IterationCount::new(4)).unwrap(), "4");
    }

    #[test]
    fn test_brush_radius_steps_and_clamps() {
        let radius = BrushRadius::default();
        assert_eq!(radius.get(), 30);
        assert_eq!(radius.increased().get(), 35);
        assert_eq!(radius.decreased().get(), 25);
        assert_eq!(BrushRadius::new(100).increased().get(), 100);
        assert_eq!(BrushRadius::new(5).decreased().get(), 5);
        assert_eq!(BrushRadius::new(1).get(), 5);
        assert_eq!(BrushRadius::new(30).to_string(), "30px");
    }

    #[test]
    fn test_job_id_from_timestamp() {
        let at = DateTime::from_timestamp_millis(1_234_567).unwrap();
        assert_eq!(JobId::from_timestamp(at).as_str(), "1234567");
    }
}
