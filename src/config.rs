//! Configuration types for the authoring workflow and the remote service

use crate::error::{InpaintError, Result};
use crate::types::{BrushRadius, IterationCount};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default endpoint root of the inpainting service
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Largest upload accepted at the decode boundary (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration for mask authoring and remote inpainting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InpaintConfig {
    /// Base URL of the inpainting service (`/inpaint/` and `/jobs/{id}/` live below it)
    pub api_base_url: String,

    /// Timeout for a single remote request, in seconds
    pub request_timeout_secs: u64,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: u64,

    /// Bounding box the canvas surface is fitted into
    pub canvas_max_width: u32,
    pub canvas_max_height: u32,

    /// Brush radius selected when an image is loaded (5-100)
    pub default_brush_radius: u32,

    /// Iteration count selected for a fresh session (1-5)
    pub default_iterations: u8,

    /// Number of completed results retained in history
    pub history_capacity: usize,
}

impl Default for InpaintConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            canvas_max_width: 800,
            canvas_max_height: 600,
            default_brush_radius: BrushRadius::DEFAULT,
            default_iterations: IterationCount::DEFAULT,
            history_capacity: 10,
        }
    }
}

impl InpaintConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imgly_inpaint::InpaintConfig;
    ///
    /// let config = InpaintConfig::builder()
    ///     .api_base_url("https://inpaint.example.com/api")
    ///     .request_timeout_secs(45)
    ///     .default_iterations(3)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.default_iterations, 3);
    /// ```
    #[must_use]
    pub fn builder() -> InpaintConfigBuilder {
        InpaintConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)
            .map_err(|e| InpaintError::file_io_error("read config file", path_ref, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            InpaintError::invalid_config(format!(
                "Failed to parse '{}': {}",
                path_ref.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty or non-http(s) base URL
    /// - Zero timeout, upload limit, canvas bound or history capacity
    /// - Brush radius outside 5-100 or iterations outside 1-5
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(InpaintError::invalid_config("API base URL cannot be empty"));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(InpaintError::invalid_config(format!(
                "Unsupported API base URL: {}. Expected http:// or https://",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(InpaintError::config_value_error(
                "request timeout",
                self.request_timeout_secs,
                ">= 1 second",
                Some(30),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(InpaintError::config_value_error(
                "upload limit",
                self.max_upload_bytes,
                ">= 1 byte",
                Some(DEFAULT_MAX_UPLOAD_BYTES),
            ));
        }
        if self.canvas_max_width == 0 || self.canvas_max_height == 0 {
            return Err(InpaintError::invalid_config(format!(
                "Canvas bounds must be non-zero, got {}x{}",
                self.canvas_max_width, self.canvas_max_height
            )));
        }
        if !(BrushRadius::MIN..=BrushRadius::MAX).contains(&self.default_brush_radius) {
            return Err(InpaintError::config_value_error(
                "brush radius",
                self.default_brush_radius,
                "5-100",
                Some(BrushRadius::DEFAULT),
            ));
        }
        if !(IterationCount::MIN..=IterationCount::MAX).contains(&self.default_iterations) {
            return Err(InpaintError::config_value_error(
                "iterations",
                self.default_iterations,
                "1-5",
                Some(IterationCount::DEFAULT),
            ));
        }
        if self.history_capacity == 0 {
            return Err(InpaintError::config_value_error(
                "history capacity",
                self.history_capacity,
                ">= 1",
                Some(10),
            ));
        }
        Ok(())
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Canvas bounding box as `(width, height)`
    #[must_use]
    pub fn canvas_bounds(&self) -> (u32, u32) {
        (self.canvas_max_width, self.canvas_max_height)
    }
}

/// Builder for `InpaintConfig`
#[derive(Debug, Default)]
pub struct InpaintConfigBuilder {
    config: InpaintConfig,
}

impl InpaintConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn canvas_bounds(mut self, width: u32, height: u32) -> Self {
        self.config.canvas_max_width = width;
        self.config.canvas_max_height = height;
        self
    }

    /// Brush radius, clamped to 5-100
    #[must_use]
    pub fn default_brush_radius(mut self, radius: u32) -> Self {
        self.config.default_brush_radius = BrushRadius::new(radius).get();
        self
    }

    /// Iteration count, clamped to 1-5
    #[must_use]
    pub fn default_iterations(mut self, iterations: u8) -> Self {
        self.config.default_iterations = IterationCount::new(iterations).get();
        self
    }

    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<InpaintConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
