#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # IMG.LY Inpainting Library
//!
//! Mask authoring and remote inpainting for object removal. A user marks the
//! regions to remove with freehand brush strokes, the marks are turned into a
//! strict black-and-white mask, and the image, mask and an iteration count are
//! sent to a remote reconstruction service.
//!
//! ## Features
//!
//! - **Stroke Engine**: translucent marker and eraser with keyboard shortcuts
//! - **Mask Encoding**: pixel-exact binary masks derived from the canvas surface
//! - **Workflow**: upload, mark, configure and result stages with enforced preconditions
//! - **History**: the last ten completed results, restorable at any time
//! - **Remote Client**: multipart HTTP submission with a bounded timeout
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_inpaint::{
//!     HttpInpaintClient, ImageIOService, ImagePoint, InpaintConfig, InpaintSession,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = InpaintConfig::builder()
//!     .api_base_url("http://localhost:8000/api")
//!     .build()?;
//! let client = Arc::new(HttpInpaintClient::new(&config)?);
//! let mut session = InpaintSession::new(client, &config);
//!
//! let payload = ImageIOService::load_upload("photo.jpg", config.max_upload_bytes)?;
//! session.apply(|workflow| -> imgly_inpaint::Result<()> {
//!     workflow.load_image(payload)?;
//!     workflow.begin_stroke(ImagePoint::new(120.0, 80.0))?;
//!     workflow.continue_stroke(ImagePoint::new(200.0, 90.0))?;
//!     workflow.end_stroke()?;
//!     workflow.advance_to_configure()?;
//!     workflow.set_iterations(3)?;
//!     Ok(())
//! })?;
//!
//! session.submit_and_wait().await?;
//! if let Some(result) = session.workflow().result() {
//!     ImageIOService::save_result(result, "inpainted.png")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): Command-line interface and progress reporting
//! - `webp-support` (default): WebP uploads
//! - `tracing-json`: JSON log output for the CLI

#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod coords;
pub mod error;
pub mod history;
pub mod mask;
pub mod services;
pub mod session;
pub mod stroke;
pub mod tracing_config;
pub mod types;
pub mod workflow;

pub use client::{HttpInpaintClient, InpaintOutput, InpaintResponse, InpaintService, JobStatus};
pub use config::{InpaintConfig, InpaintConfigBuilder};
pub use coords::{fit_within, CoordinateMapper, DisplayRect, ImagePoint, PointerPosition};
pub use error::{InpaintError, Result};
pub use history::{HistoryEntry, HistoryStore};
pub use mask::{MaskEncoder, MaskRaster};
pub use services::ImageIOService;
pub use session::InpaintSession;
pub use stroke::{Shortcut, StrokeEngine, StrokeSummary};
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
pub use types::{BrushRadius, ImagePayload, IterationCount, JobId, ResultImage, Tool};
pub use workflow::{
    Completion, StepStatus, SubmissionRequest, SubmissionTicket, Workflow, WorkflowSnapshot,
    WorkflowStage,
};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;

/// Create a session talking to the HTTP service described by `config`
///
/// # Errors
/// - Invalid configuration
/// - Failed to create the HTTP client
pub fn connect(config: &InpaintConfig) -> Result<InpaintSession<HttpInpaintClient>> {
    let client = HttpInpaintClient::new(config)?;
    Ok(InpaintSession::new(std::sync::Arc::new(client), config))
}
