//! Inpainting CLI Tool
//!
//! Replays brush strokes over an image, derives the removal mask and sends
//! both to the inpainting service.

use super::config::{parse_dimensions, CliConfigBuilder, StrokeSpec};
use crate::{
    client::{HttpInpaintClient, InpaintService},
    coords::DisplayRect,
    services::ImageIOService,
    session::InpaintSession,
    tracing_config::{events, init_cli_tracing, spans, TracingFormat},
    types::{JobId, Tool},
    workflow::{Completion, Workflow, SUBMISSION_FAILED_NOTICE},
};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Object removal by mask-guided inpainting
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imgly-inpaint")]
pub struct Cli {
    /// Input image file
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Output file for the result [default: inpainted-result-<timestamp>.<ext>]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Mark stroke as space-separated points, e.g. "10,10 40,12 80,30" (repeatable)
    #[arg(short, long, value_name = "POINTS", allow_hyphen_values = true)]
    pub stroke: Vec<String>,

    /// Erase stroke, applied after all mark strokes (repeatable)
    #[arg(short, long, value_name = "POINTS", allow_hyphen_values = true)]
    pub erase: Vec<String>,

    /// Brush radius in canvas pixels (5-100)
    #[arg(short, long)]
    pub radius: Option<u32>,

    /// Size the points were recorded at, as WIDTHxHEIGHT [default: canvas size]
    #[arg(long, value_name = "WxH")]
    pub display: Option<String>,

    /// Refinement iterations (1-5)
    #[arg(short, long)]
    pub iterations: Option<u8>,

    /// Base URL of the inpainting API
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// JSON configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write the derived mask as PNG
    #[arg(long, value_name = "PATH")]
    pub mask_output: Option<PathBuf>,

    /// Write the mask and stop without contacting the service
    #[arg(long)]
    pub mask_only: bool,

    /// Look up the status of a previously submitted job and exit
    #[arg(long, value_name = "JOB_ID")]
    pub job_status: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let session_id = init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let client =
        Arc::new(HttpInpaintClient::new(&config).context("Failed to create inpainting client")?);

    if let Some(job_id) = &cli.job_status {
        return show_job_status(client.as_ref(), job_id).await;
    }

    let input = cli
        .input
        .as_ref()
        .context("An input image is required")?;
    let payload = ImageIOService::load_upload(input, config.max_upload_bytes)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    info!(
        "Loaded {} ({}x{}, {})",
        input.display(),
        payload.dimensions().0,
        payload.dimensions().1,
        payload.mime()
    );

    let mut session = InpaintSession::new(client, &config);
    let strokes = CliConfigBuilder::strokes(&cli)?;
    let display = cli.display.as_deref().map(parse_dimensions).transpose()?;
    spans::session(&session_id, config.canvas_bounds()).in_scope(|| {
        session.apply(|workflow| -> Result<()> {
            workflow.load_image(payload)?;
            replay_strokes(workflow, &strokes, display)
        })
    })?;

    let mask = session
        .workflow()
        .mask()
        .cloned()
        .context("No area has been marked for removal; add at least one --stroke")?;
    events::progress(&format!(
        "Mask covers {} of {} pixels",
        mask.marked_pixels(),
        u64::from(mask.width()) * u64::from(mask.height())
    ));
    if let Some(path) = &cli.mask_output {
        ImageIOService::save_mask(&mask, path)?;
    }
    if cli.mask_only {
        return Ok(());
    }

    let iterations = session.apply(|workflow| -> Result<_> {
        workflow.advance_to_configure()?;
        Ok(workflow.set_iterations(config.default_iterations)?)
    })?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!(
        "Inpainting with {} iteration(s) ({})...",
        iterations,
        iterations.label()
    ));

    let start_time = Instant::now();
    let completion = session.submit_and_wait().await?;
    spinner.finish_and_clear();

    match completion {
        Completion::Succeeded { entry, .. } => {
            let output = cli.output.clone().unwrap_or_else(|| {
                PathBuf::from(entry.result.suggested_file_name(Utc::now()))
            });
            ImageIOService::save_result(&entry.result, &output)?;
            info!(
                "Job {} finished in {:.2}s; result written to {}",
                entry.id,
                start_time.elapsed().as_secs_f64(),
                output.display()
            );
            Ok(())
        },
        Completion::Failed { error, .. } => {
            events::error_with_context(&error, SUBMISSION_FAILED_NOTICE);
            Err(anyhow::Error::new(error).context(SUBMISSION_FAILED_NOTICE))
        },
    }
}

/// Feed each stroke through the workflow as press, motions and release
fn replay_strokes(
    workflow: &mut Workflow,
    strokes: &[StrokeSpec],
    display: Option<(u32, u32)>,
) -> Result<()> {
    for stroke in strokes {
        workflow.select_tool(stroke.tool)?;
        let engine = workflow
            .engine()
            .context("No canvas surface is available")?;
        let (width, height) = engine.dimensions();
        let rect = match display {
            Some((w, h)) => DisplayRect::new(0.0, 0.0, w as f32, h as f32),
            None => DisplayRect::identity(width, height),
        };
        let points: Vec<_> = stroke
            .points
            .iter()
            .map(|p| engine.map_pointer(*p, rect))
            .collect();

        let _span = spans::stroke(stroke.tool, engine.brush_radius().get()).entered();
        let mut points = points.into_iter();
        if let Some(first) = points.next() {
            workflow.begin_stroke(first)?;
            for point in points {
                workflow.continue_stroke(point)?;
            }
            workflow.end_stroke()?;
        }
    }

    if strokes.iter().any(|s| s.tool == Tool::Erase) && workflow.mask().is_none() {
        events::warning_with_recommendation(
            "Erase strokes removed every mark",
            "Add a --stroke outside the erased area",
        );
    }
    Ok(())
}

async fn show_job_status(service: &dyn InpaintService, job_id: &str) -> Result<()> {
    let status = service
        .job_status(&JobId::new(job_id))
        .await
        .with_context(|| format!("Failed to look up job {}", job_id))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
