//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::InpaintConfig;
use crate::coords::PointerPosition;
use crate::types::Tool;
use anyhow::{bail, Context, Result};

/// One stroke given on the command line
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StrokeSpec {
    pub(crate) tool: Tool,
    pub(crate) points: Vec<PointerPosition>,
}

/// Convert CLI arguments to [`InpaintConfig`] and stroke lists
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the configuration: file (if given) first, then flag overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<InpaintConfig> {
        let base = match &cli.config {
            Some(path) => InpaintConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => InpaintConfig::default(),
        };

        InpaintConfig::builder()
            .api_base_url(cli.api_url.clone().unwrap_or(base.api_base_url))
            .request_timeout_secs(cli.timeout.unwrap_or(base.request_timeout_secs))
            .max_upload_bytes(base.max_upload_bytes)
            .canvas_bounds(base.canvas_max_width, base.canvas_max_height)
            .default_brush_radius(cli.radius.unwrap_or(base.default_brush_radius))
            .default_iterations(cli.iterations.unwrap_or(base.default_iterations))
            .history_capacity(base.history_capacity)
            .build()
            .context("Invalid configuration")
    }

    /// Mark strokes first, then erase strokes, in the order given
    pub(crate) fn strokes(cli: &Cli) -> Result<Vec<StrokeSpec>> {
        let marks = cli.stroke.iter().map(|s| (Tool::Mark, s));
        let erases = cli.erase.iter().map(|s| (Tool::Erase, s));
        marks
            .chain(erases)
            .map(|(tool, spec)| {
                let points = parse_points(spec)
                    .with_context(|| format!("Invalid {} stroke '{}'", tool, spec))?;
                Ok(StrokeSpec { tool, points })
            })
            .collect()
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.job_status.is_none() && cli.input.is_none() {
            bail!("An input image is required unless --job-status is given");
        }
        if cli.mask_only && cli.mask_output.is_none() {
            bail!("--mask-only requires --mask-output");
        }
        if let Some(iterations) = cli.iterations {
            if !(1..=5).contains(&iterations) {
                bail!("Iterations must be between 1 and 5, got {}", iterations);
            }
        }
        if let Some(display) = &cli.display {
            parse_dimensions(display).context("Invalid --display")?;
        }
        Self::strokes(cli)?;
        Ok(())
    }
}

/// Parse `"x,y x,y ..."` into pointer positions
pub(crate) fn parse_points(spec: &str) -> Result<Vec<PointerPosition>> {
    let points = spec
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .with_context(|| format!("Expected x,y but got '{}'", pair))?;
            let x: f32 = x.trim().parse().with_context(|| format!("Bad x in '{}'", pair))?;
            let y: f32 = y.trim().parse().with_context(|| format!("Bad y in '{}'", pair))?;
            if !x.is_finite() || !y.is_finite() {
                bail!("Point '{}' must have finite coordinates", pair);
            }
            Ok(PointerPosition::new(x, y))
        })
        .collect::<Result<Vec<_>>>()?;

    if points.is_empty() {
        bail!("A stroke needs at least one point");
    }
    Ok(points)
}

/// Parse `"WIDTHxHEIGHT"`
pub(crate) fn parse_dimensions(spec: &str) -> Result<(u32, u32)> {
    let (width, height) = spec
        .split_once(['x', 'X'])
        .with_context(|| format!("Expected WIDTHxHEIGHT but got '{}'", spec))?;
    let width: u32 = width.trim().parse().context("Bad width")?;
    let height: u32 = height.trim().parse().context("Bad height")?;
    if width == 0 || height == 0 {
        bail!("Display size must be non-zero");
    }
    Ok((width, height))
}
