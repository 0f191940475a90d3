//! Freehand stroke engine
//!
//! The canvas surface is kept as two layers: the fitted source image and a
//! coverage layer holding the marker's alpha per pixel. The mark tool stamps
//! translucent discs onto the coverage layer with source-over blending; the
//! erase tool cuts discs out of it. The visible surface is composited on read,
//! so erasing restores the image pixel underneath exactly, whatever the stroke
//! order was.

use crate::coords::{fit_within, CoordinateMapper, DisplayRect, ImagePoint, PointerPosition};
use crate::mask::{MaskEncoder, MaskRaster};
use crate::types::{BrushRadius, Tool};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma, Rgba, RgbaImage};
use std::sync::Arc;
use tracing::{debug, trace};

/// Marker color painted by the mark tool
pub const MARKER_RGB: [u8; 3] = [255, 0, 0];

/// Marker opacity per stamp (0.6)
pub const MARKER_ALPHA: u8 = 153;

/// Keyboard bindings understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// `b`
    MarkTool,
    /// `e`
    EraseTool,
    /// `[`
    DecreaseBrush,
    /// `]`
    IncreaseBrush,
}

impl Shortcut {
    /// Parse a key name as delivered by a keyboard event
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "b" => Some(Self::MarkTool),
            "e" => Some(Self::EraseTool),
            "[" => Some(Self::DecreaseBrush),
            "]" => Some(Self::IncreaseBrush),
            _ => None,
        }
    }
}

/// Summary of a finished stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeSummary {
    pub tool: Tool,
    /// Pointer samples received, including the initial press
    pub samples: usize,
    /// Discs stamped, including interpolated ones
    pub stamps: usize,
    /// Whether the regenerated mask has any marked pixel
    pub mask_present: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActiveStroke {
    tool: Tool,
    last: ImagePoint,
    samples: usize,
    stamps: usize,
}

/// Accumulates pointer strokes into the canvas surface and derives the mask
#[derive(Debug, Clone)]
pub struct StrokeEngine {
    base: RgbaImage,
    coverage: GrayImage,
    tool: Tool,
    radius: BrushRadius,
    enabled: bool,
    active: Option<ActiveStroke>,
    has_marks: bool,
    mask: Option<Arc<MaskRaster>>,
    mask_regenerations: u64,
}

impl StrokeEngine {
    /// Allocate a canvas surface for `image`, fitted into `bounds`
    ///
    /// The surface is sized to the fitted dimensions, never larger than the
    /// source, and the image is resampled to fill it exactly.
    #[must_use]
    pub fn new(image: &DynamicImage, bounds: (u32, u32), radius: BrushRadius) -> Self {
        let native = image.dimensions();
        let (width, height) = fit_within(native, bounds);
        let base = if (width, height) == native {
            image.to_rgba8()
        } else {
            image.resize_exact(width, height, FilterType::Triangle).to_rgba8()
        };

        debug!(
            native_width = native.0,
            native_height = native.1,
            width,
            height,
            "Canvas surface allocated"
        );

        let mut engine = Self {
            base,
            coverage: GrayImage::new(width, height),
            tool: Tool::default(),
            radius,
            enabled: true,
            active: None,
            has_marks: false,
            mask: None,
            mask_regenerations: 0,
        };
        // Source pixels that already carry the marker color classify on their own
        engine.mask = MaskEncoder::encode(&engine.composite()).map(Arc::new);
        engine
    }

    /// Canvas surface dimensions (the post-fit "native" grid)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.base.dimensions()
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[must_use]
    pub fn brush_radius(&self) -> BrushRadius {
        self.radius
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn is_stroking(&self) -> bool {
        self.active.is_some()
    }

    /// True once a mark stroke has been committed, until the next clear
    #[must_use]
    pub fn has_marks(&self) -> bool {
        self.has_marks
    }

    /// Mask derived at the last stroke end or clear
    #[must_use]
    pub fn mask(&self) -> Option<Arc<MaskRaster>> {
        self.mask.clone()
    }

    /// How many times the mask has been recomputed since load
    #[must_use]
    pub fn mask_regenerations(&self) -> u64 {
        self.mask_regenerations
    }

    /// Fitted source image layer
    #[must_use]
    pub fn base_layer(&self) -> &RgbaImage {
        &self.base
    }

    /// Marker alpha per pixel
    #[must_use]
    pub fn coverage_layer(&self) -> &GrayImage {
        &self.coverage
    }

    /// Enable or disable authoring input; disabled engines ignore strokes,
    /// tool changes and shortcuts
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Map a pointer position through the surface's on-screen rectangle
    #[must_use]
    pub fn map_pointer(&self, pointer: PointerPosition, rect: DisplayRect) -> ImagePoint {
        let (width, height) = self.dimensions();
        CoordinateMapper::new(width, height, rect).to_image(pointer)
    }

    pub fn select_tool(&mut self, tool: Tool) -> bool {
        if !self.enabled {
            return false;
        }
        self.tool = tool;
        true
    }

    /// Set the brush radius, clamped to 5-100
    pub fn set_brush_radius(&mut self, radius: u32) -> bool {
        if !self.enabled {
            return false;
        }
        self.radius = BrushRadius::new(radius);
        true
    }

    pub fn increase_brush(&mut self) -> bool {
        self.set_brush_radius(self.radius.increased().get())
    }

    pub fn decrease_brush(&mut self) -> bool {
        self.set_brush_radius(self.radius.decreased().get())
    }

    /// Apply a keyboard shortcut; returns whether the key was consumed
    pub fn handle_key(&mut self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match Shortcut::from_key(key) {
            Some(Shortcut::MarkTool) => self.select_tool(Tool::Mark),
            Some(Shortcut::EraseTool) => self.select_tool(Tool::Erase),
            Some(Shortcut::DecreaseBrush) => self.decrease_brush(),
            Some(Shortcut::IncreaseBrush) => self.increase_brush(),
            None => false,
        }
    }

    /// Press: start a stroke and paint the first disc
    ///
    /// Rejected while disabled or while another stroke is active.
    pub fn begin_stroke(&mut self, pos: ImagePoint) -> bool {
        if !self.enabled {
            trace!("Stroke rejected: engine disabled");
            return false;
        }
        if self.active.is_some() {
            trace!("Stroke rejected: another stroke is active");
            return false;
        }
        if !pos.is_finite() {
            trace!("Stroke rejected: non-finite position");
            return false;
        }

        self.stamp(pos, self.tool);
        self.active = Some(ActiveStroke {
            tool: self.tool,
            last: pos,
            samples: 1,
            stamps: 1,
        });
        true
    }

    /// Motion: paint towards `pos`, filling gaps between distant samples
    pub fn continue_stroke(&mut self, pos: ImagePoint) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(mut stroke) = self.active else {
            return false;
        };
        if !pos.is_finite() {
            trace!("Sample rejected: non-finite position");
            return false;
        }

        // Only the part of the segment whose discs can reach the surface is stamped
        let radius = self.radius.as_f32();
        let (width, height) = self.dimensions();
        let reach = (
            -radius,
            -radius,
            width as f32 + radius,
            height as f32 + radius,
        );
        if let Some((start, end)) = clip_segment(stroke.last, pos, reach) {
            let spacing = (radius / 2.0).max(1.0);
            // Clipping far-off endpoints loses f32 precision; no segment inside
            // the reach box needs more steps than its perimeter
            let max_steps = ((reach.2 - reach.0 + reach.3 - reach.1) / spacing).ceil() + 1.0;
            let steps = (start.distance_to(end) / spacing).clamp(1.0, max_steps).ceil() as usize;
            // The stroke's last sample was already stamped unless it lies off the surface
            let first = if start == stroke.last { 1 } else { 0 };
            for step in first..=steps {
                let t = step as f32 / steps as f32;
                self.stamp(lerp(start, end, t), stroke.tool);
            }
            stroke.stamps += steps + 1 - first;
        }

        stroke.last = pos;
        stroke.samples += 1;
        self.active = Some(stroke);
        true
    }

    /// Release: finish the stroke and regenerate the mask once
    pub fn end_stroke(&mut self) -> Option<StrokeSummary> {
        let stroke = self.active.take()?;
        if stroke.tool == Tool::Mark {
            self.has_marks = true;
        }
        self.regenerate_mask();

        let summary = StrokeSummary {
            tool: stroke.tool,
            samples: stroke.samples,
            stamps: stroke.stamps,
            mask_present: self.mask.is_some(),
        };
        debug!(
            tool = %summary.tool,
            samples = summary.samples,
            stamps = summary.stamps,
            mask_present = summary.mask_present,
            "Stroke finished"
        );
        Some(summary)
    }

    /// Discard all marks and regenerate the mask
    pub fn clear(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        self.coverage = GrayImage::new(self.base.width(), self.base.height());
        self.active = None;
        self.has_marks = false;
        self.regenerate_mask();
        debug!("Canvas cleared");
        true
    }

    /// Composite the coverage layer over the base image
    #[must_use]
    pub fn composite(&self) -> RgbaImage {
        let mut surface = self.base.clone();
        for (pixel, coverage) in surface.pixels_mut().zip(self.coverage.pixels()) {
            let Luma([alpha]) = *coverage;
            if alpha > 0 {
                *pixel = blend_marker(*pixel, alpha);
            }
        }
        surface
    }

    fn regenerate_mask(&mut self) {
        let _span = crate::tracing_config::spans::mask_encoding(self.dimensions()).entered();
        self.mask = MaskEncoder::encode(&self.composite()).map(Arc::new);
        self.mask_regenerations += 1;
    }

    fn stamp(&mut self, center: ImagePoint, tool: Tool) {
        let (width, height) = self.coverage.dimensions();
        if width == 0 || height == 0 || !center.is_finite() {
            return;
        }
        let radius = self.radius.as_f32();
        let radius_sq = radius * radius;

        let min_x = (center.x - radius).floor().max(0.0);
        let min_y = (center.y - radius).floor().max(0.0);
        let max_x = (center.x + radius).ceil().min((width - 1) as f32);
        let max_y = (center.y + radius).ceil().min((height - 1) as f32);
        if min_x > max_x || min_y > max_y {
            return;
        }

        for y in (min_y as u32)..=(max_y as u32) {
            let dy = y as f32 + 0.5 - center.y;
            for x in (min_x as u32)..=(max_x as u32) {
                let dx = x as f32 + 0.5 - center.x;
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }
                let Luma([current]) = *self.coverage.get_pixel(x, y);
                let next = match tool {
                    Tool::Mark => paint_over(current),
                    Tool::Erase => 0,
                };
                self.coverage.put_pixel(x, y, Luma([next]));
            }
        }
    }
}

fn lerp(from: ImagePoint, to: ImagePoint, t: f32) -> ImagePoint {
    ImagePoint::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
}

/// Liang-Barsky clip of the segment `from -> to` against `(min_x, min_y, max_x, max_y)`
///
/// Returns `None` when the segment misses the box or its extent overflows `f32`.
fn clip_segment(
    from: ImagePoint,
    to: ImagePoint,
    (min_x, min_y, max_x, max_y): (f32, f32, f32, f32),
) -> Option<(ImagePoint, ImagePoint)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if !dx.is_finite() || !dy.is_finite() {
        return None;
    }

    let mut t0 = 0.0_f32;
    let mut t1 = 1.0_f32;
    for (p, q) in [
        (-dx, from.x - min_x),
        (dx, max_x - from.x),
        (-dy, from.y - min_y),
        (dy, max_y - from.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }

    let start = if t0 > 0.0 { lerp(from, to, t0) } else { from };
    let end = if t1 < 1.0 { lerp(from, to, t1) } else { to };
    Some((start, end))
}

/// Source-over of one marker stamp onto existing coverage
fn paint_over(current: u8) -> u8 {
    let src = u32::from(MARKER_ALPHA);
    let dst = u32::from(current);
    (src + (dst * (255 - src) + 127) / 255).min(255) as u8
}

/// Source-over of the marker color with `alpha` onto an image pixel
fn blend_marker(base: Rgba<u8>, alpha: u8) -> Rgba<u8> {
    let src_a = f32::from(alpha) / 255.0;
    let dst_a = f32::from(base.0[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |src: u8, dst: u8| -> u8 {
        let value = (f32::from(src) * src_a + f32::from(dst) * dst_a * (1.0 - src_a)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(MARKER_RGB[0], base.0[0]),
        channel(MARKER_RGB[1], base.0[1]),
        channel(MARKER_RGB[2], base.0[2]),
        (out_a * 255.0).round() as u8,
    ])
}
