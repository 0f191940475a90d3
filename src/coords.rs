//! Display-space to image-space coordinate mapping
//!
//! Pointer positions arrive relative to the viewport. The canvas surface may be
//! shown at a different size than its pixel grid, so both axes are scaled
//! independently before a position reaches the stroke engine.

/// Bounding rectangle of the canvas surface as laid out on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    #[must_use]
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle at the origin showing the surface at exactly its pixel size
    #[must_use]
    pub fn identity(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }
}

/// Pointer position in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    pub x: f32,
    pub y: f32,
}

impl PointerPosition {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Position on the canvas surface's pixel grid (unrounded)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePoint {
    pub x: f32,
    pub y: f32,
}

impl ImagePoint {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite numbers
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Maps viewport positions onto the canvas surface's native pixel grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    rect: DisplayRect,
    scale_x: f32,
    scale_y: f32,
}

impl CoordinateMapper {
    /// Build a mapper for a surface of `native_width`x`native_height` pixels shown in `rect`
    ///
    /// A degenerate display rectangle (zero or negative extent) maps with scale 1.
    #[must_use]
    pub fn new(native_width: u32, native_height: u32, rect: DisplayRect) -> Self {
        let scale_x = if rect.width > 0.0 {
            native_width as f32 / rect.width
        } else {
            1.0
        };
        let scale_y = if rect.height > 0.0 {
            native_height as f32 / rect.height
        } else {
            1.0
        };
        Self {
            rect,
            scale_x,
            scale_y,
        }
    }

    /// Independent horizontal and vertical scale factors
    #[must_use]
    pub fn scale(&self) -> (f32, f32) {
        (self.scale_x, self.scale_y)
    }

    #[must_use]
    pub fn display_rect(&self) -> DisplayRect {
        self.rect
    }

    /// Map a pointer position to image space
    #[must_use]
    pub fn to_image(&self, pointer: PointerPosition) -> ImagePoint {
        ImagePoint {
            x: (pointer.x - self.rect.left) * self.scale_x,
            y: (pointer.y - self.rect.top) * self.scale_y,
        }
    }

    /// Map an image-space point back to the viewport
    #[must_use]
    pub fn to_display(&self, point: ImagePoint) -> PointerPosition {
        PointerPosition {
            x: point.x / self.scale_x + self.rect.left,
            y: point.y / self.scale_y + self.rect.top,
        }
    }
}

/// Fit `native` dimensions into `bounds`, scaling down only and keeping aspect ratio
///
/// Returns the dimensions the canvas surface is allocated at. Images already
/// inside the bounds keep their size.
///
/// ```rust
/// use imgly_inpaint::coords::fit_within;
///
/// assert_eq!(fit_within((1000, 800), (800, 600)), (750, 600));
/// assert_eq!(fit_within((640, 480), (800, 600)), (640, 480));
/// ```
#[must_use]
pub fn fit_within(native: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (width, height) = native;
    let (max_width, max_height) = bounds;
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let ratio = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let fitted_width = (f64::from(width) * ratio).round().max(1.0) as u32;
    let fitted_height = (f64::from(height) * ratio).round().max(1.0) as u32;
    (fitted_width.min(max_width), fitted_height.min(max_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    #[test]
    fn test_identity_mapping() {
        let mapper = CoordinateMapper::new(800, 600, DisplayRect::identity(800, 600));
        assert_eq!(mapper.scale(), (1.0, 1.0));
        let point = mapper.to_image(PointerPosition::new(123.5, 456.25));
        assert_eq!(point, ImagePoint::new(123.5, 456.25));
    }

    #[test]
    fn test_offset_and_independent_scales() {
        // 800x640 surface shown at 400x160 starting at (10, 20)
        let mapper = CoordinateMapper::new(800, 640, DisplayRect::new(10.0, 20.0, 400.0, 160.0));
        assert_eq!(mapper.scale(), (2.0, 4.0));
        let point = mapper.to_image(PointerPosition::new(110.0, 40.0));
        assert!((point.x - 200.0).abs() < EPSILON);
        assert!((point.y - 80.0).abs() < EPSILON);
    }

    #[test]
    fn test_round_trip_for_various_scales() {
        let rects = [
            DisplayRect::new(0.0, 0.0, 800.0, 600.0),
            DisplayRect::new(35.5, 12.25, 400.0, 300.0),
            DisplayRect::new(-20.0, 100.0, 1600.0, 900.0),
            DisplayRect::new(3.0, 7.0, 123.0, 457.0),
        ];
        let pointers = [
            PointerPosition::new(0.0, 0.0),
            PointerPosition::new(50.0, 75.5),
            PointerPosition::new(399.9, 299.9),
            PointerPosition::new(-5.0, 1000.0),
        ];

        for rect in rects {
            let mapper = CoordinateMapper::new(800, 600, rect);
            for pointer in pointers {
                let back = mapper.to_display(mapper.to_image(pointer));
                assert!((back.x - pointer.x).abs() < EPSILON, "{rect:?} {pointer:?}");
                assert!((back.y - pointer.y).abs() < EPSILON, "{rect:?} {pointer:?}");
            }
        }
    }

    #[test]
    fn test_degenerate_rect_falls_back_to_unit_scale() {
        let mapper = CoordinateMapper::new(800, 600, DisplayRect::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(mapper.scale(), (1.0, 1.0));
    }

    #[test]
    fn test_fit_within_scales_down_only() {
        assert_eq!(fit_within((1000, 800), (800, 600)), (750, 600));
        assert_eq!(fit_within((1600, 600), (800, 600)), (800, 300));
        assert_eq!(fit_within((800, 600), (800, 600)), (800, 600));
        assert_eq!(fit_within((100, 50), (800, 600)), (100, 50));
        assert_eq!(fit_within((10_000, 1), (800, 600)), (800, 1));
    }
}
