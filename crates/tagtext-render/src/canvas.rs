use std::sync::Arc;

use tagtext::Rgba;

/// Font request handed to the canvas: a family plus the synthetic style bits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FontHandle {
    /// Family name as configured (not normalized).
    pub family: Arc<str>,
    pub bold: bool,
    pub italic: bool,
}

impl FontHandle {
    pub fn new(family: impl Into<Arc<str>>, bold: bool, italic: bool) -> Self {
        Self {
            family: family.into(),
            bold,
            italic,
        }
    }
}

/// Vertical metrics for a font at a given size, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FontMetrics {
    /// Distance from the baseline up to the top of the line box.
    pub ascent: f32,
    /// Distance from the baseline down to the bottom of the line box.
    pub descent: f32,
}

impl FontMetrics {
    pub fn height(self) -> f32 {
        self.ascent + self.descent
    }
}

/// Canvas-space position in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// How glyphs of a text paint call are filled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PaintMode {
    /// Solid glyph fill.
    Fill,
    /// Glyph outline of the given width in pixels.
    Stroke { width: f32 },
}

/// Paint parameters for one text paint call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextPaint {
    pub color: Rgba,
    pub size_px: f32,
    pub mode: PaintMode,
}

/// Read-only measurement surface used by font resolution and layout.
pub trait TextMeasurer {
    /// Horizontal advance of `text` set in `font` at `size_px`.
    fn measure_advance(&self, font: &FontHandle, size_px: f32, text: &str) -> f32;

    /// Vertical metrics of `font` at `size_px`.
    fn font_metrics(&self, font: &FontHandle, size_px: f32) -> FontMetrics;

    /// Whether `font` has renderable glyphs for every scalar of `cluster`.
    fn has_glyph(&self, font: &FontHandle, cluster: &str) -> bool;
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for &T {
    fn measure_advance(&self, font: &FontHandle, size_px: f32, text: &str) -> f32 {
        (**self).measure_advance(font, size_px, text)
    }

    fn font_metrics(&self, font: &FontHandle, size_px: f32) -> FontMetrics {
        (**self).font_metrics(font, size_px)
    }

    fn has_glyph(&self, font: &FontHandle, cluster: &str) -> bool {
        (**self).has_glyph(font, cluster)
    }
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for Arc<T> {
    fn measure_advance(&self, font: &FontHandle, size_px: f32, text: &str) -> f32 {
        (**self).measure_advance(font, size_px, text)
    }

    fn font_metrics(&self, font: &FontHandle, size_px: f32) -> FontMetrics {
        (**self).font_metrics(font, size_px)
    }

    fn has_glyph(&self, font: &FontHandle, cluster: &str) -> bool {
        (**self).has_glyph(font, cluster)
    }
}

/// Paint surface. Only the renderer calls the paint methods.
pub trait Canvas: TextMeasurer {
    type Error;

    /// Paint `text` with its baseline starting at `origin`.
    fn paint_text(
        &mut self,
        font: &FontHandle,
        text: &str,
        paint: &TextPaint,
        origin: Point,
    ) -> Result<(), Self::Error>;

    /// Paint a straight segment (decorations).
    fn paint_line(
        &mut self,
        from: Point,
        to: Point,
        color: Rgba,
        width: f32,
    ) -> Result<(), Self::Error>;
}
