use std::sync::Arc;

use embedded_graphics::{
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
};
use tagtext::Rgba;
use tagtext_render::{
    Canvas, FontHandle, FontMetrics, PaintMode, Point as TextPoint, TextMeasurer, TextPaint,
};

use crate::mono_backend::{FontBackend, FontFallbackReason, MonoFontBackend};

/// Counters for font fallbacks observed while painting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextFallbackDiagnostics {
    pub unknown_family: u64,
    pub unsupported_weight_italic: u64,
    pub size_out_of_range: u64,
}

impl TextFallbackDiagnostics {
    /// Total fallback count across all reasons.
    pub fn total(&self) -> u64 {
        self.unknown_family
            .saturating_add(self.unsupported_weight_italic)
            .saturating_add(self.size_out_of_range)
    }

    fn note_reason(&mut self, reason: FontFallbackReason) {
        match reason {
            FontFallbackReason::UnknownFamily => {
                self.unknown_family = self.unknown_family.saturating_add(1)
            }
            FontFallbackReason::UnsupportedWeightItalic => {
                self.unsupported_weight_italic = self.unsupported_weight_italic.saturating_add(1)
            }
            FontFallbackReason::SizeOutOfRange => {
                self.size_out_of_range = self.size_out_of_range.saturating_add(1)
            }
        }
    }
}

/// [`TextMeasurer`] backed by a [`FontBackend`].
#[derive(Clone, Copy, Debug, Default)]
pub struct EgTextMeasurer<B = MonoFontBackend> {
    backend: B,
}

impl EgTextMeasurer<MonoFontBackend> {
    /// Create a default measurer using the mono backend.
    pub fn new() -> Self {
        Self {
            backend: MonoFontBackend::new(),
        }
    }

    /// Shared measurer trait object.
    pub fn shared() -> Arc<dyn TextMeasurer + Send + Sync> {
        Arc::new(Self::new())
    }
}

impl<B> EgTextMeasurer<B>
where
    B: FontBackend,
{
    /// Create a measurer using an explicit backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B> TextMeasurer for EgTextMeasurer<B>
where
    B: FontBackend,
{
    fn measure_advance(&self, font: &FontHandle, size_px: f32, text: &str) -> f32 {
        let selection = self.backend.resolve_font(font, size_px);
        self.backend.advance(selection.face, text)
    }

    fn font_metrics(&self, font: &FontHandle, size_px: f32) -> FontMetrics {
        let selection = self.backend.resolve_font(font, size_px);
        self.backend.metrics(selection.face)
    }

    fn has_glyph(&self, font: &FontHandle, cluster: &str) -> bool {
        self.backend.covers(font, cluster)
    }
}

/// [`Canvas`] over any RGB embedded-graphics draw target.
///
/// Alpha is not blended: fully transparent paints are skipped and every
/// other color is drawn opaque.
pub struct EgCanvas<'a, D, B = MonoFontBackend> {
    display: &'a mut D,
    measurer: EgTextMeasurer<B>,
    diagnostics: TextFallbackDiagnostics,
}

impl<'a, D> EgCanvas<'a, D, MonoFontBackend>
where
    D: DrawTarget<Color = Rgb888>,
{
    pub fn new(display: &'a mut D) -> Self {
        Self::with_backend(display, MonoFontBackend::new())
    }
}

impl<'a, D, B> EgCanvas<'a, D, B>
where
    D: DrawTarget<Color = Rgb888>,
    B: FontBackend,
{
    pub fn with_backend(display: &'a mut D, backend: B) -> Self {
        Self {
            display,
            measurer: EgTextMeasurer::with_backend(backend),
            diagnostics: TextFallbackDiagnostics::default(),
        }
    }

    /// Fallbacks observed by paint calls so far.
    pub fn diagnostics(&self) -> TextFallbackDiagnostics {
        self.diagnostics
    }

    pub fn display_mut(&mut self) -> &mut D {
        self.display
    }

    fn draw_at(
        &mut self,
        face: B::Face,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<(), D::Error> {
        self.measurer
            .backend
            .draw_text_run(self.display, face, text, origin, color)
            .map(|_| ())
    }
}

impl<D, B> TextMeasurer for EgCanvas<'_, D, B>
where
    B: FontBackend,
{
    fn measure_advance(&self, font: &FontHandle, size_px: f32, text: &str) -> f32 {
        self.measurer.measure_advance(font, size_px, text)
    }

    fn font_metrics(&self, font: &FontHandle, size_px: f32) -> FontMetrics {
        self.measurer.font_metrics(font, size_px)
    }

    fn has_glyph(&self, font: &FontHandle, cluster: &str) -> bool {
        self.measurer.has_glyph(font, cluster)
    }
}

impl<D, B> Canvas for EgCanvas<'_, D, B>
where
    D: DrawTarget<Color = Rgb888>,
    B: FontBackend,
{
    type Error = D::Error;

    fn paint_text(
        &mut self,
        font: &FontHandle,
        text: &str,
        paint: &TextPaint,
        origin: TextPoint,
    ) -> Result<(), Self::Error> {
        if paint.color.is_transparent() {
            return Ok(());
        }
        let selection = self.measurer.backend.resolve_font(font, paint.size_px);
        if let Some(reason) = selection.fallback_reason {
            log::trace!("font '{}' fallback: {:?}", font.family, reason);
            self.diagnostics.note_reason(reason);
        }
        let color = to_rgb888(paint.color);
        let origin = to_point(origin);
        match paint.mode {
            PaintMode::Fill => self.draw_at(selection.face, text, origin, color),
            PaintMode::Stroke { width } => {
                let radius = width.round().max(1.0) as i32;
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        if dx * dx + dy * dy > radius * radius {
                            continue;
                        }
                        self.draw_at(selection.face, text, origin + Point::new(dx, dy), color)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn paint_line(
        &mut self,
        from: TextPoint,
        to: TextPoint,
        color: Rgba,
        width: f32,
    ) -> Result<(), Self::Error> {
        if color.is_transparent() {
            return Ok(());
        }
        let stroke = width.round().max(1.0) as u32;
        Line::new(to_point(from), to_point(to))
            .into_styled(PrimitiveStyle::with_stroke(to_rgb888(color), stroke))
            .draw(self.display)
    }
}

pub(crate) fn to_point(p: TextPoint) -> Point {
    Point::new(p.x.round() as i32, p.y.round() as i32)
}

pub(crate) fn to_rgb888(color: Rgba) -> Rgb888 {
    Rgb888::new(color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use tagtext_render::{
        render, FontFallbackList, FontResolver, LayoutConfig, LayoutEngine,
    };
    use tagtext::{Style, StyledText};

    #[derive(Default)]
    struct PixelCaptureDisplay {
        size: Size,
        pixels: Vec<(Point, Rgb888)>,
    }

    impl PixelCaptureDisplay {
        fn with_size(width: u32, height: u32) -> Self {
            Self {
                size: Size::new(width, height),
                pixels: Vec::new(),
            }
        }

        fn colored(&self, color: Rgb888) -> usize {
            self.pixels.iter().filter(|(_, c)| *c == color).count()
        }
    }

    impl OriginDimensions for PixelCaptureDisplay {
        fn size(&self) -> Size {
            self.size
        }
    }

    impl DrawTarget for PixelCaptureDisplay {
        type Color = Rgb888;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(point, color) in pixels {
                self.pixels.push((point, color));
            }
            Ok(())
        }
    }

    fn layout(markup: &str, size: f32, measurer: &EgTextMeasurer) -> tagtext_render::LayoutResult {
        let engine = LayoutEngine::new(
            LayoutConfig::default(),
            FontResolver::new(FontFallbackList::new(["latin1", "greek"]).expect("list")),
        );
        engine.layout(&StyledText::from_markup(markup, &Style::with_size(size)), measurer, None)
    }

    #[test]
    fn measurer_uses_backend_cells() {
        let measurer = EgTextMeasurer::new();
        let font = FontHandle::new("latin1", false, false);
        assert_eq!(measurer.measure_advance(&font, 20.0, "abc"), 30.0);
        assert_eq!(measurer.font_metrics(&font, 20.0).height(), 20.0);
        assert!(measurer.has_glyph(&font, "x"));
    }

    #[test]
    fn stroke_draws_more_pixels_than_fill() {
        let measurer = EgTextMeasurer::new();
        let plain = layout("Hi", 20.0, &measurer);
        let stroked = layout("[stroke=blue]Hi[/stroke]", 20.0, &measurer);

        let mut display = PixelCaptureDisplay::with_size(200, 100);
        render(&plain, &mut EgCanvas::new(&mut display), TextPoint::new(0.0, 0.0))
            .expect("render");
        let fill_only = display.colored(Rgb888::BLACK);

        let mut display = PixelCaptureDisplay::with_size(200, 100);
        tagtext_render::Renderer::new(tagtext_render::PaintConfig::default().with_stroke_ratio(0.1))
            .render(&stroked, &mut EgCanvas::new(&mut display), TextPoint::new(0.0, 0.0))
            .expect("render");
        assert!(display.colored(Rgb888::BLUE) > fill_only);
        assert_eq!(display.colored(Rgb888::BLACK), fill_only);
        let first_black = display
            .pixels
            .iter()
            .position(|(_, c)| *c == Rgb888::BLACK)
            .expect("fill pixels");
        let last_blue = display
            .pixels
            .iter()
            .rposition(|(_, c)| *c == Rgb888::BLUE)
            .expect("stroke pixels");
        assert!(last_blue < first_black);
    }

    #[test]
    fn decorations_draw_lines() {
        let measurer = EgTextMeasurer::new();
        let out = layout("[u][color=red]abc[/color][/u]", 20.0, &measurer);
        let mut display = PixelCaptureDisplay::with_size(200, 100);
        render(&out, &mut EgCanvas::new(&mut display), TextPoint::new(0.0, 0.0)).expect("render");
        let baseline = out.lines()[0].baseline;
        let underline_y = (baseline + 2.0).round() as i32;
        let row: Vec<i32> = display
            .pixels
            .iter()
            .filter(|(p, c)| *c == Rgb888::RED && (p.y - underline_y).abs() <= 1)
            .map(|(p, _)| p.x)
            .collect();
        assert!(row.contains(&0) && row.contains(&29));
    }

    #[test]
    fn transparent_paint_is_skipped() {
        let measurer = EgTextMeasurer::new();
        let out = layout("[color=#00000000]abc[/color]", 20.0, &measurer);
        let mut display = PixelCaptureDisplay::with_size(200, 100);
        render(&out, &mut EgCanvas::new(&mut display), TextPoint::new(0.0, 0.0)).expect("render");
        assert!(display.pixels.is_empty());
    }

    #[test]
    fn fallback_reasons_are_counted() {
        let mut display = PixelCaptureDisplay::with_size(100, 100);
        let mut canvas = EgCanvas::new(&mut display);
        let paint = TextPaint {
            color: Rgba::BLACK,
            size_px: 16.0,
            mode: PaintMode::Fill,
        };
        canvas
            .paint_text(
                &FontHandle::new("Arial", true, true),
                "x",
                &paint,
                TextPoint::new(0.0, 20.0),
            )
            .expect("paint");
        let diag = canvas.diagnostics();
        assert_eq!(diag.unknown_family, 1);
        assert_eq!(diag.total(), 1);
    }
}
