use tagtext::Rgba;

use crate::canvas::{Canvas, PaintMode, Point, TextPaint};
use crate::render_layout::{LayoutResult, RunPiece, TextRun};

/// Paint-time knobs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintConfig {
    /// Stroke width as a fraction of the run's font size.
    pub stroke_ratio: f32,
    /// Underline offset below the baseline, as a fraction of font size.
    pub underline_offset: f32,
    /// Strikethrough height above the baseline, as a fraction of ascent.
    pub strikethrough_position: f32,
    /// Decoration thickness as a fraction of font size.
    pub decoration_thickness: f32,
    /// Extra multiplier on decoration thickness.
    pub decoration_weight: f32,
}

impl Default for PaintConfig {
    fn default() -> Self {
        Self {
            stroke_ratio: 0.02,
            underline_offset: 0.1,
            strikethrough_position: 0.5,
            decoration_thickness: 0.05,
            decoration_weight: 1.5,
        }
    }
}

impl PaintConfig {
    pub fn with_stroke_ratio(mut self, stroke_ratio: f32) -> Self {
        self.stroke_ratio = stroke_ratio;
        self
    }
}

/// Paints a [`LayoutResult`] onto a [`Canvas`].
///
/// For every piece the stroke is painted first, the fill on top of it, and
/// decorations last.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Renderer {
    cfg: PaintConfig,
}

impl Renderer {
    pub fn new(cfg: PaintConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &PaintConfig {
        &self.cfg
    }

    /// Paint `layout` with its top-left corner at `origin`.
    pub fn render<C>(&self, layout: &LayoutResult, canvas: &mut C, origin: Point) -> Result<(), C::Error>
    where
        C: Canvas + ?Sized,
    {
        for line in layout.lines() {
            let baseline = origin.y + line.baseline;
            let left = origin.x + line.x_offset;
            for (run, piece) in layout.line_pieces(line) {
                let text = layout.piece_text(piece);
                if text.is_empty() {
                    continue;
                }
                let at = Point::new(left + piece.x, baseline);
                self.paint_piece(canvas, run, text, at)?;
                self.paint_decorations(canvas, run, piece, at)?;
            }
        }
        Ok(())
    }

    fn paint_piece<C>(&self, canvas: &mut C, run: &TextRun, text: &str, at: Point) -> Result<(), C::Error>
    where
        C: Canvas + ?Sized,
    {
        let size_px = run.style.size_px;
        if let Some(stroke) = run.style.stroke {
            let width = size_px * self.cfg.stroke_ratio;
            if width > 0.0 && !stroke.is_transparent() {
                let paint = TextPaint {
                    color: stroke,
                    size_px,
                    mode: PaintMode::Stroke { width },
                };
                canvas.paint_text(&run.font, text, &paint, at)?;
            }
        }
        let paint = TextPaint {
            color: run.style.color,
            size_px,
            mode: PaintMode::Fill,
        };
        canvas.paint_text(&run.font, text, &paint, at)
    }

    fn paint_decorations<C>(
        &self,
        canvas: &mut C,
        run: &TextRun,
        piece: &RunPiece,
        at: Point,
    ) -> Result<(), C::Error>
    where
        C: Canvas + ?Sized,
    {
        let style = &run.style;
        if !style.underline && !style.strikethrough {
            return Ok(());
        }
        let thickness = self.decoration_thickness(style.size_px);
        let x1 = at.x + piece.width;
        if style.underline {
            let y = at.y + style.size_px * self.cfg.underline_offset;
            line(canvas, at.x, x1, y, style.color, thickness)?;
        }
        if style.strikethrough {
            let y = at.y - run.metrics.ascent * self.cfg.strikethrough_position;
            line(canvas, at.x, x1, y, style.color, thickness)?;
        }
        Ok(())
    }

    /// Decoration thickness for a font size; never thinner than one pixel.
    pub fn decoration_thickness(&self, size_px: f32) -> f32 {
        (size_px * self.cfg.decoration_thickness * self.cfg.decoration_weight).max(1.0)
    }
}

fn line<C>(canvas: &mut C, x0: f32, x1: f32, y: f32, color: Rgba, width: f32) -> Result<(), C::Error>
where
    C: Canvas + ?Sized,
{
    canvas.paint_line(Point::new(x0, y), Point::new(x1, y), color, width)
}

/// Paint `layout` at `origin` with the default [`PaintConfig`].
pub fn render<C>(layout: &LayoutResult, canvas: &mut C, origin: Point) -> Result<(), C::Error>
where
    C: Canvas + ?Sized,
{
    Renderer::default().render(layout, canvas, origin)
}
