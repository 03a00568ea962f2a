use core::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tagtext::{markup, Align, Rgba, Span, Style, StyledText};

use crate::auto_fit::{FitOutcome, FitRequest};
use crate::canvas::{Canvas, Point, TextMeasurer};
use crate::error::TextConfigError;
use crate::font_resolve::{FontFallbackList, FontResolver, GlyphCoverageCache};
use crate::render_layout::{LayoutConfig, LayoutEngine, LayoutResult, DEFAULT_LINE_SPACING};
use crate::render_paint::{PaintConfig, Renderer};

/// Vertical placement inside a box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Space around a rendered text block, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Padding {
    pub const fn uniform(px: f32) -> Self {
        Self {
            left: px,
            top: px,
            right: px,
            bottom: px,
        }
    }

    /// Horizontal and vertical padding, as `(x, y)`.
    pub const fn symmetric(x: f32, y: f32) -> Self {
        Self {
            left: x,
            top: y,
            right: x,
            bottom: y,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

impl Default for Padding {
    fn default() -> Self {
        Self::uniform(10.0)
    }
}

/// Axis-aligned target rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoxRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Options for turning markup into a positioned text block.
///
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    /// Fallback families; empty uses the process-wide list.
    pub font_families: Vec<String>,
    /// Family tried before the fallback list for unstyled text.
    pub font_family: Option<String>,
    pub base_color: Rgba,
    pub base_stroke_color: Option<Rgba>,
    pub base_size: f32,
    pub bold: bool,
    pub italic: bool,
    /// Default line alignment.
    pub align: Align,
    /// Interpret `[tag]` markup; when false the text is drawn literally.
    pub markup: bool,
    /// Wrap lines at this width.
    pub max_width: Option<f32>,
    pub line_spacing: f32,
    /// Stroke width as a fraction of font size.
    pub stroke_ratio: f32,
    pub padding: Padding,
    /// Image background; `None` keeps it transparent.
    pub background: Option<Rgba>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            font_families: Vec::new(),
            font_family: None,
            base_color: Rgba::BLACK,
            base_stroke_color: None,
            base_size: 30.0,
            bold: false,
            italic: false,
            align: Align::Left,
            markup: true,
            max_width: None,
            line_spacing: DEFAULT_LINE_SPACING,
            stroke_ratio: 0.02,
            padding: Padding::default(),
            background: Some(Rgba::WHITE),
        }
    }
}

impl TextOptions {
    /// Decode options from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, TextConfigError> {
        let opts: Self = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn to_json_string(&self) -> Result<String, TextConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reject sizes that cannot produce a layout.
    pub fn validate(&self) -> Result<(), TextConfigError> {
        positive("base_size", self.base_size)?;
        positive("line_spacing", self.line_spacing)?;
        if let Some(max_width) = self.max_width {
            positive("max_width", max_width)?;
        }
        if !self.stroke_ratio.is_finite() || self.stroke_ratio < 0.0 {
            return Err(TextConfigError::InvalidSize {
                field: "stroke_ratio",
                value: self.stroke_ratio,
            });
        }
        for (field, value) in [
            ("padding.left", self.padding.left),
            ("padding.top", self.padding.top),
            ("padding.right", self.padding.right),
            ("padding.bottom", self.padding.bottom),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TextConfigError::InvalidSize { field, value });
            }
        }
        Ok(())
    }

    pub fn with_font_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.font_families = families.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn with_base_color(mut self, color: Rgba) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_base_stroke_color(mut self, color: Option<Rgba>) -> Self {
        self.base_stroke_color = color;
        self
    }

    pub fn with_base_size(mut self, size_px: f32) -> Self {
        self.base_size = size_px;
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    pub fn with_align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn with_markup(mut self, markup: bool) -> Self {
        self.markup = markup;
        self
    }

    pub fn with_max_width(mut self, max_width: Option<f32>) -> Self {
        self.max_width = max_width;
        self
    }

    pub fn with_line_spacing(mut self, line_spacing: f32) -> Self {
        self.line_spacing = line_spacing;
        self
    }

    pub fn with_stroke_ratio(mut self, stroke_ratio: f32) -> Self {
        self.stroke_ratio = stroke_ratio;
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_background(mut self, background: Option<Rgba>) -> Self {
        self.background = background;
        self
    }

    /// Style every run inherits before tag overrides.
    pub fn base_style(&self) -> Style {
        Style {
            color: self.base_color,
            stroke: self.base_stroke_color,
            font_family: self.font_family.as_deref().map(Arc::from),
            size_px: self.base_size,
            bold: self.bold,
            italic: self.italic,
            align: self.align,
            ..Style::default()
        }
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), TextConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TextConfigError::InvalidSize { field, value })
    }
}

/// Size range and placement for box fitting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub min_size: f32,
    pub max_size: f32,
    pub allow_wrap: bool,
    pub halign: Align,
    pub valign: VAlign,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            min_size: 12.0,
            max_size: 30.0,
            allow_wrap: false,
            halign: Align::Center,
            valign: VAlign::Center,
        }
    }
}

impl FitOptions {
    pub fn with_sizes(mut self, min_size: f32, max_size: f32) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    pub fn with_wrap(mut self, allow_wrap: bool) -> Self {
        self.allow_wrap = allow_wrap;
        self
    }

    pub fn with_halign(mut self, halign: Align) -> Self {
        self.halign = halign;
        self
    }

    pub fn with_valign(mut self, valign: VAlign) -> Self {
        self.valign = valign;
        self
    }

    pub fn validate(&self) -> Result<(), TextConfigError> {
        positive("min_size", self.min_size)?;
        positive("max_size", self.max_size)
    }

    fn request(&self, rect: BoxRect) -> FitRequest {
        FitRequest::new(rect.width, rect.height, self.min_size, self.max_size)
            .with_wrap(self.allow_wrap)
    }
}

/// Runtime diagnostics from layout and fitting.
#[derive(Clone, Debug, PartialEq)]
pub enum TextDiagnostic {
    /// A run had clusters no candidate font covers.
    LastResortFont { family: String },
    /// Auto fit finished after this many trial layouts.
    FitIterations(u32),
    /// Text overflows its box even at the minimum size.
    Overflow { min_size: f32 },
}

type DiagnosticCallback = Arc<Mutex<Box<dyn FnMut(TextDiagnostic) + Send + 'static>>>;

/// Markup to positioned, painted text.
#[derive(Clone)]
pub struct TextEngine {
    opts: TextOptions,
    layout: LayoutEngine,
    renderer: Renderer,
    diagnostic_sink: Option<DiagnosticCallback>,
}

impl fmt::Debug for TextEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextEngine")
            .field("opts", &self.opts)
            .field("layout", &self.layout)
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl TextEngine {
    /// Build an engine; fails on invalid sizes or an empty fallback list.
    pub fn new(opts: TextOptions) -> Result<Self, TextConfigError> {
        opts.validate()?;
        let fallback = if opts.font_families.is_empty() {
            FontFallbackList::global()
        } else {
            FontFallbackList::new(&opts.font_families)?
        };
        let layout = LayoutEngine::new(
            LayoutConfig::default()
                .with_line_spacing(opts.line_spacing)
                .with_default_align(opts.align),
            FontResolver::new(fallback),
        );
        let renderer = Renderer::new(PaintConfig::default().with_stroke_ratio(opts.stroke_ratio));
        Ok(Self {
            opts,
            layout,
            renderer,
            diagnostic_sink: None,
        })
    }

    /// Share a glyph coverage cache with other engines.
    pub fn with_coverage_cache(mut self, cache: GlyphCoverageCache) -> Self {
        let resolver = self.layout.resolver().clone().with_coverage_cache(cache);
        self.layout = LayoutEngine::new(*self.layout.config(), resolver);
        self
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(TextDiagnostic) + Send + 'static,
    {
        self.diagnostic_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
    }

    fn emit_diagnostic(&self, diagnostic: TextDiagnostic) {
        let Some(sink) = &self.diagnostic_sink else {
            return;
        };
        if let Ok(mut sink) = sink.lock() {
            sink(diagnostic);
        }
    }

    pub fn options(&self) -> &TextOptions {
        &self.opts
    }

    pub fn layout_engine(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Parse `text` as markup, or literally when markup is disabled.
    pub fn parse(&self, text: &str) -> Span {
        if self.opts.markup {
            markup::parse(text)
        } else {
            markup::literal(text)
        }
    }

    /// Parse and resolve styles against the configured base style.
    pub fn styled(&self, text: &str) -> StyledText {
        StyledText::from_span(&self.parse(text), &self.opts.base_style())
    }

    /// Lay out `text` at the base size.
    ///
    /// Without a configured `max_width`, lines are aligned against the
    /// widest line.
    pub fn layout<M>(&self, text: &str, measurer: &M) -> LayoutResult
    where
        M: TextMeasurer + ?Sized,
    {
        let styled = self.styled(text);
        let out = self.layout.layout(&styled, measurer, self.opts.max_width);
        self.report_last_resort(&out);
        if out.max_width.is_some() {
            out
        } else {
            out.aligned_to(out.width)
        }
    }

    /// Fit `text` into `rect`, searching sizes in `fit`'s range.
    ///
    /// Lines keep the configured `align`; they are aligned against the
    /// widest line, and `fit.halign` only positions that block in `rect`.
    pub fn fit<M>(&self, text: &str, measurer: &M, rect: BoxRect, fit: &FitOptions) -> FitOutcome
    where
        M: TextMeasurer + ?Sized,
    {
        let root = self.parse(text);
        let base = self.opts.base_style();
        let mut outcome = self
            .layout
            .fit_to_box(&root, &base, measurer, &fit.request(rect));
        self.emit_diagnostic(TextDiagnostic::FitIterations(outcome.iterations));
        if outcome.overflow {
            log::warn!(
                "text does not fit {:.1}x{:.1} at minimum size {:.1}",
                rect.width,
                rect.height,
                fit.min_size
            );
            self.emit_diagnostic(TextDiagnostic::Overflow {
                min_size: fit.min_size,
            });
        }
        self.report_last_resort(&outcome.layout);
        outcome.layout = outcome.layout.aligned_to(outcome.layout.width);
        outcome
    }

    /// Top-left corner for `layout` placed in `rect` per `fit`'s alignment.
    ///
    /// The block is as wide as its widest line. Overflowing blocks are
    /// centered (or pinned) the same way, so they may start outside `rect`.
    pub fn place_in_box(&self, layout: &LayoutResult, rect: BoxRect, fit: &FitOptions) -> Point {
        let block_w = layout.width;
        let dx = match fit.halign {
            Align::Left => 0.0,
            Align::Center => (rect.width - block_w) / 2.0,
            Align::Right => rect.width - block_w,
        };
        let dy = match fit.valign {
            VAlign::Top => 0.0,
            VAlign::Center => (rect.height - layout.height) / 2.0,
            VAlign::Bottom => rect.height - layout.height,
        };
        Point::new(rect.x + dx, rect.y + dy)
    }

    /// Canvas size needed to hold `layout` plus padding, as `(width, height)`.
    pub fn padded_size(&self, layout: &LayoutResult) -> (f32, f32) {
        let block_w = layout.max_width.unwrap_or(layout.width).max(layout.width);
        (
            block_w + self.opts.padding.horizontal(),
            layout.height + self.opts.padding.vertical(),
        )
    }

    /// Paint `layout` with its top-left corner at `origin`.
    pub fn paint<C>(&self, layout: &LayoutResult, canvas: &mut C, origin: Point) -> Result<(), C::Error>
    where
        C: Canvas + ?Sized,
    {
        self.renderer.render(layout, canvas, origin)
    }

    fn report_last_resort(&self, layout: &LayoutResult) {
        if self.diagnostic_sink.is_none() {
            return;
        }
        for run in layout.runs().iter().filter(|run| run.last_resort) {
            self.emit_diagnostic(TextDiagnostic::LastResortFont {
                family: run.font.family.to_string(),
            });
        }
    }
}
