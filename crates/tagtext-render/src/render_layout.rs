use std::ops::Range;

use tagtext::{Align, Style, StyledItem, StyledText};
use unicode_segmentation::UnicodeSegmentation;

use crate::canvas::{FontHandle, FontMetrics, TextMeasurer};
use crate::font_resolve::FontResolver;

/// Default line box height as a multiple of the tallest font on the line.
pub const DEFAULT_LINE_SPACING: f32 = 1.2;

/// Tolerance for width comparisons; avoids wrapping text that fits exactly.
pub const LAYOUT_EPSILON: f32 = 1e-3;

/// Line-level layout knobs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Line box height multiplier applied to `ascent + descent`.
    pub line_spacing: f32,
    /// Alignment for lines whose runs carry no `[align]` override.
    pub default_align: Align,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_spacing: DEFAULT_LINE_SPACING,
            default_align: Align::Left,
        }
    }
}

impl LayoutConfig {
    pub fn with_line_spacing(mut self, line_spacing: f32) -> Self {
        self.line_spacing = line_spacing;
        self
    }

    pub fn with_default_align(mut self, default_align: Align) -> Self {
        self.default_align = default_align;
        self
    }
}

/// Measured grapheme cluster of a [`TextRun`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterAdvance {
    /// Byte offset of the cluster in the run text.
    pub start: usize,
    pub advance: f32,
    pub is_space: bool,
}

/// Text set in a single font and style, with per-cluster advances.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: Style,
    pub font: FontHandle,
    pub metrics: FontMetrics,
    pub clusters: Vec<ClusterAdvance>,
    /// Sum of all cluster advances.
    pub width: f32,
    /// Set when the font was picked as last resort for uncovered clusters.
    pub last_resort: bool,
}

impl TextRun {
    /// Measure `text` cluster by cluster.
    pub fn measure<M>(text: String, style: Style, font: FontHandle, measurer: &M) -> Self
    where
        M: TextMeasurer + ?Sized,
    {
        let size = style.size_px;
        let mut clusters = Vec::with_capacity(text.len());
        let mut width = 0.0f32;
        for (start, cluster) in text.grapheme_indices(true) {
            let advance = measurer.measure_advance(&font, size, cluster).max(0.0);
            width += advance;
            clusters.push(ClusterAdvance {
                start,
                advance,
                is_space: cluster.chars().all(is_break_space),
            });
        }
        let metrics = measurer.font_metrics(&font, size);
        Self {
            text,
            style,
            font,
            metrics,
            clusters,
            width,
            last_resort: false,
        }
    }

    /// Byte offset one past cluster `idx`.
    fn cluster_end(&self, idx: usize) -> usize {
        self.clusters
            .get(idx + 1)
            .map(|c| c.start)
            .unwrap_or(self.text.len())
    }

    /// Byte range covering clusters `range`.
    fn byte_range(&self, range: &Range<usize>) -> Range<usize> {
        if range.is_empty() {
            return 0..0;
        }
        let start = self.clusters.get(range.start).map(|c| c.start).unwrap_or(0);
        start..self.cluster_end(range.end - 1)
    }
}

/// Shaped input for the line breaker.
#[derive(Clone, Debug, PartialEq)]
pub enum RunItem {
    Run(TextRun),
    /// Hard break; metrics are used when the line it ends holds no text.
    LineBreak(FontMetrics),
}

/// Part of a [`TextRun`] placed on a line.
#[derive(Clone, Debug, PartialEq)]
pub struct RunPiece {
    /// Index into [`LayoutResult::runs`].
    pub run: usize,
    /// Byte range into the run text.
    pub range: Range<usize>,
    /// Left edge relative to the line's `x_offset`.
    pub x: f32,
    pub width: f32,
}

/// One laid-out line.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    /// Index range into [`LayoutResult::pieces`].
    pub pieces: Range<usize>,
    pub align: Align,
    /// Alignment offset from the block's left edge; never negative.
    pub x_offset: f32,
    /// Top of the line box relative to the block top.
    pub top: f32,
    /// Baseline relative to the block top.
    pub baseline: f32,
    /// Ink advance width, excluding trailing whitespace.
    pub width: f32,
    /// Line box height including line spacing.
    pub height: f32,
    pub ascent: f32,
    pub descent: f32,
    /// Whether the line ended at a hard break.
    pub hard_break: bool,
}

/// Positioned text block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutResult {
    runs: Vec<TextRun>,
    pieces: Vec<RunPiece>,
    lines: Vec<Line>,
    /// Widest line.
    pub width: f32,
    /// Sum of line heights.
    pub height: f32,
    /// First baseline measured from the block top.
    pub ascent: f32,
    /// Block bottom measured from the last baseline.
    pub descent: f32,
    /// Width lines were wrapped and aligned against.
    pub max_width: Option<f32>,
}

impl LayoutResult {
    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn pieces(&self) -> &[RunPiece] {
        &self.pieces
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Pieces of `line` with their runs.
    pub fn line_pieces<'a>(
        &'a self,
        line: &'a Line,
    ) -> impl Iterator<Item = (&'a TextRun, &'a RunPiece)> + 'a {
        self.pieces
            .get(line.pieces.clone())
            .unwrap_or_default()
            .iter()
            .filter_map(move |piece| self.runs.get(piece.run).map(|run| (run, piece)))
    }

    /// Text of a piece.
    pub fn piece_text(&self, piece: &RunPiece) -> &str {
        self.runs
            .get(piece.run)
            .and_then(|run| run.text.get(piece.range.clone()))
            .unwrap_or_default()
    }

    /// Visible text of line `idx`.
    pub fn line_text(&self, idx: usize) -> String {
        let Some(line) = self.lines.get(idx) else {
            return String::new();
        };
        self.line_pieces(line)
            .map(|(_, piece)| self.piece_text(piece))
            .collect()
    }

    /// Visible text of every line.
    pub fn line_texts(&self) -> Vec<String> {
        (0..self.lines.len()).map(|idx| self.line_text(idx)).collect()
    }

    /// `(width, height)` of the block.
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Whether the block fits inside `width` x `height`.
    pub fn fits(&self, width: f32, height: f32) -> bool {
        self.width <= width + LAYOUT_EPSILON && self.height <= height + LAYOUT_EPSILON
    }

    /// Copy with every line re-aligned against `width`.
    pub fn aligned_to(&self, width: f32) -> Self {
        let mut out = self.clone();
        for line in &mut out.lines {
            line.x_offset = align_offset(line.align, line.width, Some(width));
        }
        out.max_width = Some(width);
        out
    }
}

/// Whitespace that offers a line break; no-break spaces and the word
/// joiner glue their neighbours instead.
fn is_break_space(ch: char) -> bool {
    ch.is_whitespace() && !matches!(ch, '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\u{2060}')
}

/// Horizontal offset of a line of `line_width` inside `max_width`.
///
/// Without a width there is nothing to align against. Overflowing lines
/// start at the left edge.
pub fn align_offset(align: Align, line_width: f32, max_width: Option<f32>) -> f32 {
    let Some(max_width) = max_width else {
        return 0.0;
    };
    let slack = (max_width - line_width).max(0.0);
    match align {
        Align::Left => 0.0,
        Align::Center => slack / 2.0,
        Align::Right => slack,
    }
}

/// Font resolution, measurement, and greedy line breaking.
#[derive(Clone, Debug, Default)]
pub struct LayoutEngine {
    cfg: LayoutConfig,
    resolver: FontResolver,
}

impl LayoutEngine {
    pub fn new(cfg: LayoutConfig, resolver: FontResolver) -> Self {
        Self { cfg, resolver }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.cfg
    }

    pub fn resolver(&self) -> &FontResolver {
        &self.resolver
    }

    /// Resolve fonts and measure every styled run.
    pub fn shape<M>(&self, styled: &StyledText, measurer: &M) -> Vec<RunItem>
    where
        M: TextMeasurer + ?Sized,
    {
        let mut items = Vec::with_capacity(styled.items().len());
        for item in styled.iter() {
            match item {
                StyledItem::Run(run) => {
                    let spans = self.resolver.resolve(
                        &run.text,
                        run.style.font_family.as_deref(),
                        &run.style,
                        measurer,
                    );
                    for span in spans {
                        let Some(text) = run.text.get(span.range.clone()) else {
                            continue;
                        };
                        let mut shaped = TextRun::measure(
                            text.to_string(),
                            run.style.clone(),
                            span.font,
                            measurer,
                        );
                        shaped.last_resort = span.last_resort;
                        items.push(RunItem::Run(shaped));
                    }
                }
                StyledItem::LineBreak(style) => {
                    let font = self.resolver.primary_font(style);
                    items.push(RunItem::LineBreak(
                        measurer.font_metrics(&font, style.size_px),
                    ));
                }
            }
        }
        items
    }

    /// Lay out styled text, wrapping at whitespace when `max_width` is set.
    pub fn layout<M>(&self, styled: &StyledText, measurer: &M, max_width: Option<f32>) -> LayoutResult
    where
        M: TextMeasurer + ?Sized,
    {
        self.layout_items(self.shape(styled, measurer), max_width)
    }

    /// Break pre-shaped runs into lines.
    pub fn layout_items(&self, items: Vec<RunItem>, max_width: Option<f32>) -> LayoutResult {
        let max_width = max_width.filter(|w| w.is_finite() && *w > 0.0);
        let mut breaker = LineBreaker::new(self.cfg, max_width);
        let mut ends_with_break = None;
        let mut last_metrics = FontMetrics::default();
        for item in items {
            match item {
                RunItem::Run(run) => {
                    last_metrics = run.metrics;
                    breaker.push_run(run);
                    ends_with_break = None;
                }
                RunItem::LineBreak(metrics) => {
                    breaker.finish_line(true, metrics);
                    ends_with_break = Some(metrics);
                }
            }
        }
        if let Some(metrics) = ends_with_break {
            breaker.finish_line(false, metrics);
        } else if breaker.has_pending() {
            breaker.finish_line(false, last_metrics);
        }
        let out = breaker.into_result();
        log::trace!(
            "layout: {} run(s), {} line(s), {:.2}x{:.2}",
            out.runs.len(),
            out.lines.len(),
            out.width,
            out.height
        );
        out
    }
}

/// Clusters `clusters` of run `run`.
#[derive(Clone, Debug)]
struct Segment {
    run: usize,
    clusters: Range<usize>,
    width: f32,
    is_space: bool,
}

/// A word and the whitespace that follows it; the unit of wrapping.
#[derive(Default)]
struct PendingWord {
    segments: Vec<Segment>,
    width: f32,
    trailing_space: f32,
}

impl PendingWord {
    fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push(&mut self, seg: Segment) {
        if seg.is_space {
            self.trailing_space += seg.width;
        } else {
            self.width += seg.width;
        }
        self.segments.push(seg);
    }
}

#[derive(Default)]
struct PendingLine {
    segments: Vec<Segment>,
    /// Width up to the end of the last non-space segment.
    width: f32,
    /// Whitespace after `width`; counted only if more text follows.
    trailing_space: f32,
    has_ink: bool,
}

struct LineBreaker {
    cfg: LayoutConfig,
    max_width: Option<f32>,
    runs: Vec<TextRun>,
    pieces: Vec<RunPiece>,
    lines: Vec<Line>,
    line: PendingLine,
    word: PendingWord,
    y: f32,
}

impl LineBreaker {
    fn new(cfg: LayoutConfig, max_width: Option<f32>) -> Self {
        Self {
            cfg,
            max_width,
            runs: Vec::new(),
            pieces: Vec::new(),
            lines: Vec::new(),
            line: PendingLine::default(),
            word: PendingWord::default(),
            y: 0.0,
        }
    }

    fn has_pending(&self) -> bool {
        !self.word.is_empty() || !self.line.segments.is_empty()
    }

    fn push_run(&mut self, run: TextRun) {
        let run_idx = self.runs.len();
        let mut segments: Vec<Segment> = Vec::with_capacity(4);
        for (idx, cluster) in run.clusters.iter().enumerate() {
            match segments.last_mut() {
                Some(seg) if seg.is_space == cluster.is_space => {
                    seg.clusters.end = idx + 1;
                    seg.width += cluster.advance;
                }
                _ => segments.push(Segment {
                    run: run_idx,
                    clusters: idx..idx + 1,
                    width: cluster.advance,
                    is_space: cluster.is_space,
                }),
            }
        }
        self.runs.push(run);
        for seg in segments {
            self.push_segment(seg);
        }
    }

    fn push_segment(&mut self, seg: Segment) {
        // Ink after whitespace starts a new word; the previous one is complete.
        if !seg.is_space && self.word.segments.last().is_some_and(|s| s.is_space) {
            self.commit_word();
        }
        self.word.push(seg);
    }

    fn commit_word(&mut self) {
        let word = std::mem::take(&mut self.word);
        if word.is_empty() {
            return;
        }
        let has_ink = word.segments.iter().any(|s| !s.is_space);
        if let Some(max_width) = self.max_width {
            let needed = self.line.width + self.line.trailing_space + word.width;
            if has_ink && self.line.has_ink && needed > max_width + LAYOUT_EPSILON {
                self.finish_line(false, FontMetrics::default());
            }
        }
        if has_ink {
            self.line.width += self.line.trailing_space + word.width;
            self.line.trailing_space = word.trailing_space;
            self.line.has_ink = true;
        } else {
            self.line.trailing_space += word.trailing_space;
        }
        self.line.segments.extend(word.segments);
    }

    fn finish_line(&mut self, hard_break: bool, fallback: FontMetrics) {
        self.commit_word();
        let mut line = std::mem::take(&mut self.line);
        while line.segments.last().is_some_and(|s| s.is_space) {
            line.segments.pop();
        }

        let first_piece = self.pieces.len();
        let mut x = 0.0f32;
        for seg in line.segments {
            let contiguous = self.pieces.len() > first_piece
                && self.pieces.last().is_some_and(|p| p.run == seg.run);
            let range = self.byte_range(seg.run, &seg.clusters);
            match self.pieces.last_mut() {
                Some(piece) if contiguous && piece.range.end == range.start => {
                    piece.range.end = range.end;
                    piece.width += seg.width;
                }
                _ => self.pieces.push(RunPiece {
                    run: seg.run,
                    range,
                    x,
                    width: seg.width,
                }),
            }
            x += seg.width;
        }
        let pieces = first_piece..self.pieces.len();

        let mut ascent = 0.0f32;
        let mut descent = 0.0f32;
        let mut explicit_align = None;
        let mut first_align = None;
        for piece in &self.pieces[pieces.clone()] {
            let Some(run) = self.run(piece.run) else {
                continue;
            };
            ascent = ascent.max(run.metrics.ascent);
            descent = descent.max(run.metrics.descent);
            if explicit_align.is_none() && run.style.align_explicit {
                explicit_align = Some(run.style.align);
            }
            if first_align.is_none() {
                first_align = Some(run.style.align);
            }
        }
        if pieces.is_empty() {
            ascent = fallback.ascent;
            descent = fallback.descent;
        }
        let align = explicit_align
            .or(first_align)
            .unwrap_or(self.cfg.default_align);

        let content = ascent + descent;
        let height = content * self.cfg.line_spacing;
        let top = self.y;
        let baseline = top + (height - content) / 2.0 + ascent;
        self.y += height;
        self.lines.push(Line {
            pieces,
            align,
            x_offset: align_offset(align, x, self.max_width),
            top,
            baseline,
            width: x,
            height,
            ascent,
            descent,
            hard_break,
        });
    }

    fn run(&self, idx: usize) -> Option<&TextRun> {
        self.runs.get(idx)
    }

    fn byte_range(&self, run: usize, clusters: &Range<usize>) -> Range<usize> {
        self.run(run)
            .map(|r| r.byte_range(clusters))
            .unwrap_or(0..0)
    }

    fn into_result(self) -> LayoutResult {
        let width = self.lines.iter().map(|l| l.width).fold(0.0f32, f32::max);
        let ascent = self.lines.first().map(|l| l.baseline).unwrap_or(0.0);
        let descent = self
            .lines
            .last()
            .map(|l| self.y - l.baseline)
            .unwrap_or(0.0);
        LayoutResult {
            runs: self.runs,
            pieces: self.pieces,
            lines: self.lines,
            width,
            height: self.y,
            ascent,
            descent,
            max_width: self.max_width,
        }
    }
}
