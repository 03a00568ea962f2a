//! Font fallback, layout, auto-fit, and painting for `tagtext`.
//!
//! The pipeline is backend-agnostic: measurement goes through
//! [`TextMeasurer`] and output through [`Canvas`]. See
//! `tagtext-embedded-graphics` for a raster backend.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod auto_fit;
mod canvas;
mod error;
mod font_resolve;
mod render_engine;
mod render_layout;
mod render_paint;

pub use auto_fit::{FitOutcome, FitRequest, FIT_SIZE_STEP_PX, MAX_FIT_ITERATIONS};
pub use canvas::{Canvas, FontHandle, FontMetrics, PaintMode, Point, TextMeasurer, TextPaint};
pub use error::TextConfigError;
pub use font_resolve::{
    FontFallbackList, FontResolver, FontSpan, GlyphCoverageCache, DEFAULT_FALLBACK_FONTS,
    DEFAULT_LAST_RESORT_FONT,
};
pub use render_engine::{
    BoxRect, FitOptions, Padding, TextDiagnostic, TextEngine, TextOptions, VAlign,
};
pub use render_layout::{
    align_offset, ClusterAdvance, LayoutConfig, LayoutEngine, LayoutResult, Line, RunItem,
    RunPiece, TextRun, DEFAULT_LINE_SPACING, LAYOUT_EPSILON,
};
pub use render_paint::{render, PaintConfig, Renderer};
pub use tagtext::{Align, Rgba, Span, Style, StyledText};
