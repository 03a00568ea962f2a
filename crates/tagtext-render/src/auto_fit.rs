use tagtext::{Span, Style, StyledText};

use crate::canvas::TextMeasurer;
use crate::render_layout::{LayoutEngine, LayoutResult};

/// Candidate sizes are `min_size + k * FIT_SIZE_STEP_PX`.
pub const FIT_SIZE_STEP_PX: f32 = 0.25;

/// Upper bound on trial layouts per fit.
pub const MAX_FIT_ITERATIONS: u32 = 20;

/// Largest grid index reachable within the iteration budget (two endpoint
/// probes plus a binary search over the rest).
const MAX_FIT_STEPS: u32 = 1 << (MAX_FIT_ITERATIONS - 2);

/// Target box and size range for [`LayoutEngine::fit_to_box`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitRequest {
    pub width: f32,
    pub height: f32,
    pub min_size: f32,
    pub max_size: f32,
    /// Wrap lines at `width` while fitting.
    pub allow_wrap: bool,
}

impl FitRequest {
    pub fn new(width: f32, height: f32, min_size: f32, max_size: f32) -> Self {
        Self {
            width,
            height,
            min_size,
            max_size,
            allow_wrap: false,
        }
    }

    pub fn with_wrap(mut self, allow_wrap: bool) -> Self {
        self.allow_wrap = allow_wrap;
        self
    }
}

/// Result of fitting text to a box.
#[derive(Clone, Debug, PartialEq)]
pub struct FitOutcome {
    /// Multiplier applied to every size in the styled text.
    pub scale: f32,
    /// Base font size the scale corresponds to.
    pub size_px: f32,
    pub layout: LayoutResult,
    /// The text does not fit even at `min_size`.
    pub overflow: bool,
    /// Trial layouts performed.
    pub iterations: u32,
}

impl LayoutEngine {
    /// Auto fit over an already parsed span tree.
    pub fn fit_to_box<M>(
        &self,
        root: &Span,
        base: &Style,
        measurer: &M,
        request: &FitRequest,
    ) -> FitOutcome
    where
        M: TextMeasurer + ?Sized,
    {
        let styled = StyledText::from_span(root, base);
        self.fit_styled(&styled, base.size_px, measurer, request)
    }

    /// Largest base size on the grid whose layout fits the request box.
    ///
    /// `base_size` is the size `styled` was resolved at; every trial scales
    /// all sizes, including `[size]` overrides, by `candidate / base_size`.
    pub fn fit_styled<M>(
        &self,
        styled: &StyledText,
        base_size: f32,
        measurer: &M,
        request: &FitRequest,
    ) -> FitOutcome
    where
        M: TextMeasurer + ?Sized,
    {
        let base_size = positive_or(base_size, 1.0);
        let min_size = positive_or(request.min_size, FIT_SIZE_STEP_PX);
        let max_size = positive_or(request.max_size, min_size).max(min_size);
        let steps = (((max_size - min_size) / FIT_SIZE_STEP_PX).floor() as u32).min(MAX_FIT_STEPS);
        let wrap = request.allow_wrap.then_some(request.width);

        let mut iterations = 0u32;
        let mut trial = |k: u32| {
            iterations += 1;
            let size = min_size + k as f32 * FIT_SIZE_STEP_PX;
            let layout = self.layout(&styled.scaled(size / base_size), measurer, wrap);
            let fits = layout.fits(request.width, request.height);
            log::debug!(
                "fit trial {}: size {:.2} -> {:.2}x{:.2} in {:.2}x{:.2} fits={}",
                iterations,
                size,
                layout.width,
                layout.height,
                request.width,
                request.height,
                fits
            );
            (size, layout, fits)
        };

        let (mut best_size, mut best_layout, fits) = trial(0);
        if !fits {
            log::debug!("text overflows at minimum size {:.2}", min_size);
            return FitOutcome {
                scale: best_size / base_size,
                size_px: best_size,
                layout: best_layout,
                overflow: true,
                iterations,
            };
        }

        let mut lo = 0u32;
        let mut hi = steps;
        if steps > 0 {
            let (size, layout, fits) = trial(steps);
            if fits {
                lo = steps;
                best_size = size;
                best_layout = layout;
            }
        }
        // Invariant: grid index `lo` fits and `hi` does not (unless lo == hi).
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            let (size, layout, fits) = trial(mid);
            if fits {
                lo = mid;
                best_size = size;
                best_layout = layout;
            } else {
                hi = mid;
            }
        }

        FitOutcome {
            scale: best_size / base_size,
            size_px: best_size,
            layout: best_layout,
            overflow: false,
            iterations,
        }
    }
}

fn positive_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
