use core::fmt;
use std::sync::OnceLock;

use embedded_graphics::{pixelcolor::Rgb888, prelude::DrawTarget};
use tagtext::Rgba;
use tagtext_render::{
    BoxRect, FitOptions, FitOutcome, FontFallbackList, GlyphCoverageCache, LayoutResult,
    Point as TextPoint, TextConfigError, TextEngine, TextOptions,
};

use crate::eg_canvas::{EgCanvas, EgTextMeasurer};
use crate::raster::RasterImage;

/// Families used when neither the options nor the process name any.
///
/// These are the mono backend's charset names, ordered so Latin text
/// resolves to the widest charset first.
pub const EG_FALLBACK_FAMILIES: &[&str] = &["latin1", "greek", "cyrillic", "ascii"];

/// Largest raster side produced by the image entry points.
pub const MAX_IMAGE_SIDE: u32 = 16_384;

static COVERAGE_CACHE: OnceLock<GlyphCoverageCache> = OnceLock::new();

fn shared_coverage_cache() -> GlyphCoverageCache {
    COVERAGE_CACHE.get_or_init(GlyphCoverageCache::default).clone()
}

fn engine_for(opts: &TextOptions) -> Result<TextEngine, TextConfigError> {
    let opts = if opts.font_families.is_empty() && FontFallbackList::installed().is_none() {
        opts.clone()
            .with_font_families(EG_FALLBACK_FAMILIES.iter().copied())
    } else {
        opts.clone()
    };
    Ok(TextEngine::new(opts)?.with_coverage_cache(shared_coverage_cache()))
}

/// Errors from the raster entry points.
#[derive(Debug, Clone, PartialEq)]
pub enum TextImageError {
    Config(TextConfigError),
    /// Requested or computed raster exceeds [`MAX_IMAGE_SIDE`].
    ImageTooLarge { width: u32, height: u32 },
    /// Target box has no drawable area after padding.
    EmptyBox { width: f32, height: f32 },
}

impl fmt::Display for TextImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextImageError::Config(err) => write!(f, "{}", err),
            TextImageError::ImageTooLarge { width, height } => write!(
                f,
                "image {}x{} exceeds the {} px side limit",
                width, height, MAX_IMAGE_SIDE
            ),
            TextImageError::EmptyBox { width, height } => {
                write!(f, "box {:.1}x{:.1} has no room for text", width, height)
            }
        }
    }
}

impl std::error::Error for TextImageError {}

impl From<TextConfigError> for TextImageError {
    fn from(err: TextConfigError) -> Self {
        TextImageError::Config(err)
    }
}

/// Errors from drawing into a caller-owned target.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawTextError<E> {
    Config(TextConfigError),
    Target(E),
}

impl<E: fmt::Debug> fmt::Display for DrawTextError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawTextError::Config(err) => write!(f, "{}", err),
            DrawTextError::Target(err) => write!(f, "draw target error: {:?}", err),
        }
    }
}

impl<E: fmt::Debug> std::error::Error for DrawTextError<E> {}

impl<E> From<TextConfigError> for DrawTextError<E> {
    fn from(err: TextConfigError) -> Self {
        DrawTextError::Config(err)
    }
}

/// Raster sized to its text, plus the layout painted into it.
#[derive(Clone, Debug)]
pub struct TextImage {
    pub image: RasterImage,
    pub layout: LayoutResult,
}

/// Fixed-size raster with text fitted into it.
#[derive(Clone, Debug)]
pub struct FittedImage {
    pub image: RasterImage,
    pub outcome: FitOutcome,
}

fn raster_side(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.ceil().min(u32::MAX as f32) as u32
    } else {
        0
    }
}

fn new_raster(width: u32, height: u32, background: Option<Rgba>) -> Result<RasterImage, TextImageError> {
    if width > MAX_IMAGE_SIDE || height > MAX_IMAGE_SIDE {
        return Err(TextImageError::ImageTooLarge { width, height });
    }
    Ok(RasterImage::new(
        width,
        height,
        background.unwrap_or(Rgba::TRANSPARENT),
    ))
}

/// Render `text` at its base size into a raster just large enough to hold
/// it plus padding.
pub fn text_to_image(text: &str, opts: &TextOptions) -> Result<TextImage, TextImageError> {
    let engine = engine_for(opts)?;
    let measurer = EgTextMeasurer::new();
    let layout = engine.layout(text, &measurer);
    let (w, h) = engine.padded_size(&layout);
    let mut image = new_raster(raster_side(w), raster_side(h), opts.background)?;
    let mut canvas = EgCanvas::new(&mut image);
    let origin = TextPoint::new(opts.padding.left, opts.padding.top);
    engine
        .paint(&layout, &mut canvas, origin)
        .unwrap_or_else(|never| match never {});
    let diag = canvas.diagnostics();
    if diag.total() > 0 {
        log::debug!("text_to_image font fallbacks: {:?}", diag);
    }
    Ok(TextImage { image, layout })
}

/// Render `text` into a `width` x `height` raster, shrinking it to fit the
/// padded interior.
pub fn fit_text_to_image(
    text: &str,
    width: u32,
    height: u32,
    opts: &TextOptions,
    fit: &FitOptions,
) -> Result<FittedImage, TextImageError> {
    let rect = BoxRect::new(
        opts.padding.left,
        opts.padding.top,
        width as f32 - opts.padding.horizontal(),
        height as f32 - opts.padding.vertical(),
    );
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return Err(TextImageError::EmptyBox {
            width: rect.width,
            height: rect.height,
        });
    }
    let mut image = new_raster(width, height, opts.background)?;
    let outcome = draw_text_in_box(&mut image, text, rect, opts, fit).map_err(|err| match err {
        DrawTextError::Config(err) => TextImageError::Config(err),
        DrawTextError::Target(never) => match never {},
    })?;
    Ok(FittedImage { image, outcome })
}

/// Fit `text` into `rect` on an existing target and paint it.
pub fn draw_text_in_box<D>(
    display: &mut D,
    text: &str,
    rect: BoxRect,
    opts: &TextOptions,
    fit: &FitOptions,
) -> Result<FitOutcome, DrawTextError<D::Error>>
where
    D: DrawTarget<Color = Rgb888>,
{
    fit.validate()?;
    let engine = engine_for(opts)?;
    let outcome = engine.fit(text, &EgTextMeasurer::new(), rect, fit);
    let at = engine.place_in_box(&outcome.layout, rect, fit);
    let mut canvas = EgCanvas::new(display);
    engine
        .paint(&outcome.layout, &mut canvas, at)
        .map_err(DrawTextError::Target)?;
    Ok(outcome)
}

/// Lay out `text` at its base size and paint it with its top-left corner at
/// `origin`. Padding is not applied.
pub fn draw_text_at<D>(
    display: &mut D,
    text: &str,
    origin: TextPoint,
    opts: &TextOptions,
) -> Result<LayoutResult, DrawTextError<D::Error>>
where
    D: DrawTarget<Color = Rgb888>,
{
    let engine = engine_for(opts)?;
    let mut canvas = EgCanvas::new(display);
    let layout = engine.layout(text, &canvas);
    engine
        .paint(&layout, &mut canvas, origin)
        .map_err(DrawTextError::Target)?;
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_tracks_text_and_padding() {
        let opts = TextOptions::default().with_base_size(20.0);
        let out = text_to_image("abcd", &opts).expect("image");
        assert_eq!(out.image.width(), 60);
        assert_eq!(out.layout.lines().len(), 1);
        assert!(out.image.height() >= 40);
    }

    #[test]
    fn empty_text_is_padding_only() {
        let opts = TextOptions::default().with_padding(tagtext_render::Padding::uniform(4.0));
        let out = text_to_image("", &opts).expect("image");
        assert_eq!((out.image.width(), out.image.height()), (8, 8));
        assert!(out.layout.is_empty());
    }

    #[test]
    fn padding_larger_than_box_is_rejected() {
        let err = fit_text_to_image("x", 15, 100, &TextOptions::default(), &FitOptions::default())
            .expect_err("empty box");
        assert!(matches!(err, TextImageError::EmptyBox { .. }));
    }

    #[test]
    fn oversized_image_is_rejected() {
        let err = fit_text_to_image(
            "x",
            MAX_IMAGE_SIDE + 1,
            100,
            &TextOptions::default(),
            &FitOptions::default(),
        )
        .expect_err("too large");
        assert_eq!(
            err,
            TextImageError::ImageTooLarge {
                width: MAX_IMAGE_SIDE + 1,
                height: 100
            }
        );
    }

    #[test]
    fn invalid_fit_options_surface_as_config_errors() {
        let fit = FitOptions::default().with_sizes(0.0, 10.0);
        let err = fit_text_to_image("x", 100, 100, &TextOptions::default(), &fit)
            .expect_err("invalid");
        assert!(matches!(
            err,
            TextImageError::Config(TextConfigError::InvalidSize { field: "min_size", .. })
        ));
    }
}
