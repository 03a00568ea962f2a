//! embedded-graphics backend for `tagtext-render`.
//!
//! [`EgTextMeasurer`] and [`EgCanvas`] adapt a [`FontBackend`] to the
//! measurement and painting seams of the layout pipeline. The default
//! [`MonoFontBackend`] uses the bitmap fonts bundled with embedded-graphics,
//! upscaled by whole pixels for large sizes. [`text_to_image`] and
//! [`fit_text_to_image`] rasterize markup into PNG-ready images.

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

mod eg_canvas;
mod image_text;
mod mono_backend;
mod raster;

pub use eg_canvas::{EgCanvas, EgTextMeasurer, TextFallbackDiagnostics};
pub use image_text::{
    draw_text_at, draw_text_in_box, fit_text_to_image, text_to_image, DrawTextError,
    FittedImage, TextImage, TextImageError, EG_FALLBACK_FAMILIES, MAX_IMAGE_SIDE,
};
pub use mono_backend::{
    normalize_text_for_mono, Charset, FontBackend, FontFallbackReason, FontSelection, MonoFace,
    MonoFontBackend,
};
pub use raster::RasterImage;
