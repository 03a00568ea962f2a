use core::convert::Infallible;
use std::path::Path;

use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use image::{Rgba as ImagePixel, RgbaImage};
use tagtext::Rgba;

/// In-memory RGBA raster that embedded-graphics can draw into.
///
/// Drawn pixels are opaque; out-of-bounds pixels are dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterImage {
    image: RgbaImage,
}

impl RasterImage {
    /// Create a raster filled with `background`.
    pub fn new(width: u32, height: u32, background: Rgba) -> Self {
        let fill = ImagePixel([background.r, background.g, background.b, background.a]);
        Self {
            image: RgbaImage::from_pixel(width, height, fill),
        }
    }

    /// Wrap an existing image.
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel at `(x, y)`, if inside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.image
            .get_pixel_checked(x, y)
            .map(|p| Rgba::new(p.0[0], p.0[1], p.0[2], p.0[3]))
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encode as PNG at `path`.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
    }
}

impl OriginDimensions for RasterImage {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for RasterImage {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = (self.image.width(), self.image.height());
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x >= w || y >= h {
                continue;
            }
            self.image
                .put_pixel(x, y, ImagePixel([color.r(), color.g(), color.b(), 255]));
        }
        Ok(())
    }
}
