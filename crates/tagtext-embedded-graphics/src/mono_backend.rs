use core::fmt;
use std::borrow::Cow;

use embedded_graphics::{
    mono_font::{
        ascii, iso_8859_1, iso_8859_5, iso_8859_7, mapping::GlyphMapping, MonoFont,
        MonoTextStyle,
    },
    pixelcolor::Rgb888,
    prelude::*,
    primitives::Rectangle,
    text::{Baseline, Text},
};
use tagtext_render::{FontHandle, FontMetrics};

/// Why font mapping had to fall back from the exact request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontFallbackReason {
    /// Family is not a charset the backend knows; Latin-1 glyphs are used.
    UnknownFamily,
    /// No bold-italic face exists; bold is used.
    UnsupportedWeightItalic,
    /// Requested size is below the smallest face.
    SizeOutOfRange,
}

/// Resolved face for a font request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontSelection<F> {
    pub face: F,
    pub fallback_reason: Option<FontFallbackReason>,
}

/// Font abstraction used by the measurer and canvas.
pub trait FontBackend {
    /// Backend-local face handle.
    type Face: Copy;

    fn resolve_font(&self, font: &FontHandle, size_px: f32) -> FontSelection<Self::Face>;

    fn metrics(&self, face: Self::Face) -> FontMetrics;

    /// Advance of `text` in pixels.
    fn advance(&self, face: Self::Face, text: &str) -> f32;

    /// Whether `font` has real glyphs (not the replacement) for `cluster`.
    fn covers(&self, font: &FontHandle, cluster: &str) -> bool;

    /// Draw `text` with its baseline at `origin`; returns the advance.
    fn draw_text_run<D>(
        &self,
        display: &mut D,
        face: Self::Face,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>;
}

/// Character repertoire of a mono font family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Charset {
    Ascii,
    Latin1,
    Greek,
    Cyrillic,
}

impl Charset {
    /// Map a family name to a charset. Generic names map to Latin-1.
    pub fn from_family(family: &str) -> Option<Self> {
        match family.trim().to_ascii_lowercase().as_str() {
            "ascii" | "us-ascii" => Some(Self::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" | "mono" | "monospace" | "fixed" | "serif"
            | "sans-serif" => Some(Self::Latin1),
            "greek" | "iso-8859-7" => Some(Self::Greek),
            "cyrillic" | "iso-8859-5" => Some(Self::Cyrillic),
            _ => None,
        }
    }

    fn ladders(self) -> &'static Ladders {
        match self {
            Self::Ascii => &ASCII,
            Self::Latin1 => &LATIN1,
            Self::Greek => &GREEK,
            Self::Cyrillic => &CYRILLIC,
        }
    }
}

/// Faces of one charset ordered by height.
struct Ladders {
    regular: &'static [&'static MonoFont<'static>],
    bold: &'static [&'static MonoFont<'static>],
    italic: &'static [&'static MonoFont<'static>],
}

macro_rules! ladders {
    ($cs:ident) => {
        Ladders {
            regular: &[
                &$cs::FONT_4X6,
                &$cs::FONT_5X7,
                &$cs::FONT_5X8,
                &$cs::FONT_6X9,
                &$cs::FONT_6X10,
                &$cs::FONT_6X12,
                &$cs::FONT_6X13,
                &$cs::FONT_7X13,
                &$cs::FONT_7X14,
                &$cs::FONT_8X13,
                &$cs::FONT_9X15,
                &$cs::FONT_9X18,
                &$cs::FONT_10X20,
            ],
            bold: &[
                &$cs::FONT_6X13_BOLD,
                &$cs::FONT_7X13_BOLD,
                &$cs::FONT_7X14_BOLD,
                &$cs::FONT_8X13_BOLD,
                &$cs::FONT_9X15_BOLD,
                &$cs::FONT_9X18_BOLD,
            ],
            italic: &[
                &$cs::FONT_6X13_ITALIC,
                &$cs::FONT_7X13_ITALIC,
                &$cs::FONT_8X13_ITALIC,
            ],
        }
    };
}

const ASCII: Ladders = ladders!(ascii);
const LATIN1: Ladders = ladders!(iso_8859_1);
const GREEK: Ladders = ladders!(iso_8859_7);
const CYRILLIC: Ladders = ladders!(iso_8859_5);

/// A mono font drawn at an integer pixel scale.
#[derive(Clone, Copy)]
pub struct MonoFace {
    pub font: &'static MonoFont<'static>,
    pub scale: u32,
}

impl MonoFace {
    /// Rendered cell height in pixels.
    pub fn height(&self) -> u32 {
        self.font.character_size.height * self.scale
    }

    /// Rendered cell advance in pixels.
    pub fn cell_advance(&self) -> u32 {
        (self.font.character_size.width + self.font.character_spacing) * self.scale
    }
}

impl fmt::Debug for MonoFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonoFace")
            .field("character_size", &self.font.character_size)
            .field("scale", &self.scale)
            .finish()
    }
}

impl PartialEq for MonoFace {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.font, other.font) && self.scale == other.scale
    }
}

/// Backend over the embedded-graphics bitmap fonts.
///
/// Sizes larger than the biggest face are reached by integer upscaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonoFontBackend {
    max_scale: u32,
}

impl Default for MonoFontBackend {
    fn default() -> Self {
        Self { max_scale: 8 }
    }
}

impl MonoFontBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap integer upscaling; 1 disables it.
    pub fn with_max_scale(mut self, max_scale: u32) -> Self {
        self.max_scale = max_scale.max(1);
        self
    }

    fn charset_for(family: &str) -> (Charset, Option<FontFallbackReason>) {
        match Charset::from_family(family) {
            Some(charset) => (charset, None),
            None => (Charset::Latin1, Some(FontFallbackReason::UnknownFamily)),
        }
    }

    fn ladder_for(
        charset: Charset,
        bold: bool,
        italic: bool,
    ) -> (&'static [&'static MonoFont<'static>], Option<FontFallbackReason>) {
        let ladders = charset.ladders();
        match (bold, italic) {
            (true, true) => (
                ladders.bold,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            (true, false) => (ladders.bold, None),
            (false, true) => (ladders.italic, None),
            (false, false) => (ladders.regular, None),
        }
    }

    /// Tallest face (at any allowed scale) not taller than `size_px`.
    fn pick_face(&self, ladder: &[&'static MonoFont<'static>], size_px: f32) -> Option<MonoFace> {
        let mut best: Option<MonoFace> = None;
        for scale in 1..=self.max_scale {
            for &font in ladder {
                let face = MonoFace { font, scale };
                if face.height() as f32 > size_px + 1e-3 {
                    continue;
                }
                if best.is_none_or(|b| face.height() > b.height()) {
                    best = Some(face);
                }
            }
        }
        best
    }
}

impl FontBackend for MonoFontBackend {
    type Face = MonoFace;

    fn resolve_font(&self, font: &FontHandle, size_px: f32) -> FontSelection<MonoFace> {
        let (charset, family_reason) = Self::charset_for(&font.family);
        let (ladder, variant_reason) = Self::ladder_for(charset, font.bold, font.italic);
        let mut fallback_reason = family_reason.or(variant_reason);
        let face = match self.pick_face(ladder, size_px) {
            Some(face) => face,
            None => {
                fallback_reason = fallback_reason.or(Some(FontFallbackReason::SizeOutOfRange));
                MonoFace {
                    font: ladder.first().copied().unwrap_or(&ascii::FONT_6X10),
                    scale: 1,
                }
            }
        };
        FontSelection {
            face,
            fallback_reason,
        }
    }

    fn metrics(&self, face: MonoFace) -> FontMetrics {
        let baseline = face.font.baseline.min(face.font.character_size.height);
        FontMetrics {
            ascent: (baseline * face.scale) as f32,
            descent: ((face.font.character_size.height - baseline) * face.scale) as f32,
        }
    }

    fn advance(&self, face: MonoFace, text: &str) -> f32 {
        let chars = normalize_text_for_mono(text).chars().count() as u32;
        (chars * face.cell_advance()) as f32
    }

    fn covers(&self, font: &FontHandle, cluster: &str) -> bool {
        let Some(charset) = Charset::from_family(&font.family) else {
            return false;
        };
        let (ladder, _) = Self::ladder_for(charset, font.bold, font.italic);
        let Some(face) = ladder.first() else {
            return false;
        };
        let mapping = face.glyph_mapping;
        let replacement = mapping.index('?');
        normalize_text_for_mono(cluster)
            .chars()
            .all(|ch| ch == ' ' || ch == '?' || mapping.index(ch) != replacement)
    }

    fn draw_text_run<D>(
        &self,
        display: &mut D,
        face: MonoFace,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let style = MonoTextStyle::new(face.font, color);
        let normalized = normalize_text_for_mono(text);
        if face.scale <= 1 {
            Text::with_baseline(normalized.as_ref(), origin, style, Baseline::Alphabetic)
                .draw(display)?;
        } else {
            let mut upscaled = Upscale {
                target: display,
                origin,
                scale: face.scale as i32,
            };
            Text::with_baseline(normalized.as_ref(), Point::zero(), style, Baseline::Alphabetic)
                .draw(&mut upscaled)?;
        }
        Ok(normalized.chars().count() as i32 * face.cell_advance() as i32)
    }
}

/// Draws every pixel as a `scale` x `scale` block anchored at `origin`.
struct Upscale<'a, D> {
    target: &'a mut D,
    origin: Point,
    scale: i32,
}

impl<D: DrawTarget> Dimensions for Upscale<'_, D> {
    fn bounding_box(&self) -> Rectangle {
        self.target.bounding_box()
    }
}

impl<D: DrawTarget> DrawTarget for Upscale<'_, D> {
    type Color = D::Color;
    type Error = D::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let block = Size::new(self.scale as u32, self.scale as u32);
        for Pixel(point, color) in pixels {
            let at = self.origin + point * self.scale;
            self.target.fill_solid(&Rectangle::new(at, block), color)?;
        }
        Ok(())
    }
}

/// Replace typographic punctuation the bitmap fonts lack with ASCII.
pub fn normalize_text_for_mono(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|ch| {
        matches!(
            ch,
            '\t' | '\u{00A0}' // nbsp
                | '\u{2013}' // en dash
                | '\u{2014}' // em dash
                | '\u{2018}' // left single quote
                | '\u{2019}' // right single quote
                | '\u{201C}' // left double quote
                | '\u{201D}' // right double quote
                | '\u{2026}' // ellipsis
        )
    }) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\t' | '\u{00A0}' => out.push(' '),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
