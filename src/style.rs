//! Style resolution: flattens a span tree into styled runs.

use core::fmt;
use std::sync::Arc;

use crate::color::Rgba;
use crate::markup::{self, Span, Tag};

/// Horizontal line alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Parse `left`, `center`, or `right` case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Align {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        })
    }
}

/// Fully resolved text style.
///
/// Every attribute holds a concrete value; inheritance is already applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    /// Fill color.
    pub color: Rgba,
    /// Stroke color, if the run is outlined.
    pub stroke: Option<Rgba>,
    /// Requested family; `None` uses the fallback list only.
    pub font_family: Option<Arc<str>>,
    /// Font size in pixels.
    pub size_px: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    /// Line alignment.
    pub align: Align,
    /// Whether `align` came from an `[align]` tag rather than the base style.
    pub align_explicit: bool,
}

impl Style {
    /// Default style at the given size.
    pub fn with_size(size_px: f32) -> Self {
        Self {
            size_px,
            ..Self::default()
        }
    }

    /// Copy of this style with its size multiplied by `scale`.
    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            size_px: self.size_px * scale,
            ..self.clone()
        }
    }

    /// Apply a single tag override.
    pub fn apply(&self, tag: &Tag) -> Self {
        let mut next = self.clone();
        match tag {
            Tag::Bold => next.bold = true,
            Tag::Italic => next.italic = true,
            Tag::Underline => next.underline = true,
            Tag::Strikethrough => next.strikethrough = true,
            Tag::Color(color) => next.color = *color,
            Tag::Stroke(color) => next.stroke = Some(*color),
            Tag::Font(family) => next.font_family = Some(Arc::from(family.as_str())),
            Tag::Size(size) => next.size_px = *size,
            Tag::Align(align) => {
                next.align = *align;
                next.align_explicit = true;
            }
        }
        next
    }
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: Rgba::BLACK,
            stroke: None,
            font_family: None,
            size_px: 30.0,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            align: Align::Left,
            align_explicit: false,
        }
    }
}

/// Text sharing one resolved style.
#[derive(Clone, Debug, PartialEq)]
pub struct StyledRun {
    pub text: String,
    pub style: Style,
}

/// Item of a flattened styled sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum StyledItem {
    /// Styled text run.
    Run(StyledRun),
    /// Hard line break; carries the style in effect for empty-line metrics.
    LineBreak(Style),
}

/// Flattened styled text ready for font resolution and layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyledText {
    items: Vec<StyledItem>,
}

impl StyledText {
    /// Parse markup and flatten it against `base`.
    pub fn from_markup(markup: &str, base: &Style) -> Self {
        Self::from_span(&markup::parse(markup), base)
    }

    /// Treat `text` literally (no tags) with a single base style.
    pub fn plain(text: &str, base: &Style) -> Self {
        Self::from_span(&markup::literal(text), base)
    }

    /// Flatten a parsed span tree against `base`.
    pub fn from_span(root: &Span, base: &Style) -> Self {
        Self {
            items: flatten(root, base),
        }
    }

    /// Build from pre-collected items.
    pub fn from_items(items: Vec<StyledItem>) -> Self {
        Self { items }
    }

    /// Iterate all items.
    pub fn iter(&self) -> impl Iterator<Item = &StyledItem> {
        self.items.iter()
    }

    /// Iterate only text runs.
    pub fn runs(&self) -> impl Iterator<Item = &StyledRun> {
        self.items.iter().filter_map(|item| match item {
            StyledItem::Run(run) => Some(run),
            StyledItem::LineBreak(_) => None,
        })
    }

    pub fn items(&self) -> &[StyledItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Text content; line breaks become `\n`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                StyledItem::Run(run) => out.push_str(&run.text),
                StyledItem::LineBreak(_) => out.push('\n'),
            }
        }
        out
    }

    /// Copy with every size (base and `[size]` overrides) multiplied by `scale`.
    pub fn scaled(&self, scale: f32) -> Self {
        let items = self
            .items
            .iter()
            .map(|item| match item {
                StyledItem::Run(run) => StyledItem::Run(StyledRun {
                    text: run.text.clone(),
                    style: run.style.scaled(scale),
                }),
                StyledItem::LineBreak(style) => StyledItem::LineBreak(style.scaled(scale)),
            })
            .collect();
        Self { items }
    }
}

/// Flatten a span tree depth-first into styled runs and line breaks.
///
/// Adjacent runs with identical styles are merged.
pub fn flatten(root: &Span, base: &Style) -> Vec<StyledItem> {
    let mut items = Vec::with_capacity(8);
    flatten_into(root, base, &mut items);
    items
}

fn flatten_into(span: &Span, style: &Style, out: &mut Vec<StyledItem>) {
    match span {
        Span::Text(text) => {
            if text.is_empty() {
                return;
            }
            if let Some(StyledItem::Run(prev)) = out.last_mut() {
                if prev.style == *style {
                    prev.text.push_str(text);
                    return;
                }
            }
            out.push(StyledItem::Run(StyledRun {
                text: text.clone(),
                style: style.clone(),
            }));
        }
        Span::LineBreak => out.push(StyledItem::LineBreak(style.clone())),
        Span::Root(children) => {
            for child in children {
                flatten_into(child, style, out);
            }
        }
        Span::Tagged { tag, children } => {
            let inner = style.apply(tag);
            for child in children {
                flatten_into(child, &inner, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(markup: &str, base: &Style) -> Vec<(String, Style)> {
        StyledText::from_markup(markup, base)
            .runs()
            .map(|run| (run.text.clone(), run.style.clone()))
            .collect()
    }

    #[test]
    fn colored_siblings_become_two_runs() {
        let base = Style::with_size(20.0);
        let out = runs("[color=red]A[/color][color=blue]B[/color]", &base);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "A");
        assert_eq!(
            out[0].1,
            Style {
                color: Rgba::rgb(255, 0, 0),
                ..base.clone()
            }
        );
        assert_eq!(out[1].0, "B");
        assert_eq!(
            out[1].1,
            Style {
                color: Rgba::rgb(0, 0, 255),
                ..base
            }
        );
    }

    #[test]
    fn innermost_override_wins() {
        let base = Style::default();
        let out = runs("[size=10]a[size=20]b[/size]c[/size]", &base);
        let sizes: Vec<f32> = out.iter().map(|(_, s)| s.size_px).collect();
        assert_eq!(sizes, vec![10.0, 20.0, 10.0]);
    }

    #[test]
    fn adjacent_identical_styles_merge() {
        let base = Style::default();
        let out = runs("[b]a[/b][b]b[/b]c", &base);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "ab");
        assert!(out[0].1.bold);
        assert_eq!(out[1].0, "c");
        assert!(!out[1].1.bold);
    }

    #[test]
    fn flags_accumulate_through_nesting() {
        let base = Style::default();
        let out = runs("[b][i][u][del]x[/del][/u][/i][/b]", &base);
        let style = &out[0].1;
        assert!(style.bold && style.italic && style.underline && style.strikethrough);
    }

    #[test]
    fn align_tag_marks_style_explicit() {
        let base = Style {
            align: Align::Right,
            ..Style::default()
        };
        let out = runs("a[align=center]b[/align]", &base);
        assert_eq!(out[0].1.align, Align::Right);
        assert!(!out[0].1.align_explicit);
        assert_eq!(out[1].1.align, Align::Center);
        assert!(out[1].1.align_explicit);
    }

    #[test]
    fn stripped_text_matches_plain_text() {
        let markup = "[b]Hello[/b], [color=#123]wor[i]ld[/i][/color]\n[size=5]![/size]";
        let styled = StyledText::from_markup(markup, &Style::default());
        assert_eq!(styled.plain_text(), "Hello, world\n!");
    }

    #[test]
    fn line_break_carries_inner_style() {
        let styled = StyledText::from_markup("[size=40]\n[/size]", &Style::default());
        match styled.items() {
            [StyledItem::LineBreak(style)] => assert_eq!(style.size_px, 40.0),
            other => panic!("unexpected items: {other:?}"),
        }
    }

    #[test]
    fn scaling_multiplies_override_sizes() {
        let styled = StyledText::from_markup("a[size=10]b[/size]", &Style::with_size(20.0));
        let scaled = styled.scaled(0.5);
        let sizes: Vec<f32> = scaled.runs().map(|r| r.style.size_px).collect();
        assert_eq!(sizes, vec![10.0, 5.0]);
    }

    #[test]
    fn plain_mode_keeps_brackets() {
        let styled = StyledText::plain("[b]x[/b]", &Style::default());
        assert_eq!(styled.runs().count(), 1);
        assert_eq!(styled.plain_text(), "[b]x[/b]");
    }
}
