//! Bracket-markup tokenizer and tree builder.
//!
//! The grammar is a small fixed tag set (`[b]`, `[i]`, `[u]`, `[del]`,
//! `[color=..]`, `[stroke=..]`, `[font=..]`, `[size=..]`, `[align=..]`).
//! Parsing never fails: anything that is not a well-formed, properly paired
//! tag is kept verbatim as literal text.

use smallvec::SmallVec;

use crate::color::Rgba;
use crate::style::Align;

/// Recognized tag names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagName {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Color,
    Stroke,
    Font,
    Size,
    Align,
}

impl TagName {
    /// Match a tag name case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let tag = match lower.as_str() {
            "b" => Self::Bold,
            "i" => Self::Italic,
            "u" => Self::Underline,
            "del" => Self::Strikethrough,
            "color" => Self::Color,
            "stroke" => Self::Stroke,
            "font" => Self::Font,
            "size" => Self::Size,
            "align" => Self::Align,
            _ => return None,
        };
        Some(tag)
    }

    /// Canonical lowercase spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bold => "b",
            Self::Italic => "i",
            Self::Underline => "u",
            Self::Strikethrough => "del",
            Self::Color => "color",
            Self::Stroke => "stroke",
            Self::Font => "font",
            Self::Size => "size",
            Self::Align => "align",
        }
    }

    fn takes_value(self) -> bool {
        matches!(
            self,
            Self::Color | Self::Stroke | Self::Font | Self::Size | Self::Align
        )
    }
}

/// A recognized tag together with its parsed parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Tag {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Color(Rgba),
    Stroke(Rgba),
    Font(String),
    Size(f32),
    Align(Align),
}

impl Tag {
    /// Name of this tag.
    pub fn name(&self) -> TagName {
        match self {
            Self::Bold => TagName::Bold,
            Self::Italic => TagName::Italic,
            Self::Underline => TagName::Underline,
            Self::Strikethrough => TagName::Strikethrough,
            Self::Color(_) => TagName::Color,
            Self::Stroke(_) => TagName::Stroke,
            Self::Font(_) => TagName::Font,
            Self::Size(_) => TagName::Size,
            Self::Align(_) => TagName::Align,
        }
    }

    /// Build a tag from its name and optional `=value` parameter.
    ///
    /// Returns `None` when the value is missing, superfluous, or malformed.
    pub fn from_parts(name: TagName, value: Option<&str>) -> Option<Self> {
        let value = value.map(unquote);
        match (name.takes_value(), value) {
            (false, None) => {}
            (true, Some(v)) if !v.is_empty() => {}
            _ => return None,
        }
        let tag = match name {
            TagName::Bold => Self::Bold,
            TagName::Italic => Self::Italic,
            TagName::Underline => Self::Underline,
            TagName::Strikethrough => Self::Strikethrough,
            TagName::Color => Self::Color(Rgba::parse(value?)?),
            TagName::Stroke => Self::Stroke(Rgba::parse(value?)?),
            TagName::Font => Self::Font(value?.trim().into()),
            TagName::Size => {
                let size: f32 = value?.trim().parse().ok()?;
                if !size.is_finite() || size <= 0.0 {
                    return None;
                }
                Self::Size(size)
            }
            TagName::Align => Self::Align(Align::parse(value?)?),
        };
        Some(tag)
    }
}

fn unquote(value: &str) -> &str {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}

/// Node of the markup parse tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Span {
    /// Tree root; owns the top-level nodes.
    Root(Vec<Span>),
    /// Container tag owning its children.
    Tagged { tag: Tag, children: Vec<Span> },
    /// Literal text leaf.
    Text(String),
    /// Hard line break from the source text.
    LineBreak,
}

impl Span {
    /// Child nodes (empty for leaves).
    pub fn children(&self) -> &[Span] {
        match self {
            Self::Root(children) | Self::Tagged { children, .. } => children,
            Self::Text(_) | Self::LineBreak => &[],
        }
    }

    /// Text content with all markup removed; line breaks become `\n`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.push_plain_text(&mut out);
        out
    }

    fn push_plain_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::LineBreak => out.push('\n'),
            Self::Root(children) | Self::Tagged { children, .. } => {
                for child in children {
                    child.push_plain_text(out);
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Open { tag: Tag, raw: &'a str },
    Close { name: TagName, raw: &'a str },
    LineBreak,
}

impl Token<'_> {
    fn raw(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Open { raw, .. } | Self::Close { raw, .. } => raw,
            Self::LineBreak => "\n",
        }
    }
}

/// Parse markup into a span tree. Never fails.
pub fn parse(markup: &str) -> Span {
    let tokens = tokenize(markup, true);
    let paired = pair_tags(&tokens);
    build_tree(&tokens, &paired)
}

/// Wrap literal text in a root span without interpreting tags.
///
/// Line breaks are still honored.
pub fn literal(text: &str) -> Span {
    let tokens = tokenize(text, false);
    let paired = vec![false; tokens.len()];
    build_tree(&tokens, &paired)
}

fn tokenize(markup: &str, with_tags: bool) -> Vec<Token<'_>> {
    let bytes = markup.as_bytes();
    let mut tokens = Vec::with_capacity(8);
    let mut text_start = 0usize;
    let mut idx = 0usize;

    while idx < bytes.len() {
        match bytes[idx] {
            b'\r' | b'\n' => {
                if text_start < idx {
                    tokens.push(Token::Text(&markup[text_start..idx]));
                }
                let len = if bytes[idx] == b'\r' && bytes.get(idx + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                tokens.push(Token::LineBreak);
                idx += len;
                text_start = idx;
            }
            b'[' if with_tags => match scan_tag(&markup[idx..]) {
                Some((len, token)) => {
                    if text_start < idx {
                        tokens.push(Token::Text(&markup[text_start..idx]));
                    }
                    tokens.push(token);
                    idx += len;
                    text_start = idx;
                }
                None => idx += 1,
            },
            _ => idx += 1,
        }
    }
    if text_start < bytes.len() {
        tokens.push(Token::Text(&markup[text_start..]));
    }
    tokens
}

/// Scan a tag starting at `[`; returns the consumed length and the token.
fn scan_tag(rest: &str) -> Option<(usize, Token<'_>)> {
    let end = rest[1..].find([']', '[', '\n', '\r'])? + 1;
    if rest.as_bytes()[end] != b']' {
        return None;
    }
    let raw = &rest[..=end];
    let body = &rest[1..end];

    if let Some(name) = body.strip_prefix('/') {
        let token = match TagName::from_name(name) {
            Some(name) => Token::Close { name, raw },
            None => {
                log::debug!("unknown closing tag {} kept as text", raw);
                Token::Text(raw)
            }
        };
        return Some((raw.len(), token));
    }

    let (name, value) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (body, None),
    };
    let token = match TagName::from_name(name).and_then(|name| Tag::from_parts(name, value)) {
        Some(tag) => Token::Open { tag, raw },
        None => {
            log::debug!("unrecognized or malformed tag {} kept as text", raw);
            Token::Text(raw)
        }
    };
    Some((raw.len(), token))
}

/// Mark which open/close tokens form properly nested pairs.
///
/// A close matches the innermost open of the same name; opens left above it
/// on the stack can no longer be closed and stay literal.
fn pair_tags(tokens: &[Token<'_>]) -> Vec<bool> {
    let mut paired = vec![false; tokens.len()];
    let mut open_stack: SmallVec<[(usize, TagName); 16]> = SmallVec::new();

    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::Open { tag, .. } => open_stack.push((idx, tag.name())),
            Token::Close { name, .. } => {
                if let Some(pos) = open_stack.iter().rposition(|(_, open)| open == name) {
                    paired[open_stack[pos].0] = true;
                    paired[idx] = true;
                    open_stack.truncate(pos);
                }
            }
            Token::Text(_) | Token::LineBreak => {}
        }
    }
    paired
}

fn build_tree(tokens: &[Token<'_>], paired: &[bool]) -> Span {
    let mut frames: Vec<(Option<Tag>, Vec<Span>)> = vec![(None, Vec::new())];

    for (token, &is_paired) in tokens.iter().zip(paired) {
        match token {
            Token::Open { tag, .. } if is_paired => frames.push((Some(tag.clone()), Vec::new())),
            Token::Close { .. } if is_paired => {
                if frames.len() > 1 {
                    if let Some((Some(tag), children)) = frames.pop() {
                        push_child(&mut frames, Span::Tagged { tag, children });
                    }
                }
            }
            Token::LineBreak => push_child(&mut frames, Span::LineBreak),
            other => push_text(&mut frames, other.raw()),
        }
    }

    // Pairing guarantees every pushed frame was popped.
    let children = frames
        .into_iter()
        .next()
        .map(|(_, children)| children)
        .unwrap_or_default();
    Span::Root(children)
}

fn push_child(frames: &mut [(Option<Tag>, Vec<Span>)], span: Span) {
    if let Some((_, children)) = frames.last_mut() {
        children.push(span);
    }
}

fn push_text(frames: &mut [(Option<Tag>, Vec<Span>)], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some((_, children)) = frames.last_mut() {
        if let Some(Span::Text(prev)) = children.last_mut() {
            prev.push_str(text);
        } else {
            children.push(Span::Text(text.into()));
        }
    }
}
