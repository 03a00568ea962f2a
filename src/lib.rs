//! Bracket markup parsing and style resolution for `tagtext`.
//!
//! [`markup::parse`] turns a string such as `"[b]Hi[/b] [color=red]there[/color]"`
//! into a [`Span`] tree, and [`StyledText`] flattens that tree into runs that
//! each carry one fully resolved [`Style`]. Font resolution, layout, and
//! painting live in `tagtext-render`.

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

pub mod color;
pub mod markup;
pub mod style;

pub use color::Rgba;
pub use markup::{parse, Span, Tag, TagName};
pub use style::{flatten, Align, Style, StyledItem, StyledRun, StyledText};
