use core::fmt;

/// Configuration errors. These are the only failures of the text pipeline;
/// malformed markup, missing fonts, and overflowing layouts all degrade
/// instead of erroring.
#[derive(Clone, Debug, PartialEq)]
pub enum TextConfigError {
    /// A font fallback list with no families was supplied.
    EmptyFallbackList,
    /// The process-wide fallback list was already installed.
    FallbackAlreadyInstalled,
    /// A size option was zero, negative, or not finite.
    InvalidSize { field: &'static str, value: f32 },
    /// Options JSON could not be decoded.
    InvalidJson(String),
}

impl fmt::Display for TextConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFallbackList => write!(f, "font fallback list is empty"),
            Self::FallbackAlreadyInstalled => {
                write!(f, "process-wide font fallback list already installed")
            }
            Self::InvalidSize { field, value } => {
                write!(f, "invalid {}: {} (must be positive and finite)", field, value)
            }
            Self::InvalidJson(msg) => write!(f, "invalid text options JSON: {}", msg),
        }
    }
}

impl std::error::Error for TextConfigError {}

impl From<serde_json::Error> for TextConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidJson(value.to_string())
    }
}
