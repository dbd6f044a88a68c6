use thiserror::Error;

#[derive(Debug, Error)]
pub enum HighlightError {
    /// Collapsed, reversed or unresolvable selection. Nothing was mutated.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
    /// A descriptor no longer matches the live document.
    #[error("Stale descriptor: {0}")]
    StaleDescriptor(StaleReason),
    /// The highlighter was given no live anchor element.
    #[error("Missing anchor element")]
    MissingAnchor,
    #[error("Malformed descriptor list: {0}")]
    MalformedDescriptors(#[from] serde_json::Error),
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Why a single descriptor could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaleReason {
    #[error("path {0:?} does not address a text run")]
    UnresolvablePath(Vec<usize>),
    #[error("offset {offset} lies outside a text run of {run_len} characters")]
    OffsetOutOfRange { offset: usize, run_len: usize },
    #[error("range of {length} characters runs past the end of the document")]
    Truncated { length: usize },
    #[error("expected {expected:?} but found {found:?}")]
    TextMismatch { expected: String, found: String },
    #[error("descriptor covers no characters")]
    Empty,
    #[error("no highlightable text at the described range")]
    NothingWrapped,
}

pub type Result<T> = std::result::Result<T, HighlightError>;
