pub mod classify;
pub mod descriptor;
pub mod error;
pub mod highlighter;
pub mod normalize;
pub mod range;
pub mod removal;
pub mod tree;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use classify::{COLOR_ATTR, DATA_ATTR, IGNORE_TAGS, is_highlight};
pub use descriptor::{
    HighlightDescriptor, RestoreFailure, RestoreReport, descriptors_from_json,
    descriptors_to_json, deserialize_highlights, deserialize_records, serialize_highlights,
};
pub use error::{HighlightError, Result, StaleReason};
pub use highlighter::{
    HighlightGroup, HighlightOutcome, HighlightQuery, Highlighter, HighlighterOptions,
};
pub use normalize::normalize_highlights;
pub use range::{
    Bias, MarkerTemplate, Position, Selection, char_range_of, highlight_range,
    selection_from_offsets,
};
pub use removal::remove_highlights;
pub use tree::{DocumentTree, Element, NodeData, NodeId};
