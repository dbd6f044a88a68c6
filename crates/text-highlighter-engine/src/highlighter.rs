use std::fmt;

use regex::Regex;
use uuid::Uuid;

use crate::classify::{highlight_id, highlights_in, is_highlight};
use crate::descriptor::{
    HighlightDescriptor, RestoreReport, descriptors_from_json, descriptors_to_json,
};
use crate::error::{HighlightError, Result};
use crate::range::{MarkerTemplate, Selection, selection_from_offsets};
use crate::tree::{DocumentTree, NodeId};
use crate::{descriptor, normalize, range, removal};

pub const DEFAULT_COLOR: &str = "#ffff7b";
pub const DEFAULT_HIGHLIGHTED_CLASS: &str = "highlighted";
pub const DEFAULT_CONTEXT_CLASS: &str = "highlighter-context";

/// Gate run before any mutation. Returning `false` cancels the highlight.
pub type BeforeHighlightHook = Box<dyn FnMut(&DocumentTree, &Selection) -> bool>;
/// Observer run once the new markers are normalized. Receives the operation id.
pub type AfterHighlightHook = Box<dyn FnMut(&DocumentTree, &Selection, &[NodeId], &str)>;
/// Gate run per marker before it is removed. Returning `false` keeps it.
pub type RemoveHighlightHook = Box<dyn FnMut(&DocumentTree, NodeId) -> bool>;

pub struct HighlighterOptions {
    pub color: String,
    /// Class added to every marker.
    pub highlighted_class: String,
    /// Class added to the anchor element while the highlighter owns it.
    pub context_class: String,
    pub on_before_highlight: Option<BeforeHighlightHook>,
    pub on_after_highlight: Option<AfterHighlightHook>,
    pub on_remove_highlight: Option<RemoveHighlightHook>,
}

impl Default for HighlighterOptions {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            highlighted_class: DEFAULT_HIGHLIGHTED_CLASS.to_string(),
            context_class: DEFAULT_CONTEXT_CLASS.to_string(),
            on_before_highlight: None,
            on_after_highlight: None,
            on_remove_highlight: None,
        }
    }
}

impl fmt::Debug for HighlighterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HighlighterOptions")
            .field("color", &self.color)
            .field("highlighted_class", &self.highlighted_class)
            .field("context_class", &self.context_class)
            .field("on_before_highlight", &self.on_before_highlight.is_some())
            .field("on_after_highlight", &self.on_after_highlight.is_some())
            .field("on_remove_highlight", &self.on_remove_highlight.is_some())
            .finish()
    }
}

impl HighlighterOptions {
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_highlighted_class(mut self, class: impl Into<String>) -> Self {
        self.highlighted_class = class.into();
        self
    }

    pub fn with_context_class(mut self, class: impl Into<String>) -> Self {
        self.context_class = class.into();
        self
    }

    pub fn on_before_highlight(
        mut self,
        hook: impl FnMut(&DocumentTree, &Selection) -> bool + 'static,
    ) -> Self {
        self.on_before_highlight = Some(Box::new(hook));
        self
    }

    pub fn on_after_highlight(
        mut self,
        hook: impl FnMut(&DocumentTree, &Selection, &[NodeId], &str) + 'static,
    ) -> Self {
        self.on_after_highlight = Some(Box::new(hook));
        self
    }

    pub fn on_remove_highlight(
        mut self,
        hook: impl FnMut(&DocumentTree, NodeId) -> bool + 'static,
    ) -> Self {
        self.on_remove_highlight = Some(Box::new(hook));
        self
    }
}

/// Result of a successful [`Highlighter::do_highlight`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightOutcome {
    pub operation_id: String,
    /// Canonical markers touched by the operation, in document order.
    pub markers: Vec<NodeId>,
}

/// Which markers [`Highlighter::highlights`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightQuery {
    /// Search root. Defaults to the anchor.
    pub container: Option<NodeId>,
    /// Include the container itself when it is a marker.
    pub and_self: bool,
}

/// Markers created by one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightGroup {
    pub id: String,
    pub markers: Vec<NodeId>,
    /// Marked text of the group's markers, concatenated in document order.
    pub text: String,
}

/// Text highlighter bound to one anchor element of a [`DocumentTree`].
///
/// The highlighter owns the tree for its whole lifetime. Every mutating
/// operation works beneath the anchor, and every returned [`NodeId`] is a
/// handle into [`Highlighter::tree`].
///
/// ## Lifecycle
/// - **Construction** validates the anchor and tags it with the context class
/// - **Highlighting** splits, wraps and normalizes, with optional veto and observer hooks
/// - **Persistence** goes through descriptors, addressed independently of existing markers
/// - **Teardown** via [`Highlighter::into_tree`] removes the context class again
///
/// ```rust
/// use text_highlighter_engine::{DocumentTree, Highlighter, HighlighterOptions};
///
/// let tree = DocumentTree::from_markdown("The quick brown fox");
/// let anchor = tree.root();
/// let mut highlighter = Highlighter::new(tree, anchor, HighlighterOptions::default()).unwrap();
///
/// let outcome = highlighter.highlight_offsets(4, 9).unwrap().unwrap();
/// assert_eq!(highlighter.tree().text_content(outcome.markers[0]), "quick");
///
/// let json = highlighter.serialize_highlights_json().unwrap();
/// assert!(json.contains("\"text\":\"quick\""));
/// ```
#[derive(Debug)]
pub struct Highlighter {
    tree: DocumentTree,
    anchor: NodeId,
    options: HighlighterOptions,
}

impl Highlighter {
    pub fn new(mut tree: DocumentTree, anchor: NodeId, options: HighlighterOptions) -> Result<Self> {
        if !tree.is_attached(anchor) || !tree.is_element(anchor) {
            return Err(HighlightError::MissingAnchor);
        }
        add_class(&mut tree, anchor, &options.context_class);
        log::debug!("Highlighter attached with color {}", options.color);
        Ok(Self {
            tree,
            anchor,
            options,
        })
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    pub fn options(&self) -> &HighlighterOptions {
        &self.options
    }

    /// Detach the highlighter, dropping the context class from the anchor.
    pub fn into_tree(mut self) -> DocumentTree {
        remove_class(&mut self.tree, self.anchor, &self.options.context_class);
        self.tree
    }

    pub fn color(&self) -> &str {
        &self.options.color
    }

    /// Color used by subsequent highlights. Existing markers keep theirs.
    pub fn set_color(&mut self, color: impl Into<String>) {
        self.options.color = color.into();
    }

    fn template(&self, operation_id: &str) -> MarkerTemplate {
        MarkerTemplate::new(operation_id, &self.options.color)
            .with_attribute("class", &self.options.highlighted_class)
            .with_inline_style()
    }

    /// Highlight `selection` with the current color.
    ///
    /// Returns `Ok(None)` when the before-highlight hook vetoes. Invalid
    /// selections fail before the hook runs and before any mutation.
    pub fn do_highlight(&mut self, selection: &Selection) -> Result<Option<HighlightOutcome>> {
        selection.validate(&self.tree, self.anchor)?;

        if let Some(hook) = self.options.on_before_highlight.as_mut()
            && !hook(&self.tree, selection)
        {
            log::debug!("Highlight vetoed by before-highlight hook");
            return Ok(None);
        }

        let operation_id = Uuid::new_v4().to_string();
        let template = self.template(&operation_id);
        let created = range::highlight_range(&mut self.tree, self.anchor, selection, &template)?;
        let markers = normalize::normalize_highlights(&mut self.tree, &created);

        if let Some(hook) = self.options.on_after_highlight.as_mut() {
            hook(&self.tree, selection, &markers, &operation_id);
        }

        Ok(Some(HighlightOutcome {
            operation_id,
            markers,
        }))
    }

    /// [`Self::do_highlight`] over character offsets into the anchor's text.
    pub fn highlight_offsets(&mut self, start: usize, end: usize) -> Result<Option<HighlightOutcome>> {
        let selection = selection_from_offsets(&self.tree, self.anchor, start, end)?;
        self.do_highlight(&selection)
    }

    /// Raw splitter pass with a caller-provided template. The result is not normalized.
    pub fn highlight_range(
        &mut self,
        selection: &Selection,
        template: &MarkerTemplate,
    ) -> Result<Vec<NodeId>> {
        range::highlight_range(&mut self.tree, self.anchor, selection, template)
    }

    pub fn normalize_highlights(&mut self, markers: &[NodeId]) -> Vec<NodeId> {
        normalize::normalize_highlights(&mut self.tree, markers)
    }

    pub fn flatten_nested_highlights(&mut self, markers: &mut Vec<NodeId>) {
        normalize::flatten_nested_highlights(&mut self.tree, markers);
    }

    pub fn merge_sibling_highlights(&mut self, markers: &[NodeId]) {
        normalize::merge_sibling_highlights(&mut self.tree, markers);
    }

    pub fn is_highlight(&self, node: NodeId) -> bool {
        is_highlight(&self.tree, node)
    }

    pub fn highlights(&self, query: HighlightQuery) -> Vec<NodeId> {
        let container = query.container.unwrap_or(self.anchor);
        if !self.tree.is_attached(container) {
            return Vec::new();
        }
        highlights_in(&self.tree, container, query.and_self)
    }

    /// Markers grouped by operation id, groups in order of first appearance.
    pub fn highlight_groups(&self, query: HighlightQuery) -> Vec<HighlightGroup> {
        let mut groups: Vec<HighlightGroup> = Vec::new();
        for marker in self.highlights(query) {
            let id = highlight_id(&self.tree, marker).unwrap_or_default();
            let text = self.tree.text_content(marker);
            match groups.iter_mut().find(|g| g.id == id) {
                Some(group) => {
                    group.markers.push(marker);
                    group.text.push_str(&text);
                }
                None => groups.push(HighlightGroup {
                    id: id.to_string(),
                    markers: vec![marker],
                    text,
                }),
            }
        }
        groups
    }

    /// Remove markers in `container` (the anchor when `None`), honouring the
    /// remove hook. Returns how many were removed.
    pub fn remove_highlights(&mut self, container: Option<NodeId>) -> usize {
        let node = container.unwrap_or(self.anchor);
        if !self.tree.is_attached(node) {
            return 0;
        }
        let hook = &mut self.options.on_remove_highlight;
        removal::remove_highlights(&mut self.tree, node, |tree, marker| {
            hook.as_mut().is_none_or(|h| h(tree, marker))
        })
    }

    pub fn serialize_highlights(&self) -> Vec<HighlightDescriptor> {
        descriptor::serialize_highlights(&self.tree, self.anchor)
    }

    pub fn serialize_highlights_json(&self) -> Result<String> {
        descriptors_to_json(&self.serialize_highlights())
    }

    /// Restore markers from descriptors.
    ///
    /// Descriptors without a group share one fresh operation id.
    pub fn deserialize_highlights(&mut self, descriptors: &[HighlightDescriptor]) -> RestoreReport {
        let template = self.template(&Uuid::new_v4().to_string());
        let report =
            descriptor::deserialize_highlights(&mut self.tree, self.anchor, descriptors, &template);
        log::debug!(
            "Restored {} of {} highlight descriptor(s)",
            report.restored,
            descriptors.len()
        );
        report
    }

    /// Restore from records decoded one by one. Undecodable records are
    /// reported as failures at their index.
    pub fn deserialize_records(
        &mut self,
        records: Vec<Result<HighlightDescriptor>>,
    ) -> RestoreReport {
        let template = self.template(&Uuid::new_v4().to_string());
        let total = records.len();
        let report =
            descriptor::deserialize_records(&mut self.tree, self.anchor, records, &template);
        log::debug!("Restored {} of {total} highlight record(s)", report.restored);
        report
    }

    /// Fails only when `json` is not an array.
    pub fn deserialize_highlights_json(&mut self, json: &str) -> Result<RestoreReport> {
        let records = descriptors_from_json(json)?;
        Ok(self.deserialize_records(records))
    }

    /// Highlight every occurrence of `text` in the anchor's text content.
    ///
    /// Each occurrence is a separate operation. Returns the canonical markers
    /// still live at the end, in document order.
    pub fn find(&mut self, text: &str, case_sensitive: bool) -> Result<Vec<NodeId>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let escaped = regex::escape(text);
        let pattern = if case_sensitive {
            escaped
        } else {
            format!("(?i){escaped}")
        };
        let re = Regex::new(&pattern)?;

        let content = self.tree.text_content(self.anchor);
        let mut ranges = Vec::new();
        let mut chars_before = 0;
        let mut bytes_seen = 0;
        for found in re.find_iter(&content) {
            chars_before += content[bytes_seen..found.start()].chars().count();
            let len = found.as_str().chars().count();
            ranges.push((chars_before, chars_before + len));
            chars_before += len;
            bytes_seen = found.end();
        }

        let mut markers = Vec::new();
        for (start, end) in ranges {
            if let Some(outcome) = self.highlight_offsets(start, end)? {
                markers.extend(outcome.markers);
            }
        }
        let mut seen = std::collections::HashSet::new();
        markers.retain(|&m| self.tree.is_attached(m) && seen.insert(m));
        let order = highlights_in(&self.tree, self.anchor, true);
        markers.sort_by_key(|m| order.iter().position(|o| o == m));
        Ok(markers)
    }
}

fn add_class(tree: &mut DocumentTree, node: NodeId, class: &str) {
    if class.is_empty() {
        return;
    }
    let current = tree.attribute(node, "class").unwrap_or_default();
    if current.split_whitespace().any(|c| c == class) {
        return;
    }
    let updated = if current.is_empty() {
        class.to_string()
    } else {
        format!("{current} {class}")
    };
    tree.set_attribute(node, "class", &updated);
}

fn remove_class(tree: &mut DocumentTree, node: NodeId, class: &str) {
    let Some(current) = tree.attribute(node, "class") else {
        return;
    };
    let remaining: Vec<&str> = current.split_whitespace().filter(|&c| c != class).collect();
    if remaining.is_empty() {
        tree.remove_attribute(node, "class");
    } else {
        let joined = remaining.join(" ");
        tree.set_attribute(node, "class", &joined);
    }
}
