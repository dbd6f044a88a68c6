//! Range splitting: turning a selection into wrapped text nodes.

use std::ops::Range;

use crate::classify::{COLOR_ATTR, DATA_ATTR, is_ignored};
use crate::error::{HighlightError, Result};
use crate::tree::{DocumentTree, Element, NodeId};

/// A point inside a text node, `offset` counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Ordered pair of positions; `start` must precede `end` in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

/// Text nodes under the root plus where the selection falls among them.
struct Bounds {
    nodes: Vec<NodeId>,
    start_index: usize,
    end_index: usize,
}

impl Selection {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Check the selection against `root` without touching the tree.
    pub fn validate(&self, tree: &DocumentTree, root: NodeId) -> Result<()> {
        self.resolve(tree, root).map(|_| ())
    }

    fn resolve(&self, tree: &DocumentTree, root: NodeId) -> Result<Bounds> {
        if self.is_collapsed() {
            return Err(invalid("selection is collapsed"));
        }
        let nodes = tree.text_nodes(root);
        let index_of = |position: &Position, label: &str| {
            nodes
                .iter()
                .position(|&n| n == position.node)
                .ok_or_else(|| invalid(format!("{label} is not a text node under the root")))
        };
        let start_index = index_of(&self.start, "start")?;
        let end_index = index_of(&self.end, "end")?;

        for (position, label) in [(&self.start, "start"), (&self.end, "end")] {
            let len = tree.char_len(position.node);
            if position.offset > len {
                return Err(invalid(format!(
                    "{label} offset {} exceeds text length {len}",
                    position.offset
                )));
            }
        }

        let selected = if start_index == end_index {
            self.end.offset.saturating_sub(self.start.offset)
        } else if start_index < end_index {
            let inner: usize = nodes[start_index + 1..end_index]
                .iter()
                .map(|&n| tree.char_len(n))
                .sum();
            tree.char_len(self.start.node) - self.start.offset + inner + self.end.offset
        } else {
            0
        };
        if selected == 0 {
            return Err(invalid("selection covers no text"));
        }

        Ok(Bounds {
            nodes,
            start_index,
            end_index,
        })
    }
}

fn invalid(message: impl Into<String>) -> HighlightError {
    HighlightError::InvalidSelection(message.into())
}

/// Blueprint for the wrapper element placed around highlighted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerTemplate {
    element: Element,
}

impl MarkerTemplate {
    /// A `span` marker tagged with operation `id` and `color`.
    pub fn new(id: &str, color: &str) -> Self {
        let mut element = Element::new("span");
        element.attributes.insert(DATA_ATTR.to_string(), id.to_string());
        element
            .attributes
            .insert(COLOR_ATTR.to_string(), color.to_string());
        Self { element }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.element
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_id(self, id: &str) -> Self {
        self.with_attribute(DATA_ATTR, id)
    }

    /// Change the color. An inline style added by [`Self::with_inline_style`]
    /// follows the new color.
    pub fn with_color(mut self, color: &str) -> Self {
        if self.element.attributes.contains_key("style") {
            self.element
                .attributes
                .insert("style".to_string(), background_style(color));
        }
        self.with_attribute(COLOR_ATTR, color)
    }

    /// Also paint the color through a `background-color` inline style.
    pub fn with_inline_style(self) -> Self {
        let style = background_style(self.color());
        self.with_attribute("style", &style)
    }

    pub fn id(&self) -> &str {
        self.element
            .attributes
            .get(DATA_ATTR)
            .map_or("", String::as_str)
    }

    pub fn color(&self) -> &str {
        self.element
            .attributes
            .get(COLOR_ATTR)
            .map_or("", String::as_str)
    }

    /// Create a fresh, detached marker element in `tree`.
    pub fn instantiate(&self, tree: &mut DocumentTree) -> NodeId {
        tree.create_element_from(&self.element)
    }
}

fn background_style(color: &str) -> String {
    format!("background-color: {color};")
}

/// Wrap every text segment covered by `selection` in a marker built from `template`.
///
/// Text nodes cut by the selection boundaries are split first so that only
/// whole nodes get wrapped. Nesting is left for the normalizer to resolve.
/// Fails with [`HighlightError::InvalidSelection`] before any mutation when the
/// selection does not resolve under `root`.
pub fn highlight_range(
    tree: &mut DocumentTree,
    root: NodeId,
    selection: &Selection,
    template: &MarkerTemplate,
) -> Result<Vec<NodeId>> {
    wrap_selection(tree, root, selection, template, true)
}

/// Like [`highlight_range`], but whitespace-only text is wrapped too when
/// `skip_blank` is false.
pub(crate) fn wrap_selection(
    tree: &mut DocumentTree,
    root: NodeId,
    selection: &Selection,
    template: &MarkerTemplate,
    skip_blank: bool,
) -> Result<Vec<NodeId>> {
    let bounds = selection.resolve(tree, root)?;
    let targets = isolate_selected_text(tree, &bounds, selection);

    let mut highlights = Vec::new();
    for node in targets {
        let blank = tree.text(node).is_none_or(|t| t.trim().is_empty());
        if (skip_blank && blank) || is_ignored(tree, node) {
            continue;
        }
        let wrapper = template.instantiate(tree);
        tree.wrap(node, wrapper);
        highlights.push(wrapper);
    }

    log::debug!(
        "highlight_range wrapped {} text node(s) with color {}",
        highlights.len(),
        template.color()
    );
    Ok(highlights)
}

/// Split the boundary nodes and return the whole text nodes inside the selection.
fn isolate_selected_text(
    tree: &mut DocumentTree,
    bounds: &Bounds,
    selection: &Selection,
) -> Vec<NodeId> {
    let Selection { start, end } = *selection;

    if bounds.start_index == bounds.end_index {
        let node = start.node;
        if end.offset < tree.char_len(node) {
            tree.split_text(node, end.offset);
        }
        let inside = if start.offset > 0 {
            tree.split_text(node, start.offset)
        } else {
            Some(node)
        };
        return inside.into_iter().collect();
    }

    let mut targets = Vec::new();

    let start_len = tree.char_len(start.node);
    if start.offset == 0 {
        targets.push(start.node);
    } else if start.offset < start_len
        && let Some(suffix) = tree.split_text(start.node, start.offset)
    {
        targets.push(suffix);
    }

    targets.extend_from_slice(&bounds.nodes[bounds.start_index + 1..bounds.end_index]);

    if end.offset > 0 {
        if end.offset < tree.char_len(end.node) {
            tree.split_text(end.node, end.offset);
        }
        targets.push(end.node);
    }

    targets
}

/// Which node wins when an offset falls exactly between two text nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Prefer the start of the following node.
    Forward,
    /// Prefer the end of the preceding node.
    Backward,
}

/// Resolve a character offset within a sequence of text nodes.
pub fn position_in(
    tree: &DocumentTree,
    nodes: &[NodeId],
    offset: usize,
    bias: Bias,
) -> Option<Position> {
    let mut consumed = 0;
    for &node in nodes {
        let len = tree.char_len(node);
        let hit = match bias {
            Bias::Forward => offset < consumed + len,
            Bias::Backward => offset > consumed && offset <= consumed + len,
        };
        if hit {
            return Some(Position::new(node, offset - consumed));
        }
        consumed += len;
    }
    match bias {
        Bias::Forward if offset == consumed => nodes
            .last()
            .map(|&n| Position::new(n, tree.char_len(n))),
        Bias::Backward if offset == 0 => nodes.first().map(|&n| Position::new(n, 0)),
        _ => None,
    }
}

/// Build a selection from character offsets into `root`'s text content.
pub fn selection_from_offsets(
    tree: &DocumentTree,
    root: NodeId,
    start: usize,
    end: usize,
) -> Result<Selection> {
    if start >= end {
        return Err(invalid(format!("empty offset range {start}..{end}")));
    }
    let nodes = tree.text_nodes(root);
    let start_pos = position_in(tree, &nodes, start, Bias::Forward)
        .ok_or_else(|| invalid(format!("start offset {start} is past the end of the text")))?;
    let end_pos = position_in(tree, &nodes, end, Bias::Backward)
        .ok_or_else(|| invalid(format!("end offset {end} is past the end of the text")))?;
    Ok(Selection::new(start_pos, end_pos))
}

/// Character range covered by `node`'s text within `root`'s text content.
pub fn char_range_of(tree: &DocumentTree, root: NodeId, node: NodeId) -> Option<Range<usize>> {
    let mut consumed = 0;
    for text in tree.text_nodes(root) {
        if tree.is_inclusive_descendant(text, node) {
            let len = tree.text_content(node).chars().count();
            return Some(consumed..consumed + len);
        }
        consumed += tree.char_len(text);
    }
    None
}
