//! Serialization of markers into position-addressed descriptors and back.
//!
//! Addresses are expressed in the *marker-transparent view* of the tree: every
//! marker is dissolved into its parent and adjacent text nodes are read as a
//! single text run. In that view a paragraph with three highlights looks the
//! same as the freshly loaded paragraph, so a path recorded against the
//! highlighted tree resolves on a clean rebuild of the document, and restoring
//! one descriptor never shifts the address of the next.

use serde::{Deserialize, Serialize};

use crate::classify::{highlight_color, highlight_id, highlights_in, is_highlight};
use crate::error::{HighlightError, Result, StaleReason};
use crate::normalize::normalize_highlights;
use crate::range::{Bias, MarkerTemplate, Selection, position_in, wrap_selection};
use crate::tree::{DocumentTree, NodeId};

/// Serializable record of one marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightDescriptor {
    /// Child indices from the root to the text run the marker starts in.
    pub path: Vec<usize>,
    /// Characters preceding the marker within that text run.
    pub offset: usize,
    /// Length of the marked text in characters.
    pub length: usize,
    pub color: String,
    /// Marked text. Used only to verify the address still matches.
    pub text: String,
    /// Id of the operation that created the marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// One descriptor that could not be restored.
#[derive(Debug)]
pub struct RestoreFailure {
    /// Position of the descriptor in the input list.
    pub index: usize,
    pub error: HighlightError,
}

/// Outcome of [`deserialize_highlights`].
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Number of descriptors restored.
    pub restored: usize,
    /// Live markers after restoration, in document order.
    pub markers: Vec<NodeId>,
    pub failures: Vec<RestoreFailure>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn stale_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f.error, HighlightError::StaleDescriptor(_)))
            .count()
    }
}

enum ViewItem {
    Element(NodeId),
    Run(Vec<NodeId>),
}

fn view_children(tree: &DocumentTree, parent: NodeId) -> Vec<ViewItem> {
    let mut items = Vec::new();
    collect_view(tree, parent, &mut items);
    items
}

fn collect_view(tree: &DocumentTree, parent: NodeId, items: &mut Vec<ViewItem>) {
    for &child in tree.children(parent) {
        if tree.is_text(child) {
            match items.last_mut() {
                Some(ViewItem::Run(run)) => run.push(child),
                _ => items.push(ViewItem::Run(vec![child])),
            }
        } else if is_highlight(tree, child) {
            collect_view(tree, child, items);
        } else {
            items.push(ViewItem::Element(child));
        }
    }
}

/// View path and run offset of a text node under `root`.
fn view_address(tree: &DocumentTree, root: NodeId, text: NodeId) -> Option<(Vec<usize>, usize)> {
    let mut chain = Vec::new();
    let mut current = tree.parent(text)?;
    while current != root {
        if !is_highlight(tree, current) {
            chain.push(current);
        }
        current = tree.parent(current)?;
    }
    chain.reverse();

    let mut path = Vec::with_capacity(chain.len() + 1);
    let mut container = root;
    for element in chain {
        let index = view_children(tree, container)
            .iter()
            .position(|item| matches!(item, ViewItem::Element(e) if *e == element))?;
        path.push(index);
        container = element;
    }

    for (index, item) in view_children(tree, container).into_iter().enumerate() {
        if let ViewItem::Run(run) = item
            && let Some(at) = run.iter().position(|&n| n == text)
        {
            path.push(index);
            let offset = run[..at].iter().map(|&n| tree.char_len(n)).sum();
            return Some((path, offset));
        }
    }
    None
}

/// Text nodes of the run addressed by `path`, resolved against the live tree.
fn resolve_run(tree: &DocumentTree, root: NodeId, path: &[usize]) -> Option<Vec<NodeId>> {
    let (last, parents) = path.split_last()?;
    let mut container = root;
    for &index in parents {
        match view_children(tree, container).into_iter().nth(index)? {
            ViewItem::Element(element) => container = element,
            ViewItem::Run(_) => return None,
        }
    }
    match view_children(tree, container).into_iter().nth(*last)? {
        ViewItem::Run(run) => Some(run),
        ViewItem::Element(_) => None,
    }
}

/// Describe every marker under `root`, in document order.
pub fn serialize_highlights(tree: &DocumentTree, root: NodeId) -> Vec<HighlightDescriptor> {
    highlights_in(tree, root, false)
        .into_iter()
        .filter_map(|marker| describe(tree, root, marker))
        .collect()
}

fn describe(tree: &DocumentTree, root: NodeId, marker: NodeId) -> Option<HighlightDescriptor> {
    let first_text = tree.text_nodes(marker).into_iter().next()?;
    let text = tree.text_content(marker);
    let length = text.chars().count();
    if length == 0 {
        return None;
    }
    let (path, offset) = view_address(tree, root, first_text)?;
    Some(HighlightDescriptor {
        path,
        offset,
        length,
        color: highlight_color(tree, marker).unwrap_or_default().to_string(),
        text,
        group: highlight_id(tree, marker).map(str::to_string),
    })
}

/// Find the selection a descriptor addresses in the current tree.
pub fn locate(
    tree: &DocumentTree,
    root: NodeId,
    descriptor: &HighlightDescriptor,
) -> std::result::Result<Selection, StaleReason> {
    if descriptor.length == 0 {
        return Err(StaleReason::Empty);
    }
    let run = resolve_run(tree, root, &descriptor.path)
        .ok_or_else(|| StaleReason::UnresolvablePath(descriptor.path.clone()))?;
    let run_len: usize = run.iter().map(|&n| tree.char_len(n)).sum();
    let out_of_range = StaleReason::OffsetOutOfRange {
        offset: descriptor.offset,
        run_len,
    };
    if descriptor.offset >= run_len {
        return Err(out_of_range);
    }
    let start = position_in(tree, &run, descriptor.offset, Bias::Forward).ok_or(out_of_range)?;

    let nodes = tree.text_nodes(root);
    let first = nodes
        .iter()
        .position(|&n| n == start.node)
        .ok_or(StaleReason::Truncated {
            length: descriptor.length,
        })?;
    let tail = &nodes[first..];
    let end_offset = start.offset + descriptor.length;
    let end = position_in(tree, tail, end_offset, Bias::Backward).ok_or(StaleReason::Truncated {
        length: descriptor.length,
    })?;

    let found: String = tail
        .iter()
        .filter_map(|&n| tree.text(n))
        .flat_map(str::chars)
        .skip(start.offset)
        .take(descriptor.length)
        .collect();
    if found != descriptor.text {
        return Err(StaleReason::TextMismatch {
            expected: descriptor.text.clone(),
            found,
        });
    }

    Ok(Selection::new(start, end))
}

/// Re-create markers from descriptors, in the order given.
///
/// Each descriptor is resolved against the tree as it stands after the
/// previous ones were restored. Records that no longer match are reported in
/// [`RestoreReport::failures`] and the rest are still processed.
pub fn deserialize_highlights(
    tree: &mut DocumentTree,
    root: NodeId,
    descriptors: &[HighlightDescriptor],
    template: &MarkerTemplate,
) -> RestoreReport {
    let mut report = RestoreReport::default();
    for (index, descriptor) in descriptors.iter().enumerate() {
        report.restore(tree, root, index, descriptor, template);
    }
    report.finish(tree)
}

/// Like [`deserialize_highlights`], for records read by [`descriptors_from_json`].
///
/// A record that failed to decode is reported at its index alongside the
/// stale ones.
pub fn deserialize_records(
    tree: &mut DocumentTree,
    root: NodeId,
    records: Vec<Result<HighlightDescriptor>>,
    template: &MarkerTemplate,
) -> RestoreReport {
    let mut report = RestoreReport::default();
    for (index, record) in records.into_iter().enumerate() {
        match record {
            Ok(descriptor) => report.restore(tree, root, index, &descriptor, template),
            Err(error) => report.fail(index, error),
        }
    }
    report.finish(tree)
}

impl RestoreReport {
    fn restore(
        &mut self,
        tree: &mut DocumentTree,
        root: NodeId,
        index: usize,
        descriptor: &HighlightDescriptor,
        template: &MarkerTemplate,
    ) {
        match restore_one(tree, root, descriptor, template) {
            Ok(markers) => {
                self.restored += 1;
                self.markers.extend(markers);
            }
            Err(error) => self.fail(index, error),
        }
    }

    fn fail(&mut self, index: usize, error: HighlightError) {
        log::warn!("Skipping highlight descriptor {index}: {error}");
        self.failures.push(RestoreFailure { index, error });
    }

    fn finish(mut self, tree: &DocumentTree) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.markers.retain(|&m| tree.is_attached(m) && seen.insert(m));
        self
    }
}

fn restore_one(
    tree: &mut DocumentTree,
    root: NodeId,
    descriptor: &HighlightDescriptor,
    template: &MarkerTemplate,
) -> Result<Vec<NodeId>> {
    let selection =
        locate(tree, root, descriptor).map_err(HighlightError::StaleDescriptor)?;
    let mut template = template.clone().with_color(&descriptor.color);
    if let Some(group) = &descriptor.group {
        template = template.with_id(group);
    }
    // Recorded whitespace-only fragments are restored too.
    let created = wrap_selection(tree, root, &selection, &template, false)?;
    if created.is_empty() {
        return Err(HighlightError::StaleDescriptor(StaleReason::NothingWrapped));
    }
    Ok(normalize_highlights(tree, &created))
}

pub fn descriptors_to_json(descriptors: &[HighlightDescriptor]) -> Result<String> {
    Ok(serde_json::to_string(descriptors)?)
}

/// Parse a JSON array of descriptors. Unknown fields are ignored.
///
/// Only input that is not a JSON array fails as a whole. Each element is
/// decoded on its own, so one bad record keeps its slot as an error.
pub fn descriptors_from_json(json: &str) -> Result<Vec<Result<HighlightDescriptor>>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    Ok(values
        .into_iter()
        .map(|value| Ok(serde_json::from_value(value)?))
        .collect())
}
