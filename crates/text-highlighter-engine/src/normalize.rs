//! Normalization of markers: flatten, merge, coalesce.
//!
//! Ensures highlighting uses the smallest possible number of wrapper elements.
//! The steps run in a fixed order and the whole pass is idempotent: running it
//! on its own output changes nothing.

use std::collections::{HashMap, HashSet};

use crate::classify::{contains_highlight, have_same_color, highlight_ancestor, is_highlight};
use crate::tree::{DocumentTree, NodeId};

/// Flatten, merge and coalesce `highlights`, returning the surviving markers
/// in document order.
///
/// Document order stands in for the visual top-to-bottom, left-to-right order
/// a rendering host would use.
pub fn normalize_highlights(tree: &mut DocumentTree, highlights: &[NodeId]) -> Vec<NodeId> {
    let mut working = highlights.to_vec();

    flatten_nested_highlights(tree, &mut working);
    merge_sibling_highlights(tree, &working);
    coalesce_highlight_text(tree, &working);

    let mut seen = HashSet::new();
    let mut normalized: Vec<NodeId> = working
        .into_iter()
        .filter(|&hl| tree.is_attached(hl) && seen.insert(hl))
        .collect();

    let root = tree.root();
    let order: HashMap<NodeId, usize> = tree
        .descendants(root)
        .into_iter()
        .enumerate()
        .map(|(i, n)| (n, i))
        .collect();
    normalized.sort_by_key(|n| order.get(n).copied().unwrap_or(usize::MAX));
    normalized
}

/// Remove marker-in-marker nesting.
///
/// A marker inside a same-colored marker is unwrapped and the ancestor takes
/// its slot in `highlights`. A marker inside a differently colored one keeps
/// its color: the ancestor is pushed down around it, and the new fragments are
/// appended to `highlights`.
pub fn flatten_nested_highlights(tree: &mut DocumentTree, highlights: &mut Vec<NodeId>) {
    loop {
        highlights.sort_by_key(|&hl| std::cmp::Reverse(tree.depth(hl)));
        let mut again = false;
        let mut fragments = Vec::new();

        for slot in highlights.iter_mut() {
            let hl = *slot;
            if !tree.contains(hl) {
                continue;
            }
            let Some(outer) = highlight_ancestor(tree, hl) else {
                continue;
            };
            if have_same_color(tree, outer, hl) {
                tree.unwrap(hl);
                *slot = outer;
            } else {
                fragments.extend(push_down(tree, outer));
            }
            again = true;
        }

        highlights.extend(fragments);
        if !again {
            break;
        }
    }
}

/// Unwrap `outer` and re-wrap everything it held outside inner markers in
/// copies of it. Returns the copies.
fn push_down(tree: &mut DocumentTree, outer: NodeId) -> Vec<NodeId> {
    let Some(template) = tree.element(outer).cloned() else {
        return Vec::new();
    };
    let children = tree.unwrap(outer);
    let mut created = Vec::new();
    wrap_unmarked_runs(tree, &children, &template, &mut created);
    created
}

fn wrap_unmarked_runs(
    tree: &mut DocumentTree,
    nodes: &[NodeId],
    template: &crate::tree::Element,
    created: &mut Vec<NodeId>,
) {
    let mut run: Vec<NodeId> = Vec::new();
    for &node in nodes {
        if is_highlight(tree, node) {
            flush_run(tree, &mut run, template, created);
        } else if contains_highlight(tree, node) {
            flush_run(tree, &mut run, template, created);
            let children = tree.children(node).to_vec();
            wrap_unmarked_runs(tree, &children, template, created);
        } else {
            run.push(node);
        }
    }
    flush_run(tree, &mut run, template, created);
}

fn flush_run(
    tree: &mut DocumentTree,
    run: &mut Vec<NodeId>,
    template: &crate::tree::Element,
    created: &mut Vec<NodeId>,
) {
    let Some(&first) = run.first() else {
        return;
    };
    let wrapper = tree.create_element_from(template);
    tree.insert_before(first, wrapper);
    for node in run.drain(..) {
        tree.append(wrapper, node);
    }
    created.push(wrapper);
}

/// Absorb same-colored sibling markers into each of `highlights`.
///
/// Previous siblings' children are prepended, next siblings' appended, and
/// the emptied siblings discarded. Repeats until neither neighbour qualifies.
pub fn merge_sibling_highlights(tree: &mut DocumentTree, highlights: &[NodeId]) {
    for &hl in highlights {
        if !tree.contains(hl) {
            continue;
        }
        while let Some(prev) = tree
            .previous_sibling(hl)
            .filter(|&p| should_merge(tree, hl, p))
        {
            let children = tree.children(prev).to_vec();
            for (index, child) in children.into_iter().enumerate() {
                tree.insert(hl, index, child);
            }
            tree.discard(prev);
        }
        while let Some(next) = tree
            .next_sibling(hl)
            .filter(|&n| should_merge(tree, hl, n))
        {
            for child in tree.children(next).to_vec() {
                tree.append(hl, child);
            }
            tree.discard(next);
        }
    }
}

fn should_merge(tree: &DocumentTree, current: NodeId, node: NodeId) -> bool {
    is_highlight(tree, node) && have_same_color(tree, current, node)
}

/// Merge consecutive text nodes inside each marker.
pub fn coalesce_highlight_text(tree: &mut DocumentTree, highlights: &[NodeId]) {
    for &hl in highlights {
        if tree.contains(hl) {
            tree.normalize_text(hl);
        }
    }
}
