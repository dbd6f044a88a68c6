//! Marker recognition.
//!
//! A marker is any element carrying [`DATA_ATTR`]; its value is the id of the
//! operation that created it. The color lives in [`COLOR_ATTR`] and is compared
//! as a plain string.

use crate::tree::{DocumentTree, NodeId};

/// Reserved attribute present on every marker. Holds the operation id.
pub const DATA_ATTR: &str = "data-highlighted";
/// Reserved attribute holding the marker color.
pub const COLOR_ATTR: &str = "data-backgroundcolor";

/// Elements whose text is never highlighted.
pub const IGNORE_TAGS: &[&str] = &[
    "script", "style", "select", "option", "button", "object", "applet", "video", "audio",
    "canvas", "embed", "param", "meter", "progress",
];

pub fn is_highlight(tree: &DocumentTree, node: NodeId) -> bool {
    tree.is_element(node) && tree.has_attribute(node, DATA_ATTR)
}

pub fn highlight_color(tree: &DocumentTree, node: NodeId) -> Option<&str> {
    tree.attribute(node, COLOR_ATTR)
}

pub fn highlight_id(tree: &DocumentTree, node: NodeId) -> Option<&str> {
    tree.attribute(node, DATA_ATTR)
}

pub fn have_same_color(tree: &DocumentTree, a: NodeId, b: NodeId) -> bool {
    highlight_color(tree, a) == highlight_color(tree, b)
}

/// Closest ancestor of `node` that is itself a marker.
pub fn highlight_ancestor(tree: &DocumentTree, node: NodeId) -> Option<NodeId> {
    let mut current = tree.parent(node);
    while let Some(candidate) = current {
        if is_highlight(tree, candidate) {
            return Some(candidate);
        }
        current = tree.parent(candidate);
    }
    None
}

/// Whether any node beneath `node` (excluding itself) is a marker.
pub fn contains_highlight(tree: &DocumentTree, node: NodeId) -> bool {
    tree.descendants(node)
        .into_iter()
        .any(|n| is_highlight(tree, n))
}

/// Whether text under `node` sits inside an element that is never highlighted.
pub fn is_ignored(tree: &DocumentTree, node: NodeId) -> bool {
    let mut current = tree.parent(node);
    while let Some(ancestor) = current {
        if let Some(tag) = tree.tag(ancestor)
            && IGNORE_TAGS.contains(&tag.to_ascii_lowercase().as_str())
        {
            return true;
        }
        current = tree.parent(ancestor);
    }
    false
}

/// Markers under `container` in document order, optionally including the container.
pub fn highlights_in(tree: &DocumentTree, container: NodeId, and_self: bool) -> Vec<NodeId> {
    let mut found: Vec<NodeId> = tree
        .descendants(container)
        .into_iter()
        .filter(|&n| is_highlight(tree, n))
        .collect();
    if and_self && is_highlight(tree, container) {
        found.insert(0, container);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(tree: &mut DocumentTree, color: &str) -> NodeId {
        let span = tree.create_element("span");
        tree.set_attribute(span, DATA_ATTR, "op");
        tree.set_attribute(span, COLOR_ATTR, color);
        span
    }

    #[test]
    fn test_marker_requires_data_attribute() {
        let mut tree = DocumentTree::new("body");
        let plain = tree.create_element("span");
        let text = tree.create_text("x");
        let m = marker(&mut tree, "red");

        assert!(is_highlight(&tree, m));
        assert!(!is_highlight(&tree, plain));
        assert!(!is_highlight(&tree, text));
    }

    #[test]
    fn test_color_comparison_is_exact_string_equality() {
        let mut tree = DocumentTree::new("body");
        let a = marker(&mut tree, "#ffff7b");
        let b = marker(&mut tree, "#ffff7b");
        let c = marker(&mut tree, "#FFFF7B");

        assert!(have_same_color(&tree, a, b));
        assert!(!have_same_color(&tree, a, c));
    }

    #[test]
    fn test_ignored_ancestors() {
        let mut tree = DocumentTree::new("body");
        let root = tree.root();
        let button = tree.create_element("button");
        let label = tree.create_element("span");
        let text = tree.create_text("click");
        tree.append(root, button);
        tree.append(button, label);
        tree.append(label, text);
        let free = tree.create_text("free");
        tree.append(root, free);

        assert!(is_ignored(&tree, text));
        assert!(!is_ignored(&tree, free));
    }

    #[test]
    fn test_highlights_in_includes_self_on_request() {
        let mut tree = DocumentTree::new("body");
        let root = tree.root();
        let outer = marker(&mut tree, "red");
        let inner = marker(&mut tree, "blue");
        tree.append(root, outer);
        tree.append(outer, inner);

        assert_eq!(highlights_in(&tree, outer, false), vec![inner]);
        assert_eq!(highlights_in(&tree, outer, true), vec![outer, inner]);
        assert_eq!(highlight_ancestor(&tree, inner), Some(outer));
        assert!(contains_highlight(&tree, root));
    }
}
