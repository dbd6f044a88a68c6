//! Unwrapping markers back into plain content.

use crate::classify::highlights_in;
use crate::tree::{DocumentTree, NodeId};

/// Remove `node` if it is a marker, and every marker beneath it.
///
/// `veto` is asked once per marker and may keep it by returning `false`.
/// Markers are removed deepest first, and text lifted out of a marker is merged
/// with its new text neighbours. Returns the number of markers removed.
pub fn remove_highlights(
    tree: &mut DocumentTree,
    node: NodeId,
    mut veto: impl FnMut(&DocumentTree, NodeId) -> bool,
) -> usize {
    let mut markers = highlights_in(tree, node, true);
    markers.sort_by_key(|&m| std::cmp::Reverse(tree.depth(m)));

    let mut removed = 0;
    for marker in markers {
        if !tree.contains(marker) || !veto(tree, marker) {
            continue;
        }
        let lifted = tree.unwrap(marker);
        for child in lifted {
            if tree.contains(child) && tree.is_text(child) {
                tree.merge_adjacent_text(child);
            }
        }
        removed += 1;
    }

    if removed > 0 {
        log::debug!("Removed {removed} highlight marker(s)");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{highlight_color, highlights_in};
    use crate::normalize::normalize_highlights;
    use crate::range::{MarkerTemplate, highlight_range, selection_from_offsets};
    use crate::tests::sample_template;
    use pretty_assertions::assert_eq;

    fn highlight(tree: &mut DocumentTree, start: usize, end: usize, template: &MarkerTemplate) -> Vec<NodeId> {
        let root = tree.root();
        let selection = selection_from_offsets(tree, root, start, end).unwrap();
        let created = highlight_range(tree, root, &selection, template).unwrap();
        normalize_highlights(tree, &created)
    }

    #[test]
    fn test_removing_everything_restores_original_structure() {
        let source = "one *two* three\n\nfour five";
        let mut tree = DocumentTree::from_markdown(source);
        let original = tree.inner_html(tree.root());
        highlight(&mut tree, 2, 10, &sample_template());
        highlight(&mut tree, 6, 12, &MarkerTemplate::new("op-2", "red"));
        highlight(&mut tree, 14, 19, &sample_template());

        let root = tree.root();
        let removed = remove_highlights(&mut tree, root, |_, _| true);

        assert!(removed >= 3);
        assert!(highlights_in(&tree, root, true).is_empty());
        assert_eq!(tree.inner_html(root), original);
    }

    #[test]
    fn test_removing_single_marker_merges_text_at_removal_point() {
        let mut tree = DocumentTree::from_markdown("The quick brown fox");
        let markers = highlight(&mut tree, 4, 9, &sample_template());
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.children(p).len(), 3);

        let removed = remove_highlights(&mut tree, markers[0], |_, _| true);

        assert_eq!(removed, 1);
        assert_eq!(tree.children(p).len(), 1);
        assert_eq!(tree.text(tree.children(p)[0]), Some("The quick brown fox"));
        assert!(!tree.contains(markers[0]));
    }

    #[test]
    fn test_removing_same_marker_twice_is_a_no_op() {
        let mut tree = DocumentTree::from_markdown("The quick brown fox");
        let markers = highlight(&mut tree, 4, 9, &sample_template());
        assert_eq!(remove_highlights(&mut tree, markers[0], |_, _| true), 1);
        let root = tree.root();
        let after_first = tree.inner_html(root);

        let removed = remove_highlights(&mut tree, markers[0], |_, _| true);

        assert_eq!(removed, 0);
        assert_eq!(tree.inner_html(root), after_first);
    }

    #[test]
    fn test_veto_keeps_marker() {
        let mut tree = DocumentTree::from_markdown("abc def ghi");
        highlight(&mut tree, 0, 3, &MarkerTemplate::new("a", "red"));
        highlight(&mut tree, 8, 11, &MarkerTemplate::new("b", "blue"));

        let root = tree.root();
        let removed = remove_highlights(&mut tree, root, |tree, marker| {
            highlight_color(tree, marker) != Some("red")
        });

        assert_eq!(removed, 1);
        let left = highlights_in(&tree, root, false);
        assert_eq!(left.len(), 1);
        assert_eq!(tree.text_content(left[0]), "abc");
    }

    #[test]
    fn test_container_without_markers_is_untouched() {
        let mut tree = DocumentTree::from_markdown("plain *text*");
        let root = tree.root();
        let before = tree.inner_html(root);

        assert_eq!(remove_highlights(&mut tree, root, |_, _| true), 0);
        assert_eq!(tree.inner_html(root), before);
    }
}
