use crate::classify::{have_same_color, highlight_ancestor, highlights_in, is_highlight};
use crate::range::MarkerTemplate;
use crate::tree::{DocumentTree, NodeId};

pub fn sample_template() -> MarkerTemplate {
    MarkerTemplate::new("op-1", "#ffff7b")
}

/// First text node of the `index`-th top-level block.
pub fn paragraph_text(tree: &DocumentTree, index: usize) -> NodeId {
    let block = tree.children(tree.root())[index];
    tree.text_nodes(block)[0]
}

/// Assert the two structural invariants normalization guarantees.
pub fn assert_canonical(tree: &DocumentTree) {
    let root = tree.root();
    for marker in highlights_in(tree, root, true) {
        assert!(
            highlight_ancestor(tree, marker).is_none(),
            "nested marker: {}",
            tree.outer_html(root)
        );
        if let Some(next) = tree.next_sibling(marker) {
            assert!(
                !(is_highlight(tree, next) && have_same_color(tree, marker, next)),
                "adjacent same-color markers: {}",
                tree.outer_html(root)
            );
        }
    }
}
