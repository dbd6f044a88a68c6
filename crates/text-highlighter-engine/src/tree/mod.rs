//! Mutable document tree the highlight engine operates on.
//!
//! Nodes live in an arena owned by [`DocumentTree`] and are addressed by
//! [`NodeId`] handles. A handle carries the generation of the slot it was
//! issued for, so once a node is discarded (for example a marker absorbed by a
//! merge) every outstanding handle to it reports as dead instead of silently
//! pointing at whatever node reuses the slot.
//!
//! Character offsets are counted in `char`s throughout.

mod html;
mod markdown;

use std::collections::BTreeMap;

/// Generational handle to a node in a [`DocumentTree`].
///
/// Handles are identity plus lookup: they never imply ownership, and callers
/// holding one across a mutation should re-check [`DocumentTree::is_attached`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Tag and attributes of an element node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-backed element/text tree with a single root element.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl DocumentTree {
    /// Create an empty tree whose root is an element with the given tag.
    pub fn new(root_tag: &str) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        tree.root = tree.alloc(NodeData::Element(Element::new(root_tag)));
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            data,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    // ============ Construction ============

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(Element::new(tag)))
    }

    /// Create a detached element carrying a copy of `element`'s tag and attributes.
    pub fn create_element_from(&mut self, element: &Element) -> NodeId {
        self.alloc(NodeData::Element(element.clone()))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    // ============ Inspection ============

    /// Whether the handle still refers to a live node (attached or not).
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Whether the node is live and reachable from the tree root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_inclusive_descendant(id, self.root)
    }

    /// Whether `id` is `ancestor` or lies somewhere beneath it.
    pub fn is_inclusive_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.node(id).map(|n| &n.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id)? {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(text) => Some(text.as_str()),
            NodeData::Element(_) => None,
        }
    }

    /// Length of a text node in characters; zero for anything else.
    pub fn char_len(&self, id: NodeId) -> usize {
        self.text(id).map_or(0, |t| t.chars().count())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attributes.get(name).map(String::as_str)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Number of ancestors between the node and the top of its tree.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(node) = current {
            depth += 1;
            current = self.parent(node);
        }
        depth
    }

    /// All nodes beneath `id` in document (pre-)order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Text nodes beneath `id` (or `id` itself when it is text) in document order.
    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        if self.is_text(id) {
            return vec![id];
        }
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.is_text(n))
            .collect()
    }

    /// Concatenated text of every text node beneath `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.text_nodes(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    // ============ Mutation ============

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(Node {
            data: NodeData::Element(element),
            ..
        }) = self.node_mut(id)
        {
            element.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        match self.node_mut(id) {
            Some(Node {
                data: NodeData::Element(element),
                ..
            }) => element.attributes.remove(name),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let Some(Node {
            data: NodeData::Text(text),
            ..
        }) = self.node_mut(id)
        {
            *text = value.to_string();
        }
    }

    /// Remove a node from its parent's child list, keeping it (and its subtree) alive.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&c| c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Insert `child` at `index` among `parent`'s children, detaching it first.
    ///
    /// The index is clamped to the child count. Inserting a node into its own
    /// subtree is refused.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if !self.is_element(parent)
            || !self.contains(child)
            || self.is_inclusive_descendant(parent, child)
        {
            return;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.insert(parent, usize::MAX, child);
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if node == reference {
            return;
        }
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference))
        {
            self.insert(parent, index, node);
        }
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        if node == reference {
            return;
        }
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference))
        {
            self.insert(parent, index + 1, node);
        }
    }

    /// Detach a node and free it together with its whole subtree.
    pub fn discard(&mut self, id: NodeId) {
        if !self.contains(id) {
            return;
        }
        self.detach(id);
        let mut pending = vec![id];
        while let Some(node) = pending.pop() {
            pending.extend_from_slice(self.children(node));
            let slot = &mut self.slots[node.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
    }

    /// Put `wrapper` in `node`'s place and move `node` inside it as its last child.
    pub fn wrap(&mut self, node: NodeId, wrapper: NodeId) -> NodeId {
        self.insert_before(node, wrapper);
        self.append(wrapper, node);
        wrapper
    }

    /// Replace an element by its children and discard it.
    ///
    /// Returns the lifted children in order. A detached element simply loses
    /// its children, which end up detached.
    pub fn unwrap(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = self.children(id).to_vec();
        match (self.parent(id), self.index_in_parent(id)) {
            (Some(parent), Some(index)) => {
                for (offset, &child) in children.iter().enumerate() {
                    self.insert(parent, index + offset, child);
                }
            }
            _ => {
                for &child in &children {
                    self.detach(child);
                }
            }
        }
        self.discard(id);
        children
    }

    /// Split a text node at a character offset.
    ///
    /// The node keeps the text before `offset`; a new text node holding the
    /// rest is inserted right after it and returned. Offsets equal to 0 or the
    /// length are allowed and produce an empty fragment.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let text = self.text(id)?;
        let byte = byte_offset(text, offset)?;
        let tail = text[byte..].to_string();
        let head = text[..byte].to_string();
        self.set_text(id, &head);
        let new_node = self.create_text(&tail);
        if self.parent(id).is_some() {
            self.insert_after(id, new_node);
        }
        Some(new_node)
    }

    /// Merge runs of adjacent text nodes beneath `id` and drop empty ones.
    pub fn normalize_text(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        let mut previous_text: Option<NodeId> = None;
        for child in children {
            match self.text(child).map(str::to_string) {
                Some(text) if text.is_empty() => self.discard(child),
                Some(text) => match previous_text {
                    Some(prev) => {
                        let merged = format!("{}{}", self.text(prev).unwrap_or_default(), text);
                        self.set_text(prev, &merged);
                        self.discard(child);
                    }
                    None => previous_text = Some(child),
                },
                None => {
                    previous_text = None;
                    self.normalize_text(child);
                }
            }
        }
    }

    /// Merge a text node with any text siblings directly before and after it.
    pub fn merge_adjacent_text(&mut self, id: NodeId) {
        let Some(mut text) = self.text(id).map(str::to_string) else {
            return;
        };
        while let Some(prev) = self.previous_sibling(id).filter(|&p| self.is_text(p)) {
            text = format!("{}{}", self.text(prev).unwrap_or_default(), text);
            self.discard(prev);
        }
        while let Some(next) = self.next_sibling(id).filter(|&n| self.is_text(n)) {
            text.push_str(self.text(next).unwrap_or_default());
            self.discard(next);
        }
        self.set_text(id, &text);
    }
}

/// Byte index of the `offset`-th character, allowing one-past-the-end.
pub(crate) fn byte_offset(text: &str, offset: usize) -> Option<usize> {
    if offset == 0 {
        return Some(0);
    }
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .nth(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paragraph(tree: &mut DocumentTree, parts: &[&str]) -> NodeId {
        let p = tree.create_element("p");
        let root = tree.root();
        tree.append(root, p);
        for part in parts {
            let t = tree.create_text(part);
            tree.append(p, t);
        }
        p
    }

    #[test]
    fn test_split_text_keeps_prefix_in_place() {
        let mut tree = DocumentTree::new("body");
        let p = paragraph(&mut tree, &["Hello world"]);
        let first = tree.children(p)[0];

        let second = tree.split_text(first, 5).unwrap();

        assert_eq!(tree.text(first), Some("Hello"));
        assert_eq!(tree.text(second), Some(" world"));
        assert_eq!(tree.children(p), &[first, second]);
    }

    #[test]
    fn test_split_text_counts_characters_not_bytes() {
        let mut tree = DocumentTree::new("body");
        let p = paragraph(&mut tree, &["héllo"]);
        let first = tree.children(p)[0];

        let second = tree.split_text(first, 2).unwrap();

        assert_eq!(tree.text(first), Some("hé"));
        assert_eq!(tree.text(second), Some("llo"));
    }

    #[test]
    fn test_split_text_rejects_offset_past_end() {
        let mut tree = DocumentTree::new("body");
        let p = paragraph(&mut tree, &["abc"]);
        let first = tree.children(p)[0];

        assert_eq!(tree.split_text(first, 4), None);
        assert_eq!(tree.text(first), Some("abc"));
    }

    #[test]
    fn test_discarded_handles_go_stale_even_when_slot_reused() {
        let mut tree = DocumentTree::new("body");
        let p = paragraph(&mut tree, &["a"]);
        let text = tree.children(p)[0];

        tree.discard(text);
        let reused = tree.create_text("b");

        assert!(!tree.contains(text));
        assert!(tree.contains(reused));
        assert_ne!(text, reused);
    }

    #[test]
    fn test_wrap_and_unwrap_restore_structure() {
        let mut tree = DocumentTree::new("body");
        let p = paragraph(&mut tree, &["a", "b", "c"]);
        let b = tree.children(p)[1];
        let span = tree.create_element("span");

        tree.wrap(b, span);
        assert_eq!(tree.children(p).len(), 3);
        assert_eq!(tree.children(span), &[b]);
        assert_eq!(tree.parent(b), Some(span));

        let lifted = tree.unwrap(span);
        assert_eq!(lifted, vec![b]);
        assert_eq!(tree.parent(b), Some(p));
        assert!(!tree.contains(span));
        assert_eq!(tree.text_content(p), "abc");
    }

    #[test]
    fn test_normalize_text_merges_and_drops_empty() {
        let mut tree = DocumentTree::new("body");
        let p = paragraph(&mut tree, &["a", "", "b"]);
        let em = tree.create_element("em");
        tree.append(p, em);
        let c = tree.create_text("c");
        tree.append(p, c);

        tree.normalize_text(p);

        let children = tree.children(p);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.text(children[0]), Some("ab"));
        assert_eq!(children[1], em);
        assert_eq!(tree.text(children[2]), Some("c"));
    }

    #[test]
    fn test_insert_refuses_cycles() {
        let mut tree = DocumentTree::new("body");
        let p = paragraph(&mut tree, &[]);
        let em = tree.create_element("em");
        tree.append(p, em);

        tree.append(em, p);

        assert_eq!(tree.parent(em), Some(p));
        assert!(tree.is_attached(p));
    }

    #[test]
    fn test_detached_nodes_are_not_attached() {
        let mut tree = DocumentTree::new("body");
        let p = paragraph(&mut tree, &["x"]);
        assert!(tree.is_attached(p));

        tree.detach(p);

        assert!(tree.contains(p));
        assert!(!tree.is_attached(p));
    }
}
