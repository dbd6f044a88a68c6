use super::{DocumentTree, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img"];

impl DocumentTree {
    /// Render a node and its subtree as HTML.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    /// Render only the children of a node as HTML.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            Some(NodeData::Text(text)) => {
                out.push_str(&html_escape::encode_text(text));
            }
            Some(NodeData::Element(element)) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_attributes_in_order_and_escapes() {
        let mut tree = DocumentTree::new("body");
        let root = tree.root();
        let span = tree.create_element("span");
        tree.set_attribute(span, "title", "a \"quoted\" value");
        tree.set_attribute(span, "class", "x");
        tree.append(root, span);
        let text = tree.create_text("1 < 2 & 3");
        tree.append(span, text);

        insta::assert_snapshot!(
            tree.outer_html(root),
            @r#"<body><span class="x" title="a &quot;quoted&quot; value">1 &lt; 2 &amp; 3</span></body>"#
        );
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let tree = DocumentTree::from_markdown("a  \nb\n\n---\n");

        insta::assert_snapshot!(tree.inner_html(tree.root()), @"<p>a<br>b</p><hr>");
    }
}
