use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

use super::{DocumentTree, NodeId};

impl DocumentTree {
    /// Build a tree from Markdown source.
    ///
    /// The root is a `body` element; block and inline constructs map onto the
    /// usual HTML element names. Raw HTML is kept as literal text.
    pub fn from_markdown(source: &str) -> Self {
        let mut tree = DocumentTree::new("body");
        let mut stack: Vec<NodeId> = vec![tree.root()];

        for event in Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH) {
            let current = *stack.last().unwrap_or(&tree.root());
            match event {
                Event::Start(tag) => {
                    let element = tree.open_tag(current, &tag);
                    stack.push(element);
                }
                Event::End(_) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                    if tree.tag(current) == Some("img") {
                        let alt = format!("{}{}", tree.attribute(current, "alt").unwrap_or(""), text);
                        tree.set_attribute(current, "alt", &alt);
                    } else {
                        tree.append_text(current, &text);
                    }
                }
                Event::Code(code) => {
                    let element = tree.create_element("code");
                    tree.append(current, element);
                    tree.append_text(element, &code);
                }
                Event::SoftBreak => tree.append_text(current, "\n"),
                Event::HardBreak => {
                    let br = tree.create_element("br");
                    tree.append(current, br);
                }
                Event::Rule => {
                    let hr = tree.create_element("hr");
                    tree.append(current, hr);
                }
                _ => {}
            }
        }

        tree
    }

    fn open_tag(&mut self, parent: NodeId, tag: &Tag) -> NodeId {
        let element = match tag {
            Tag::Paragraph => self.create_element("p"),
            Tag::Heading { level, .. } => self.create_element(heading_tag(*level)),
            Tag::BlockQuote(_) => self.create_element("blockquote"),
            Tag::CodeBlock(kind) => {
                let pre = self.create_element("pre");
                if let CodeBlockKind::Fenced(lang) = kind
                    && !lang.is_empty()
                {
                    self.set_attribute(pre, "data-lang", lang);
                }
                pre
            }
            Tag::List(Some(_)) => self.create_element("ol"),
            Tag::List(None) => self.create_element("ul"),
            Tag::Item => self.create_element("li"),
            Tag::Emphasis => self.create_element("em"),
            Tag::Strong => self.create_element("strong"),
            Tag::Strikethrough => self.create_element("del"),
            Tag::Link { dest_url, .. } => {
                let a = self.create_element("a");
                self.set_attribute(a, "href", dest_url);
                a
            }
            Tag::Image { dest_url, .. } => {
                let img = self.create_element("img");
                self.set_attribute(img, "src", dest_url);
                img
            }
            _ => self.create_element("div"),
        };
        self.append(parent, element);
        element
    }

    /// Append text to `parent`, extending its last child when that is already text.
    fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.children(parent).last()
            && let Some(existing) = self.text(last)
        {
            let merged = format!("{existing}{text}");
            self.set_text(last, &merged);
            return;
        }
        let node = self.create_text(text);
        self.append(parent, node);
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_paragraph_becomes_single_text_run() {
        let tree = DocumentTree::from_markdown("The quick brown fox");
        let root = tree.root();

        assert_eq!(tree.children(root).len(), 1);
        let p = tree.children(root)[0];
        assert_eq!(tree.tag(p), Some("p"));
        assert_eq!(tree.children(p).len(), 1);
        assert_eq!(tree.text_content(p), "The quick brown fox");
    }

    #[test]
    fn test_inline_markup_nests_elements() {
        let tree = DocumentTree::from_markdown("Some *emphasis* and **strong** `code`");
        let p = tree.children(tree.root())[0];
        let tags: Vec<_> = tree
            .children(p)
            .iter()
            .filter_map(|&c| tree.tag(c))
            .collect();

        assert_eq!(tags, vec!["em", "strong", "code"]);
        assert_eq!(tree.text_content(p), "Some emphasis and strong code");
    }

    #[test]
    fn test_headings_lists_and_links() {
        let tree = DocumentTree::from_markdown("## Title\n\n- one\n- [two](https://example.com)\n");
        let root = tree.root();
        let children = tree.children(root);

        assert_eq!(tree.tag(children[0]), Some("h2"));
        assert_eq!(tree.tag(children[1]), Some("ul"));
        let a = tree
            .descendants(children[1])
            .into_iter()
            .find(|&n| tree.tag(n) == Some("a"))
            .unwrap();
        assert_eq!(tree.attribute(a, "href"), Some("https://example.com"));
        assert_eq!(tree.text_content(a), "two");
    }

    #[test]
    fn test_image_text_goes_to_alt() {
        let tree = DocumentTree::from_markdown("![a cat](cat.png)");
        let img = tree
            .descendants(tree.root())
            .into_iter()
            .find(|&n| tree.tag(n) == Some("img"))
            .unwrap();

        assert_eq!(tree.attribute(img, "alt"), Some("a cat"));
        assert!(tree.children(img).is_empty());
    }
}
