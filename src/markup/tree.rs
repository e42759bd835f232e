//! Markup tree
//!
//! An arena of nodes parsed from a stored HTML fragment. Only `Text` nodes
//! carry renderable text; elements keep their original start and end tags
//! and text keeps its source, so serializing an untouched subtree
//! reproduces it.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::path::NodePath;
use crate::error::MarkupError;

/// Elements that never have content or an end tag in HTML
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Start tags that close an open `p`
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "dialog", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hgroup", "hr", "li", "main", "menu", "nav", "ol", "p", "pre", "section", "table",
    "ul",
];

/// Elements an implied end tag never reaches past
const SCOPE_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "template", "th",
];

/// Index of a node in its tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// An element node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,
    /// Everything between `<` and `>` of the start tag (without a trailing `/`)
    pub start_tag: String,
    /// Written as `<name/>` in the source
    pub self_closing: bool,
    /// Text between `</` and `>` of the end tag; `None` when the source omits it
    pub end_tag: Option<String>,
}

impl Element {
    /// Build an element from a tag name and attribute pairs (values are escaped)
    pub fn new(name: &str, attributes: &[(&str, &str)]) -> Self {
        let mut start_tag = name.to_string();
        for (key, value) in attributes {
            start_tag.push(' ');
            start_tag.push_str(key);
            start_tag.push_str("=\"");
            start_tag.push_str(&html_escape::encode_double_quoted_attribute(value));
            start_tag.push('"');
        }
        Self {
            name: name.to_ascii_lowercase(),
            start_tag,
            self_closing: false,
            end_tag: Some(name.to_string()),
        }
    }

    /// Look up a decoded attribute value
    pub fn attribute(&self, key: &str) -> Option<String> {
        let start = BytesStart::from_content(self.start_tag.as_str(), self.start_tag_name_len());
        start
            .attributes()
            .with_checks(false)
            .flatten()
            .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(key.as_bytes()))
            .map(|attr| {
                let raw = String::from_utf8_lossy(&attr.value);
                html_escape::decode_html_entities(&raw).into_owned()
            })
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    fn start_tag_name_len(&self) -> usize {
        self.start_tag
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(self.start_tag.len())
    }
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Synthetic fragment root
    Root,
    Element(Element),
    /// Decoded text
    Text(String),
    /// Comments, doctype and the like, emitted verbatim
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Source text of an unmodified text node
    source: Option<String>,
}

/// Arena-backed markup tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupTree {
    nodes: Vec<NodeData>,
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupTree {
    /// Create an empty tree holding only the root
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
                source: None,
            }],
        }
    }

    /// Parse an HTML fragment leniently
    ///
    /// Void elements never open a scope, start tags end the elements HTML
    /// closes implicitly (`p`, `li`, table cells), an end tag closes the
    /// nearest open element with the same name, and end tags with no open
    /// match are dropped. A `<` that cannot start markup is text.
    pub fn parse(html: &str) -> Result<Self, MarkupError> {
        let html = escape_stray_brackets(html);
        let mut tree = Self::new();
        let mut open: Vec<NodeId> = Vec::new();

        let mut reader = Reader::from_str(&html);
        reader.check_end_names(false);

        loop {
            let position = reader.buffer_position();
            let event = reader.read_event().map_err(|e| MarkupError::Parse {
                position,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => tree.open_element(&mut open, element_from(&e, false, position)?),
                Event::Empty(e) => tree.open_element(&mut open, element_from(&e, true, position)?),
                Event::End(e) => {
                    let raw = utf8(&e, position)?;
                    let name = raw.trim_end().to_ascii_lowercase();
                    if let Some(depth) = open
                        .iter()
                        .rposition(|id| tree.element(*id).is_some_and(|el| el.name == name))
                    {
                        if let NodeKind::Element(el) = &mut tree.nodes[open[depth].0].kind {
                            el.end_tag = Some(raw.to_string());
                        }
                        open.truncate(depth);
                    }
                }
                Event::Text(e) => {
                    let raw = utf8(&e, position)?;
                    let current = open.last().copied().unwrap_or_else(|| tree.root());
                    tree.append_text(current, &html_escape::decode_html_entities(raw), raw);
                }
                Event::CData(e) => {
                    let raw = utf8(&e, position)?;
                    let current = open.last().copied().unwrap_or_else(|| tree.root());
                    tree.append_text(current, raw, &format!("<![CDATA[{}]]>", raw));
                }
                Event::Comment(e) => {
                    let raw = utf8(&e, position)?;
                    let current = open.last().copied().unwrap_or_else(|| tree.root());
                    tree.append(current, NodeKind::Raw(format!("<!--{}-->", raw)));
                }
                Event::DocType(e) => {
                    let raw = utf8(&e, position)?;
                    let current = open.last().copied().unwrap_or_else(|| tree.root());
                    tree.append(current, NodeKind::Raw(format!("<!DOCTYPE {}>", raw)));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// True when the fragment has no content at all
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Path from the root, or `None` for nodes detached from the tree
    pub fn path_of(&self, id: NodeId) -> Option<NodePath> {
        let mut steps = Vec::new();
        let mut node = id;
        while let Some(parent) = self.parent(node) {
            let index = self.children(parent).iter().position(|c| *c == node)?;
            steps.push(index);
            node = parent;
        }
        if node != self.root() {
            return None;
        }
        steps.reverse();
        Some(NodePath::from_steps(steps))
    }

    /// Follow a path from the root
    pub fn resolve(&self, path: &NodePath) -> Option<NodeId> {
        path.steps()
            .iter()
            .try_fold(self.root(), |node, step| self.children(node).get(*step).copied())
    }

    /// Append a child node
    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            source: None,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Insert a node directly after `sibling` under the same parent
    pub fn insert_after(&mut self, sibling: NodeId, kind: NodeKind) -> Option<NodeId> {
        let parent = self.parent(sibling)?;
        let index = self.children(parent).iter().position(|c| *c == sibling)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            source: None,
        });
        self.nodes[parent.0].children.insert(index + 1, id);
        Some(id)
    }

    /// Replace the text of a text node; returns false for other kinds
    pub fn set_text(&mut self, id: NodeId, text: String) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(NodeData {
                kind: NodeKind::Text(current),
                source,
                ..
            }) => {
                *current = text;
                *source = None;
                true
            }
            _ => false,
        }
    }

    /// Detach a node from its parent; the arena slot stays but becomes unreachable
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].children.retain(|c| *c != id);
            self.nodes[id.0].parent = None;
        }
    }

    /// Nodes reachable from the root in pre-order (root included)
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Concatenated text of every reachable text node
    pub fn text_content(&self) -> String {
        self.pre_order()
            .into_iter()
            .filter_map(|id| self.text(id))
            .collect()
    }

    /// Serialize the whole tree
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root(), &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Root => self.write_children(id, out),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.start_tag);
                out.push_str(if el.self_closing { "/>" } else { ">" });
                if el.is_void() {
                    return;
                }
                self.write_children(id, out);
                if let Some(end_tag) = &el.end_tag {
                    out.push_str("</");
                    out.push_str(end_tag);
                    out.push('>');
                }
            }
            NodeKind::Text(text) => match &self.nodes[id.0].source {
                Some(source) => out.push_str(source),
                None => out.push_str(&html_escape::encode_text(text)),
            },
            NodeKind::Raw(raw) => out.push_str(raw),
        }
    }

    fn write_children(&self, id: NodeId, out: &mut String) {
        for child in &self.nodes[id.0].children {
            self.write_node(*child, out);
        }
    }

    /// Append a parsed element under the innermost open element
    ///
    /// HTML ignores `/>` on non-void elements outside SVG and MathML, so
    /// those still open a scope.
    fn open_element(&mut self, open: &mut Vec<NodeId>, element: Element) {
        close_implied(self, open, &element.name);
        let foreign = is_foreign(&element.name)
            || open
                .iter()
                .any(|id| self.element(*id).is_some_and(|el| is_foreign(&el.name)));
        let opens_scope = !element.is_void() && !(element.self_closing && foreign);

        let current = open.last().copied().unwrap_or_else(|| self.root());
        let id = self.append(current, NodeKind::Element(element));
        if opens_scope {
            open.push(id);
        }
    }

    /// Text events are merged into a preceding text sibling
    fn append_text(&mut self, parent: NodeId, text: &str, source: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.children(parent).last() {
            let node = &mut self.nodes[last.0];
            if let NodeKind::Text(existing) = &mut node.kind {
                existing.push_str(text);
                if let Some(existing_source) = &mut node.source {
                    existing_source.push_str(source);
                }
                return;
            }
        }
        let id = self.append(parent, NodeKind::Text(text.to_string()));
        self.nodes[id.0].source = Some(source.to_string());
    }
}

fn is_foreign(name: &str) -> bool {
    name == "svg" || name == "math"
}

/// Close the elements HTML ends implicitly when a `name` start tag opens
fn close_implied(tree: &MarkupTree, open: &mut Vec<NodeId>, name: &str) {
    match name {
        "li" => close_in_scope(tree, open, &["li"], &["ol", "ul"]),
        "dd" | "dt" => close_in_scope(tree, open, &["dd", "dt"], &["dl"]),
        "tr" => close_in_scope(tree, open, &["tr", "td", "th"], &["table", "thead", "tbody", "tfoot"]),
        "td" | "th" => close_in_scope(tree, open, &["td", "th"], &["tr", "table"]),
        "thead" | "tbody" | "tfoot" => {
            close_in_scope(tree, open, &["thead", "tbody", "tfoot", "tr", "td", "th"], &["table"])
        }
        "option" => close_in_scope(tree, open, &["option"], &["select", "datalist"]),
        _ => {}
    }
    if CLOSES_PARAGRAPH.contains(&name) {
        close_in_scope(tree, open, &["p"], &[]);
    }
}

/// Truncate `open` at the outermost `targets` element below the nearest boundary
fn close_in_scope(tree: &MarkupTree, open: &mut Vec<NodeId>, targets: &[&str], boundaries: &[&str]) {
    let mut close_at = None;
    for (depth, id) in open.iter().enumerate().rev() {
        let Some(el) = tree.element(*id) else {
            continue;
        };
        let name = el.name.as_str();
        if targets.contains(&name) {
            close_at = Some(depth);
        } else if boundaries.contains(&name) || SCOPE_BOUNDARIES.contains(&name) {
            break;
        }
    }
    if let Some(depth) = close_at {
        open.truncate(depth);
    }
}

/// Escape every `<` that cannot start markup so the reader sees it as text
fn escape_stray_brackets(html: &str) -> Cow<'_, str> {
    let bytes = html.as_bytes();
    let mut escaped: Option<String> = None;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        if starts_markup(&bytes[i + 1..]) {
            i = skip_markup(bytes, i);
            continue;
        }
        let out = escaped.get_or_insert_with(|| String::with_capacity(html.len() + 8));
        out.push_str(&html[copied..i]);
        out.push_str("&lt;");
        i += 1;
        copied = i;
    }

    match escaped {
        Some(mut out) => {
            out.push_str(&html[copied..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(html),
    }
}

fn starts_markup(rest: &[u8]) -> bool {
    match rest {
        [c, ..] if c.is_ascii_alphabetic() => true,
        [b'/', c, ..] if c.is_ascii_alphabetic() => true,
        [b'!', ..] => {
            rest.starts_with(b"!--")
                || rest.starts_with(b"![CDATA[")
                || rest.get(1..8).is_some_and(|s| s.eq_ignore_ascii_case(b"doctype"))
        }
        _ => false,
    }
}

/// Index just past the tag, comment or CDATA section starting at `start`
fn skip_markup(bytes: &[u8], start: usize) -> usize {
    let rest = &bytes[start..];
    if rest.starts_with(b"<!--") {
        return find(rest, b"-->").map_or(bytes.len(), |end| start + end + 3);
    }
    if rest.starts_with(b"<![CDATA[") {
        return find(rest, b"]]>").map_or(bytes.len(), |end| start + end + 3);
    }

    let mut quote = None;
    for (offset, &b) in rest.iter().enumerate().skip(1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return start + offset + 1,
            None => {}
        }
    }
    bytes.len()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn element_from(e: &BytesStart<'_>, self_closing: bool, position: usize) -> Result<Element, MarkupError> {
    let start_tag = utf8(e, position)?.trim_end().to_string();
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    Ok(Element {
        name,
        start_tag,
        self_closing,
        end_tag: None,
    })
}

fn utf8(bytes: &[u8], position: usize) -> Result<&str, MarkupError> {
    std::str::from_utf8(bytes).map_err(|e| MarkupError::Parse {
        position,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_fragment() {
        let tree = MarkupTree::parse("<p>Alpha <em>Beta</em> Gamma</p>").unwrap();
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.element(p).unwrap().name, "p");
        assert_eq!(tree.children(p).len(), 3);
        assert_eq!(tree.text_content(), "Alpha Beta Gamma");
    }

    #[test]
    fn test_round_trip_preserves_start_tags() {
        let html = r#"<p class="lede" id="intro">Hello <a href="/x?a=1&amp;b=2">world</a></p><hr><img src="a.png"/>"#;
        let tree = MarkupTree::parse(html).unwrap();
        assert_eq!(tree.to_html(), html);
    }

    #[test]
    fn test_decodes_entities_in_text() {
        let tree = MarkupTree::parse("<p>Fish &amp; chips&nbsp;today</p>").unwrap();
        assert_eq!(tree.text_content(), "Fish & chips\u{a0}today");
    }

    #[test]
    fn test_void_elements_do_not_swallow_siblings() {
        let tree = MarkupTree::parse("<p>one<br>two</p>").unwrap();
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.children(p).len(), 3);
        assert_eq!(tree.text_content(), "onetwo");
    }

    #[test]
    fn test_unmatched_end_tag_is_ignored() {
        let tree = MarkupTree::parse("<p>one</div>two</p>").unwrap();
        assert_eq!(tree.children(tree.root()).len(), 1);
        assert_eq!(tree.text_content(), "onetwo");
    }

    #[test]
    fn test_path_round_trip() {
        let tree = MarkupTree::parse("<p>a<b>bold</b></p><p>c</p>").unwrap();
        for id in tree.pre_order() {
            let path = tree.path_of(id).unwrap();
            assert_eq!(tree.resolve(&path), Some(id));
        }
        assert!(tree.resolve(&NodePath::from_steps(vec![5])).is_none());
    }

    #[test]
    fn test_insert_after_and_detach() {
        let mut tree = MarkupTree::parse("<p>abc</p>").unwrap();
        let p = tree.children(tree.root())[0];
        let text = tree.children(p)[0];
        let inserted = tree.insert_after(text, NodeKind::Text("def".into())).unwrap();
        assert_eq!(tree.children(p), &[text, inserted]);

        tree.detach(text);
        assert_eq!(tree.children(p), &[inserted]);
        assert!(tree.path_of(text).is_none());
        assert_eq!(tree.to_html(), "<p>def</p>");
    }

    #[test]
    fn test_element_attribute_lookup() {
        let el = Element::new("mark", &[("class", "hl"), ("data-ids", "a \"b\"")]);
        assert_eq!(el.attribute("class").as_deref(), Some("hl"));
        assert_eq!(el.attribute("data-ids").as_deref(), Some("a \"b\""));
        assert_eq!(el.attribute("missing"), None);
    }

    #[test]
    fn test_comments_are_kept_verbatim() {
        let html = "<p>a<!-- note -->b</p>";
        let tree = MarkupTree::parse(html).unwrap();
        assert_eq!(tree.to_html(), html);
        assert_eq!(tree.text_content(), "ab");
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        let tree = MarkupTree::parse("<p>a < b and c</p><p>next</p>").unwrap();
        assert_eq!(tree.children(tree.root()).len(), 2);
        assert_eq!(tree.text_content(), "a < b and cnext");
        assert_eq!(tree.to_html(), "<p>a &lt; b and c</p><p>next</p>");
    }

    #[test]
    fn test_angle_bracket_in_attribute_value() {
        let html = r#"<p title="x<y">1 <2</p>"#;
        let tree = MarkupTree::parse(html).unwrap();
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.element(p).unwrap().attribute("title").as_deref(), Some("x<y"));
        assert_eq!(tree.text_content(), "1 <2");
    }

    #[test]
    fn test_paragraph_start_closes_open_paragraph() {
        let tree = MarkupTree::parse("<p>one<p>two").unwrap();
        let root = tree.children(tree.root());
        assert_eq!(root.len(), 2);
        assert_eq!(tree.text(tree.children(root[1])[0]), Some("two"));
        assert_eq!(tree.to_html(), "<p>one<p>two");
    }

    #[test]
    fn test_block_start_closes_paragraph() {
        let tree = MarkupTree::parse("<p>intro<div>body</div>").unwrap();
        assert_eq!(tree.children(tree.root()).len(), 2);
    }

    #[test]
    fn test_list_items_close_implicitly() {
        let html = "<ul><li>one<li>two<ul><li>nested</ul></ul>";
        let tree = MarkupTree::parse(html).unwrap();
        let ul = tree.children(tree.root())[0];
        let items = tree.children(ul);
        assert_eq!(items.len(), 2);
        // The nested list stays inside the second item
        assert_eq!(tree.children(items[1]).len(), 2);
        assert_eq!(tree.to_html(), html);
    }

    #[test]
    fn test_end_tag_text_is_preserved() {
        let html = "<P>Upper</P><p>lower</p>";
        let tree = MarkupTree::parse(html).unwrap();
        let upper = tree.children(tree.root())[0];
        assert_eq!(tree.element(upper).unwrap().name, "p");
        assert_eq!(tree.to_html(), html);
    }

    #[test]
    fn test_untouched_text_keeps_its_source() {
        let html = "<p>Fish &amp; chips &#39;today&#39;</p>";
        let mut tree = MarkupTree::parse(html).unwrap();
        assert_eq!(tree.to_html(), html);

        let text = tree.children(tree.children(tree.root())[0])[0];
        tree.set_text(text, "Fish & chips".to_string());
        assert_eq!(tree.to_html(), "<p>Fish &amp; chips</p>");
    }

    #[test]
    fn test_self_closing_non_void_element_opens_scope() {
        let tree = MarkupTree::parse("<div/>text<svg><path/>x</svg>").unwrap();
        let div = tree.children(tree.root())[0];
        assert_eq!(tree.children(div).len(), 2);

        let svg = tree.children(div)[1];
        assert_eq!(tree.children(svg).len(), 2);
        assert_eq!(tree.to_html(), "<div/>text<svg><path/>x</svg>");
    }
}
