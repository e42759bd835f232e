//! Plain-text projection
//!
//! Flattens a markup tree into one contiguous string plus a position map from
//! plain-text offsets back to the text leaves that produced them. Offsets are
//! counted in chars. The traversal is a fixed pre-order walk over the arena,
//! so projecting the same markup twice always yields the same offsets.

use std::collections::HashMap;

use serde::Serialize;

use crate::markup::{MarkupTree, NodeId, NodeKind, NodePath};

/// Projected text with char-offset slicing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainText {
    text: String,
    /// Byte offset of every char, plus the total byte length
    char_bytes: Vec<usize>,
}

impl PlainText {
    pub fn new(text: &str) -> Self {
        let mut plain = Self {
            text: String::new(),
            char_bytes: vec![0],
        };
        plain.push_str(text);
        plain
    }

    fn push_str(&mut self, s: &str) {
        let base = self.text.len();
        self.char_bytes.pop();
        self.char_bytes
            .extend(s.char_indices().map(|(i, _)| base + i));
        self.text.push_str(s);
        self.char_bytes.push(self.text.len());
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.char_bytes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn byte_offset(&self, char_offset: usize) -> Option<usize> {
        self.char_bytes.get(char_offset).copied()
    }

    pub fn char_offset(&self, byte_offset: usize) -> Option<usize> {
        self.char_bytes.binary_search(&byte_offset).ok()
    }

    /// Text between two char offsets
    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        if start > end {
            return None;
        }
        Some(&self.text[self.byte_offset(start)?..self.byte_offset(end)?])
    }

    /// Start offsets of every occurrence of `needle` lying wholly inside
    /// `[from, to)`, overlapping occurrences included
    pub fn occurrences(&self, needle: &str, from: usize, to: usize) -> Vec<usize> {
        let (Some(lo), Some(hi)) = (self.byte_offset(from), self.byte_offset(to)) else {
            return Vec::new();
        };
        if needle.is_empty() || lo >= hi {
            return Vec::new();
        }

        let haystack = &self.text[lo..hi];
        let mut found = Vec::new();
        let mut at = 0;
        while let Some(pos) = haystack[at..].find(needle) {
            let hit = at + pos;
            if let Some(offset) = self.char_offset(lo + hit) {
                found.push(offset);
            }
            let step = haystack[hit..].chars().next().map_or(1, char::len_utf8);
            at = hit + step;
        }
        found
    }

    /// First occurrence of `needle` anywhere in the text
    pub fn first_occurrence(&self, needle: &str) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        let byte = self.text.find(needle)?;
        self.char_offset(byte)
    }
}

/// One text leaf in traversal order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafEntry {
    pub start: usize,
    pub end: usize,
    #[serde(skip)]
    pub node: NodeId,
    pub path: NodePath,
}

impl LeafEntry {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Plain-text extent of any node, text or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpan {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    pub child_count: usize,
    pub is_text: bool,
}

/// Offset-to-markup table for one projection of one tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    leaves: Vec<LeafEntry>,
    spans: HashMap<NodePath, NodeSpan>,
    text_len: usize,
}

impl PositionMap {
    /// Text leaves in traversal order; starts are non-decreasing and contiguous
    pub fn leaves(&self) -> &[LeafEntry] {
        &self.leaves
    }

    pub fn text_len(&self) -> usize {
        self.text_len
    }

    pub fn span(&self, path: &NodePath) -> Option<&NodeSpan> {
        self.spans.get(path)
    }

    /// The leaf holding the char at `offset`
    pub fn leaf_at(&self, offset: usize) -> Option<&LeafEntry> {
        let index = self.leaves.partition_point(|leaf| leaf.end <= offset);
        self.leaves
            .get(index)
            .filter(|leaf| leaf.start <= offset && offset < leaf.end)
    }

    /// Non-empty leaves intersecting `[start, end)`, in traversal order
    pub fn leaves_in(&self, start: usize, end: usize) -> &[LeafEntry] {
        let from = self.leaves.partition_point(|leaf| leaf.end <= start);
        let to = self.leaves.partition_point(|leaf| leaf.start < end);
        if from >= to {
            return &[];
        }
        &self.leaves[from..to]
    }
}

/// Result of projecting a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub plain_text: PlainText,
    pub position_map: PositionMap,
}

enum Frame {
    Enter(NodeId, NodePath),
    Exit(NodeId, NodePath, usize),
}

/// Project a tree to plain text and its position map
pub fn project(tree: &MarkupTree) -> Projection {
    let mut plain = PlainText::new("");
    let mut leaves = Vec::new();
    let mut spans = HashMap::new();

    let mut stack = vec![Frame::Enter(tree.root(), NodePath::root())];
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(id, path) => {
                let start = plain.len();
                if let Some(NodeKind::Text(text)) = tree.kind(id) {
                    plain.push_str(text);
                    let end = plain.len();
                    leaves.push(LeafEntry {
                        start,
                        end,
                        node: id,
                        path: path.clone(),
                    });
                    spans.insert(
                        path,
                        NodeSpan {
                            node: id,
                            start,
                            end,
                            child_count: 0,
                            is_text: true,
                        },
                    );
                    continue;
                }

                let children = tree.children(id);
                stack.push(Frame::Exit(id, path.clone(), start));
                for (index, child) in children.iter().enumerate().rev() {
                    stack.push(Frame::Enter(*child, path.child(index)));
                }
            }
            Frame::Exit(id, path, start) => {
                spans.insert(
                    path,
                    NodeSpan {
                        node: id,
                        start,
                        end: plain.len(),
                        child_count: tree.children(id).len(),
                        is_text: false,
                    },
                );
            }
        }
    }

    let text_len = plain.len();
    Projection {
        plain_text: plain,
        position_map: PositionMap {
            leaves,
            spans,
            text_len,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection_of(html: &str) -> Projection {
        project(&MarkupTree::parse(html).unwrap())
    }

    #[test]
    fn test_projects_leaves_in_document_order() {
        let projection = projection_of("<p>Alpha <em>Beta</em> Gamma</p>");
        assert_eq!(projection.plain_text.as_str(), "Alpha Beta Gamma");

        let bounds: Vec<(usize, usize)> = projection
            .position_map
            .leaves()
            .iter()
            .map(|leaf| (leaf.start, leaf.end))
            .collect();
        assert_eq!(bounds, vec![(0, 6), (6, 10), (10, 16)]);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let html = "<h2>Title</h2><p>One <a href=\"#\">two</a> three</p><ul><li>four</li></ul>";
        let first = projection_of(html);
        let second = projection_of(html);
        assert_eq!(first, second);
    }

    #[test]
    fn test_offsets_count_chars_not_bytes() {
        let projection = projection_of("<p>café <b>crème</b></p>");
        let plain = &projection.plain_text;
        assert_eq!(plain.len(), 11);
        assert_eq!(plain.slice(5, 10), Some("crème"));
        assert_eq!(projection.position_map.leaves()[1].start, 5);
    }

    #[test]
    fn test_element_spans_cover_descendants() {
        let projection = projection_of("<p>ab<em>cd</em></p><p>ef</p>");
        let first_p = projection.position_map.span(&"/0".parse().unwrap()).unwrap();
        assert_eq!((first_p.start, first_p.end, first_p.child_count), (0, 4, 2));

        let second_p = projection.position_map.span(&"/1".parse().unwrap()).unwrap();
        assert_eq!((second_p.start, second_p.end), (4, 6));
    }

    #[test]
    fn test_leaf_lookup() {
        let projection = projection_of("<p>ab<em>cd</em>ef</p>");
        let map = &projection.position_map;

        assert_eq!(map.leaf_at(0).unwrap().start, 0);
        assert_eq!(map.leaf_at(2).unwrap().start, 2);
        assert_eq!(map.leaf_at(5).unwrap().start, 4);
        assert!(map.leaf_at(6).is_none());

        let hit: Vec<usize> = map.leaves_in(1, 5).iter().map(|l| l.start).collect();
        assert_eq!(hit, vec![0, 2, 4]);
        assert!(map.leaves_in(6, 8).is_empty());
    }

    #[test]
    fn test_occurrences_include_overlaps() {
        let plain = PlainText::new("aaaa");
        assert_eq!(plain.occurrences("aa", 0, 4), vec![0, 1, 2]);
        assert_eq!(plain.occurrences("aa", 1, 3), vec![1]);
        assert!(plain.occurrences("", 0, 4).is_empty());
    }

    #[test]
    fn test_empty_markup() {
        let projection = projection_of("");
        assert!(projection.plain_text.is_empty());
        assert!(projection.position_map.leaves().is_empty());
    }
}
