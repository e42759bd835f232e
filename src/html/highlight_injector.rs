//! Highlight injection into a markup tree
//!
//! Wraps every resolved range in highlight wrapper elements. A range that
//! crosses element boundaries gets one wrapper per text leaf it touches, all
//! sharing the range's highlight id, so the markup stays well formed.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::anchoring::{PositionMap, ResolvedRange};
use crate::config::HighlightConfig;
use crate::markup::{Element, MarkupTree, NodeId, NodeKind, NodePath};

/// Parents that only allow whitespace text between their structural children
const STRUCTURAL_PARENTS: &[&str] = &[
    "table", "thead", "tbody", "tfoot", "tr", "colgroup", "ul", "ol", "dl", "select",
];

/// Result of highlight injection
#[derive(Debug, Clone)]
pub struct InjectionResult {
    /// The rendered tree with highlight wrappers
    pub markup: MarkupTree,
    /// Highlight ids rendered, in document order
    pub injected: Vec<String>,
    /// Annotations on ranges that could not be rendered
    pub failed_annotations: Vec<String>,
}

/// Reasons a range cannot be wrapped
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("range {start}..{end} extends past the end of the text ({len})")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("range {start}..{end} covers no text")]
    NoText { start: usize, end: usize },

    #[error("leaf {0} is missing or no longer text")]
    MissingLeaf(NodePath),

    #[error("leaf {path} holds {actual} characters, {needed} needed")]
    ShortLeaf {
        path: NodePath,
        actual: usize,
        needed: usize,
    },
}

/// Slice of one text leaf to wrap, in chars
#[derive(Debug, Clone, Copy)]
struct Piece {
    node: NodeId,
    from: usize,
    to: usize,
}

/// Renders highlight wrappers for resolved ranges
#[derive(Debug, Clone, Default)]
pub struct HighlightRenderer {
    config: HighlightConfig,
}

impl HighlightRenderer {
    pub fn new(config: HighlightConfig) -> Self {
        Self { config }
    }

    /// Render `ranges` into a copy of `original`
    ///
    /// `map` must come from projecting `original`. Ranges whose leaves do not
    /// match the tree are skipped and their annotations reported as failed;
    /// the rest of the document still renders. Ranges covering only
    /// whitespace between structural elements are skipped without failing.
    /// `pulse` holds annotation ids whose wrappers are marked as newly
    /// created.
    pub fn inject(
        &self,
        original: &MarkupTree,
        map: &PositionMap,
        ranges: &[ResolvedRange],
        pulse: &HashSet<String>,
    ) -> InjectionResult {
        let mut markup = original.clone();
        let mut injected = Vec::with_capacity(ranges.len());
        let mut failed_annotations: Vec<String> = Vec::new();
        let mut emptied = Vec::new();

        // Rightmost first: splitting a leaf keeps its prefix in place, so
        // leaves still to be processed keep their node ids and offsets.
        let mut order: Vec<&ResolvedRange> = ranges.iter().collect();
        order.sort_by(|a, b| b.start.cmp(&a.start));

        for range in order {
            let pieces = match plan(&markup, map, range) {
                Ok(pieces) => pieces,
                Err(e) => {
                    warn!("Could not render highlight {}: {}", range.highlight_id(), e);
                    for id in &range.annotation_ids {
                        if !failed_annotations.contains(id) {
                            failed_annotations.push(id.clone());
                        }
                    }
                    continue;
                }
            };
            if pieces.is_empty() {
                debug!("Skipped {}: structural whitespace only", range.highlight_id());
                continue;
            }

            let wrapper = self.wrapper_for(range, pulse);
            for piece in pieces.iter().rev() {
                if split_and_wrap(&mut markup, piece, &wrapper) {
                    emptied.push(piece.node);
                }
            }
            injected.push(range.highlight_id());
        }

        for node in emptied {
            if markup.text(node).is_some_and(str::is_empty) {
                markup.detach(node);
            }
        }

        injected.reverse();
        debug!(
            "Injected {} highlights, {} annotations failed",
            injected.len(),
            failed_annotations.len()
        );

        InjectionResult {
            markup,
            injected,
            failed_annotations,
        }
    }

    /// Build the wrapper element for one range
    fn wrapper_for(&self, range: &ResolvedRange, pulse: &HashSet<String>) -> Element {
        let prefix = &self.config.class_prefix;
        let is_new = range.annotation_ids.iter().any(|id| pulse.contains(id));

        let mut class = prefix.clone();
        if range.annotation_ids.len() > 1 {
            class.push_str(&format!(" {}-multi", prefix));
        }
        if is_new {
            class.push_str(&format!(" {}-new", prefix));
        }

        let ids = range.annotation_ids.join(" ");
        let highlight_id = range.highlight_id();
        let mut attributes = vec![
            ("class", class.as_str()),
            (self.config.id_attribute.as_str(), ids.as_str()),
            (self.config.highlight_attribute.as_str(), highlight_id.as_str()),
        ];
        if is_new {
            attributes.push((self.config.new_attribute.as_str(), "true"));
        }

        Element::new(&self.config.element, &attributes)
    }
}

/// Validate every leaf of a range before anything is mutated
///
/// An empty plan means every leaf in the range is structural whitespace.
fn plan(markup: &MarkupTree, map: &PositionMap, range: &ResolvedRange) -> Result<Vec<Piece>, InjectError> {
    if range.end > map.text_len() {
        return Err(InjectError::OutOfBounds {
            start: range.start,
            end: range.end,
            len: map.text_len(),
        });
    }

    let leaves = map.leaves_in(range.start, range.end);
    if leaves.is_empty() {
        return Err(InjectError::NoText {
            start: range.start,
            end: range.end,
        });
    }

    let mut pieces = Vec::new();
    for leaf in leaves {
        let text = markup
            .text(leaf.node)
            .filter(|_| markup.parent(leaf.node).is_some())
            .ok_or_else(|| InjectError::MissingLeaf(leaf.path.clone()))?;

        let from = range.start.max(leaf.start) - leaf.start;
        let to = range.end.min(leaf.end) - leaf.start;
        let actual = text.chars().count();
        if actual < to {
            return Err(InjectError::ShortLeaf {
                path: leaf.path.clone(),
                actual,
                needed: to,
            });
        }

        if is_structural_whitespace(markup, leaf.node, text, from, to) {
            continue;
        }
        pieces.push(Piece {
            node: leaf.node,
            from,
            to,
        });
    }
    Ok(pieces)
}

fn is_structural_whitespace(markup: &MarkupTree, node: NodeId, text: &str, from: usize, to: usize) -> bool {
    let blank = text
        .chars()
        .skip(from)
        .take(to - from)
        .all(char::is_whitespace);
    blank
        && markup
            .parent(node)
            .and_then(|parent| markup.element(parent))
            .is_some_and(|el| STRUCTURAL_PARENTS.contains(&el.name.as_str()))
}

/// Split a leaf around `piece` and wrap the middle part
///
/// The leaf keeps the text before the piece; the wrapper and any remaining
/// text are inserted after it. Returns true when the leaf was left empty.
fn split_and_wrap(markup: &mut MarkupTree, piece: &Piece, wrapper: &Element) -> bool {
    let Some(text) = markup.text(piece.node).map(str::to_string) else {
        return false;
    };
    let from = byte_index(&text, piece.from);
    let to = byte_index(&text, piece.to);
    let (before, rest) = text.split_at(from);
    let (middle, after) = rest.split_at(to - from);

    let Some(wrapper_id) = markup.insert_after(piece.node, NodeKind::Element(wrapper.clone())) else {
        return false;
    };
    markup.append(wrapper_id, NodeKind::Text(middle.to_string()));
    if !after.is_empty() {
        markup.insert_after(wrapper_id, NodeKind::Text(after.to_string()));
    }
    markup.set_text(piece.node, before.to_string());
    before.is_empty()
}

fn byte_index(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index)
}
