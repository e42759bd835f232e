//! Selection resolution
//!
//! Converts a live selection, reported as (node path, offset) boundary
//! points, into a candidate anchor over the plain-text projection.

use serde::{Deserialize, Serialize};

use super::projector::{PositionMap, Projection};
use crate::error::CaptureError;
use crate::markup::NodePath;

/// One boundary point of a live selection
///
/// For a text node `offset` counts chars into its text. For an element it
/// counts child nodes, so `offset == 0` sits before the first child and
/// `offset == child_count` after the last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SelectionPoint {
    Inside { path: NodePath, offset: usize },
    /// The boundary lies outside the rendered content region
    Outside,
}

impl SelectionPoint {
    pub fn inside(path: NodePath, offset: usize) -> Self {
        Self::Inside { path, offset }
    }
}

/// A selection as the rendering layer reports it; anchor may follow focus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSelection {
    pub anchor: SelectionPoint,
    pub focus: SelectionPoint,
}

impl LiveSelection {
    pub fn new(anchor: SelectionPoint, focus: SelectionPoint) -> Self {
        Self { anchor, focus }
    }

    /// A selection spanning chars `[start, end)` of one text node
    pub fn within(path: NodePath, start: usize, end: usize) -> Self {
        Self {
            anchor: SelectionPoint::inside(path.clone(), start),
            focus: SelectionPoint::inside(path, end),
        }
    }
}

/// A captured, not yet persisted, plain-text range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCandidate {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Resolve a live selection against a projection of the same markup
///
/// Backwards selections are normalized so `start < end`. Selections whose
/// trimmed text is shorter than `min_chars` are rejected.
pub fn resolve_selection(
    projection: &Projection,
    selection: &LiveSelection,
    min_chars: usize,
) -> Result<AnchorCandidate, CaptureError> {
    let map = &projection.position_map;
    let a = point_offset(map, &selection.anchor)?;
    let b = point_offset(map, &selection.focus)?;
    let (start, end) = if a <= b { (a, b) } else { (b, a) };

    if start == end {
        return Err(CaptureError::Empty);
    }

    let text = projection
        .plain_text
        .slice(start, end)
        .ok_or(CaptureError::OutsideContent)?;

    let length = text.trim().chars().count();
    if length == 0 && min_chars == 0 {
        return Err(CaptureError::Empty);
    }
    if length < min_chars {
        return Err(CaptureError::TooShort {
            length,
            minimum: min_chars,
        });
    }

    Ok(AnchorCandidate {
        start,
        end,
        text: text.to_string(),
    })
}

/// Plain-text offset of one boundary point
fn point_offset(map: &PositionMap, point: &SelectionPoint) -> Result<usize, CaptureError> {
    let SelectionPoint::Inside { path, offset } = point else {
        return Err(CaptureError::OutsideContent);
    };
    let span = map
        .span(path)
        .ok_or_else(|| CaptureError::Unresolvable(path.clone()))?;

    if span.is_text {
        if *offset > span.end - span.start {
            return Err(CaptureError::Unresolvable(path.clone()));
        }
        return Ok(span.start + offset);
    }

    if *offset > span.child_count {
        return Err(CaptureError::Unresolvable(path.clone()));
    }
    if *offset == span.child_count {
        return Ok(span.end);
    }
    map.span(&path.child(*offset))
        .map(|child| child.start)
        .ok_or_else(|| CaptureError::Unresolvable(path.clone()))
}
