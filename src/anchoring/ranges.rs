//! Range set resolution
//!
//! Flattens possibly-overlapping annotation ranges into non-overlapping
//! ranges, each tagged with every annotation covering it, using a boundary
//! sweep over start/end events.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

/// One annotation's live range over the current plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRange {
    pub annotation_id: String,
    pub start: usize,
    pub end: usize,
}

impl LiveRange {
    pub fn new(annotation_id: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            annotation_id: annotation_id.into(),
            start,
            end,
        }
    }
}

/// A non-overlapping range and the annotations covering it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRange {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "annotationIds")]
    pub annotation_ids: Vec<String>,
}

impl ResolvedRange {
    /// Identifier shared by every wrapper rendered for this range
    pub fn highlight_id(&self) -> String {
        format!("hl-{}-{}", self.start, self.end)
    }

    pub fn covers(&self, annotation_id: &str) -> bool {
        self.annotation_ids.iter().any(|id| id == annotation_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    // Ends sort before starts at the same position, so touching ranges never overlap
    End,
    Start,
}

/// Resolve live ranges into sorted, non-overlapping, non-empty ranges
///
/// Input order decides the order of ids within each output range. A repeated
/// annotation id is ignored after its first occurrence.
pub fn resolve_ranges(ranges: &[LiveRange]) -> Vec<ResolvedRange> {
    let mut seen = HashSet::new();
    let inputs: Vec<&LiveRange> = ranges
        .iter()
        .filter(|range| range.start < range.end)
        .filter(|range| seen.insert(range.annotation_id.as_str()))
        .collect();

    let mut events: Vec<(usize, EventKind, usize)> = Vec::with_capacity(inputs.len() * 2);
    for (index, range) in inputs.iter().enumerate() {
        events.push((range.start, EventKind::Start, index));
        events.push((range.end, EventKind::End, index));
    }
    events.sort();

    let mut resolved = Vec::new();
    let mut active: BTreeSet<usize> = BTreeSet::new();
    let mut segment_start = 0;

    for (position, kind, index) in events {
        if position > segment_start && !active.is_empty() {
            resolved.push(ResolvedRange {
                start: segment_start,
                end: position,
                annotation_ids: active
                    .iter()
                    .map(|i| inputs[*i].annotation_id.clone())
                    .collect(),
            });
        }
        segment_start = position;
        match kind {
            EventKind::Start => {
                active.insert(index);
            }
            EventKind::End => {
                active.remove(&index);
            }
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(ranges: &[ResolvedRange]) -> Vec<(usize, usize, Vec<&str>)> {
        ranges
            .iter()
            .map(|r| {
                (
                    r.start,
                    r.end,
                    r.annotation_ids.iter().map(String::as_str).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_overlap_splits_into_three() {
        let resolved = resolve_ranges(&[LiveRange::new("a", 0, 10), LiveRange::new("b", 5, 15)]);
        assert_eq!(
            bounds(&resolved),
            vec![
                (0, 5, vec!["a"]),
                (5, 10, vec!["a", "b"]),
                (10, 15, vec!["b"]),
            ]
        );
    }

    #[test]
    fn test_identical_ranges_collapse() {
        let resolved = resolve_ranges(&[LiveRange::new("a", 3, 8), LiveRange::new("b", 3, 8)]);
        assert_eq!(bounds(&resolved), vec![(3, 8, vec!["a", "b"])]);
    }

    #[test]
    fn test_touching_ranges_stay_separate() {
        let resolved = resolve_ranges(&[LiveRange::new("a", 0, 5), LiveRange::new("b", 5, 9)]);
        assert_eq!(bounds(&resolved), vec![(0, 5, vec!["a"]), (5, 9, vec!["b"])]);
    }

    #[test]
    fn test_nested_range() {
        let resolved = resolve_ranges(&[LiveRange::new("outer", 0, 20), LiveRange::new("inner", 5, 8)]);
        assert_eq!(
            bounds(&resolved),
            vec![
                (0, 5, vec!["outer"]),
                (5, 8, vec!["outer", "inner"]),
                (8, 20, vec!["outer"]),
            ]
        );
    }

    #[test]
    fn test_gaps_produce_no_range() {
        let resolved = resolve_ranges(&[LiveRange::new("a", 0, 2), LiveRange::new("b", 6, 9)]);
        assert_eq!(bounds(&resolved), vec![(0, 2, vec!["a"]), (6, 9, vec!["b"])]);
    }

    #[test]
    fn test_ids_follow_input_order() {
        let resolved = resolve_ranges(&[LiveRange::new("late", 4, 6), LiveRange::new("early", 0, 10)]);
        assert_eq!(resolved[1].annotation_ids, vec!["late", "early"]);
    }

    #[test]
    fn test_duplicate_ids_and_empty_ranges_ignored() {
        let resolved = resolve_ranges(&[
            LiveRange::new("a", 0, 4),
            LiveRange::new("a", 0, 4),
            LiveRange::new("z", 7, 7),
        ]);
        assert_eq!(bounds(&resolved), vec![(0, 4, vec!["a"])]);
        assert!(resolve_ranges(&[]).is_empty());
    }

    #[test]
    fn test_output_is_sorted_and_disjoint() {
        let input = [
            LiveRange::new("a", 12, 30),
            LiveRange::new("b", 0, 14),
            LiveRange::new("c", 5, 6),
            LiveRange::new("d", 20, 25),
        ];
        let resolved = resolve_ranges(&input);
        for pair in resolved.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        for range in &resolved {
            assert!(range.start < range.end);
            assert!(!range.annotation_ids.is_empty());
        }
    }

    #[test]
    fn test_highlight_id() {
        let range = ResolvedRange {
            start: 6,
            end: 10,
            annotation_ids: vec!["a".to_string()],
        };
        assert_eq!(range.highlight_id(), "hl-6-10");
        assert!(range.covers("a"));
        assert!(!range.covers("b"));
    }
}
