//! Anchoring module
//!
//! Maps between markup and the plain-text coordinate space anchors live in:
//! - `projector`: markup tree to plain text plus position map
//! - `selection`: live selection to anchor candidate
//! - `drift`: stored anchor to its current location
//! - `ranges`: overlapping anchors to disjoint highlight ranges

mod drift;
mod projector;
mod ranges;
mod selection;

pub use drift::{DriftCorrector, DriftOutcome};
pub use projector::{project, LeafEntry, NodeSpan, PlainText, PositionMap, Projection};
pub use ranges::{resolve_ranges, LiveRange, ResolvedRange};
pub use selection::{resolve_selection, AnchorCandidate, LiveSelection, SelectionPoint};
