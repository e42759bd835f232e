//! Drift correction
//!
//! Re-locates a stored anchor in the current plain text when the content
//! has been edited since the anchor was captured. The quoted text is the
//! source of truth; offsets are only a hint.

use serde::Serialize;
use tracing::debug;

use super::projector::PlainText;
use crate::annotations::Anchor;
use crate::config::DRIFT_SEARCH_WINDOW;

/// Where a stored anchor lands in the current text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DriftOutcome {
    /// Stored offsets still select the quoted text
    Valid,
    /// The quote was found elsewhere
    Corrected { start: usize, end: usize },
    /// The quote no longer exists; do not render
    Stale,
}

impl DriftOutcome {
    /// Range to highlight for `anchor`, if any
    pub fn range(&self, anchor: &Anchor) -> Option<(usize, usize)> {
        match self {
            DriftOutcome::Valid => Some((anchor.start, anchor.end)),
            DriftOutcome::Corrected { start, end } => Some((*start, *end)),
            DriftOutcome::Stale => None,
        }
    }
}

/// Windowed-then-global quote search
#[derive(Debug, Clone, Copy)]
pub struct DriftCorrector {
    window: usize,
}

impl DriftCorrector {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn correct(&self, anchor: &Anchor, plain: &PlainText) -> DriftOutcome {
        let quote = anchor.quoted_text.as_str();
        if quote.is_empty() || anchor.start >= anchor.end {
            return DriftOutcome::Stale;
        }

        if plain.slice(anchor.start, anchor.end) == Some(quote) {
            return DriftOutcome::Valid;
        }

        let quote_len = quote.chars().count();
        let len = plain.len();
        let from = anchor.start.saturating_sub(self.window).min(len);
        let to = anchor.end.saturating_add(self.window).min(len);

        let nearest = plain
            .occurrences(quote, from, to)
            .into_iter()
            .min_by_key(|pos| (pos.abs_diff(anchor.start), *pos));

        if let Some(start) = nearest {
            debug!(
                "Anchor drifted from {} to {} within window",
                anchor.start, start
            );
            return DriftOutcome::Corrected {
                start,
                end: start + quote_len,
            };
        }

        match plain.first_occurrence(quote) {
            Some(start) => {
                debug!("Anchor drifted from {} to {} (global search)", anchor.start, start);
                DriftOutcome::Corrected {
                    start,
                    end: start + quote_len,
                }
            }
            None => DriftOutcome::Stale,
        }
    }
}

impl Default for DriftCorrector {
    fn default() -> Self {
        Self::new(DRIFT_SEARCH_WINDOW)
    }
}
