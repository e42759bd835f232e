//! Highlight rendering pipeline
//!
//! Projection, drift correction, range resolution and wrapper injection,
//! run from scratch on every render against the original markup tree.

use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::anchoring::{
    self, project, resolve_ranges, DriftCorrector, DriftOutcome, LiveRange, LiveSelection, Projection,
    ResolvedRange,
};
use crate::annotations::Annotation;
use crate::config::Config;
use crate::error::{CaptureError, MarkupError};
use crate::html::HighlightRenderer;
use crate::markup::{load_markup, MarkupTree};

/// How one annotation came out of a render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PlacementStatus {
    /// Rendered inline over `start..end` of the current plain text
    Highlighted {
        start: usize,
        end: usize,
        /// The stored offsets had drifted
        corrected: bool,
        #[serde(rename = "highlightIds")]
        highlight_ids: Vec<String>,
    },
    /// Quoted text no longer exists in the post
    Stale,
    /// Range located but could not be drawn
    RenderFailed,
    /// Whole-document comment
    Unanchored,
    Reply,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationPlacement {
    #[serde(rename = "annotationId")]
    pub annotation_id: String,
    #[serde(flatten)]
    pub status: PlacementStatus,
}

impl AnnotationPlacement {
    pub fn highlight_ids(&self) -> &[String] {
        match &self.status {
            PlacementStatus::Highlighted { highlight_ids, .. } => highlight_ids,
            _ => &[],
        }
    }

    pub fn is_stale(&self) -> bool {
        self.status == PlacementStatus::Stale
    }
}

/// A rendered post
#[derive(Debug, Clone)]
pub struct HighlightedDocument {
    pub markup: MarkupTree,
    /// One entry per input annotation, in input order
    pub placements: Vec<AnnotationPlacement>,
    pub ranges: Vec<ResolvedRange>,
    pub render_failures: Vec<String>,
}

impl HighlightedDocument {
    pub fn html(&self) -> String {
        self.markup.to_html()
    }

    pub fn placement(&self, annotation_id: &str) -> Option<&AnnotationPlacement> {
        self.placements
            .iter()
            .find(|p| p.annotation_id == annotation_id)
    }

    pub fn stale_ids(&self) -> Vec<&str> {
        self.placements
            .iter()
            .filter(|p| p.is_stale())
            .map(|p| p.annotation_id.as_str())
            .collect()
    }
}

/// Pipeline settings taken from [`Config`]
#[derive(Debug, Clone, Default)]
pub struct HighlightPipeline {
    corrector: DriftCorrector,
    renderer: HighlightRenderer,
}

impl HighlightPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            corrector: DriftCorrector::new(config.drift.window),
            renderer: HighlightRenderer::new(config.highlight.clone()),
        }
    }

    /// Render `annotations` over `original`, which is left untouched
    ///
    /// Wrappers of annotations in `pulse` are flagged as newly created.
    pub fn render(
        &self,
        original: &MarkupTree,
        annotations: &[Annotation],
        pulse: &HashSet<String>,
    ) -> HighlightedDocument {
        let projection = project(original);

        let mut placements: Vec<AnnotationPlacement> = Vec::with_capacity(annotations.len());
        let mut live = Vec::new();
        for annotation in annotations {
            let status = match (&annotation.parent_id, &annotation.anchor) {
                (Some(_), _) => PlacementStatus::Reply,
                (None, None) => PlacementStatus::Unanchored,
                (None, Some(anchor)) => {
                    let outcome = self.corrector.correct(anchor, &projection.plain_text);
                    match outcome.range(anchor) {
                        Some((start, end)) => {
                            live.push(LiveRange::new(annotation.id.as_str(), start, end));
                            PlacementStatus::Highlighted {
                                start,
                                end,
                                corrected: matches!(outcome, DriftOutcome::Corrected { .. }),
                                highlight_ids: Vec::new(),
                            }
                        }
                        None => {
                            warn!("Annotation {} is stale: quoted text not found", annotation.id);
                            PlacementStatus::Stale
                        }
                    }
                }
            };
            placements.push(AnnotationPlacement {
                annotation_id: annotation.id.clone(),
                status,
            });
        }

        let ranges = resolve_ranges(&live);
        let injection = self
            .renderer
            .inject(original, &projection.position_map, &ranges, pulse);

        // An annotation only counts as failed when none of its ranges were drawn
        let rendered: HashSet<&str> = injection.injected.iter().map(String::as_str).collect();
        let mut render_failures = Vec::new();
        for placement in &mut placements {
            let PlacementStatus::Highlighted { highlight_ids, .. } = &mut placement.status else {
                continue;
            };
            *highlight_ids = ranges
                .iter()
                .filter(|r| r.covers(&placement.annotation_id))
                .map(ResolvedRange::highlight_id)
                .filter(|id| rendered.contains(id.as_str()))
                .collect();

            if !injection.failed_annotations.contains(&placement.annotation_id) {
                continue;
            }
            if highlight_ids.is_empty() {
                render_failures.push(placement.annotation_id.clone());
                placement.status = PlacementStatus::RenderFailed;
            } else {
                warn!(
                    "Annotation {} rendered partially as {:?}",
                    placement.annotation_id, highlight_ids
                );
            }
        }

        if !render_failures.is_empty() {
            warn!(
                "{} annotations could not be rendered: {:?}",
                render_failures.len(),
                render_failures
            );
        }

        HighlightedDocument {
            markup: injection.markup,
            placements,
            ranges,
            render_failures,
        }
    }
}

/// Parse stored markup and project it to plain text
pub fn project_plain_text(markup: &str) -> Result<Projection, MarkupError> {
    let tree = load_markup(markup, &Config::default().highlight)?;
    Ok(project(&tree))
}

/// Resolve a live selection against a projection using the default minimum length
pub fn resolve_selection(projection: &Projection, selection: &LiveSelection) -> Result<anchoring::AnchorCandidate, CaptureError> {
    anchoring::resolve_selection(projection, selection, crate::config::MIN_SELECTION_CHARS)
}

/// Render annotations over stored markup with default settings
pub fn render_with_highlights(markup: &str, annotations: &[Annotation]) -> Result<HighlightedDocument, MarkupError> {
    let config = Config::default();
    let tree = load_markup(markup, &config.highlight)?;
    Ok(HighlightPipeline::new(&config).render(&tree, annotations, &HashSet::new()))
}
