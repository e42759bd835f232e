//! Annotation session for one open document
//!
//! Ties the stores to the render and capture passes. Local state is always
//! the store's confirmed annotation list, plus at most one optimistic copy
//! while a create is in flight. After any write the list is refetched and
//! replaces local state wholesale.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::anchoring::{project, resolve_selection, AnchorCandidate, LiveSelection, Projection};
use crate::annotations::{Annotation, CommentStore, ContentStore, Document};
use crate::config::Config;
use crate::error::{CaptureError, Result};
use crate::focus::FocusCoordinator;
use crate::markup::{load_markup, MarkupTree};
use crate::render::{HighlightPipeline, HighlightedDocument};

/// Prefix of client-only ids given to optimistic annotations
const PENDING_PREFIX: &str = "pending-";

pub struct AnnotationSession {
    comments: Arc<dyn CommentStore>,
    content: Arc<dyn ContentStore>,
    config: Config,
    pipeline: HighlightPipeline,
    document: Document,
    /// The tree last handed to the view; selections report paths into it
    displayed: Option<MarkupTree>,
    /// Confirmed top-level annotations, as last listed by the store
    annotations: Vec<Annotation>,
    capture: Option<AnchorCandidate>,
    pending: Option<Annotation>,
    /// Newly created annotations whose wrappers pulse until acknowledged
    pulsing: HashSet<String>,
    focus: FocusCoordinator,
}

impl AnnotationSession {
    /// Load a document and its confirmed annotations
    pub async fn open(
        comments: Arc<dyn CommentStore>,
        content: Arc<dyn ContentStore>,
        config: Config,
        document_id: &str,
    ) -> Result<Self> {
        let document = content.get_document(document_id).await?;
        let annotations = comments.list_annotations(document_id).await?;
        info!(
            "Opened document {} (version {}) with {} annotations",
            document.id,
            document.version,
            annotations.len()
        );

        Ok(Self {
            comments,
            content,
            pipeline: HighlightPipeline::new(&config),
            focus: FocusCoordinator::new(config.focus.channel_capacity),
            config,
            document,
            displayed: None,
            annotations,
            capture: None,
            pending: None,
            pulsing: HashSet::new(),
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Confirmed annotations in store order
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn captured(&self) -> Option<&AnchorCandidate> {
        self.capture.as_ref()
    }

    /// The optimistic annotation awaiting store confirmation
    pub fn pending(&self) -> Option<&Annotation> {
        self.pending.as_ref()
    }

    pub fn is_pulsing(&self, annotation_id: &str) -> bool {
        self.pulsing.contains(annotation_id)
    }

    pub fn focus(&self) -> &FocusCoordinator {
        &self.focus
    }

    pub fn focus_mut(&mut self) -> &mut FocusCoordinator {
        &mut self.focus
    }

    /// Parse the stored markup; never previously rendered output
    fn original(&self) -> Result<MarkupTree> {
        Ok(load_markup(&self.document.markup, &self.config.highlight)?)
    }

    /// Plain text and position map of what the view currently shows
    ///
    /// Wrappers add no text, so offsets match the stored markup's plain
    /// text while node paths follow the rendered tree. Before the first
    /// render the stored markup is used.
    pub fn projection(&self) -> Result<Projection> {
        match &self.displayed {
            Some(displayed) => Ok(project(displayed)),
            None => Ok(project(&self.original()?)),
        }
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Resolve a live selection and hold it as the capture in progress
    ///
    /// A declined selection clears any earlier capture.
    pub fn capture(&mut self, selection: &LiveSelection) -> Result<AnchorCandidate> {
        let projection = self.projection()?;
        match resolve_selection(&projection, selection, self.config.capture.min_selection_chars) {
            Ok(candidate) => {
                debug!(
                    "Captured {}..{} {:?}",
                    candidate.start, candidate.end, candidate.text
                );
                self.capture = Some(candidate.clone());
                Ok(candidate)
            }
            Err(e) => {
                debug!("Capture declined: {}", e);
                self.capture = None;
                Err(e.into())
            }
        }
    }

    /// Abandon the capture in progress; nothing is persisted
    pub fn cancel_capture(&mut self) {
        let captured = self.capture.take();
        let pending = self.pending.take();
        if captured.is_some() || pending.is_some() {
            debug!("Capture abandoned");
        }
    }

    /// Show the captured selection as an optimistic annotation
    pub fn stage(&mut self, author_id: &str, body: &str) -> Result<&Annotation> {
        let candidate = self.capture.clone().ok_or(CaptureError::NothingCaptured)?;
        let mut pending = Annotation::new(&self.document.id, author_id, body, Some(candidate.into()));
        pending.id = format!("{}{}", PENDING_PREFIX, pending.id);
        Ok(&*self.pending.insert(pending))
    }

    /// Persist the staged annotation and reconcile with the store
    ///
    /// On failure the optimistic copy is dropped and the capture kept so the
    /// user can retry.
    pub async fn commit(&mut self) -> Result<Annotation> {
        let pending = self.pending.take().ok_or(CaptureError::NothingCaptured)?;

        let created = match self
            .comments
            .create_annotation(&pending.document_id, &pending.author_id, &pending.body, pending.anchor)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                warn!("Failed to create annotation on {}: {}", self.document.id, e);
                return Err(e.into());
            }
        };

        info!("Created annotation {} on {}", created.id, self.document.id);
        self.capture = None;
        self.pulsing.insert(created.id.clone());
        if let Err(e) = self.reload_annotations().await {
            warn!("Annotation {} created but list refresh failed: {}", created.id, e);
        }
        Ok(created)
    }

    /// Stage and commit in one step
    pub async fn submit(&mut self, author_id: &str, body: &str) -> Result<Annotation> {
        self.stage(author_id, body)?;
        self.commit().await
    }

    /// Stop pulsing a newly created annotation's highlight
    pub fn acknowledge_pulse(&mut self, annotation_id: &str) -> bool {
        self.pulsing.remove(annotation_id)
    }

    // ========================================================================
    // Comment operations
    // ========================================================================

    /// Comment on the whole document; listed but never highlighted
    pub async fn comment_on_document(&mut self, author_id: &str, body: &str) -> Result<Annotation> {
        let created = self
            .comments
            .create_annotation(&self.document.id, author_id, body, None)
            .await?;
        self.reload_annotations().await?;
        Ok(created)
    }

    pub async fn edit_body(&mut self, annotation_id: &str, body: &str) -> Result<Annotation> {
        let updated = self.comments.update_annotation_body(annotation_id, body).await?;
        self.reload_annotations().await?;
        Ok(updated)
    }

    pub async fn delete(&mut self, annotation_id: &str) -> Result<()> {
        self.comments.delete_annotation(annotation_id).await?;
        self.pulsing.remove(annotation_id);
        self.reload_annotations().await
    }

    pub async fn replies(&self, annotation_id: &str) -> Result<Vec<Annotation>> {
        Ok(self.comments.list_replies(annotation_id).await?)
    }

    pub async fn add_reply(&mut self, parent_id: &str, author_id: &str, body: &str) -> Result<Annotation> {
        Ok(self.comments.create_reply(parent_id, author_id, body).await?)
    }

    /// Refetch the document and its annotations
    ///
    /// A capture taken against an older version of the markup is dropped.
    pub async fn refresh(&mut self) -> Result<()> {
        let document = self.content.get_document(&self.document.id).await?;
        if document.version != self.document.version {
            info!(
                "Document {} changed from version {} to {}",
                document.id, self.document.version, document.version
            );
            self.capture = None;
            self.pending = None;
            self.displayed = None;
        }
        self.document = document;
        self.reload_annotations().await
    }

    async fn reload_annotations(&mut self) -> Result<()> {
        let annotations = self.comments.list_annotations(&self.document.id).await?;
        self.pulsing
            .retain(|id| annotations.iter().any(|a| &a.id == id));
        self.annotations = annotations;
        Ok(())
    }

    // ========================================================================
    // Render
    // ========================================================================

    /// Render the current markup with every confirmed and pending annotation
    pub fn render(&mut self) -> Result<HighlightedDocument> {
        let original = self.original()?;

        let mut annotations = self.annotations.clone();
        let mut pulse = self.pulsing.clone();
        if let Some(pending) = &self.pending {
            pulse.insert(pending.id.clone());
            annotations.push(pending.clone());
        }

        let rendered = self.pipeline.render(&original, &annotations, &pulse);
        self.focus.sync_highlights(&rendered.placements);
        self.displayed = Some(rendered.markup.clone());
        Ok(rendered)
    }
}
