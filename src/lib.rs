//! Marginalia Library
//!
//! Anchors comments to text ranges of rendered posts and renders them back
//! as inline highlights. The command line binary is in main.rs.
//!
//! # Modules
//!
//! - `markup`: markup tree, node paths and sanitization
//! - `anchoring`: plain-text projection, selection capture, drift correction
//!   and overlap resolution
//! - `html`: highlight wrapper injection
//! - `render`: the full render pipeline
//! - `focus`: highlight and comment focus coordination
//! - `annotations`: annotation records and store traits
//! - `session`: one open document, its stores and its capture state

pub mod anchoring;
pub mod annotations;
pub mod config;
pub mod error;
pub mod focus;
pub mod html;
pub mod markup;
pub mod render;
pub mod session;

pub use anchoring::{AnchorCandidate, DriftOutcome, LiveSelection, PlainText, PositionMap, Projection, SelectionPoint};
pub use annotations::{Anchor, Annotation, CommentStore, ContentStore, Document};
pub use config::Config;
pub use error::{AppError, CaptureError, Result};
pub use focus::{FocusCoordinator, FocusSignal, FocusState};
pub use markup::{load_markup, MarkupTree, NodePath};
pub use render::{
    project_plain_text, render_with_highlights, resolve_selection, AnnotationPlacement, HighlightPipeline,
    HighlightedDocument, PlacementStatus,
};
pub use session::AnnotationSession;
