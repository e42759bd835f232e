//! Markup module
//!
//! Stored post markup as an explicit tree:
//! - `MarkupTree` arena parsed leniently from an HTML fragment
//! - `NodePath` child-index addresses for nodes
//! - sanitization of stored markup before parsing

mod path;
mod sanitize;
mod tree;

pub use path::NodePath;
pub use sanitize::sanitize_markup;
pub use tree::{Element, MarkupTree, NodeId, NodeKind};

use crate::config::HighlightConfig;
use crate::error::MarkupError;

/// Sanitize then parse stored markup; the only way content enters the engine
pub fn load_markup(html: &str, config: &HighlightConfig) -> Result<MarkupTree, MarkupError> {
    let clean = sanitize_markup(html, config)?;
    MarkupTree::parse(&clean)
}
