//! Annotations module
//!
//! Annotation records and the store traits the engine consumes.

mod store;
mod types;

pub use store::{CommentStore, ContentStore, MemoryCommentStore, MemoryContentStore};
pub use types::{Anchor, Annotation, Document};
