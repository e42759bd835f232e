//! HTML processing for rendered posts
//!
//! Highlight wrappers are injected into a copy of the stored markup tree.

mod highlight_injector;

pub use highlight_injector::{HighlightRenderer, InjectError, InjectionResult};
