//! Stored markup sanitization using lol_html
//!
//! Runs before every parse, on the capture pass and on every render pass, so
//! both always see the same tree for the same stored markup.

use lol_html::{element, rewrite_str, RewriteStrSettings};

use crate::config::HighlightConfig;
use crate::error::MarkupError;

/// Sanitize stored markup before it is projected or highlighted
///
/// - `script` and `style` elements are removed with their content
/// - `on*` event handler attributes and `javascript:` URLs are stripped
/// - highlight wrappers left over from an earlier render are unwrapped, so
///   highlighting always starts from the original content
pub fn sanitize_markup(html: &str, config: &HighlightConfig) -> Result<String, MarkupError> {
    let wrapper_selector = format!("[{}]", config.id_attribute);

    let result = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("style", |el| {
                    el.remove();
                    Ok(())
                }),
                element!(wrapper_selector, |el| {
                    el.remove_and_keep_content();
                    Ok(())
                }),
                element!("*", |el| {
                    let handlers: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|attr| attr.name())
                        .filter(|name| name.starts_with("on"))
                        .collect();
                    for name in handlers {
                        el.remove_attribute(&name);
                    }
                    for attr in ["href", "src"] {
                        if let Some(value) = el.get_attribute(attr) {
                            if value.trim().to_lowercase().starts_with("javascript:") {
                                el.remove_attribute(attr);
                            }
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| MarkupError::Rewrite(e.to_string()))?;

    Ok(result)
}
