//! Configuration management for the annotation engine

use serde::Deserialize;
use std::env;

use crate::error::AppError;

/// Shortest selection (in characters, surrounding whitespace ignored) that may become an anchor
pub const MIN_SELECTION_CHARS: usize = 3;

/// Characters searched on either side of a stored anchor before falling back to a global search
pub const DRIFT_SEARCH_WINDOW: usize = 200;

/// Buffered focus signals per subscriber
pub const FOCUS_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub drift: DriftConfig,
    pub highlight: HighlightConfig,
    pub focus: FocusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    pub min_selection_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriftConfig {
    pub window: usize,
}

/// Configuration for highlight wrappers
#[derive(Debug, Clone, Deserialize)]
pub struct HighlightConfig {
    /// Element name used for wrappers
    pub element: String,
    /// CSS class prefix for highlights
    pub class_prefix: String,
    /// Data attribute listing the annotation ids on a wrapper
    pub id_attribute: String,
    /// Data attribute identifying the wrapper (shared by every piece of one range)
    pub highlight_attribute: String,
    /// Data attribute set while a wrapper is pulsing as newly created
    pub new_attribute: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FocusConfig {
    pub channel_capacity: usize,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            element: "mark".to_string(),
            class_prefix: "ml-highlight".to_string(),
            id_attribute: "data-annotation-ids".to_string(),
            highlight_attribute: "data-highlight-id".to_string(),
            new_attribute: "data-highlight-new".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capture: CaptureConfig {
                min_selection_chars: MIN_SELECTION_CHARS,
            },
            drift: DriftConfig {
                window: DRIFT_SEARCH_WINDOW,
            },
            highlight: HighlightConfig::default(),
            focus: FocusConfig {
                channel_capacity: FOCUS_CHANNEL_CAPACITY,
            },
        }
    }
}

impl Config {
    /// Load configuration from `MARGINALIA_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Config::default();
        let highlight = HighlightConfig {
            class_prefix: env::var("MARGINALIA_HIGHLIGHT_CLASS")
                .unwrap_or(defaults.highlight.class_prefix),
            id_attribute: env::var("MARGINALIA_ID_ATTRIBUTE")
                .unwrap_or(defaults.highlight.id_attribute),
            ..defaults.highlight
        };

        let config = Config {
            capture: CaptureConfig {
                min_selection_chars: parse_var(
                    "MARGINALIA_MIN_SELECTION_CHARS",
                    defaults.capture.min_selection_chars,
                )?,
            },
            drift: DriftConfig {
                window: parse_var("MARGINALIA_DRIFT_WINDOW", defaults.drift.window)?,
            },
            highlight,
            focus: FocusConfig {
                channel_capacity: parse_var(
                    "MARGINALIA_FOCUS_CHANNEL_CAPACITY",
                    defaults.focus.channel_capacity,
                )?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.drift.window == 0 {
            return Err(AppError::Config("drift window must be positive".to_string()));
        }
        if self.focus.channel_capacity == 0 {
            return Err(AppError::Config(
                "focus channel capacity must be positive".to_string(),
            ));
        }
        let h = &self.highlight;
        for (what, value) in [
            ("element", &h.element),
            ("class prefix", &h.class_prefix),
            ("id attribute", &h.id_attribute),
            ("highlight attribute", &h.highlight_attribute),
            ("new attribute", &h.new_attribute),
        ] {
            if !is_markup_name(value) {
                return Err(AppError::Config(format!("invalid highlight {}: {:?}", what, value)));
            }
        }
        Ok(())
    }
}

fn parse_var(name: &str, default: usize) -> Result<usize, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} is not a number: {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}

/// Names end up inside CSS selectors and start tags, so keep them to a safe alphabet
fn is_markup_name(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
