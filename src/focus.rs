//! Focus coordination between inline highlights and comment cards
//!
//! Holds which annotation is focused and fans focus changes out to two
//! subscribers, the comment list and the content view, over broadcast
//! channels. Each receiver buffers up to the configured capacity; a lagging
//! receiver drops the oldest signals, which is harmless because only the
//! latest focus matters.

use std::collections::{HashMap, HashSet};

use tokio::sync::broadcast;
use tracing::debug;

use crate::render::{AnnotationPlacement, PlacementStatus};

/// Current focus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusState {
    Idle,
    Focused(String),
}

/// Signal sent to a focus subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusSignal {
    /// Scroll to and pulse the target
    Reveal {
        annotation_id: String,
        highlight_ids: Vec<String>,
    },
    /// Restyle only: the target is focused but already in view
    Focused { annotation_id: String },
    /// Nothing is focused any more
    Cleared,
}

/// Bidirectional focus between highlights and comments
pub struct FocusCoordinator {
    state: FocusState,
    /// Annotation id -> highlight ids of its wrappers
    highlights: HashMap<String, Vec<String>>,
    /// Highlight id -> annotation ids on that wrapper, in render order
    annotations: HashMap<String, Vec<String>>,
    /// Every annotation shown in the comment list
    listed: HashSet<String>,
    comment_list: broadcast::Sender<FocusSignal>,
    content_view: broadcast::Sender<FocusSignal>,
}

impl FocusCoordinator {
    pub fn new(capacity: usize) -> Self {
        let (comment_list, _) = broadcast::channel(capacity);
        let (content_view, _) = broadcast::channel(capacity);
        Self {
            state: FocusState::Idle,
            highlights: HashMap::new(),
            annotations: HashMap::new(),
            listed: HashSet::new(),
            comment_list,
            content_view,
        }
    }

    /// Receiver for the comment list
    pub fn subscribe_comment_list(&self) -> broadcast::Receiver<FocusSignal> {
        self.comment_list.subscribe()
    }

    /// Receiver for the content view
    pub fn subscribe_content_view(&self) -> broadcast::Receiver<FocusSignal> {
        self.content_view.subscribe()
    }

    pub fn state(&self) -> &FocusState {
        &self.state
    }

    /// The focused annotation, if any
    pub fn focused_id(&self) -> Option<&str> {
        match &self.state {
            FocusState::Focused(id) => Some(id),
            FocusState::Idle => None,
        }
    }

    /// Highlight ids rendered for an annotation
    pub fn highlights_for(&self, annotation_id: &str) -> &[String] {
        self.highlights
            .get(annotation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rebuild the id mappings after a render
    ///
    /// Focus on an annotation that is no longer listed is cleared.
    pub fn sync_highlights(&mut self, placements: &[AnnotationPlacement]) {
        self.highlights.clear();
        self.annotations.clear();
        self.listed.clear();

        for placement in placements {
            if matches!(placement.status, PlacementStatus::Reply) {
                continue;
            }
            self.listed.insert(placement.annotation_id.clone());

            let ids = placement.highlight_ids();
            if ids.is_empty() {
                continue;
            }
            for highlight_id in ids {
                self.annotations
                    .entry(highlight_id.clone())
                    .or_default()
                    .push(placement.annotation_id.clone());
            }
            self.highlights
                .insert(placement.annotation_id.clone(), ids.to_vec());
        }

        if let FocusState::Focused(id) = &self.state {
            if !self.listed.contains(id) {
                debug!("Focused annotation {} is gone, clearing focus", id);
                self.clear();
            }
        }
    }

    /// A highlight wrapper was clicked or tapped
    ///
    /// Focuses the first annotation on the wrapper; activating it again while
    /// one of its annotations is focused moves on to the next one. Returns the
    /// newly focused annotation.
    pub fn on_highlight_activated(&mut self, highlight_id: &str) -> Option<String> {
        let Some(candidates) = self.annotations.get(highlight_id) else {
            debug!("Ignoring activation of unknown highlight {}", highlight_id);
            return None;
        };

        let next = match self.focused_id().and_then(|f| candidates.iter().position(|c| c == f)) {
            Some(index) => candidates[(index + 1) % candidates.len()].clone(),
            None => candidates[0].clone(),
        };

        self.state = FocusState::Focused(next.clone());
        self.notify(
            &self.comment_list,
            FocusSignal::Reveal {
                annotation_id: next.clone(),
                highlight_ids: self.highlights_for(&next).to_vec(),
            },
        );
        self.notify(
            &self.content_view,
            FocusSignal::Focused {
                annotation_id: next.clone(),
            },
        );
        Some(next)
    }

    /// A comment card was clicked; returns false for unknown annotations
    pub fn on_comment_activated(&mut self, annotation_id: &str) -> bool {
        if !self.listed.contains(annotation_id) {
            debug!("Ignoring activation of unknown annotation {}", annotation_id);
            return false;
        }

        self.state = FocusState::Focused(annotation_id.to_string());
        let highlight_ids = self.highlights_for(annotation_id).to_vec();
        // Stale and whole-document comments have nothing to scroll to
        let to_content = if highlight_ids.is_empty() {
            FocusSignal::Focused {
                annotation_id: annotation_id.to_string(),
            }
        } else {
            FocusSignal::Reveal {
                annotation_id: annotation_id.to_string(),
                highlight_ids,
            }
        };
        self.notify(&self.content_view, to_content);
        self.notify(
            &self.comment_list,
            FocusSignal::Focused {
                annotation_id: annotation_id.to_string(),
            },
        );
        true
    }

    /// Click outside any highlight or comment, or an explicit close
    pub fn dismiss(&mut self) {
        if self.state != FocusState::Idle {
            self.clear();
        }
    }

    fn clear(&mut self) {
        self.state = FocusState::Idle;
        self.notify(&self.comment_list, FocusSignal::Cleared);
        self.notify(&self.content_view, FocusSignal::Cleared);
    }

    fn notify(&self, channel: &broadcast::Sender<FocusSignal>, signal: FocusSignal) {
        if channel.send(signal).is_err() {
            debug!("No focus subscribers listening");
        }
    }
}

impl Default for FocusCoordinator {
    fn default() -> Self {
        Self::new(crate::config::FOCUS_CHANNEL_CAPACITY)
    }
}
