//! Annotation record types
//!
//! The persisted record shape shared with the comment store. Field names on
//! the wire are camelCase; optional fields are omitted when absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anchoring::AnchorCandidate;

/// A comment on a post, optionally anchored to a text range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique identifier (UUID), assigned by the store
    pub id: String,
    /// The post this annotation belongs to
    #[serde(rename = "documentId")]
    pub document_id: String,
    #[serde(rename = "authorId")]
    pub author_id: String,
    /// Set on replies only
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Comment text
    pub body: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "editedAt", default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    /// Absent for whole-document comments and replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

/// Stored plain-text range; never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub start: usize,
    pub end: usize,
    /// Exact text captured at creation, used to re-locate the range
    #[serde(rename = "quotedText")]
    pub quoted_text: String,
}

/// A post as held by the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Serialized markup, immutable per version
    pub markup: String,
    /// Bumped whenever the markup is edited
    pub version: u64,
}

impl Annotation {
    /// Create a new top-level annotation; `anchor: None` comments on the whole post
    pub fn new(document_id: &str, author_id: &str, body: &str, anchor: Option<Anchor>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            author_id: author_id.to_string(),
            parent_id: None,
            body: body.to_string(),
            created_at: Utc::now(),
            edited_at: None,
            anchor,
        }
    }

    /// Create a reply to `parent`
    pub fn new_reply(parent: &Annotation, author_id: &str, body: &str) -> Self {
        Self {
            parent_id: Some(parent.id.clone()),
            ..Self::new(&parent.document_id, author_id, body, None)
        }
    }

    /// Replace the body and stamp the edit time
    pub fn edit_body(&mut self, body: &str) {
        self.body = body.to_string();
        self.edited_at = Some(Utc::now());
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Whether this annotation should be highlighted inline
    pub fn is_anchored(&self) -> bool {
        !self.is_reply() && self.anchor.is_some()
    }
}

impl From<AnchorCandidate> for Anchor {
    fn from(candidate: AnchorCandidate) -> Self {
        Self {
            start: candidate.start,
            end: candidate.end,
            quoted_text: candidate.text,
        }
    }
}

impl Document {
    pub fn new(id: &str, markup: &str) -> Self {
        Self {
            id: id.to_string(),
            markup: markup.to_string(),
            version: 1,
        }
    }
}
