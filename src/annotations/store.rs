//! Comment and content store seams
//!
//! The engine never owns persistence: it talks to a comment store and a
//! content store through these traits. The in-memory implementations back
//! the tests, the benchmarks and the CLI.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::types::{Anchor, Annotation, Document};
use crate::error::StoreError;

// ============================================================================
// Store Traits
// ============================================================================

/// Comment store holding annotations and replies
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Top-level annotations of a document, oldest first
    async fn list_annotations(&self, document_id: &str) -> Result<Vec<Annotation>, StoreError>;

    /// Persist a new top-level annotation; `anchor: None` is a whole-document comment
    async fn create_annotation(
        &self,
        document_id: &str,
        author_id: &str,
        body: &str,
        anchor: Option<Anchor>,
    ) -> Result<Annotation, StoreError>;

    async fn update_annotation_body(&self, annotation_id: &str, body: &str) -> Result<Annotation, StoreError>;

    /// Delete an annotation together with its replies
    async fn delete_annotation(&self, annotation_id: &str) -> Result<(), StoreError>;

    /// Replies to an annotation, oldest first
    async fn list_replies(&self, annotation_id: &str) -> Result<Vec<Annotation>, StoreError>;

    async fn create_reply(&self, parent_id: &str, author_id: &str, body: &str) -> Result<Annotation, StoreError>;
}

/// Content store holding post markup
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_document(&self, document_id: &str) -> Result<Document, StoreError>;
}

// ============================================================================
// In-memory Implementations
// ============================================================================

/// Comment store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    /// Every annotation and reply in creation order
    records: RwLock<Vec<Annotation>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records, e.g. loaded from a JSON export
    pub fn with_annotations(annotations: Vec<Annotation>) -> Self {
        Self {
            records: RwLock::new(annotations),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn list_annotations(&self, document_id: &str) -> Result<Vec<Annotation>, StoreError> {
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|a| a.document_id == document_id && !a.is_reply())
            .cloned()
            .collect())
    }

    async fn create_annotation(
        &self,
        document_id: &str,
        author_id: &str,
        body: &str,
        anchor: Option<Anchor>,
    ) -> Result<Annotation, StoreError> {
        if let Some(anchor) = &anchor {
            if anchor.start >= anchor.end || anchor.quoted_text.is_empty() {
                return Err(StoreError::Rejected(format!(
                    "malformed anchor {}..{}",
                    anchor.start, anchor.end
                )));
            }
        }

        let annotation = Annotation::new(document_id, author_id, body, anchor);
        self.records.write().push(annotation.clone());
        Ok(annotation)
    }

    async fn update_annotation_body(&self, annotation_id: &str, body: &str) -> Result<Annotation, StoreError> {
        let mut records = self.records.write();
        let annotation = records
            .iter_mut()
            .find(|a| a.id == annotation_id)
            .ok_or_else(|| StoreError::NotFound(annotation_id.to_string()))?;
        annotation.edit_body(body);
        Ok(annotation.clone())
    }

    async fn delete_annotation(&self, annotation_id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|a| a.id != annotation_id && a.parent_id.as_deref() != Some(annotation_id));
        if records.len() == before {
            return Err(StoreError::NotFound(annotation_id.to_string()));
        }
        Ok(())
    }

    async fn list_replies(&self, annotation_id: &str) -> Result<Vec<Annotation>, StoreError> {
        let records = self.records.read();
        if !records.iter().any(|a| a.id == annotation_id) {
            return Err(StoreError::NotFound(annotation_id.to_string()));
        }
        Ok(records
            .iter()
            .filter(|a| a.parent_id.as_deref() == Some(annotation_id))
            .cloned()
            .collect())
    }

    async fn create_reply(&self, parent_id: &str, author_id: &str, body: &str) -> Result<Annotation, StoreError> {
        let mut records = self.records.write();
        let parent = records
            .iter()
            .find(|a| a.id == parent_id)
            .ok_or_else(|| StoreError::NotFound(parent_id.to_string()))?;
        if parent.is_reply() {
            return Err(StoreError::Rejected("replies cannot be nested".to_string()));
        }

        let reply = Annotation::new_reply(parent, author_id, body);
        records.push(reply.clone());
        Ok(reply)
    }
}

/// Content store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document at version 1
    pub fn insert(&self, document_id: &str, markup: &str) -> Document {
        let document = Document::new(document_id, markup);
        self.documents
            .write()
            .insert(document_id.to_string(), document.clone());
        document
    }

    /// Replace a document's markup, bumping its version
    pub fn update_markup(&self, document_id: &str, markup: &str) -> Result<Document, StoreError> {
        let mut documents = self.documents.write();
        let document = documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::NotFound(document_id.to_string()))?;
        document.markup = markup.to_string();
        document.version += 1;
        Ok(document.clone())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_document(&self, document_id: &str) -> Result<Document, StoreError> {
        self.documents
            .read()
            .get(document_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(document_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(start: usize, end: usize, quote: &str) -> Option<Anchor> {
        Some(Anchor {
            start,
            end,
            quoted_text: quote.to_string(),
        })
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = MemoryCommentStore::new();
        let first = store
            .create_annotation("post-1", "user-1", "one", anchor(0, 5, "Alpha"))
            .await
            .unwrap();
        store
            .create_annotation("post-2", "user-1", "elsewhere", None)
            .await
            .unwrap();
        let second = store
            .create_annotation("post-1", "user-2", "two", None)
            .await
            .unwrap();

        let listed = store.list_annotations("post-1").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
    }

    #[tokio::test]
    async fn test_rejects_malformed_anchor() {
        let store = MemoryCommentStore::new();
        let result = store
            .create_annotation("post-1", "user-1", "bad", anchor(5, 5, "x"))
            .await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_body() {
        let store = MemoryCommentStore::new();
        let created = store
            .create_annotation("post-1", "user-1", "draft", None)
            .await
            .unwrap();

        let updated = store.update_annotation_body(&created.id, "final").await.unwrap();
        assert_eq!(updated.body, "final");
        assert!(updated.edited_at.is_some());

        let missing = store.update_annotation_body("nope", "x").await;
        assert_eq!(missing, Err(StoreError::NotFound("nope".to_string())));
    }

    #[tokio::test]
    async fn test_replies_are_listed_separately_and_deleted_with_parent() {
        let store = MemoryCommentStore::new();
        let parent = store
            .create_annotation("post-1", "user-1", "top", anchor(0, 5, "Alpha"))
            .await
            .unwrap();
        let reply = store.create_reply(&parent.id, "user-2", "reply").await.unwrap();

        assert!(reply.anchor.is_none());
        assert_eq!(store.list_annotations("post-1").await.unwrap().len(), 1);
        assert_eq!(store.list_replies(&parent.id).await.unwrap(), vec![reply.clone()]);

        let nested = store.create_reply(&reply.id, "user-3", "nested").await;
        assert!(matches!(nested, Err(StoreError::Rejected(_))));

        store.delete_annotation(&parent.id).await.unwrap();
        assert!(store.is_empty());
        assert!(store.delete_annotation(&parent.id).await.is_err());
    }

    #[tokio::test]
    async fn test_content_store_versions() {
        let store = MemoryContentStore::new();
        store.insert("post-1", "<p>v1</p>");

        let document = store.get_document("post-1").await.unwrap();
        assert_eq!(document.version, 1);

        let updated = store.update_markup("post-1", "<p>v2</p>").unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(store.get_document("post-1").await.unwrap().markup, "<p>v2</p>");
        assert!(store.get_document("post-9").await.is_err());
    }
}
