//! End-to-end annotation lifecycle over the in-memory stores

use std::fs;
use std::io::Write;
use std::sync::Arc;

use marginalia::annotations::{MemoryCommentStore, MemoryContentStore};
use marginalia::{
    AnnotationSession, Annotation, Config, FocusSignal, LiveSelection, PlacementStatus, SelectionPoint,
};

const POST: &str = "<p>Alpha Beta Gamma</p>";

async fn open_post(comments: Arc<MemoryCommentStore>) -> (AnnotationSession, Arc<MemoryContentStore>) {
    let content = Arc::new(MemoryContentStore::new());
    content.insert("post-1", POST);
    let session = AnnotationSession::open(comments, content.clone(), Config::default(), "post-1")
        .await
        .unwrap();
    (session, content)
}

#[tokio::test]
async fn test_select_comment_render_and_focus() {
    let (mut session, _) = open_post(Arc::new(MemoryCommentStore::new())).await;

    // Select "Beta" inside the paragraph's only text node
    let selection = LiveSelection::new(
        SelectionPoint::inside("/0/0".parse().unwrap(), 6),
        SelectionPoint::inside("/0/0".parse().unwrap(), 10),
    );
    let candidate = session.capture(&selection).unwrap();
    assert_eq!((candidate.start, candidate.end), (6, 10));
    assert_eq!(candidate.text, "Beta");

    let created = session.submit("user-1", "Why Beta?").await.unwrap();
    session.acknowledge_pulse(&created.id);

    let rendered = session.render().unwrap();
    assert_eq!(
        rendered.html(),
        format!(
            r#"<p>Alpha <mark class="ml-highlight" data-annotation-ids="{}" data-highlight-id="hl-6-10">Beta</mark> Gamma</p>"#,
            created.id
        )
    );
    assert!(rendered.render_failures.is_empty());

    let mut comment_list = session.focus().subscribe_comment_list();
    let focused = session.focus_mut().on_highlight_activated("hl-6-10");
    assert_eq!(focused.as_deref(), Some(created.id.as_str()));
    assert_eq!(session.focus().focused_id(), Some(created.id.as_str()));
    assert_eq!(
        comment_list.try_recv().unwrap(),
        FocusSignal::Reveal {
            annotation_id: created.id.clone(),
            highlight_ids: vec!["hl-6-10".to_string()],
        }
    );

    session.focus_mut().dismiss();
    assert_eq!(session.focus().focused_id(), None);
}

#[tokio::test]
async fn test_overlapping_comments_from_exported_records() {
    let records = r#"[
        {
            "id": "first",
            "documentId": "post-1",
            "authorId": "user-1",
            "body": "Alpha and Beta",
            "createdAt": "2024-03-01T10:00:00Z",
            "anchor": { "start": 0, "end": 10, "quotedText": "Alpha Beta" }
        },
        {
            "id": "second",
            "documentId": "post-1",
            "authorId": "user-2",
            "body": "Beta and Gamma",
            "createdAt": "2024-03-01T11:00:00Z",
            "anchor": { "start": 6, "end": 16, "quotedText": "Beta Gamma" }
        },
        {
            "id": "overall",
            "documentId": "post-1",
            "authorId": "user-3",
            "body": "Nice post",
            "createdAt": "2024-03-01T12:00:00Z"
        }
    ]"#;
    let mut export = tempfile::NamedTempFile::new().unwrap();
    export.write_all(records.as_bytes()).unwrap();

    let loaded: Vec<Annotation> = serde_json::from_str(&fs::read_to_string(export.path()).unwrap()).unwrap();
    let comments = Arc::new(MemoryCommentStore::with_annotations(loaded));
    let (mut session, _) = open_post(comments).await;

    let rendered = session.render().unwrap();
    let html = rendered.html();
    assert_eq!(rendered.ranges.len(), 3);
    assert!(html.contains(r#"data-annotation-ids="first second" data-highlight-id="hl-6-10">Beta</mark>"#));
    assert!(html.contains("ml-highlight-multi"));
    assert_eq!(
        rendered.placement("overall").unwrap().status,
        PlacementStatus::Unanchored
    );

    // The shared middle range cycles between both comments
    let focus = session.focus_mut();
    assert_eq!(focus.on_highlight_activated("hl-6-10").as_deref(), Some("first"));
    assert_eq!(focus.on_highlight_activated("hl-6-10").as_deref(), Some("second"));

    // Projection of the rendered output equals projection of the original
    assert_eq!(rendered.markup.text_content(), "Alpha Beta Gamma");
}

#[tokio::test]
async fn test_comment_survives_content_edit() {
    let (mut session, content) = open_post(Arc::new(MemoryCommentStore::new())).await;
    session
        .capture(&LiveSelection::within("/0/0".parse().unwrap(), 6, 10))
        .unwrap();
    let created = session.submit("user-1", "Why Beta?").await.unwrap();

    content
        .update_markup("post-1", "<p>Intro.</p><p>Alpha <b>Beta</b> Gamma</p>")
        .unwrap();
    session.refresh().await.unwrap();

    let rendered = session.render().unwrap();
    assert!(rendered.html().contains("<b><mark"));
    assert!(matches!(
        rendered.placement(&created.id).unwrap().status,
        PlacementStatus::Highlighted { corrected: true, .. }
    ));
}
