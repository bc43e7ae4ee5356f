use super::*;
use crate::database::sqlite::models::{NewChatMessage, NewSource};

async fn test_db() -> Database {
    Database::in_memory().await.expect("can create test database")
}

#[tokio::test]
async fn topic_create_and_fetch() {
    let db = test_db().await;

    let topic = db.get_or_create_topic("Catan").await.expect("can create topic");
    assert_eq!(topic.name, "Catan");
    assert_eq!(topic.status, TopicStatus::Created);
    assert!(topic.last_researched_at.is_none());

    let fetched = db
        .get_topic_by_id(topic.id)
        .await
        .expect("can fetch topic")
        .expect("topic exists");
    assert_eq!(fetched, topic);
}

#[tokio::test]
async fn topic_name_unique_case_insensitive() {
    let db = test_db().await;

    let first = db.get_or_create_topic("Catan").await.expect("can create topic");
    let second = db
        .get_or_create_topic("cAtAn")
        .await
        .expect("get_or_create succeeds for known name");

    assert_eq!(first.id, second.id, "must not create a duplicate row");
    assert_eq!(second.name, "Catan", "canonical spelling is kept");

    let all = db.list_topics().await.expect("can list topics");
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn topic_status_transitions() {
    let db = test_db().await;
    let topic = db.get_or_create_topic("Azul").await.expect("can create topic");

    db.update_topic_status(topic.id, TopicStatus::Researching)
        .await
        .expect("can update status");
    let topic = db
        .get_topic_by_id(topic.id)
        .await
        .expect("fetch")
        .expect("exists");
    assert!(topic.is_researching());

    db.update_topic_status(topic.id, TopicStatus::Ready)
        .await
        .expect("can update status");
    TopicQueries::stamp_researched(db.pool(), topic.id)
        .await
        .expect("can stamp");

    let topic = db
        .get_topic_by_id(topic.id)
        .await
        .expect("fetch")
        .expect("exists");
    assert!(topic.is_ready());
    assert!(topic.last_researched_at.is_some());
}

#[tokio::test]
async fn topic_metadata_update_preserves_existing_values() {
    let db = test_db().await;
    let topic = db.get_or_create_topic("Wingspan").await.expect("can create topic");

    TopicQueries::update_metadata(
        db.pool(),
        topic.id,
        &TopicMetadata {
            difficulty: Some(2.4),
            player_count: Some("1-5".to_string()),
            ..TopicMetadata::default()
        },
    )
    .await
    .expect("can update metadata");

    // A later partial update must not clobber fields it does not carry.
    TopicQueries::update_metadata(
        db.pool(),
        topic.id,
        &TopicMetadata {
            video_url: Some("https://www.youtube.com/watch?v=abc12345678".to_string()),
            ..TopicMetadata::default()
        },
    )
    .await
    .expect("can update metadata");

    let topic = db
        .get_topic_by_id(topic.id)
        .await
        .expect("fetch")
        .expect("exists");
    assert_eq!(topic.difficulty, Some(2.4));
    assert_eq!(topic.player_count.as_deref(), Some("1-5"));
    assert!(topic.video_url.is_some());
}

#[tokio::test]
async fn sources_are_listed_in_insertion_order() {
    let db = test_db().await;
    let topic = db.get_or_create_topic("Catan").await.expect("can create topic");

    for (kind, url, path) in [
        (SourceKind::Document, "http://x/catan.pdf", Some("/tmp/catan.pdf")),
        (SourceKind::WebPage, "http://x/catan.html", Some("/tmp/catan.html")),
        (SourceKind::Link, "http://x/unreachable", None),
    ] {
        db.add_source(NewSource {
            topic_id: topic.id,
            kind,
            url: Some(url.to_string()),
            title: Some(url.to_string()),
            local_path: path.map(str::to_string),
        })
        .await
        .expect("can add source");
    }

    let sources = db.list_sources(topic.id).await.expect("can list sources");
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0].kind, SourceKind::Document);
    assert!(sources[0].is_materialized());
    assert_eq!(sources[2].kind, SourceKind::Link);
    assert!(!sources[2].is_materialized());
}

#[tokio::test]
async fn chat_log_append_and_recent_ordering() {
    let db = test_db().await;

    for text in ["first", "second", "third"] {
        db.log_chat_message(NewChatMessage {
            chat_id: 42,
            chat_kind: Some("group".to_string()),
            author_id: Some(7),
            author_name: Some("alice".to_string()),
            message: text.to_string(),
            role: ChatRole::User,
            topic_id: None,
        })
        .await
        .expect("can log message");
    }

    let recent = ChatLogQueries::recent_for_chat(db.pool(), 42, 2)
        .await
        .expect("can fetch recent");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].message, "second");
    assert_eq!(recent[1].message, "third");
}

#[tokio::test]
async fn recent_topic_inference_uses_latest_tag() {
    let db = test_db().await;
    let catan = db.get_or_create_topic("Catan").await.expect("create");
    let azul = db.get_or_create_topic("Azul").await.expect("create");

    for topic_id in [Some(catan.id), None, Some(azul.id), None] {
        db.log_chat_message(NewChatMessage {
            chat_id: 9,
            chat_kind: None,
            author_id: None,
            author_name: None,
            message: "...".to_string(),
            role: ChatRole::Assistant,
            topic_id,
        })
        .await
        .expect("can log message");
    }

    let inferred = db
        .find_recent_topic_for_chat(9)
        .await
        .expect("can infer")
        .expect("a topic is tagged");
    assert_eq!(inferred.id, azul.id);

    // An unrelated chat has no tagged topic.
    assert!(
        db.find_recent_topic_for_chat(10)
            .await
            .expect("can infer")
            .is_none()
    );
}
