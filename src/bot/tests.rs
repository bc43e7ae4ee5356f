use super::*;
use crate::config::Config;
use crate::database::sqlite::TopicQueries;
use crate::database::sqlite::TopicStatus;
use tempfile::TempDir;

async fn test_router() -> (Router, Database, TempDir) {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = Config::load(temp_dir.path()).expect("can load config");
    let database = Database::in_memory().await.expect("can create database");
    let llm = OpenAiClient::new(&config);
    let embedder = EmbeddingClient::new(&config);
    let router = Router::new(config, database.clone(), llm, embedder);
    (router, database, temp_dir)
}

#[test]
fn reply_builders() {
    let reply = Reply::text("hello").with_button(UrlButton {
        label: "Files".to_string(),
        url: "http://x/files".to_string(),
    });

    assert_eq!(reply.text, "hello");
    assert_eq!(reply.buttons.len(), 1);
    assert_eq!(reply.buttons[0].label, "Files");
}

#[tokio::test]
async fn empty_library_listing_suggests_research() {
    let (router, _database, _temp_dir) = test_router().await;
    let reply = router.handle_list(&[]);

    assert!(reply.text.contains("library is empty"));
    assert!(reply.buttons.is_empty());
}

#[tokio::test]
async fn library_listing_separates_ready_and_pending() {
    let (router, database, _temp_dir) = test_router().await;

    let catan = database.get_or_create_topic("Catan").await.expect("create");
    database
        .update_topic_status(catan.id, TopicStatus::Ready)
        .await
        .expect("update status");
    TopicQueries::update_description(database.pool(), catan.id, "Trade and build on an island.")
        .await
        .expect("update description");

    database.get_or_create_topic("Azul").await.expect("create");

    let topics = database.list_topics().await.expect("list");
    let reply = router.handle_list(&topics);

    assert!(reply.text.contains("<b>Catan</b>"));
    assert!(reply.text.contains("Trade and build on an island."));
    assert!(reply.text.contains("Azul (created)"));
    assert!(reply.text.contains("/topics/1/files") || reply.text.contains("/topics/2/files"));

    // Only ready topics get file buttons.
    assert_eq!(reply.buttons.len(), 1);
    assert!(reply.buttons[0].label.contains("Catan"));
}

#[tokio::test]
async fn chat_messages_are_logged_with_roles() {
    let (router, database, _temp_dir) = test_router().await;

    let message = IncomingMessage {
        chat_id: 5,
        chat_kind: Some("group".to_string()),
        author_id: Some(11),
        author_name: Some("bob".to_string()),
        text: "hello there".to_string(),
    };
    router
        .log_message(&message, &message.text, ChatRole::User, None)
        .await
        .expect("can log");
    router
        .log_message(&message, "hi!", ChatRole::Assistant, None)
        .await
        .expect("can log");

    let recent = crate::database::sqlite::ChatLogQueries::recent_for_chat(database.pool(), 5, 10)
        .await
        .expect("can fetch");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].role, ChatRole::User);
    assert_eq!(recent[0].author_name.as_deref(), Some("bob"));
    assert_eq!(recent[1].role, ChatRole::Assistant);
    assert_eq!(recent[1].author_name.as_deref(), Some("MeepleBot"));
}
