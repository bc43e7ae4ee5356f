//! CLI command implementations. Each command wires the shared handles
//! (config, database, model clients) into the core components.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input};
use tracing::info;

use crate::bot::{IncomingMessage, Router};
use crate::config::{Config, get_config_dir};
use crate::crawler::{Researcher, ResearchStatus};
use crate::database::sqlite::Database;
use crate::embeddings::EmbeddingClient;
use crate::index::TopicIndexStore;
use crate::llm::OpenAiClient;

async fn open_database(config: &Config) -> Result<Database> {
    Database::new(config.database_path())
        .await
        .context("Failed to initialize database")
}

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(config_dir)
}

/// Print the active configuration.
#[inline]
pub fn show_config() -> Result<()> {
    let config = load_config()?;

    println!("Configuration directory: {}", config.base_dir.display());
    println!();
    println!("[openai]");
    println!("  api_base            = {}", config.openai.api_base);
    println!("  chat_model          = {}", config.openai.chat_model);
    println!("  intent_model        = {}", config.openai.intent_model);
    println!("  embedding_model     = {}", config.openai.embedding_model);
    println!("  embedding_batch_size = {}", config.openai.embedding_batch_size);
    println!(
        "  api key             = {}",
        if config.openai.api_key().is_some() {
            format!("set via ${}", config.openai.api_key_env)
        } else {
            format!("NOT SET (export ${})", config.openai.api_key_env)
        }
    );
    println!("[crawler]");
    println!("  user_agent      = {}", config.crawler.user_agent);
    println!("  timeout_seconds = {}", config.crawler.timeout_seconds);
    println!("  max_sources     = {}", config.crawler.max_sources);
    println!("[chunking]");
    println!("  window_words  = {}", config.chunking.window_words);
    println!("  overlap_words = {}", config.chunking.overlap_words);
    println!("[server]");
    println!("  api_base_url = {}", config.server.api_base_url);

    Ok(())
}

/// Interactive configuration editor.
#[inline]
pub fn run_interactive_config() -> Result<()> {
    let mut config = load_config()?;

    let api_base: String = Input::new()
        .with_prompt("LLM API base URL")
        .default(config.openai.api_base.clone())
        .interact_text()?;
    config.openai.set_api_base(api_base)?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(config.openai.chat_model.clone())
        .interact_text()?;
    config.openai.set_chat_model(chat_model)?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(config.openai.embedding_model.clone())
        .interact_text()?;
    config.openai.embedding_model = embedding_model;

    let api_base_url: String = Input::new()
        .with_prompt("File server base URL (for citation links)")
        .default(config.server.api_base_url.clone())
        .interact_text()?;
    config.server.api_base_url = api_base_url;

    config.validate()?;

    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save()?;
        println!("Configuration saved to {}", config.base_dir.join("config.toml").display());
    } else {
        println!("Configuration not saved.");
    }

    Ok(())
}

/// Research a topic from the command line.
#[inline]
pub async fn research_topic(name: &str) -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;
    let llm = OpenAiClient::new(&config);
    let embedder = EmbeddingClient::new(&config);

    info!("Researching '{}'", name);
    let researcher = Researcher::new(&config, &database, &llm, &embedder);
    let outcome = researcher.research(name).await?;

    match outcome.status {
        ResearchStatus::Completed { downloaded, linked } => {
            println!(
                "Research complete for '{}': {} files downloaded, {} link-only sources.",
                outcome.topic.name, downloaded, linked
            );
            println!("Files: {}", config.topic_files_url(outcome.topic.id));
        }
        ResearchStatus::AlreadyResearched => {
            println!("'{}' is already researched and ready.", outcome.topic.name);
        }
        ResearchStatus::InProgress => {
            println!("'{}' research is already in progress.", outcome.topic.name);
        }
    }

    Ok(())
}

/// Ask a question from the command line.
#[inline]
pub async fn ask_question(question: &str, topic: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;
    let llm = OpenAiClient::new(&config);
    let embedder = EmbeddingClient::new(&config);
    let index_store = TopicIndexStore::new(config.clone(), embedder);

    let composer =
        crate::bot::answer::AnswerComposer::new(&config, &database, &llm, &index_store);
    // CLI sessions share a reserved chat id for context inference.
    let (reply, _topic_id) = composer.answer(0, question, topic).await?;

    println!("{}", reply.text);
    Ok(())
}

/// List all topics in the library.
#[inline]
pub async fn list_topics() -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;

    let topics = database.list_topics().await?;
    if topics.is_empty() {
        println!("No topics yet. Use 'meeplebot research <name>' to add one.");
        return Ok(());
    }

    println!("Topics ({} total):", topics.len());
    for topic in &topics {
        println!("\u{1F3B2} {} (ID: {})", topic.name, topic.id);
        println!("   Status: {}", topic.status);
        if let Some(description) = &topic.description {
            println!("   {}", description);
        }
        if let Some(players) = &topic.player_count {
            println!("   Players: {}", players);
        }
        if let Some(difficulty) = topic.difficulty {
            println!("   Difficulty: {:.2} / 5", difficulty);
        }
        if let Some(researched) = topic.last_researched_at {
            println!("   Last researched: {}", researched);
        }
    }

    Ok(())
}

/// Show pipeline status for every topic: source counts and index presence.
#[inline]
pub async fn show_status() -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;
    let embedder = EmbeddingClient::new(&config);
    let index_store = TopicIndexStore::new(config.clone(), embedder);

    let topics = database.list_topics().await?;
    if topics.is_empty() {
        println!("No topics yet.");
        return Ok(());
    }

    for topic in &topics {
        let sources = database.list_sources(topic.id).await?;
        let materialized = sources.iter().filter(|s| s.is_materialized()).count();
        let indexed = index_store.has_index(topic.id);

        println!("{} (ID: {})", topic.name, topic.id);
        println!("   Status: {}", topic.status);
        println!(
            "   Sources: {} materialized, {} link-only",
            materialized,
            sources.len() - materialized
        );
        println!("   Index: {}", if indexed { "present" } else { "missing" });
    }

    Ok(())
}

/// Run one message through the full router pipeline, as the chat
/// transport would.
#[inline]
pub async fn handle_single_message(chat_id: i64, text: &str) -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;
    let llm = OpenAiClient::new(&config);
    let embedder = EmbeddingClient::new(&config);

    let router = Router::new(config, database, llm, embedder);
    let message = IncomingMessage {
        chat_id,
        chat_kind: Some("private".to_string()),
        author_id: None,
        author_name: Some("cli".to_string()),
        text: text.to_string(),
    };

    let reply = router.handle_message(&message).await;
    println!("{}", reply.text);
    for button in &reply.buttons {
        println!("[{}] {}", button.label, button.url);
    }

    Ok(())
}
