use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::debug;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub use models::{
    ChatMessage, ChatRole, NewChatMessage, NewSource, Source, SourceKind, Topic, TopicMetadata,
    TopicStatus,
};
pub use queries::{ChatLogQueries, SourceQueries, TopicQueries};

pub type DbPool = Pool<Sqlite>;

/// Handle to the document store. Constructed once at process start and
/// passed by reference into every component that needs it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.create_tables().await?;

        Ok(database)
    }

    /// In-memory database, used by tests.
    #[inline]
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to create in-memory database")?;

        let database = Self { pool };
        database.create_tables().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL COLLATE NOCASE UNIQUE,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'created',
                store_dir TEXT NOT NULL,
                difficulty REAL,
                player_count TEXT,
                reference_url TEXT,
                video_url TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                last_researched_at DATETIME
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create topics table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                url TEXT,
                title TEXT,
                local_path TEXT,
                added_at DATETIME NOT NULL,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create sources table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                chat_kind TEXT,
                author_id INTEGER,
                author_name TEXT,
                message TEXT NOT NULL,
                role TEXT NOT NULL,
                topic_id INTEGER,
                created_at DATETIME NOT NULL,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE SET NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create chat_log table")?;

        debug!("Database tables ready");
        Ok(())
    }

    // Topic operations

    #[inline]
    pub async fn get_or_create_topic(&self, name: &str) -> Result<Topic> {
        TopicQueries::get_or_create(&self.pool, name).await
    }

    #[inline]
    pub async fn get_topic_by_id(&self, id: i64) -> Result<Option<Topic>> {
        TopicQueries::get_by_id(&self.pool, id).await
    }

    #[inline]
    pub async fn get_topic_by_name(&self, name: &str) -> Result<Option<Topic>> {
        TopicQueries::get_by_name(&self.pool, name).await
    }

    #[inline]
    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        TopicQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn update_topic_status(&self, id: i64, status: TopicStatus) -> Result<()> {
        TopicQueries::update_status(&self.pool, id, status).await
    }

    // Source operations

    #[inline]
    pub async fn add_source(&self, new_source: NewSource) -> Result<Source> {
        SourceQueries::create(&self.pool, new_source).await
    }

    #[inline]
    pub async fn list_sources(&self, topic_id: i64) -> Result<Vec<Source>> {
        SourceQueries::list_for_topic(&self.pool, topic_id).await
    }

    // Chat log operations

    #[inline]
    pub async fn log_chat_message(&self, new_message: NewChatMessage) -> Result<ChatMessage> {
        ChatLogQueries::append(&self.pool, new_message).await
    }

    #[inline]
    pub async fn find_recent_topic_for_chat(&self, chat_id: i64) -> Result<Option<Topic>> {
        ChatLogQueries::find_recent_topic_for_chat(&self.pool, chat_id).await
    }
}
