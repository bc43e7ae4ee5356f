use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::debug;

use super::models::{
    ChatMessage, ChatRole, NewChatMessage, NewSource, Source, SourceKind, Topic, TopicMetadata,
    TopicStatus,
};

const TOPIC_COLUMNS: &str = "id, name, description, status, store_dir, difficulty, player_count, \
                             reference_url, video_url, created_at, updated_at, last_researched_at";

fn topic_from_row(row: &SqliteRow) -> Result<Topic> {
    let status_str: String = row.get("status");
    let status = TopicStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid topic status: {}", status_str))?;

    Ok(Topic {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        status,
        store_dir: row.get("store_dir"),
        difficulty: row.get("difficulty"),
        player_count: row.get("player_count"),
        reference_url: row.get("reference_url"),
        video_url: row.get("video_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_researched_at: row.get("last_researched_at"),
    })
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    let kind_str: String = row.get("kind");
    let kind = SourceKind::parse(&kind_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid source kind: {}", kind_str))?;

    Ok(Source {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        kind,
        url: row.get("url"),
        title: row.get("title"),
        local_path: row.get("local_path"),
        added_at: row.get("added_at"),
    })
}

fn chat_message_from_row(row: &SqliteRow) -> Result<ChatMessage> {
    let role_str: String = row.get("role");
    let role = ChatRole::parse(&role_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat role: {}", role_str))?;

    Ok(ChatMessage {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        chat_kind: row.get("chat_kind"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        message: row.get("message"),
        role,
        topic_id: row.get("topic_id"),
        created_at: row.get("created_at"),
    })
}

pub struct TopicQueries;

impl TopicQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, name: &str) -> Result<Topic> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO topics (name, status, store_dir, created_at, updated_at) \
             VALUES (?, 'created', '', ?, ?)",
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create topic")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created topic"))
    }

    /// Get the existing topic under case-insensitive name comparison, or
    /// create a new row. Never creates a duplicate for a known name.
    #[inline]
    pub async fn get_or_create(pool: &SqlitePool, name: &str) -> Result<Topic> {
        if let Some(existing) = Self::get_by_name(pool, name).await? {
            debug!("Topic '{}' already exists with id {}", name, existing.id);
            return Ok(existing);
        }
        Self::create(pool, name).await
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Topic>> {
        let row = sqlx::query(&format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get topic by id")?;

        row.as_ref().map(topic_from_row).transpose()
    }

    #[inline]
    pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Topic>> {
        let row = sqlx::query(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE name = ? COLLATE NOCASE"
        ))
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get topic by name")?;

        row.as_ref().map(topic_from_row).transpose()
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Topic>> {
        let rows = sqlx::query(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics ORDER BY name COLLATE NOCASE ASC"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list topics")?;

        rows.iter().map(topic_from_row).collect()
    }

    #[inline]
    pub async fn set_store_dir(pool: &SqlitePool, id: i64, store_dir: &str) -> Result<()> {
        sqlx::query("UPDATE topics SET store_dir = ?, updated_at = ? WHERE id = ?")
            .bind(store_dir)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to set topic store directory")?;
        Ok(())
    }

    #[inline]
    pub async fn update_status(pool: &SqlitePool, id: i64, status: TopicStatus) -> Result<()> {
        sqlx::query("UPDATE topics SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update topic status")?;
        Ok(())
    }

    #[inline]
    pub async fn update_description(pool: &SqlitePool, id: i64, description: &str) -> Result<()> {
        sqlx::query("UPDATE topics SET description = ?, updated_at = ? WHERE id = ?")
            .bind(description)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update topic description")?;
        Ok(())
    }

    #[inline]
    pub async fn update_metadata(
        pool: &SqlitePool,
        id: i64,
        metadata: &TopicMetadata,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE topics SET \
               difficulty = COALESCE(?, difficulty), \
               player_count = COALESCE(?, player_count), \
               reference_url = COALESCE(?, reference_url), \
               video_url = COALESCE(?, video_url), \
               updated_at = ? \
             WHERE id = ?",
        )
        .bind(metadata.difficulty)
        .bind(metadata.player_count.as_deref())
        .bind(metadata.reference_url.as_deref())
        .bind(metadata.video_url.as_deref())
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update topic metadata")?;
        Ok(())
    }

    #[inline]
    pub async fn stamp_researched(pool: &SqlitePool, id: i64) -> Result<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE topics SET last_researched_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to stamp topic research time")?;
        Ok(())
    }
}

pub struct SourceQueries;

impl SourceQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_source: NewSource) -> Result<Source> {
        let id = sqlx::query(
            "INSERT INTO sources (topic_id, kind, url, title, local_path, added_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new_source.topic_id)
        .bind(new_source.kind.as_str())
        .bind(new_source.url.as_deref())
        .bind(new_source.title.as_deref())
        .bind(new_source.local_path.as_deref())
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await
        .context("Failed to create source")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created source"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Source>> {
        let row = sqlx::query(
            "SELECT id, topic_id, kind, url, title, local_path, added_at \
             FROM sources WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get source by id")?;

        row.as_ref().map(source_from_row).transpose()
    }

    #[inline]
    pub async fn list_for_topic(pool: &SqlitePool, topic_id: i64) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            "SELECT id, topic_id, kind, url, title, local_path, added_at \
             FROM sources WHERE topic_id = ? ORDER BY id",
        )
        .bind(topic_id)
        .fetch_all(pool)
        .await
        .context("Failed to list sources for topic")?;

        rows.iter().map(source_from_row).collect()
    }

    #[inline]
    pub async fn count_for_topic(pool: &SqlitePool, topic_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM sources WHERE topic_id = ?")
            .bind(topic_id)
            .fetch_one(pool)
            .await
            .context("Failed to count sources for topic")?;
        Ok(row.get("count"))
    }
}

pub struct ChatLogQueries;

impl ChatLogQueries {
    #[inline]
    pub async fn append(pool: &SqlitePool, new_message: NewChatMessage) -> Result<ChatMessage> {
        let id = sqlx::query(
            "INSERT INTO chat_log \
               (chat_id, chat_kind, author_id, author_name, message, role, topic_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_message.chat_id)
        .bind(new_message.chat_kind.as_deref())
        .bind(new_message.author_id)
        .bind(new_message.author_name.as_deref())
        .bind(&new_message.message)
        .bind(new_message.role.as_str())
        .bind(new_message.topic_id)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await
        .context("Failed to append chat message")?
        .last_insert_rowid();

        let row = sqlx::query(
            "SELECT id, chat_id, chat_kind, author_id, author_name, message, role, topic_id, \
                    created_at \
             FROM chat_log WHERE id = ?",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to retrieve appended chat message")?;

        chat_message_from_row(&row)
    }

    /// The last `limit` messages of a chat, oldest first.
    #[inline]
    pub async fn recent_for_chat(
        pool: &SqlitePool,
        chat_id: i64,
        limit: i64,
    ) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, chat_id, chat_kind, author_id, author_name, message, role, topic_id, \
                    created_at \
             FROM chat_log WHERE chat_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to fetch recent chat messages")?;

        let mut messages: Vec<ChatMessage> = rows
            .iter()
            .map(chat_message_from_row)
            .collect::<Result<_>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// The most recently tagged topic in this chat, scanning newest first.
    #[inline]
    pub async fn find_recent_topic_for_chat(
        pool: &SqlitePool,
        chat_id: i64,
    ) -> Result<Option<Topic>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chat_log c JOIN topics t ON t.id = c.topic_id \
             WHERE c.chat_id = ? AND c.topic_id IS NOT NULL \
             ORDER BY c.id DESC LIMIT 1",
            TOPIC_COLUMNS
                .split(", ")
                .map(|c| format!("t.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .bind(chat_id)
        .fetch_optional(pool)
        .await
        .context("Failed to find recent topic for chat")?;

        row.as_ref().map(topic_from_row).transpose()
    }
}
