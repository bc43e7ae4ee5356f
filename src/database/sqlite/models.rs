use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A researchable subject with its own storage directory, source list,
/// and retrieval index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: TopicStatus,
    pub store_dir: String,
    pub difficulty: Option<f64>,
    pub player_count: Option<String>,
    pub reference_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub last_researched_at: Option<NaiveDateTime>,
}

/// Lifecycle status of a topic. Transitions only move forward, except that
/// a failed research run resets `Researching` back to `Created` so a retry
/// is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Created,
    Researching,
    Ready,
}

impl TopicStatus {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            TopicStatus::Created => "created",
            TopicStatus::Researching => "researching",
            TopicStatus::Ready => "ready",
        }
    }

    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(TopicStatus::Created),
            "researching" => Some(TopicStatus::Researching),
            "ready" => Some(TopicStatus::Ready),
            _ => None,
        }
    }
}

impl std::fmt::Display for TopicStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Topic {
    /// Only ready topics are queryable by the answer composer.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.status == TopicStatus::Ready
    }

    #[inline]
    pub fn is_researching(&self) -> bool {
        self.status == TopicStatus::Researching
    }
}

/// Structured metadata gathered during research. All fields optional;
/// only present fields are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicMetadata {
    pub difficulty: Option<f64>,
    pub player_count: Option<String>,
    pub reference_url: Option<String>,
    pub video_url: Option<String>,
}

/// One retrieved artifact belonging to a topic. Either materialized
/// locally (`local_path` set) or recorded as a bare external reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub topic_id: i64,
    pub kind: SourceKind,
    pub url: Option<String>,
    pub title: Option<String>,
    pub local_path: Option<String>,
    pub added_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Document,
    WebPage,
    Video,
    Link,
    Other,
}

impl SourceKind {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Document => "document",
            SourceKind::WebPage => "web-page",
            SourceKind::Video => "video",
            SourceKind::Link => "link",
            SourceKind::Other => "other",
        }
    }

    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "document" => Some(SourceKind::Document),
            "web-page" => Some(SourceKind::WebPage),
            "video" => Some(SourceKind::Video),
            "link" => Some(SourceKind::Link),
            "other" => Some(SourceKind::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Source {
    /// Whether the content was actually downloaded and stored locally.
    #[inline]
    pub fn is_materialized(&self) -> bool {
        self.local_path.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
    pub topic_id: i64,
    pub kind: SourceKind,
    pub url: Option<String>,
    pub title: Option<String>,
    pub local_path: Option<String>,
}

/// One chat log entry, used for conversational topic inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub chat_kind: Option<String>,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub message: String,
    pub role: ChatRole,
    pub topic_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }

    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            "system" => Some(ChatRole::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub chat_id: i64,
    pub chat_kind: Option<String>,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub message: String,
    pub role: ChatRole,
    pub topic_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_status_round_trip() {
        for status in [
            TopicStatus::Created,
            TopicStatus::Researching,
            TopicStatus::Ready,
        ] {
            assert_eq!(TopicStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TopicStatus::parse("researched"), None);
    }

    #[test]
    fn source_kind_round_trip() {
        for kind in [
            SourceKind::Document,
            SourceKind::WebPage,
            SourceKind::Video,
            SourceKind::Link,
            SourceKind::Other,
        ] {
            assert_eq!(SourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SourceKind::parse("pdf"), None);
    }

    #[test]
    fn materialized_vs_bare_link() {
        let materialized = Source {
            id: 1,
            topic_id: 1,
            kind: SourceKind::Document,
            url: Some("https://example.com/rules.pdf".to_string()),
            title: Some("Rules".to_string()),
            local_path: Some("/tmp/rules.pdf".to_string()),
            added_at: chrono::Utc::now().naive_utc(),
        };
        assert!(materialized.is_materialized());

        let bare = Source {
            kind: SourceKind::Link,
            local_path: None,
            ..materialized
        };
        assert!(!bare.is_materialized());
    }

    #[test]
    fn only_ready_topics_are_queryable() {
        let topic = Topic {
            id: 1,
            name: "Catan".to_string(),
            description: None,
            status: TopicStatus::Researching,
            store_dir: "/tmp/1".to_string(),
            difficulty: None,
            player_count: None,
            reference_url: None,
            video_url: None,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
            last_researched_at: None,
        };

        assert!(!topic.is_ready());
        assert!(topic.is_researching());

        let ready = Topic {
            status: TopicStatus::Ready,
            ..topic
        };
        assert!(ready.is_ready());
    }
}
