pub mod answer;
pub mod format;
pub mod intent;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use self::answer::AnswerComposer;
use self::format::{escape_html, to_transport_html};
use self::intent::{Intent, IntentKind, IntentResolver};
use crate::config::Config;
use crate::crawler::{Researcher, ResearchStatus};
use crate::database::sqlite::{ChatRole, Database, NewChatMessage, Topic};
use crate::embeddings::EmbeddingClient;
use crate::index::TopicIndexStore;
use crate::llm::{ChatTurn, OpenAiClient, prompts};

/// One inbound chat message. The transport owns the activation rule; the
/// router assumes it is only invoked for messages meant for the bot.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    /// Transport chat kind, e.g. "private" or "group".
    pub chat_kind: Option<String>,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub text: String,
}

/// An action button for the transport to render alongside the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlButton {
    pub label: String,
    pub url: String,
}

/// Formatted reply text (HTML subset) plus optional action buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub buttons: Vec<UrlButton>,
}

impl Reply {
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    #[inline]
    pub fn with_button(mut self, button: UrlButton) -> Self {
        self.buttons.push(button);
        self
    }
}

/// Routes inbound messages: logs them, resolves the intent, dispatches to
/// the matching tool, and logs the outbound reply. This is the outermost
/// error boundary: a single message's failure is logged and answered with
/// a generic apology, never propagated.
pub struct Router {
    config: Config,
    database: Database,
    llm: OpenAiClient,
    index_store: TopicIndexStore,
    embedder: EmbeddingClient,
}

impl Router {
    #[inline]
    pub fn new(
        config: Config,
        database: Database,
        llm: OpenAiClient,
        embedder: EmbeddingClient,
    ) -> Self {
        let index_store = TopicIndexStore::new(config.clone(), embedder.clone());
        Self {
            config,
            database,
            llm,
            index_store,
            embedder,
        }
    }

    /// Handle one message start-to-finish and produce the reply to send.
    #[inline]
    pub async fn handle_message(&self, message: &IncomingMessage) -> Reply {
        match self.dispatch(message).await {
            Ok(reply) => Reply {
                text: to_transport_html(&reply.text),
                buttons: reply.buttons,
            },
            Err(e) => {
                error!(
                    chat_id = message.chat_id,
                    text = %message.text,
                    "Message handling failed: {:#}",
                    e
                );
                Reply::text(
                    "Something went wrong on my side. Please try that again in a moment.",
                )
            }
        }
    }

    async fn dispatch(&self, message: &IncomingMessage) -> Result<Reply> {
        self.log_message(message, &message.text, ChatRole::User, None)
            .await?;

        let topics = self.database.list_topics().await?;
        let known_names: Vec<String> = topics.iter().map(|t| t.name.clone()).collect();

        let llm = self.llm.clone();
        let utterance = message.text.clone();
        let intent = tokio::task::spawn_blocking(move || {
            IntentResolver::new(&llm).resolve(&utterance, &known_names)
        })
        .await
        .context("Intent resolution task failed")?;

        debug!(
            chat_id = message.chat_id,
            "Resolved intent {:?} (topic: {:?})", intent.kind, intent.topic
        );

        let (reply, topic_id) = match intent.kind {
            IntentKind::ListTopics => (self.handle_list(&topics), None),
            IntentKind::ResearchTopic => self.handle_research(&intent).await?,
            IntentKind::QueryTopic => {
                let composer = AnswerComposer::new(
                    &self.config,
                    &self.database,
                    &self.llm,
                    &self.index_store,
                );
                composer
                    .answer(message.chat_id, &message.text, intent.topic.as_deref())
                    .await?
            }
            IntentKind::GeneralChat => (self.handle_general(message).await, None),
        };

        self.log_message(message, &reply.text, ChatRole::Assistant, topic_id)
            .await?;

        Ok(reply)
    }

    /// Library listing: ready topics with descriptions and file links,
    /// in-progress topics with their status.
    fn handle_list(&self, topics: &[Topic]) -> Reply {
        if topics.is_empty() {
            return Reply::text(
                "My game library is empty so far. Ask me to research one, \
                 e.g. \"research Catan\".",
            );
        }

        let (ready, pending): (Vec<&Topic>, Vec<&Topic>) =
            topics.iter().partition(|t| t.is_ready());

        let mut lines = vec!["<b>\u{1F4DA} My board game library:</b>".to_string()];
        let mut reply = Reply::text(String::new());

        if !ready.is_empty() {
            lines.push("\n<b>Ready to answer questions:</b>".to_string());
            for topic in &ready {
                let description = topic
                    .description
                    .as_deref()
                    .unwrap_or("No description available yet.");
                let files_url = self.config.topic_files_url(topic.id);
                lines.push(format!(
                    "\u{2022} <b>{}</b>\n  {}\n  <a href=\"{}\">View files</a>",
                    escape_html(&topic.name),
                    escape_html(description),
                    escape_html(&files_url)
                ));
                reply.buttons.push(UrlButton {
                    label: format!("\u{1F4C2} {}", topic.name),
                    url: files_url,
                });
            }
        }

        if !pending.is_empty() {
            lines.push(format!("\n<b>In progress ({}):</b>", pending.len()));
            for topic in pending.iter().take(5) {
                lines.push(format!(
                    "\u{2022} {} ({})",
                    escape_html(&topic.name),
                    topic.status
                ));
            }
        }

        lines.push("\nAsk me anything about these games!".to_string());
        reply.text = lines.join("\n");
        reply
    }

    async fn handle_research(&self, intent: &Intent) -> Result<(Reply, Option<i64>)> {
        let Some(topic_name) = intent.topic.as_deref() else {
            return Ok((
                Reply::text(
                    "I'd love to research a game for you! Which one should I look into?",
                ),
                None,
            ));
        };

        let researcher = Researcher::new(&self.config, &self.database, &self.llm, &self.embedder);
        let outcome = match researcher.research(topic_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Research failed for '{}': {:#}", topic_name, e);
                return Ok((
                    Reply::text(format!(
                        "Research failed for <b>{}</b>. Please try again later, or \
                         double-check the game name.",
                        escape_html(topic_name)
                    )),
                    None,
                ));
            }
        };

        let topic = &outcome.topic;
        let files_url = self.config.topic_files_url(topic.id);
        let files_button = UrlButton {
            label: format!("\u{1F4C2} View {} files", topic.name),
            url: files_url.clone(),
        };

        let reply = match outcome.status {
            ResearchStatus::AlreadyResearched => Reply::text(format!(
                "I already have research on <b>{}</b>. Ask me about the rules or details!",
                escape_html(&topic.name)
            ))
            .with_button(files_button),
            ResearchStatus::InProgress => Reply::text(format!(
                "I'm still researching <b>{}</b>. Give me a little longer!",
                escape_html(&topic.name)
            )),
            ResearchStatus::Completed { downloaded, linked } => {
                info!(
                    "Research summary for '{}': {} downloaded, {} linked",
                    topic.name, downloaded, linked
                );
                Reply::text(format!(
                    "I've built a knowledge base for <b>{}</b> with {} saved files and \
                     {} links. You can browse them <a href=\"{}\">here</a>.\n\
                     Ask me anything about {}!",
                    escape_html(&topic.name),
                    downloaded,
                    linked,
                    escape_html(&files_url),
                    escape_html(&topic.name)
                ))
                .with_button(files_button)
            }
        };

        Ok((reply, Some(topic.id)))
    }

    /// Small talk and anything unclassifiable: answer in persona, with a
    /// static capability hint as the fallback when the LLM is unavailable.
    async fn handle_general(&self, message: &IncomingMessage) -> Reply {
        let llm = self.llm.clone();
        let turns = vec![
            ChatTurn::system(prompts::SYSTEM_PERSONA),
            ChatTurn::user(message.text.clone()),
        ];

        let response = tokio::task::spawn_blocking(move || llm.chat(&turns)).await;
        match response {
            Ok(Ok(text)) if !text.trim().is_empty() => Reply::text(text),
            _ => Reply::text(
                "Hi! I'm MeepleBot, your board game assistant. I can:\n\
                 \u{2022} research new games: \"research Catan\"\n\
                 \u{2022} answer rules questions: \"how do you win in Catan?\"\n\
                 \u{2022} show my library: \"what games do you have?\"",
            ),
        }
    }

    async fn log_message(
        &self,
        message: &IncomingMessage,
        text: &str,
        role: ChatRole,
        topic_id: Option<i64>,
    ) -> Result<()> {
        let (author_id, author_name) = match role {
            ChatRole::User => (message.author_id, message.author_name.clone()),
            _ => (None, Some("MeepleBot".to_string())),
        };
        self.database
            .log_chat_message(NewChatMessage {
                chat_id: message.chat_id,
                chat_kind: message.chat_kind.clone(),
                author_id,
                author_name,
                message: text.to_string(),
                role,
                topic_id,
            })
            .await?;
        Ok(())
    }
}
