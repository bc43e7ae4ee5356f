//! Grounded question answering over a topic's retrieval index.

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::{debug, warn};

use super::format::escape_html;
use super::{Reply, UrlButton};
use crate::config::Config;
use crate::database::sqlite::Database;
use crate::index::TopicIndexStore;
use crate::llm::{ChatTurn, OpenAiClient, clip_chars, prompts};

/// Retrieval depth for one question.
pub const TOP_K: usize = 5;
/// Hard budget for concatenated chunk text in the prompt. Truncation
/// drops the lowest-ranked chunks first.
const MAX_CONTEXT_CHARS: usize = 20_000;
/// Cap on distinct citations appended to an answer.
const MAX_CITATIONS: usize = 5;

/// Composes a grounded answer: resolves the topic, gates on readiness,
/// retrieves top-matching chunks, and asks the LLM to answer with
/// citations.
pub struct AnswerComposer<'a> {
    config: &'a Config,
    database: &'a Database,
    llm: &'a OpenAiClient,
    index_store: &'a TopicIndexStore,
}

impl<'a> AnswerComposer<'a> {
    #[inline]
    pub fn new(
        config: &'a Config,
        database: &'a Database,
        llm: &'a OpenAiClient,
        index_store: &'a TopicIndexStore,
    ) -> Self {
        Self {
            config,
            database,
            llm,
            index_store,
        }
    }

    /// Answer a question. `topic_hint` is the explicitly named or
    /// intent-extracted topic; without one, the most recently tagged topic
    /// in this chat's log is used. Returns the reply plus the resolved
    /// topic id for chat tagging.
    #[inline]
    pub async fn answer(
        &self,
        chat_id: i64,
        question: &str,
        topic_hint: Option<&str>,
    ) -> Result<(Reply, Option<i64>)> {
        let topics = self.database.list_topics().await?;

        let topic_name = match topic_hint {
            Some(name) => Some(name.to_string()),
            None => self
                .database
                .find_recent_topic_for_chat(chat_id)
                .await?
                .map(|topic| topic.name),
        };

        let Some(topic_name) = topic_name else {
            let names = topics.iter().map(|t| t.name.as_str()).join(", ");
            let known = if names.is_empty() {
                "none yet".to_string()
            } else {
                names
            };
            return Ok((
                Reply::text(format!(
                    "I'm not sure which game you mean. Games I currently know: {known}. \
                     Name the game in your question, or ask me to research a new one."
                )),
                None,
            ));
        };

        let Some(topic) = self.database.get_topic_by_name(&topic_name).await? else {
            return Ok((
                Reply::text(format!(
                    "I don't have anything about <b>{}</b> yet. Ask me to research it first!",
                    escape_html(&topic_name)
                )),
                None,
            ));
        };

        // Status gating: a topic that is not ready is reported as such and
        // the index store is never consulted.
        if !topic.is_ready() {
            return Ok((
                Reply::text(format!(
                    "<b>{}</b> isn't ready yet (status: {}). Try again in a bit.",
                    escape_html(&topic.name),
                    topic.status
                )),
                Some(topic.id),
            ));
        }

        let store = self.index_store.clone();
        let query = question.to_string();
        let topic_id = topic.id;
        let hits = tokio::task::spawn_blocking(move || store.search_topic(topic_id, &query, TOP_K))
            .await
            .context("Retrieval task failed")?;

        let files_url = self.config.topic_files_url(topic.id);
        let files_button = UrlButton {
            label: format!("\u{1F4C2} View {} files", topic.name),
            url: files_url.clone(),
        };

        if hits.is_empty() {
            return Ok((
                Reply::text(format!(
                    "I have <b>{}</b> in my library but couldn't find anything relevant \
                     to that question. You can <a href=\"{}\">browse the raw files</a> instead.",
                    escape_html(&topic.name),
                    escape_html(&files_url)
                ))
                .with_button(files_button),
                Some(topic.id),
            ));
        }

        debug!("Retrieved {} chunks for '{}'", hits.len(), topic.name);

        let mut context = String::new();
        for hit in &hits {
            let block = format!(
                "[Source: {} (score: {:.2})]\n{}",
                hit.label, hit.score, hit.content
            );
            if !context.is_empty()
                && context.chars().count() + block.chars().count() + 2 > MAX_CONTEXT_CHARS
            {
                break;
            }
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&block);
        }
        let context = clip_chars(&context, MAX_CONTEXT_CHARS);

        let turns = vec![
            ChatTurn::system(prompts::QA_SYSTEM_PROMPT),
            ChatTurn::user(format!(
                "GAME: {}\n\nQUESTION: {}\n\nDOCUMENTS:\n{}",
                topic.name, question, context
            )),
        ];

        let llm = self.llm.clone();
        let answer = tokio::task::spawn_blocking(move || llm.chat(&turns))
            .await
            .context("Answer task failed")?;

        let answer = match answer {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) | Err(_) => {
                if let Err(e) = &answer {
                    warn!("Answer composition failed for '{}': {:#}", topic.name, e);
                } else {
                    warn!("LLM returned an empty answer for '{}'", topic.name);
                }
                return Ok((
                    Reply::text(format!(
                        "I had trouble composing an answer just now. You can \
                         <a href=\"{}\">browse the {} files</a> in the meantime.",
                        escape_html(&files_url),
                        escape_html(&topic.name)
                    ))
                    .with_button(files_button),
                    Some(topic.id),
                ));
            }
        };

        // Deduplicated, order-preserving citation list from the retrieved
        // chunks' origins.
        let citations: Vec<(String, String)> = hits
            .iter()
            .map(|hit| (hit.label.clone(), hit.origin_url.clone()))
            .unique()
            .take(MAX_CITATIONS)
            .collect();

        let mut text = answer;
        text.push_str("\n\n<b>Sources:</b>\n");
        for (label, url) in &citations {
            text.push_str(&format!(
                "\u{2022} <a href=\"{}\">{}</a>\n",
                escape_html(url),
                escape_html(label)
            ));
        }
        text.push_str(&format!(
            "\n<a href=\"{}\">View all files for {}</a>",
            escape_html(&files_url),
            escape_html(&topic.name)
        ));

        Ok((Reply::text(text).with_button(files_button), Some(topic.id)))
    }
}
