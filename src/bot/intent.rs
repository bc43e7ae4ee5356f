//! Classification of a user utterance into an intent and a target topic.

use tracing::{debug, warn};

use crate::llm::{IntentClassification, OpenAiClient};

/// Minimum normalized edit-distance similarity for canonicalizing an
/// extracted topic name against the known topics.
const MATCH_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    ListTopics,
    ResearchTopic,
    QueryTopic,
    GeneralChat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    #[inline]
    pub fn parse(value: &str) -> Self {
        match value {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// The classified purpose of a user utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub kind: IntentKind,
    pub topic: Option<String>,
    pub confidence: Confidence,
}

impl Intent {
    fn general_chat() -> Self {
        Self {
            kind: IntentKind::GeneralChat,
            topic: None,
            confidence: Confidence::Low,
        }
    }
}

/// Pure classification: resolves an utterance via the LLM, then
/// canonicalizes the extracted topic name against the known topics with
/// fuzzy matching. Any LLM failure fails closed to general chat so the
/// conversational surface stays responsive.
pub struct IntentResolver<'a> {
    llm: &'a OpenAiClient,
}

impl<'a> IntentResolver<'a> {
    #[inline]
    pub fn new(llm: &'a OpenAiClient) -> Self {
        Self { llm }
    }

    #[inline]
    pub fn resolve(&self, utterance: &str, known_topics: &[String]) -> Intent {
        match self.llm.classify_intent(utterance, known_topics) {
            Ok(classification) => from_classification(classification, known_topics),
            Err(e) => {
                warn!("Intent classification failed, defaulting to general chat: {:#}", e);
                Intent::general_chat()
            }
        }
    }
}

fn from_classification(classification: IntentClassification, known_topics: &[String]) -> Intent {
    let kind = match classification.intent.as_str() {
        "list_topics" => IntentKind::ListTopics,
        "research_topic" => IntentKind::ResearchTopic,
        "query_topic" => IntentKind::QueryTopic,
        _ => IntentKind::GeneralChat,
    };
    let confidence = Confidence::parse(&classification.confidence);

    let topic = classification
        .topic_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .and_then(|name| canonicalize(&name, known_topics, confidence));

    Intent {
        kind,
        topic,
        confidence,
    }
}

/// Substitute the canonical known name when the extracted one is close
/// enough. An unmatched low-confidence extraction resolves to no topic.
fn canonicalize(extracted: &str, known_topics: &[String], confidence: Confidence) -> Option<String> {
    if let Some(canonical) = closest_match(extracted, known_topics, MATCH_THRESHOLD) {
        debug!("Extracted topic '{}' matched known '{}'", extracted, canonical);
        return Some(canonical.clone());
    }
    if confidence > Confidence::Low {
        return Some(extracted.to_string());
    }
    None
}

/// Best candidate at or above the similarity threshold, if any.
#[inline]
pub fn closest_match<'t>(
    target: &str,
    candidates: &'t [String],
    threshold: f64,
) -> Option<&'t String> {
    candidates
        .iter()
        .map(|candidate| (candidate, similarity(target, candidate)))
        .filter(|(_, score)| *score >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(candidate, _)| candidate)
}

/// Normalized, case-insensitive edit-distance similarity in [0, 1].
#[inline]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }

    1.0 - (levenshtein(&a, &b) as f64 / max_len as f64)
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution_cost = usize::from(ca != cb);
            current[j + 1] = (previous[j] + substitution_cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        vec![
            "Catan".to_string(),
            "Ticket to Ride".to_string(),
            "Wingspan".to_string(),
        ]
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("catan", "Catan"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        let partial = similarity("katan", "catan");
        assert!(partial > 0.6 && partial < 1.0);
    }

    #[test]
    fn closest_match_picks_best_above_threshold() {
        let topics = known();
        assert_eq!(
            closest_match("katan", &topics, 0.6).map(String::as_str),
            Some("Catan")
        );
        assert_eq!(closest_match("Gloomhaven", &topics, 0.6), None);
    }

    #[test]
    fn classification_maps_intents() {
        for (raw, expected) in [
            ("list_topics", IntentKind::ListTopics),
            ("research_topic", IntentKind::ResearchTopic),
            ("query_topic", IntentKind::QueryTopic),
            ("general_chat", IntentKind::GeneralChat),
            ("something_else", IntentKind::GeneralChat),
        ] {
            let intent = from_classification(
                IntentClassification {
                    intent: raw.to_string(),
                    topic_name: None,
                    confidence: "high".to_string(),
                },
                &known(),
            );
            assert_eq!(intent.kind, expected);
        }
    }

    #[test]
    fn extracted_topic_is_canonicalized() {
        let intent = from_classification(
            IntentClassification {
                intent: "query_topic".to_string(),
                topic_name: Some("ticket to ride".to_string()),
                confidence: "medium".to_string(),
            },
            &known(),
        );
        assert_eq!(intent.topic.as_deref(), Some("Ticket to Ride"));
    }

    #[test]
    fn unmatched_high_confidence_name_is_kept() {
        let intent = from_classification(
            IntentClassification {
                intent: "research_topic".to_string(),
                topic_name: Some("Gloomhaven".to_string()),
                confidence: "high".to_string(),
            },
            &known(),
        );
        assert_eq!(intent.topic.as_deref(), Some("Gloomhaven"));
    }

    #[test]
    fn unmatched_low_confidence_name_is_unresolved() {
        let intent = from_classification(
            IntentClassification {
                intent: "query_topic".to_string(),
                topic_name: Some("Gloomhaven".to_string()),
                confidence: "low".to_string(),
            },
            &known(),
        );
        assert_eq!(intent.topic, None);
    }

    #[test]
    fn blank_topic_name_is_dropped() {
        let intent = from_classification(
            IntentClassification {
                intent: "query_topic".to_string(),
                topic_name: Some("   ".to_string()),
                confidence: "high".to_string(),
            },
            &known(),
        );
        assert_eq!(intent.topic, None);
    }
}
