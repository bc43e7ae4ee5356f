#[cfg(test)]
mod tests;

use regex::Regex;
use scraper::{Html, Node};
use std::sync::LazyLock;

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex compiles"));

const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Render an HTML document as plain text: script/style/noscript content is
/// dropped and runs of blank lines are collapsed to a single blank line.
#[inline]
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut pieces: Vec<String> = Vec::new();
    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let in_skipped_tag = node.ancestors().any(|ancestor| {
            matches!(
                ancestor.value(),
                Node::Element(element) if SKIPPED_TAGS.contains(&element.name())
            )
        });
        if in_skipped_tag {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed.to_string());
        }
    }

    let joined = pieces.join("\n");
    BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

/// Best-effort page title: the <title> element's text, if any.
#[inline]
pub fn html_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = scraper::Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() { None } else { Some(title) }
}
