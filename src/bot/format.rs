//! Rendering of model output into the transport's HTML subset
//! (bold, italic, anchor links, code spans).

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<[a-z]+[^>]*>").expect("static regex compiles"));

/// Escape text for inclusion in HTML output.
#[inline]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Convert model output to the transport's HTML subset.
///
/// Models are instructed to reply in HTML, but they routinely mix in
/// markdown anyway. Text that already contains HTML tags is passed
/// through as-is; everything else is rendered from markdown, emitting
/// only the allowed tags.
#[inline]
pub fn to_transport_html(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if HTML_TAG.is_match(trimmed) {
        return trimmed.to_string();
    }

    render_markdown(trimmed)
}

fn render_markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::empty());
    let mut out = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::Strong) => out.push_str("<b>"),
            Event::End(TagEnd::Strong) => out.push_str("</b>"),
            Event::Start(Tag::Emphasis) => out.push_str("<i>"),
            Event::End(TagEnd::Emphasis) => out.push_str("</i>"),
            // Headers are not in the transport subset; render as bold lines.
            Event::Start(Tag::Heading { .. }) => out.push_str("<b>"),
            Event::End(TagEnd::Heading(_)) => out.push_str("</b>\n"),
            Event::Start(Tag::Link { dest_url, .. }) => {
                out.push_str(&format!("<a href=\"{}\">", escape_html(&dest_url)));
            }
            Event::End(TagEnd::Link) => out.push_str("</a>"),
            Event::Code(code) => {
                out.push_str(&format!("<code>{}</code>", escape_html(&code)));
            }
            Event::Start(Tag::CodeBlock(_)) => out.push_str("<code>"),
            Event::End(TagEnd::CodeBlock) => out.push_str("</code>\n"),
            Event::Start(Tag::Item) => out.push_str("\u{2022} "),
            Event::End(TagEnd::Item) => out.push('\n'),
            Event::End(TagEnd::Paragraph) => out.push_str("\n\n"),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Text(text) => out.push_str(&escape_html(&text)),
            Event::Html(html) | Event::InlineHtml(html) => out.push_str(&html),
            Event::Rule => {}
            _ => {}
        }
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_bold_italic_code() {
        let html = to_transport_html("This is **bold**, _italic_, and `code`.");
        assert_eq!(html, "This is <b>bold</b>, <i>italic</i>, and <code>code</code>.");
    }

    #[test]
    fn markdown_links_become_anchors() {
        let html = to_transport_html("See [the rules](https://example.com/rules?a=1&b=2).");
        assert!(html.contains("<a href=\"https://example.com/rules?a=1&amp;b=2\">the rules</a>"));
    }

    #[test]
    fn headers_are_rendered_as_bold() {
        let html = to_transport_html("## Setup\n\nPlace the board.");
        assert!(html.starts_with("<b>Setup</b>"));
        assert!(html.contains("Place the board."));
        assert!(!html.contains('#'));
    }

    #[test]
    fn existing_html_passes_through() {
        let text = "Already <b>formatted</b> with <a href=\"http://x\">a link</a>";
        assert_eq!(to_transport_html(text), text);
    }

    #[test]
    fn plain_text_special_chars_are_escaped() {
        let html = to_transport_html("3 < 4 & 5 > 2");
        assert_eq!(html, "3 &lt; 4 &amp; 5 &gt; 2");
    }

    #[test]
    fn list_items_become_bullets() {
        let html = to_transport_html("- first\n- second");
        assert!(html.contains("\u{2022} first"));
        assert!(html.contains("\u{2022} second"));
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(to_transport_html("   "), "");
    }
}
