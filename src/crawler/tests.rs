use super::*;

#[test]
fn youtube_id_from_known_patterns() {
    assert_eq!(
        extract_youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(
        extract_youtube_id("https://youtu.be/dQw4w9WgXcQ"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(
        extract_youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(extract_youtube_id("https://example.com/watch?v=short"), None);
    assert_eq!(extract_youtube_id("https://vimeo.com/12345"), None);
}

#[test]
fn dedup_keeps_first_seen_title_and_order() {
    let merged = dedup_by_url(vec![
        ("t1".to_string(), "http://x/u".to_string()),
        ("t2".to_string(), "http://x/u".to_string()),
        ("t3".to_string(), "http://x/v".to_string()),
    ]);

    assert_eq!(
        merged,
        vec![
            ("t1".to_string(), "http://x/u".to_string()),
            ("t3".to_string(), "http://x/v".to_string()),
        ]
    );
}

#[test]
fn wikipedia_seed_url_from_name() {
    assert_eq!(
        wikipedia_seed_url("Ticket to Ride"),
        "https://en.wikipedia.org/wiki/Ticket_to_Ride"
    );
    assert_eq!(
        wikipedia_seed_url("  Catan "),
        "https://en.wikipedia.org/wiki/Catan"
    );
}

#[test]
fn bgg_item_id_from_search_response() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
        <items total="2" termsofuse="https://boardgamegeek.com/xmlapi/termsofuse">
            <item type="boardgame" id="13">
                <name type="primary" value="Catan"/>
                <yearpublished value="1995"/>
            </item>
            <item type="boardgame" id="27710"><name value="Catan Dice Game"/></item>
        </items>"#;

    assert_eq!(parse_bgg_item_id(xml), Some("13".to_string()));
}

#[test]
fn bgg_item_id_missing_or_malformed() {
    assert_eq!(parse_bgg_item_id("<items total=\"0\"></items>"), None);
    assert_eq!(parse_bgg_item_id("plain text, not xml"), None);
    assert_eq!(parse_bgg_item_id(""), None);
}

#[test]
fn timedtext_captions_are_concatenated() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
        <transcript>
            <text start="0.0" dur="2.5">Welcome to the tutorial.</text>
            <text start="2.5" dur="3.0">Each player takes five cards &amp; one token.</text>
        </transcript>"#;

    let captions = parse_timedtext(xml).expect("captions parse");
    assert!(captions.starts_with("Welcome to the tutorial."));
    assert!(captions.contains("five cards & one token"));
}

#[test]
fn timedtext_without_text_is_none() {
    assert_eq!(parse_timedtext("<transcript></transcript>"), None);
}

#[test]
fn filenames_are_sanitized_with_fallback() {
    assert_eq!(
        filename_from_url("http://x.example/docs/catan%20rules.pdf", "doc"),
        "catan_20rules.pdf"
    );
    assert_eq!(filename_from_url("http://x.example/", "page"), "page");
    assert_eq!(filename_from_url("not a url", "doc"), "doc");
}

#[test]
fn extension_is_appended_once() {
    assert_eq!(with_extension("rules", "pdf"), "rules.pdf");
    assert_eq!(with_extension("rules.pdf", "pdf"), "rules.pdf");
    assert_eq!(with_extension("rules.PDF", "pdf"), "rules.PDF");
}

#[test]
fn url_validation() {
    assert!(validate_url("https://example.com/page").is_ok());
    assert!(validate_url("ftp://example.com/file").is_err());
    assert!(validate_url("not-a-url").is_err());
}
