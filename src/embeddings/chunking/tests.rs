use super::*;

#[test]
fn windows_advance_by_stride_and_cover_all_words() {
    let chunks = chunk_words("a b c d e f", 4, 2).expect("valid configuration");

    assert_eq!(chunks, vec!["a b c d", "c d e f"]);

    // No window longer than the configured size.
    for chunk in &chunks {
        assert!(chunk.split_whitespace().count() <= 4);
    }

    // Every input word appears in some window.
    for word in ["a", "b", "c", "d", "e", "f"] {
        assert!(chunks.iter().any(|c| c.split_whitespace().any(|w| w == word)));
    }
}

#[test]
fn short_input_yields_single_window() {
    let chunks = chunk_words("one two three", 1000, 200).expect("valid configuration");
    assert_eq!(chunks, vec!["one two three"]);
}

#[test]
fn empty_input_yields_zero_chunks() {
    assert!(chunk_words("", 1000, 200).expect("valid configuration").is_empty());
    assert!(
        chunk_words("   \n\t  ", 1000, 200)
            .expect("valid configuration")
            .is_empty()
    );
}

#[test]
fn rejects_zero_progress_configurations() {
    assert!(chunk_words("a b c", 4, 4).is_err());
    assert!(chunk_words("a b c", 4, 5).is_err());
    assert!(chunk_words("a b c", 0, 0).is_err());
}

#[test]
fn trailing_partial_window_is_emitted_once() {
    // 7 words, window 3, overlap 1 -> stride 2
    let chunks = chunk_words("w1 w2 w3 w4 w5 w6 w7", 3, 1).expect("valid configuration");
    assert_eq!(chunks, vec!["w1 w2 w3", "w3 w4 w5", "w5 w6 w7"]);
}

#[test]
fn restartable_pure_function() {
    let text = "alpha beta gamma delta epsilon";
    let first = chunk_words(text, 2, 1).expect("valid configuration");
    let second = chunk_words(text, 2, 1).expect("valid configuration");
    assert_eq!(first, second);
}

#[test]
fn config_default_matches_ingestion_policy() {
    let config = ChunkingConfig::default();
    assert_eq!(config.window_words, 1000);
    assert_eq!(config.overlap_words, 200);

    let chunks = chunk_with_config("hello world", &config).expect("valid configuration");
    assert_eq!(chunks.len(), 1);
}
