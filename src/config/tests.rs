use super::*;
use tempfile::TempDir;

#[test]
fn defaults_are_valid() {
    let config = Config {
        openai: OpenAiConfig::default(),
        crawler: CrawlerConfig::default(),
        chunking: ChunkingConfig::default(),
        server: ServerConfig::default(),
        base_dir: PathBuf::from("/tmp/meeplebot-test"),
    };

    assert!(config.validate().is_ok());
    assert_eq!(config.chunking.window_words, 1000);
    assert_eq!(config.chunking.overlap_words, 200);
    assert_eq!(config.openai.embedding_batch_size, 1000);
}

#[test]
fn load_missing_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = Config::load(temp_dir.path()).expect("can load config");

    assert_eq!(config.openai, OpenAiConfig::default());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    let mut config = Config::load(temp_dir.path()).expect("can load config");
    config
        .openai
        .set_chat_model("gpt-4o-mini".to_string())
        .expect("valid model");
    config.save().expect("can save config");

    let reloaded = Config::load(temp_dir.path()).expect("can reload config");
    assert_eq!(reloaded.openai.chat_model, "gpt-4o-mini");
}

#[test]
fn rejects_overlap_not_smaller_than_window() {
    let mut config = Config::load(TempDir::new().expect("temp dir").path()).expect("config");
    config.chunking.window_words = 100;
    config.chunking.overlap_words = 100;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));
}

#[test]
fn rejects_bad_api_base() {
    let mut openai = OpenAiConfig::default();
    assert!(openai.set_api_base("not a url".to_string()).is_err());
    assert!(
        openai
            .set_api_base("http://localhost:9999/v1".to_string())
            .is_ok()
    );
}

#[test]
fn rejects_empty_models_and_bad_batch_size() {
    let mut openai = OpenAiConfig::default();
    assert!(openai.set_chat_model("  ".to_string()).is_err());
    assert!(openai.set_embedding_batch_size(0).is_err());
    assert!(openai.set_embedding_batch_size(1001).is_err());
    assert!(openai.set_embedding_batch_size(256).is_ok());
}

#[test]
fn file_url_conventions() {
    let config = Config {
        openai: OpenAiConfig::default(),
        crawler: CrawlerConfig::default(),
        chunking: ChunkingConfig::default(),
        server: ServerConfig {
            api_base_url: "http://files.example.com/".to_string(),
        },
        base_dir: PathBuf::new(),
    };

    assert_eq!(
        config.topic_files_url(7),
        "http://files.example.com/topics/7/files"
    );
    assert_eq!(
        config.stored_file_url(7, "rules.pdf"),
        "http://files.example.com/topics/7/rules.pdf"
    );
}

#[test]
fn per_topic_paths_are_disjoint_by_id() {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = Config::load(temp_dir.path()).expect("config");

    assert_ne!(config.topic_store_dir(1), config.topic_store_dir(2));
    assert_ne!(config.topic_store_dir(1), config.topic_index_dir(1));
}
