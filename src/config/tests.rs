use super::*;
use tempfile::TempDir;

#[test]
fn defaults_when_no_config_file_exists() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.embedding.host, "localhost");
    assert_eq!(config.embedding.port, 11434);
    assert_eq!(config.embedding.dimension, DEFAULT_EMBEDDING_DIMENSION);
    assert_eq!(config.index.collection, "transcripts");
    assert_eq!(config.index.metric, DistanceMetric::Cosine);
    assert_eq!(config.ingest.interval, DEFAULT_SEGMENT_INTERVAL);
    assert_eq!(config.ingest.concurrency, 2);
    assert!(config.ingest.dedup);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_reload_round_trips() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.embedding.model = "custom-model".to_string();
    config.embedding.dimension = 1536;
    config.index.metric = DistanceMetric::Dot;
    config.ingest.interval = 60.0;

    config.save().expect("should save");
    let reloaded = Config::load(temp_dir.path()).expect("should reload");

    assert_eq!(reloaded, config);
}

#[test]
fn partial_config_file_fills_in_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[embedding]\nmodel = \"mxbai-embed-large\"\ndimension = 1024\n",
    )
    .expect("should write config");

    let config = Config::load(temp_dir.path()).expect("should load");

    assert_eq!(config.embedding.model, "mxbai-embed-large");
    assert_eq!(config.embedding.dimension, 1024);
    assert_eq!(config.embedding.host, "localhost");
    assert_eq!(config.index.collection, "transcripts");
}

#[test]
fn metric_parses_from_lowercase_names() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[index]\ncollection = \"clips\"\nmetric = \"euclidean\"\n",
    )
    .expect("should write config");

    let config = Config::load(temp_dir.path()).expect("should load");

    assert_eq!(config.index.collection, "clips");
    assert_eq!(config.index.metric, DistanceMetric::Euclidean);
}

#[test]
fn validation_rejects_bad_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let base = Config::load(temp_dir.path()).expect("should load defaults");

    let mut config = base.clone();
    config.embedding.port = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidPort(0))));

    let mut config = base.clone();
    config.embedding.model = "  ".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidModel(_))));

    let mut config = base.clone();
    config.embedding.dimension = 7;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(7))
    ));

    let mut config = base.clone();
    config.index.collection = String::new();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidCollection(_))
    ));

    let mut config = base.clone();
    config.ingest.interval = -1.0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidInterval(_))
    ));

    let mut config = base.clone();
    config.ingest.concurrency = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidConcurrency(0))
    ));

    let mut config = base;
    config.embedding.protocol = "ftp".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn data_directories_hang_off_the_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.vectors_dir(), temp_dir.path().join("vectors"));
    assert_eq!(config.transcripts_dir(), temp_dir.path().join("transcripts"));
}
