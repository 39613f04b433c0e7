use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, EmbeddingConfig, get_config_dir};
use crate::embeddings::EmbeddingClient;
use crate::index::DistanceMetric;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("Clipseek Configuration Setup").bold().cyan());
    eprintln!();

    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    let mut config = Config::load(&config_dir)?;

    eprintln!("{}", style("Embedding Backend").bold().yellow());
    eprintln!("Configure the Ollama-compatible server used to embed transcript segments.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Vector Collection").bold().yellow());
    configure_index(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_embedding_connection(&config.embedding) {
        eprintln!("{}", style("✓ Embedding server reachable").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the embedding server").yellow()
        );
        eprintln!("You can continue, but make sure it is running before ingesting.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("Configuration saved.").green());
    } else {
        eprintln!("Configuration discarded.");
    }

    Ok(())
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    embedding.host = Input::new()
        .with_prompt("Embedding server host")
        .default(embedding.host.clone())
        .interact_text()?;

    embedding.port = Input::new()
        .with_prompt("Embedding server port")
        .default(embedding.port)
        .interact_text()?;

    embedding.model = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .interact_text()?;

    embedding.dimension = Input::new()
        .with_prompt("Embedding dimension (must match the model's output)")
        .default(embedding.dimension)
        .interact_text()?;

    Ok(())
}

fn configure_index(config: &mut Config) -> Result<()> {
    config.index.collection = Input::new()
        .with_prompt("Collection name")
        .default(config.index.collection.clone())
        .interact_text()?;

    let metrics = [
        DistanceMetric::Cosine,
        DistanceMetric::Dot,
        DistanceMetric::Euclidean,
    ];
    let selected = Select::new()
        .with_prompt("Distance metric")
        .items(&["cosine", "dot", "euclidean"])
        .default(
            metrics
                .iter()
                .position(|m| *m == config.index.metric)
                .unwrap_or(0),
        )
        .interact()?;
    config.index.metric = metrics[selected];

    Ok(())
}

fn test_embedding_connection(embedding: &EmbeddingConfig) -> bool {
    EmbeddingClient::new(embedding)
        .and_then(|client| client.ping())
        .is_ok()
}

#[inline]
pub fn show_config() -> Result<()> {
    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    let config = Config::load(&config_dir)?;

    println!("{}", style("Clipseek Configuration").bold());
    println!("Config directory: {}", config_dir.display());
    println!();
    println!("[embedding]");
    println!(
        "  server:    {}://{}:{}",
        config.embedding.protocol, config.embedding.host, config.embedding.port
    );
    println!("  model:     {}", config.embedding.model);
    println!("  dimension: {}", config.embedding.dimension);
    println!();
    println!("[index]");
    println!("  collection: {}", config.index.collection);
    println!("  metric:     {}", config.index.metric);
    println!("  data dir:   {}", config.vectors_dir().display());
    println!();
    println!("[ingest]");
    println!("  interval:            {}s", config.ingest.interval);
    println!("  concurrency:         {}", config.ingest.concurrency);
    println!("  dedup:               {}", config.ingest.dedup);
    println!("  persist transcripts: {}", config.ingest.persist_transcripts);

    Ok(())
}
