use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

use crate::config::{Config, get_config_dir};
use crate::embeddings::EmbeddingClient;
use crate::index::{LanceIndex, VectorIndex};
use crate::pipeline::{IngestionPipeline, ProgressSink, SourceOutcome, SourceStatus};
use crate::provider::{DescriptionFetcher, SourceRef, TranscriptProvider, YouTubeProvider};
use crate::query::QueryService;

/// Progress bar over the ingestion batch, one tick per finished source.
struct IngestProgress {
    bar: ProgressBar,
}

impl IngestProgress {
    fn new(total: usize) -> Result<Self> {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressSink for IngestProgress {
    fn source_started(&self, source: &SourceRef) {
        self.bar.set_message(source.title.clone());
    }

    fn source_finished(&self, outcome: &SourceOutcome) {
        match &outcome.status {
            SourceStatus::Ingested { segments } => {
                self.bar.println(format!(
                    "{} {} ({} segments)",
                    style("✓").green(),
                    outcome.source.title,
                    segments
                ));
            }
            SourceStatus::Skipped { reason } => {
                self.bar.println(format!(
                    "{} {} (skipped: {})",
                    style("-").yellow(),
                    outcome.source.title,
                    reason
                ));
            }
            SourceStatus::Failed { error } => {
                self.bar.println(format!(
                    "{} {} ({})",
                    style("✗").red(),
                    outcome.source.title,
                    error
                ));
            }
        }
        self.bar.inc(1);
    }
}

/// Search the provider for `query` and ingest up to `count` sources.
#[inline]
pub async fn ingest(query: String, count: usize, interval: Option<f64>) -> Result<()> {
    let config_dir = get_config_dir()?;
    let mut config = Config::load(&config_dir)?;
    if let Some(interval) = interval {
        config.ingest.interval = interval;
        config
            .validate()
            .context("Invalid segment interval override")?;
    }

    let provider = Arc::new(YouTubeProvider::new());
    let index: Arc<dyn VectorIndex> = Arc::new(
        LanceIndex::open(&config.vectors_dir(), config.index.metric)
            .await
            .context("Failed to open vector index")?,
    );
    let embedder =
        EmbeddingClient::new(&config.embedding).context("Failed to build embedding client")?;

    embedder
        .ping()
        .context("Embedding server is unreachable; run 'clipseek config' to update settings")?;

    println!(
        "Searching for up to {} source(s) matching {}",
        count,
        style(&query).bold()
    );

    // The count isn't known until listing finishes, so start the bar at the
    // requested maximum
    let progress = Arc::new(IngestProgress::new(count)?);
    let description_fetcher: Arc<dyn DescriptionFetcher> = Arc::clone(&provider) as _;
    let transcript_provider: Arc<dyn TranscriptProvider> = provider;
    let progress_sink: Arc<dyn ProgressSink> = Arc::clone(&progress) as _;
    let pipeline = IngestionPipeline::new(transcript_provider, index, embedder, config)
        .with_description_fetcher(description_fetcher)
        .with_progress(progress_sink);

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight sources");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let report = pipeline.ingest_query(&query, count).await?;
    progress.bar.finish_and_clear();

    println!();
    println!(
        "Ingested {} source(s), skipped {}, failed {} ({} segments total) in {}s",
        style(report.ingested()).green(),
        style(report.skipped()).yellow(),
        style(report.failed()).red(),
        report.total_segments(),
        (report.finished_at - report.started_at).num_seconds()
    );

    for outcome in &report.outcomes {
        if let SourceStatus::Failed { error } = &outcome.status {
            println!("  {} {}: {}", style("✗").red(), outcome.source.url, error);
        }
    }

    Ok(())
}

/// Find the segments most similar to `text` and print timestamped deep links.
#[inline]
pub async fn search(text: String, limit: usize) -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;

    let index: Arc<dyn VectorIndex> = Arc::new(
        LanceIndex::open(&config.vectors_dir(), config.index.metric)
            .await
            .context("Failed to open vector index")?,
    );
    let embedder =
        EmbeddingClient::new(&config.embedding).context("Failed to build embedding client")?;

    let service = QueryService::new(embedder, index, config.index.collection.clone());
    let results = service.query(&text, limit).await?;

    if results.is_empty() {
        println!("No matches. Ingest some sources first with 'clipseek ingest'.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{} {} {}",
            style(format!("{}.", rank + 1)).bold(),
            style(&result.title).cyan(),
            style(format!(
                "[{} - {}]",
                format_timestamp(result.start),
                format_timestamp(result.end)
            ))
            .dim()
        );
        println!("   score: {:.3}", result.similarity_score);
        println!("   {}", result.url);
        println!("   {}", snippet(&result.content, 160));
        println!();
    }

    Ok(())
}

/// Re-upsert previously persisted segment files without refetching.
#[inline]
pub async fn reingest() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;

    let index: Arc<dyn VectorIndex> = Arc::new(
        LanceIndex::open(&config.vectors_dir(), config.index.metric)
            .await
            .context("Failed to open vector index")?,
    );
    let embedder =
        EmbeddingClient::new(&config.embedding).context("Failed to build embedding client")?;
    embedder
        .ping()
        .context("Embedding server is unreachable; run 'clipseek config' to update settings")?;

    // The provider is never called during reingestion, but the pipeline owns
    // the orchestration either way
    let provider = Arc::new(YouTubeProvider::new());
    let pipeline = IngestionPipeline::new(provider, index, embedder, config);

    let outcomes = pipeline.reingest_persisted().await?;
    if outcomes.is_empty() {
        println!("No persisted segment files found.");
        return Ok(());
    }

    for outcome in &outcomes {
        let name = outcome.file.display();
        match &outcome.status {
            SourceStatus::Ingested { segments } => {
                println!("{} {} ({} segments)", style("✓").green(), name, segments);
            }
            SourceStatus::Skipped { reason } => {
                println!("{} {} (skipped: {})", style("-").yellow(), name, reason);
            }
            SourceStatus::Failed { error } => {
                println!("{} {} ({})", style("✗").red(), name, error);
            }
        }
    }

    Ok(())
}

/// Report configuration and backend connectivity.
#[inline]
pub async fn show_status() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;

    println!("{}", style("Clipseek Status").bold());
    println!();

    println!("Embedding server:");
    match EmbeddingClient::new(&config.embedding) {
        Ok(client) => match client.ping() {
            Ok(()) => {
                println!(
                    "  {} {}://{}:{}",
                    style("✓ reachable").green(),
                    config.embedding.protocol,
                    config.embedding.host,
                    config.embedding.port
                );
                match client.validate_model() {
                    Ok(()) => println!("  {} model {}", style("✓").green(), client.model()),
                    Err(e) => println!("  {} {}", style("⚠").yellow(), e),
                }
            }
            Err(e) => println!("  {} {}", style("✗").red(), e),
        },
        Err(e) => println!("  {} {}", style("✗").red(), e),
    }

    println!();
    println!("Vector index:");
    match LanceIndex::open(&config.vectors_dir(), config.index.metric).await {
        Ok(index) => {
            println!(
                "  {} {}",
                style("✓ connected").green(),
                config.vectors_dir().display()
            );
            match index.count_points(&config.index.collection).await {
                Ok(count) => {
                    println!(
                        "  collection '{}': {} point(s)",
                        config.index.collection, count
                    );
                }
                Err(e) => {
                    println!("  collection '{}': {}", config.index.collection, e);
                }
            }
        }
        Err(e) => println!("  {} {}", style("✗").red(), e),
    }

    info!("Status check complete");
    Ok(())
}

/// Render raw seconds as `MM:SS`, or `HH:MM:SS` past an hour.
fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// First `max_chars` characters of the content, on a character boundary.
fn snippet(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_format_as_minutes_until_an_hour() {
        assert_eq!(format_timestamp(0.0), "0:00");
        assert_eq!(format_timestamp(45.0), "0:45");
        assert_eq!(format_timestamp(90.7), "1:30");
        assert_eq!(format_timestamp(3599.0), "59:59");
        assert_eq!(format_timestamp(3600.0), "1:00:00");
        assert_eq!(format_timestamp(7325.0), "2:02:05");
    }

    #[test]
    fn negative_offsets_clamp_to_zero() {
        assert_eq!(format_timestamp(-5.0), "0:00");
    }

    #[test]
    fn snippets_truncate_on_character_boundaries() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("abcdefghij", 5), "abcde…");
        assert_eq!(snippet("ééééé", 3), "ééé…");
    }
}
