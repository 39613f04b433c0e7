// Ingestion pipeline module
// Orchestrates fetch -> segment -> embed -> upsert per source, with bounded
// concurrency across sources and failure isolation between them


use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::index::{EmbeddedPoint, VectorIndex};
use crate::provider::{DescriptionFetcher, ProviderError, SourceRef, TranscriptProvider};
use crate::transcript::{Segment, read_segments, segment_transcript, write_segments};
use crate::{ClipseekError, Result};

/// Observer for per-source progress. The pipeline calls it once when a source
/// starts and once when it reaches a terminal state.
pub trait ProgressSink: Send + Sync {
    fn source_started(&self, source: &SourceRef);
    fn source_finished(&self, outcome: &SourceOutcome);
}

/// Sink that discards all progress events.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    #[inline]
    fn source_started(&self, _source: &SourceRef) {}

    #[inline]
    fn source_finished(&self, _outcome: &SourceOutcome) {}
}

/// Terminal state of one source within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    /// All of the source's segments are durably visible in the index
    Ingested { segments: usize },
    /// Nothing to do for this source; `reason` says why
    Skipped { reason: String },
    /// The source failed partway; none of its points may have landed, but the
    /// rest of the batch is unaffected
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source: SourceRef,
    pub status: SourceStatus,
    /// Best-effort long-form description; `None` when fetching is disabled
    /// or failed
    pub description: Option<String>,
}

/// Summary of one ingestion batch. Every requested source appears exactly
/// once in `outcomes`, in request order.
#[derive(Debug)]
pub struct IngestionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<SourceOutcome>,
}

impl IngestionReport {
    #[inline]
    pub fn ingested(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SourceStatus::Ingested { .. }))
            .count()
    }

    #[inline]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SourceStatus::Skipped { .. }))
            .count()
    }

    #[inline]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SourceStatus::Failed { .. }))
            .count()
    }

    #[inline]
    pub fn total_segments(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| match o.status {
                SourceStatus::Ingested { segments } => Some(segments),
                _ => None,
            })
            .sum()
    }
}

/// Outcome of re-upserting one persisted segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReingestOutcome {
    pub file: PathBuf,
    pub status: SourceStatus,
}

pub struct IngestionPipeline {
    provider: Arc<dyn TranscriptProvider>,
    fetcher: Option<Arc<dyn DescriptionFetcher>>,
    index: Arc<dyn VectorIndex>,
    embedder: EmbeddingClient,
    progress: Arc<dyn ProgressSink>,
    config: Config,
    cancel: Arc<AtomicBool>,
}

struct Prepared {
    points: Vec<EmbeddedPoint>,
    description: Option<String>,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(
        provider: Arc<dyn TranscriptProvider>,
        index: Arc<dyn VectorIndex>,
        embedder: EmbeddingClient,
        config: Config,
    ) -> Self {
        Self {
            provider,
            fetcher: None,
            index,
            embedder,
            progress: Arc::new(NullProgress),
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn with_description_fetcher(mut self, fetcher: Arc<dyn DescriptionFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[inline]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Handle for requesting cancellation. Setting it stops new sources from
    /// starting; sources already in flight finish and report normally.
    #[inline]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Search the provider for `query` and ingest up to `count` sources.
    #[inline]
    pub async fn ingest_query(&self, query: &str, count: usize) -> Result<IngestionReport> {
        if query.trim().is_empty() {
            return Err(ClipseekError::InvalidInput(
                "search query cannot be empty".to_string(),
            ));
        }
        if count == 0 {
            return Err(ClipseekError::InvalidInput(
                "source count must be at least 1".to_string(),
            ));
        }

        let sources = self.collect_sources(query, count).await?;
        info!(
            "Ingesting {} source(s) for query '{}'",
            sources.len(),
            query
        );

        self.ingest_sources(sources).await
    }

    /// Ingest a known set of sources. Each source reaches exactly one
    /// terminal state; a failing source never aborts the others.
    #[inline]
    pub async fn ingest_sources(&self, sources: Vec<SourceRef>) -> Result<IngestionReport> {
        self.ensure_collection().await?;

        let started_at = Utc::now();
        let run_dir = self.config.ingest.persist_transcripts.then(|| {
            self.config
                .transcripts_dir()
                .join(started_at.format("%Y%m%d-%H%M%S").to_string())
        });

        let outcomes = stream::iter(
            sources
                .into_iter()
                .map(|source| self.process_source(source, run_dir.as_deref())),
        )
        .buffered(self.config.ingest.concurrency)
        .collect::<Vec<_>>()
        .await;

        Ok(IngestionReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        })
    }

    /// Re-upsert previously persisted segment files without refetching or
    /// resegmenting their transcripts.
    #[inline]
    pub async fn reingest_persisted(&self) -> Result<Vec<ReingestOutcome>> {
        self.ensure_collection().await?;

        let files = collect_segment_files(&self.config.transcripts_dir())?;
        info!("Re-ingesting {} persisted segment file(s)", files.len());

        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            if self.cancel.load(Ordering::SeqCst) {
                outcomes.push(ReingestOutcome {
                    file,
                    status: SourceStatus::Skipped {
                        reason: "ingestion cancelled".to_string(),
                    },
                });
                continue;
            }
            let status = self.reingest_file(&file).await;
            outcomes.push(ReingestOutcome { file, status });
        }

        Ok(outcomes)
    }

    async fn ensure_collection(&self) -> Result<()> {
        self.index
            .ensure_collection(
                &self.config.index.collection,
                self.config.embedding.dimension,
                self.config.index.metric,
            )
            .await?;
        Ok(())
    }

    /// Page through provider listings until `count` distinct sources are
    /// collected, the provider runs out of pages, or a page makes no
    /// progress.
    async fn collect_sources(&self, query: &str, count: usize) -> Result<Vec<SourceRef>> {
        let mut sources: Vec<SourceRef> = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            let provider = Arc::clone(&self.provider);
            let query = query.to_string();
            let token = continuation.clone();
            let page = tokio::task::spawn_blocking(move || {
                provider.list_sources(&query, token.as_deref())
            })
            .await
            .map_err(|e| ClipseekError::Other(anyhow::anyhow!("listing task failed: {e}")))??;

            let before = sources.len();
            for source in page.sources {
                if sources.len() >= count {
                    break;
                }
                if sources.iter().any(|known| known.id == source.id) {
                    continue;
                }
                sources.push(source);
            }

            let made_progress = sources.len() > before;
            continuation = page.continuation;

            if sources.len() >= count || continuation.is_none() || !made_progress {
                break;
            }
        }

        Ok(sources)
    }

    async fn process_source(&self, source: SourceRef, run_dir: Option<&Path>) -> SourceOutcome {
        if self.cancel.load(Ordering::SeqCst) {
            // Sinks rely on started/finished pairs even for sources that are
            // cancelled before doing any work
            self.progress.source_started(&source);
            let outcome = SourceOutcome {
                source,
                status: SourceStatus::Skipped {
                    reason: "ingestion cancelled".to_string(),
                },
                description: None,
            };
            self.progress.source_finished(&outcome);
            return outcome;
        }

        self.progress.source_started(&source);

        let provider = Arc::clone(&self.provider);
        let fetcher = self.fetcher.clone();
        let embedder = self.embedder.clone();
        let interval = self.config.ingest.interval;
        let dedup = self.config.ingest.dedup;
        let persist_path = run_dir.map(|dir| dir.join(format!("transcript_{}.json", source.id)));
        let blocking_source = source.clone();

        let prepared = tokio::task::spawn_blocking(move || {
            prepare_source(
                provider.as_ref(),
                fetcher.as_deref(),
                &embedder,
                &blocking_source,
                interval,
                dedup,
                persist_path,
            )
        })
        .await;

        let (status, description) = match prepared {
            Err(join_error) => (
                SourceStatus::Failed {
                    error: format!("ingest worker failed: {join_error}"),
                },
                None,
            ),
            Ok(Err(status)) => (status, None),
            Ok(Ok(Prepared {
                points,
                description,
            })) => {
                let status = if points.is_empty() {
                    SourceStatus::Skipped {
                        reason: "no embeddable segments".to_string(),
                    }
                } else {
                    self.upsert_points(points).await
                };
                (status, description)
            }
        };

        let outcome = SourceOutcome {
            source,
            status,
            description,
        };
        self.progress.source_finished(&outcome);
        outcome
    }

    async fn reingest_file(&self, path: &Path) -> SourceStatus {
        let embedder = self.embedder.clone();
        let dedup = self.config.ingest.dedup;
        let owned = path.to_path_buf();

        let prepared = tokio::task::spawn_blocking(move || {
            let segments = match read_segments(&owned) {
                Ok(segments) => segments,
                Err(e) => {
                    return Err(SourceStatus::Failed {
                        error: e.to_string(),
                    });
                }
            };
            if segments.is_empty() {
                return Err(SourceStatus::Skipped {
                    reason: "segment file is empty".to_string(),
                });
            }
            embed_segments(&embedder, segments, dedup)
        })
        .await;

        match prepared {
            Err(join_error) => SourceStatus::Failed {
                error: format!("ingest worker failed: {join_error}"),
            },
            Ok(Err(status)) => status,
            Ok(Ok(points)) => self.upsert_points(points).await,
        }
    }

    async fn upsert_points(&self, points: Vec<EmbeddedPoint>) -> SourceStatus {
        let count = points.len();
        match self
            .index
            .upsert(&self.config.index.collection, points)
            .await
        {
            Ok(()) => SourceStatus::Ingested { segments: count },
            Err(e) => SourceStatus::Failed {
                error: format!("upsert failed: {e}"),
            },
        }
    }
}

/// Blocking half of one source's ingestion: fetch the transcript, segment it,
/// optionally persist and describe it, and embed every segment. Runs on the
/// blocking pool; returns the terminal status on any non-recoverable step.
fn prepare_source(
    provider: &dyn TranscriptProvider,
    fetcher: Option<&dyn DescriptionFetcher>,
    embedder: &EmbeddingClient,
    source: &SourceRef,
    interval: f64,
    dedup: bool,
    persist_path: Option<PathBuf>,
) -> std::result::Result<Prepared, SourceStatus> {
    let entries = match provider.fetch_transcript(source) {
        Ok(entries) => entries,
        Err(ProviderError::TranscriptUnavailable(_)) => {
            return Err(SourceStatus::Skipped {
                reason: "transcripts unavailable".to_string(),
            });
        }
        Err(e) => {
            return Err(SourceStatus::Failed {
                error: e.to_string(),
            });
        }
    };

    if entries.is_empty() {
        return Err(SourceStatus::Skipped {
            reason: "empty transcript".to_string(),
        });
    }

    let segments = segment_transcript(&entries, &source.url, &source.title, interval).map_err(
        |e| SourceStatus::Failed {
            error: e.to_string(),
        },
    )?;

    if let Some(path) = persist_path {
        // Persistence exists to enable reingestion later; losing it does not
        // fail the source
        if let Err(e) = write_segments(&path, &segments) {
            warn!("Failed to persist segments for {}: {e}", source.id);
        }
    }

    let description = fetcher.and_then(|f| match f.fetch_description(&source.url) {
        Ok(description) => Some(description),
        Err(e) => {
            debug!("No description for {}: {e}", source.id);
            None
        }
    });

    let points = embed_segments(embedder, segments, dedup)?;
    Ok(Prepared {
        points,
        description,
    })
}

/// Embed segments in order, one call per segment. A single embedding failure
/// fails the whole source so no partial batch reaches the index.
fn embed_segments(
    embedder: &EmbeddingClient,
    segments: Vec<Segment>,
    dedup: bool,
) -> std::result::Result<Vec<EmbeddedPoint>, SourceStatus> {
    let mut points = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.content.trim().is_empty() {
            debug!("Skipping empty window at {}s", segment.start);
            continue;
        }
        let vector = embedder
            .embed(&segment.content)
            .map_err(|e| SourceStatus::Failed {
                error: format!("embedding failed: {e}"),
            })?;
        points.push(EmbeddedPoint {
            id: point_id(dedup, &segment.url),
            vector,
            payload: segment.into(),
        });
    }
    Ok(points)
}

/// Point id for one segment. With dedup on, the id is derived from the
/// window's deep link (source URL plus floored window bounds), so re-ingesting
/// a source overwrites its windows in place. With dedup off, every run mints
/// fresh ids and re-ingestion duplicates points.
fn point_id(dedup: bool, window_url: &str) -> Uuid {
    if dedup {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, window_url.as_bytes())
    } else {
        Uuid::new_v4()
    }
}

/// Persisted segment files: `transcripts/<run>/*.json`, plus any loose
/// `*.json` dropped at the top level.
fn collect_segment_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            for inner in fs::read_dir(&path)? {
                let inner_path = inner?.path();
                if inner_path.extension().is_some_and(|ext| ext == "json") {
                    files.push(inner_path);
                }
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
