// Transcript provider module
// External boundary for listing sources and fetching their time-coded
// captions; failures here are isolated per source by the pipeline

pub mod youtube;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transcript::TranscriptEntry;

pub use youtube::YouTubeProvider;

/// A reference to one external time-coded media item (e.g. one video)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub url: String,
    pub title: String,
    /// Human-readable duration as advertised by the provider, when known
    pub duration: Option<String>,
}

/// One page of source listings; `continuation` requests the next page
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub sources: Vec<SourceRef>,
    pub continuation: Option<String>,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Captions are disabled or missing for this source. Never aborts a
    /// batch; the pipeline records the source as skipped.
    #[error("Transcripts are unavailable for source {0}")]
    TranscriptUnavailable(String),

    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Source of time-coded transcripts.
pub trait TranscriptProvider: Send + Sync {
    /// List sources matching `query`. Pass a `continuation` token from the
    /// previous page to fetch the next one.
    fn list_sources(
        &self,
        query: &str,
        continuation: Option<&str>,
    ) -> Result<SourcePage, ProviderError>;

    /// Fetch the full transcript of one source, ordered by start time.
    fn fetch_transcript(&self, source: &SourceRef) -> Result<Vec<TranscriptEntry>, ProviderError>;
}

/// Optional enrichment: a longer description of a source. Best effort,
/// callers ignore failures.
pub trait DescriptionFetcher: Send + Sync {
    fn fetch_description(&self, source_url: &str) -> Result<String, ProviderError>;
}
