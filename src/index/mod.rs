// Vector index module
// Defines the contract a vector backend must satisfy: idempotent collection
// creation, upsert-by-id, and k-nearest-neighbor search

pub mod lance;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::transcript::Segment;

pub use lance::LanceIndex;
pub use memory::MemoryIndex;

/// Distance metric configured per collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclidean,
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Dot => write!(f, "dot"),
            Self::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Payload stored alongside each vector, resolving a point back to a
/// time-coded location in its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    /// The segment text that was embedded
    pub content: String,
    /// Window start in raw seconds
    pub start: f64,
    /// Window end in raw seconds
    pub end: f64,
    /// Deep link to the window of the source
    pub url: String,
    /// Title of the source
    pub title: String,
}

impl From<Segment> for PointPayload {
    #[inline]
    fn from(segment: Segment) -> Self {
        Self {
            content: segment.content,
            start: segment.start,
            end: segment.end,
            url: segment.url,
            title: segment.title,
        }
    }
}

/// A vector paired with its payload, owned by the index once upserted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// One ranked result of a nearest-neighbor search. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: Uuid,
    pub similarity_score: f32,
    pub start: f64,
    pub end: f64,
    pub content: String,
    pub url: String,
    pub title: String,
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector backend unreachable: {0}")]
    Connection(String),

    #[error("Vector backend error: {0}")]
    Backend(String),
}

impl IndexError {
    /// `Connection` failures are transient and may be retried by the caller;
    /// the other variants are configuration bugs and are not.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Contract for a pluggable vector backend.
///
/// Implementations must make `ensure_collection` idempotent (concurrent
/// creators are serialized or "already exists" is treated as success),
/// `upsert` insert-or-overwrite by point id, and `search` return results in
/// non-increasing similarity order, stable for identical inputs against
/// identical collection state.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist; no-op otherwise.
    async fn ensure_collection(
        &self,
        name: &str,
        vector_size: usize,
        metric: DistanceMetric,
    ) -> Result<(), IndexError>;

    /// Write-or-overwrite the given points by id.
    ///
    /// Batches are all-or-nothing: on `Ok` every point is durably visible to
    /// subsequent searches; on `Err` none of the batch became visible.
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<EmbeddedPoint>,
    ) -> Result<(), IndexError>;

    /// Approximate nearest-neighbor search under the collection's configured
    /// metric. Never returns more than `limit` results.
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, IndexError>;

    /// Total number of points stored in the collection.
    async fn count_points(&self, collection: &str) -> Result<u64, IndexError>;
}
