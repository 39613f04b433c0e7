// Query module
// Answers semantic queries: embed the text, search the index, return ranked
// results with raw second offsets. Formatting belongs to the CLI layer.


use std::sync::Arc;
use tracing::debug;

use crate::embeddings::EmbeddingClient;
use crate::index::{SearchResult, VectorIndex};
use crate::{ClipseekError, Result};

/// Default number of results per query
pub const DEFAULT_QUERY_LIMIT: usize = 3;

pub struct QueryService {
    embedder: EmbeddingClient,
    index: Arc<dyn VectorIndex>,
    collection: String,
}

impl QueryService {
    #[inline]
    pub fn new(embedder: EmbeddingClient, index: Arc<dyn VectorIndex>, collection: String) -> Self {
        Self {
            embedder,
            index,
            collection,
        }
    }

    /// Find the `limit` segments most similar to `text`.
    ///
    /// Results come back exactly as the index ranked them, in non-increasing
    /// similarity order with raw second offsets. Empty query text fails
    /// before any network call is made.
    #[inline]
    pub async fn query(&self, text: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if text.trim().is_empty() {
            return Err(ClipseekError::InvalidInput(
                "query text cannot be empty".to_string(),
            ));
        }
        if limit == 0 {
            return Err(ClipseekError::InvalidInput(
                "result limit must be at least 1".to_string(),
            ));
        }

        let embedder = self.embedder.clone();
        let owned = text.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&owned))
            .await
            .map_err(|e| ClipseekError::Other(anyhow::anyhow!("embedding task failed: {e}")))??;

        debug!(
            "Searching collection '{}' with a {}-dimensional query vector",
            self.collection,
            vector.len()
        );

        let results = self.index.search(&self.collection, &vector, limit).await?;
        Ok(results)
    }
}
