// In-memory vector index
// Exact scan over every stored point; useful for tests and ephemeral runs
// where no on-disk backend is wanted

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    DistanceMetric, EmbeddedPoint, IndexError, PointPayload, SearchResult, VectorIndex,
};

struct Collection {
    vector_size: usize,
    metric: DistanceMetric,
    points: HashMap<Uuid, (Vec<f32>, PointPayload)>,
}

/// Vector index holding all points in process memory.
#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        vector_size: usize,
        metric: DistanceMetric,
    ) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;

        if collections.contains_key(name) {
            debug!("Collection '{}' already exists", name);
            return Ok(());
        }

        collections.insert(
            name.to_string(),
            Collection {
                vector_size,
                metric,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<EmbeddedPoint>,
    ) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        // Validate the whole batch before writing anything so a bad point
        // never leaves a partial batch behind
        for point in &points {
            if point.vector.len() != entry.vector_size {
                return Err(IndexError::DimensionMismatch {
                    expected: entry.vector_size,
                    actual: point.vector.len(),
                });
            }
        }

        for point in points {
            entry.points.insert(point.id, (point.vector, point.payload));
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        if query_vector.len() != entry.vector_size {
            return Err(IndexError::DimensionMismatch {
                expected: entry.vector_size,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<SearchResult> = entry
            .points
            .iter()
            .map(|(id, (vector, payload))| SearchResult {
                id: *id,
                similarity_score: similarity(query_vector, vector, entry.metric),
                start: payload.start,
                end: payload.end,
                content: payload.content.clone(),
                url: payload.url.clone(),
                title: payload.title.clone(),
            })
            .collect();

        // Ties broken by id so identical inputs against identical state
        // always rank identically
        scored.sort_by(|a, b| {
            b.similarity_score
                .total_cmp(&a.similarity_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn count_points(&self, collection: &str) -> Result<u64, IndexError> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        Ok(entry.points.len() as u64)
    }
}

fn similarity(query: &[f32], point: &[f32], metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Cosine => {
            let norm_q = dot(query, query).sqrt();
            let norm_p = dot(point, point).sqrt();
            if norm_q == 0.0 || norm_p == 0.0 {
                0.0
            } else {
                dot(query, point) / (norm_q * norm_p)
            }
        }
        DistanceMetric::Dot => dot(query, point),
        DistanceMetric::Euclidean => {
            let squared: f32 = query
                .iter()
                .zip(point.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            -squared.sqrt()
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
