// LanceDB-backed vector index
// Collections map to LanceDB tables; upserts use merge-insert keyed on the
// point id so re-writing a batch is idempotent


use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Float64Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DistanceMetric, EmbeddedPoint, IndexError, SearchResult, VectorIndex};

/// Vector index backed by an on-disk LanceDB database.
pub struct LanceIndex {
    connection: Connection,
    /// Metric to search with when a collection was created by an earlier
    /// process and never re-registered through `ensure_collection`
    default_metric: DistanceMetric,
    /// Metrics registered by `ensure_collection`, keyed by collection name
    metrics: Mutex<HashMap<String, DistanceMetric>>,
    /// Serializes check-then-create so racing creators cannot both observe
    /// a missing collection
    creation_lock: Mutex<()>,
}

impl LanceIndex {
    /// Connect to (or create) a LanceDB database at `data_dir`.
    #[inline]
    pub async fn open(data_dir: &Path, default_metric: DistanceMetric) -> Result<Self, IndexError> {
        if let Some(parent) = data_dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                IndexError::Backend(format!("Failed to create vector database directory: {e}"))
            })?;
        }

        let uri = format!("file://{}", data_dir.display());
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| IndexError::Connection(format!("Failed to connect to LanceDB: {e}")))?;

        info!("Vector index ready at {}", data_dir.display());

        Ok(Self {
            connection,
            default_metric,
            metrics: Mutex::new(HashMap::new()),
            creation_lock: Mutex::new(()),
        })
    }

    /// Schema of a collection table with the given vector dimensionality
    fn collection_schema(vector_size: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_size as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("start", DataType::Float64, false),
            Field::new("end", DataType::Float64, false),
            Field::new("url", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self, collection: &str) -> Result<lancedb::Table, IndexError> {
        self.connection
            .open_table(collection)
            .execute()
            .await
            .map_err(|e| classify_error(e, collection))
    }

    /// Read the vector dimensionality out of an existing table's schema
    async fn table_vector_size(&self, table: &lancedb::Table) -> Result<usize, IndexError> {
        let schema = table
            .schema()
            .await
            .map_err(|e| IndexError::Backend(format!("Failed to read table schema: {e}")))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(IndexError::Backend(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    async fn metric_for(&self, collection: &str) -> DistanceMetric {
        self.metrics
            .lock()
            .await
            .get(collection)
            .copied()
            .unwrap_or(self.default_metric)
    }

    fn build_record_batch(
        points: &[EmbeddedPoint],
        vector_size: usize,
    ) -> Result<RecordBatch, IndexError> {
        let len = points.len();
        let mut ids = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut starts = Vec::with_capacity(len);
        let mut ends = Vec::with_capacity(len);
        let mut urls = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_size);

        for point in points {
            ids.push(point.id.to_string());
            contents.push(point.payload.content.as_str());
            starts.push(point.payload.start);
            ends.push(point.payload.end);
            urls.push(point.payload.url.as_str());
            titles.push(point.payload.title.as_str());
            flat_values.extend_from_slice(&point.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(item_field, vector_size as i32, Arc::new(values_array), None)
                .map_err(|e| IndexError::Backend(format!("Failed to create vector array: {e}")))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(Float64Array::from(starts)),
            Arc::new(Float64Array::from(ends)),
            Arc::new(StringArray::from(urls)),
            Arc::new(StringArray::from(titles)),
        ];

        RecordBatch::try_new(Self::collection_schema(vector_size), arrays)
            .map_err(|e| IndexError::Backend(format!("Failed to create record batch: {e}")))
    }

    fn parse_search_batch(
        batch: &RecordBatch,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let ids = string_column(batch, "id")?;
        let contents = string_column(batch, "content")?;
        let starts = float64_column(batch, "start")?;
        let ends = float64_column(batch, "end")?;
        let urls = string_column(batch, "url")?;
        let titles = string_column(batch, "title")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let id = Uuid::parse_str(ids.value(row))
                .map_err(|e| IndexError::Backend(format!("Malformed point id in index: {e}")))?;

            let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            results.push(SearchResult {
                id,
                similarity_score: similarity_from_distance(distance, metric),
                start: starts.value(row),
                end: ends.value(row),
                content: contents.value(row).to_string(),
                url: urls.value(row).to_string(),
                title: titles.value(row).to_string(),
            });
        }

        Ok(results)
    }
}

#[async_trait::async_trait]
impl VectorIndex for LanceIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        vector_size: usize,
        metric: DistanceMetric,
    ) -> Result<(), IndexError> {
        let _guard = self.creation_lock.lock().await;

        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| IndexError::Connection(format!("Failed to list collections: {e}")))?;

        if table_names.contains(&name.to_string()) {
            debug!("Collection '{}' already exists", name);
        } else {
            match self
                .connection
                .create_empty_table(name, Self::collection_schema(vector_size))
                .execute()
                .await
            {
                Ok(_) => info!(
                    "Created collection '{}' with vector size {} and {} distance",
                    name, vector_size, metric
                ),
                // A racing creator on another connection won the check-then-create
                Err(lancedb::Error::TableAlreadyExists { .. }) => {
                    debug!("Collection '{}' created concurrently", name);
                }
                Err(e) => return Err(classify_error(e, name)),
            }
        }

        self.metrics.lock().await.insert(name.to_string(), metric);
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<EmbeddedPoint>,
    ) -> Result<(), IndexError> {
        if points.is_empty() {
            debug!("No points to upsert");
            return Ok(());
        }

        let table = self.open_table(collection).await?;
        let vector_size = self.table_vector_size(&table).await?;

        for point in &points {
            if point.vector.len() != vector_size {
                return Err(IndexError::DimensionMismatch {
                    expected: vector_size,
                    actual: point.vector.len(),
                });
            }
        }

        let record_batch = Self::build_record_batch(&points, vector_size)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        // merge-insert commits the whole batch in one transaction; a failure
        // here means no point of the batch became visible
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| classify_error(e, collection))?;

        info!(
            "Upserted {} points into collection '{}'",
            points.len(),
            collection
        );
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let table = self.open_table(collection).await?;
        let vector_size = self.table_vector_size(&table).await?;

        if query_vector.len() != vector_size {
            return Err(IndexError::DimensionMismatch {
                expected: vector_size,
                actual: query_vector.len(),
            });
        }

        let metric = self.metric_for(collection).await;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| classify_error(e, collection))?
            .column("vector")
            .distance_type(distance_type(metric))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| classify_error(e, collection))?;

        let mut search_results = Vec::new();
        let mut stream = results;
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| IndexError::Backend(format!("Failed to read result stream: {e}")))?
        {
            search_results.extend(Self::parse_search_batch(&batch, metric)?);
        }

        debug!(
            "Search in '{}' returned {} results",
            collection,
            search_results.len()
        );
        Ok(search_results)
    }

    async fn count_points(&self, collection: &str) -> Result<u64, IndexError> {
        let table = self.open_table(collection).await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| classify_error(e, collection))?;

        Ok(count as u64)
    }
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Dot => DistanceType::Dot,
        DistanceMetric::Euclidean => DistanceType::L2,
    }
}

/// LanceDB reports distances (lower is better); callers rank by similarity
/// (higher is better)
fn similarity_from_distance(distance: f32, metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Cosine => 1.0 - distance,
        // Dot distance is the negated dot product; L2 has no bounded inverse,
        // so negation preserves the ranking in both cases
        DistanceMetric::Dot | DistanceMetric::Euclidean => -distance,
    }
}

fn classify_error(error: lancedb::Error, collection: &str) -> IndexError {
    match error {
        lancedb::Error::TableNotFound { .. } => {
            IndexError::CollectionNotFound(collection.to_string())
        }
        other => {
            let message = other.to_string();
            let lowered = message.to_lowercase();
            if lowered.contains("connect") || lowered.contains("timed out") {
                warn!("Vector backend unreachable: {}", message);
                IndexError::Connection(message)
            } else {
                IndexError::Backend(message)
            }
        }
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, IndexError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| IndexError::Backend(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| IndexError::Backend(format!("Invalid {name} column type")))
}

fn float64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array, IndexError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| IndexError::Backend(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| IndexError::Backend(format!("Invalid {name} column type")))
}
