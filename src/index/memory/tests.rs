use super::*;
use crate::index::{DistanceMetric, EmbeddedPoint, IndexError, PointPayload, VectorIndex};
use uuid::Uuid;

const COLLECTION: &str = "transcripts";

fn point(id: Uuid, vector: Vec<f32>, title: &str) -> EmbeddedPoint {
    EmbeddedPoint {
        id,
        vector,
        payload: PointPayload {
            content: format!("content of {title}"),
            start: 10.0,
            end: 55.0,
            url: "https://www.youtube.com/watch?v=x&start=10&end=55".to_string(),
            title: title.to_string(),
        },
    }
}

async fn index_with_collection(metric: DistanceMetric) -> MemoryIndex {
    let index = MemoryIndex::new();
    index
        .ensure_collection(COLLECTION, 3, metric)
        .await
        .expect("should create collection");
    index
}

#[tokio::test]
async fn ensure_collection_is_idempotent() {
    let index = index_with_collection(DistanceMetric::Cosine).await;

    index
        .ensure_collection(COLLECTION, 3, DistanceMetric::Cosine)
        .await
        .expect("second ensure should be a no-op");

    assert_eq!(
        index.count_points(COLLECTION).await.expect("should count"),
        0
    );
}

#[tokio::test]
async fn upsert_is_idempotent_by_id() {
    let index = index_with_collection(DistanceMetric::Cosine).await;
    let id = Uuid::new_v4();
    let batch = vec![point(id, vec![1.0, 0.0, 0.0], "X")];

    index
        .upsert(COLLECTION, batch.clone())
        .await
        .expect("first upsert should succeed");
    index
        .upsert(COLLECTION, batch)
        .await
        .expect("second upsert should succeed");

    assert_eq!(
        index.count_points(COLLECTION).await.expect("should count"),
        1
    );
}

#[tokio::test]
async fn identical_vector_ranks_first_with_maximum_score() {
    let index = index_with_collection(DistanceMetric::Cosine).await;
    let target = vec![0.6, 0.8, 0.0];
    index
        .upsert(
            COLLECTION,
            vec![
                point(Uuid::new_v4(), target.clone(), "X"),
                point(Uuid::new_v4(), vec![0.0, 0.0, 1.0], "Y"),
            ],
        )
        .await
        .expect("should upsert");

    let results = index
        .search(COLLECTION, &target, 2)
        .await
        .expect("should search");

    assert_eq!(results[0].title, "X");
    assert!((results[0].similarity_score - 1.0).abs() < 1e-5);
    assert_eq!(results[0].start, 10.0);
    assert_eq!(results[0].end, 55.0);
}

#[tokio::test]
async fn search_never_exceeds_limit_and_is_sorted() {
    let index = index_with_collection(DistanceMetric::Cosine).await;
    let points: Vec<EmbeddedPoint> = (0..10)
        .map(|i| {
            point(
                Uuid::new_v4(),
                vec![1.0, i as f32 * 0.1, 0.0],
                &format!("v{i}"),
            )
        })
        .collect();
    index.upsert(COLLECTION, points).await.expect("should upsert");

    let results = index
        .search(COLLECTION, &[1.0, 0.0, 0.0], 3)
        .await
        .expect("should search");

    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
}

#[tokio::test]
async fn search_is_deterministic_for_fixed_state() {
    let index = index_with_collection(DistanceMetric::Dot).await;
    // Two points with identical vectors tie on score
    let points = vec![
        point(Uuid::new_v4(), vec![1.0, 1.0, 1.0], "A"),
        point(Uuid::new_v4(), vec![1.0, 1.0, 1.0], "B"),
    ];
    index.upsert(COLLECTION, points).await.expect("should upsert");

    let first = index
        .search(COLLECTION, &[1.0, 1.0, 1.0], 2)
        .await
        .expect("should search");
    let second = index
        .search(COLLECTION, &[1.0, 1.0, 1.0], 2)
        .await
        .expect("should search");

    assert_eq!(first, second);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected_before_any_write() {
    let index = index_with_collection(DistanceMetric::Cosine).await;
    let batch = vec![
        point(Uuid::new_v4(), vec![1.0, 0.0, 0.0], "good"),
        point(Uuid::new_v4(), vec![1.0, 0.0], "bad"),
    ];

    let result = index.upsert(COLLECTION, batch).await;

    assert!(matches!(
        result,
        Err(IndexError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
    assert_eq!(
        index.count_points(COLLECTION).await.expect("should count"),
        0
    );
}

#[tokio::test]
async fn unknown_collection_is_reported() {
    let index = MemoryIndex::new();

    let result = index.search("missing", &[1.0], 3).await;

    assert!(matches!(result, Err(IndexError::CollectionNotFound(_))));
}

#[tokio::test]
async fn euclidean_metric_prefers_closer_points() {
    let index = index_with_collection(DistanceMetric::Euclidean).await;
    index
        .upsert(
            COLLECTION,
            vec![
                point(Uuid::new_v4(), vec![0.1, 0.0, 0.0], "near"),
                point(Uuid::new_v4(), vec![5.0, 5.0, 5.0], "far"),
            ],
        )
        .await
        .expect("should upsert");

    let results = index
        .search(COLLECTION, &[0.0, 0.0, 0.0], 2)
        .await
        .expect("should search");

    assert_eq!(results[0].title, "near");
    assert!(results[0].similarity_score > results[1].similarity_score);
}
