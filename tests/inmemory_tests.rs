//! Contract tests for the in-memory vector store: search ordering, filter
//! semantics, id derivation, and validation.

use proptest::prelude::*;
use ragstore::{
    FilterOperator, FilterValue, InMemoryVectorStore, Metadata, MetadataFilter, StoreError,
    VectorStore,
};
use serde_json::{Value, json};

fn meta(doc_id: &str, chunk_index: u32) -> Metadata {
    match json!({ "doc_id": doc_id, "chunk_index": chunk_index }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn meta_with(doc_id: &str, chunk_index: u32, field: &str, value: Value) -> Metadata {
    let mut map = meta(doc_id, chunk_index);
    map.insert(field.to_string(), value);
    map
}

fn filter(field: &str, operator: FilterOperator, value: FilterValue) -> MetadataFilter {
    MetadataFilter { field: field.to_string(), operator, value }
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Search results are ordered by descending similarity and bounded by
    /// `top_k`.
    #[test]
    fn results_ordered_descending_and_bounded_by_top_k(
        embeddings in proptest::collection::vec(arb_normalized_embedding(16), 1..20),
        query in arb_normalized_embedding(16),
        top_k in 1usize..25,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let results = rt.block_on(async {
            let store = InMemoryVectorStore::new(16);
            let metadata: Vec<Metadata> = (0..embeddings.len())
                .map(|i| meta("doc_1", i as u32))
                .collect();
            store.add_vectors(&embeddings, &metadata).await.unwrap();
            store.search(&query, top_k, None).await.unwrap()
        });

        prop_assert!(results.len() <= top_k);
        prop_assert!(results.len() <= embeddings.len());
        for window in results.windows(2) {
            prop_assert!(
                window[0].similarity >= window[1].similarity,
                "results not in descending order: {} < {}",
                window[0].similarity,
                window[1].similarity,
            );
        }
    }
}

#[tokio::test]
async fn known_similarities_rank_in_order() {
    let store = InMemoryVectorStore::new(2);
    let vectors = vec![
        vec![1.0, 0.0],              // similarity 1.0 to the query
        vec![0.7071, 0.7071],        // ~0.7071
        vec![0.0, 1.0],              // 0.0
    ];
    let metadata = vec![meta("exact", 0), meta("close", 0), meta("orthogonal", 0)];
    store.add_vectors(&vectors, &metadata).await.unwrap();

    let results = store.search(&[1.0, 0.0], 2, None).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].doc_id, "exact");
    assert_eq!(results[1].doc_id, "close");
    assert!(results[0].similarity > 0.99);
    assert!((results[1].similarity - 0.7071).abs() < 1e-3);
}

#[tokio::test]
async fn same_key_overwrites_because_ids_collide() {
    // Two entries with the same (doc_id, chunk_index) derive the same row
    // id, so the second insert replaces the first.
    let store = InMemoryVectorStore::new(2);
    store
        .add_vectors(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[meta("d", 3), meta("d", 3)])
        .await
        .unwrap();
    assert_eq!(store.get_num_vectors().await.unwrap(), 1);

    store.add_vectors(&[vec![1.0, 0.0]], &[meta("d", 4)]).await.unwrap();
    assert_eq!(store.get_num_vectors().await.unwrap(), 2);
}

#[tokio::test]
async fn remove_document_is_idempotent() {
    let store = InMemoryVectorStore::new(2);
    store.add_vectors(&[vec![1.0, 0.0]], &[meta("keep", 0)]).await.unwrap();

    store.remove_document("never_ingested").await.unwrap();
    assert_eq!(store.get_num_vectors().await.unwrap(), 1);

    store.remove_document("keep").await.unwrap();
    store.remove_document("keep").await.unwrap();
    assert_eq!(store.get_num_vectors().await.unwrap(), 0);
}

#[tokio::test]
async fn in_filter_selects_only_listed_values() {
    let store = InMemoryVectorStore::new(2);
    let vectors = vec![vec![1.0, 0.0]; 3];
    let metadata = vec![
        meta_with("d1", 0, "category", json!("a")),
        meta_with("d2", 0, "category", json!("b")),
        meta_with("d3", 0, "category", json!("c")),
    ];
    store.add_vectors(&vectors, &metadata).await.unwrap();

    let hits = store
        .search(
            &[1.0, 0.0],
            10,
            Some(&filter(
                "category",
                FilterOperator::In,
                FilterValue::Many(vec![json!("a"), json!("b")]),
            )),
        )
        .await
        .unwrap();
    let mut docs: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
    docs.sort_unstable();
    assert_eq!(docs, ["d1", "d2"]);

    let hits = store
        .search(
            &[1.0, 0.0],
            10,
            Some(&filter(
                "category",
                FilterOperator::NotIn,
                FilterValue::Many(vec![json!("a"), json!("b")]),
            )),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, "d3");
}

#[tokio::test]
async fn scalar_filters_compare_text() {
    let store = InMemoryVectorStore::new(2);
    let vectors = vec![vec![1.0, 0.0]; 2];
    let metadata = vec![
        meta_with("low", 0, "grade", json!("b")),
        meta_with("high", 0, "grade", json!("d")),
    ];
    store.add_vectors(&vectors, &metadata).await.unwrap();

    let hits = store
        .search(
            &[1.0, 0.0],
            10,
            Some(&filter("grade", FilterOperator::GreaterThan, FilterValue::One(json!("c")))),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, "high");

    let hits = store
        .search(
            &[1.0, 0.0],
            10,
            Some(&filter("grade", FilterOperator::Equals, FilterValue::One(json!("b")))),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, "low");

    // A field absent from the row's metadata never matches.
    let hits = store
        .search(
            &[1.0, 0.0],
            10,
            Some(&filter("missing", FilterOperator::Equals, FilterValue::One(json!("b")))),
        )
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn injection_shaped_filter_field_is_rejected() {
    let store = InMemoryVectorStore::new(2);
    store.add_vectors(&[vec![1.0, 0.0]], &[meta("d", 0)]).await.unwrap();

    let err = store
        .search(
            &[1.0, 0.0],
            10,
            Some(&filter("a; DROP TABLE x", FilterOperator::Equals, FilterValue::One(json!("v")))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[tokio::test]
async fn batch_validation_rejects_bad_input() {
    let store = InMemoryVectorStore::new(3);

    // Vector/metadata length mismatch.
    let err = store
        .add_vectors(&[vec![1.0, 0.0, 0.0]], &[meta("d", 0), meta("d", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    // Wrong dimension.
    let err = store.add_vectors(&[vec![1.0, 0.0]], &[meta("d", 0)]).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    // Metadata missing the join keys.
    let bare = Metadata::new();
    let err = store.add_vectors(&[vec![1.0, 0.0, 0.0]], &[bare]).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    // Nothing was inserted by any failed call.
    assert_eq!(store.get_num_vectors().await.unwrap(), 0);
}

#[tokio::test]
async fn query_dimension_is_checked() {
    let store = InMemoryVectorStore::new(3);
    let err = store.search(&[1.0, 0.0], 5, None).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}
