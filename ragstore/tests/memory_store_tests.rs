//! Store contract and search-ordering properties for the in-memory backend.

mod common;

use ragstore::similarity::cosine_distance;
use ragstore::{ChunkBatch, InMemoryRagStore, NewDocument, RagStore, SearchQuery};
use proptest::prelude::*;

macro_rules! contract_tests {
    ($($name:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                let mut store = InMemoryRagStore::new();
                common::$name(&mut store).await;
            }
        )*
    };
}

contract_tests!(
    identical_vector_ranks_first,
    threshold_excludes_orthogonal_chunk,
    mismatched_batch_writes_nothing,
    failing_batch_is_rolled_back,
    delete_cascades_to_chunks,
    top_k_and_threshold_contract,
    chunk_order_is_preserved,
    stats_report_counts_and_mean_length,
    empty_store_has_no_stats_or_results,
    metadata_and_source_round_trip,
    search_can_be_scoped_to_one_document,
    query_dimension_mismatch_is_query_error,
    invalid_query_is_rejected,
    zero_magnitude_vectors_never_match,
    non_finite_components_are_rejected,
);

#[tokio::test]
async fn fixed_dimensions_reject_query_of_other_size() {
    let mut store = InMemoryRagStore::with_dimensions(2);
    common::insert_two_chunk_corpus(&mut store).await;
    assert_eq!(store.document_count(), 1);
    assert_eq!(store.chunk_count(), 2);

    let err = store.search(&SearchQuery::new(vec![1.0])).await.unwrap_err();
    assert!(matches!(err, ragstore::RagStoreError::Query(_)));
}

/// Generate a non-zero embedding of the given dimension.
fn arb_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter("non-zero embedding", |v| {
        v.iter().map(|x| x * x).sum::<f32>().sqrt() > 1e-3
    })
}

/// *For any* corpus, query, `top_k` and threshold, search returns exactly the
/// `top_k` best chunks whose similarity strictly exceeds the threshold, in
/// non-increasing similarity order.
mod prop_search_contract {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_match_brute_force(
            embeddings in proptest::collection::vec(arb_embedding(DIM), 1..20),
            query in arb_embedding(DIM),
            top_k in 1usize..25,
            threshold in 0.0f64..1.0,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let mut store = InMemoryRagStore::with_dimensions(DIM);
                let id = store.insert_document(NewDocument::new("corpus")).await.unwrap();
                let chunks = (0..embeddings.len()).map(|i| format!("chunk {i}")).collect();
                store
                    .insert_chunks(ChunkBatch::new(id, chunks, embeddings.clone()))
                    .await
                    .unwrap();
                store
                    .search(
                        &SearchQuery::new(query.clone())
                            .top_k(top_k)
                            .similarity_threshold(threshold),
                    )
                    .await
                    .unwrap()
            });

            let eligible = embeddings
                .iter()
                .filter(|e| 1.0 - cosine_distance(&query, e).unwrap() > threshold)
                .count();

            prop_assert_eq!(results.len(), eligible.min(top_k));
            for result in &results {
                prop_assert!(result.similarity > threshold);
            }
            for pair in results.windows(2) {
                prop_assert!(
                    pair[0].similarity > pair[1].similarity
                        || (pair[0].similarity == pair[1].similarity
                            && pair[0].chunk_id < pair[1].chunk_id),
                    "order violated: {:?} then {:?}",
                    (pair[0].chunk_id, pair[0].similarity),
                    (pair[1].chunk_id, pair[1].similarity)
                );
            }
        }
    }
}
