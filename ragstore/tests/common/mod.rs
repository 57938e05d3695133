//! Store contract checks shared by the in-memory and PostgreSQL test suites.
//!
//! Every check expects an empty store.

use ragstore::{
    ChunkBatch, DeleteOutcome, DocumentId, Metadata, NewDocument, RagStore, RagStoreError,
    SearchQuery,
};
use serde_json::json;

pub fn meta(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().expect("metadata literal must be an object")
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Document "D1" with chunks "hello world" at [1,0] and "foo bar baz" at [0,1].
pub async fn insert_two_chunk_corpus<S: RagStore>(store: &mut S) -> DocumentId {
    let id = store.insert_document(NewDocument::new("D1")).await.unwrap();
    let written = store
        .insert_chunks(ChunkBatch::new(
            id,
            vec!["hello world".into(), "foo bar baz".into()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        ))
        .await
        .unwrap();
    assert_eq!(written, 2);
    id
}

pub async fn identical_vector_ranks_first<S: RagStore>(store: &mut S) {
    let id = insert_two_chunk_corpus(store).await;

    let results = store
        .search(&SearchQuery::new(vec![1.0, 0.0]).top_k(1).similarity_threshold(0.0))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "hello world");
    assert_eq!(results[0].document_id, id);
    assert!(approx(results[0].similarity, 1.0), "similarity was {}", results[0].similarity);
}

pub async fn threshold_excludes_orthogonal_chunk<S: RagStore>(store: &mut S) {
    insert_two_chunk_corpus(store).await;

    let results = store
        .search(&SearchQuery::new(vec![0.0, 1.0]).top_k(5).similarity_threshold(0.99))
        .await
        .unwrap();

    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["foo bar baz"]);
}

pub async fn mismatched_batch_writes_nothing<S: RagStore>(store: &mut S) {
    let id = store.insert_document(NewDocument::new("doc")).await.unwrap();

    let err = store
        .insert_chunks(ChunkBatch::new(
            id,
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, RagStoreError::Validation(_)), "got {err:?}");
    assert!(store.list_chunks(id).await.unwrap().is_empty());
}

pub async fn failing_batch_is_rolled_back<S: RagStore>(store: &mut S) {
    let id = store.insert_document(NewDocument::new("doc")).await.unwrap();
    store
        .insert_chunks(
            ChunkBatch::new(id, vec!["first".into()], vec![vec![1.0, 0.0]]).starting_at(1),
        )
        .await
        .unwrap();

    // Index 1 is taken, so the second row collides after the first is accepted.
    let colliding = ChunkBatch::new(
        id,
        vec!["x".into(), "y".into()],
        vec![vec![1.0, 0.0], vec![0.0, 1.0]],
    );
    let err = store.insert_chunks(colliding).await.unwrap_err();
    assert!(matches!(err, RagStoreError::Write { .. }), "got {err:?}");

    let contents: Vec<String> =
        store.list_chunks(id).await.unwrap().into_iter().map(|c| c.content).collect();
    assert_eq!(contents, vec!["first"]);
}

pub async fn delete_cascades_to_chunks<S: RagStore>(store: &mut S) {
    let id = insert_two_chunk_corpus(store).await;
    let keep = store.insert_document(NewDocument::new("other")).await.unwrap();
    store
        .insert_chunks(ChunkBatch::new(keep, vec!["kept".into()], vec![vec![1.0, 1.0]]))
        .await
        .unwrap();

    let outcome = store.delete_document(id).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted { chunks_removed: 2 });

    assert!(store.get_document(id).await.unwrap().is_none());
    assert!(store.list_chunks(id).await.unwrap().is_empty());
    let results = store
        .search(&SearchQuery::new(vec![1.0, 0.0]).top_k(10).similarity_threshold(0.0))
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.document_id != id));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "kept");

    assert_eq!(store.delete_document(id).await.unwrap(), DeleteOutcome::NotFound);
}

pub async fn top_k_and_threshold_contract<S: RagStore>(store: &mut S) {
    let id = store.insert_document(NewDocument::new("corpus")).await.unwrap();
    let embeddings: Vec<Vec<f32>> = (0..12)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::PI / 11.0;
            vec![angle.cos(), angle.sin()]
        })
        .collect();
    let chunks = (0..embeddings.len()).map(|i| format!("chunk {i}")).collect();
    store.insert_chunks(ChunkBatch::new(id, chunks, embeddings)).await.unwrap();

    for (top_k, threshold) in [(1, 0.0), (3, 0.5), (5, 0.9), (20, 0.0), (20, 0.99)] {
        let results = store
            .search(&SearchQuery::new(vec![1.0, 0.0]).top_k(top_k).similarity_threshold(threshold))
            .await
            .unwrap();
        assert!(results.len() <= top_k);
        assert!(results.iter().all(|r| r.similarity > threshold));
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    // Chunks 0..=5 lie within 90° of the query, the rest point away from it.
    let all = store
        .search(&SearchQuery::new(vec![1.0, 0.0]).top_k(100).similarity_threshold(0.0))
        .await
        .unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(all[0].content, "chunk 0");
}

pub async fn chunk_order_is_preserved<S: RagStore>(store: &mut S) {
    let id = store.insert_document(NewDocument::new("abc")).await.unwrap();
    store
        .insert_chunks(ChunkBatch::new(
            id,
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        ))
        .await
        .unwrap();

    for _ in 0..2 {
        let chunks = store.list_chunks(id).await.unwrap();
        let pairs: Vec<(i32, &str)> =
            chunks.iter().map(|c| (c.chunk_index, c.content.as_str())).collect();
        assert_eq!(pairs, vec![(0, "a"), (1, "b"), (2, "c")]);
        assert_eq!(chunks[2].embedding, vec![1.0, 1.0]);
    }

    // Appending continues wherever the caller says.
    store
        .insert_chunks(
            ChunkBatch::new(id, vec!["d".into()], vec![vec![0.5, 0.5]]).starting_at(3),
        )
        .await
        .unwrap();
    let indexes: Vec<i32> =
        store.list_chunks(id).await.unwrap().iter().map(|c| c.chunk_index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3]);
}

pub async fn stats_report_counts_and_mean_length<S: RagStore>(store: &mut S) {
    let id = store.insert_document(NewDocument::new("doc").with_source("a.txt")).await.unwrap();
    store
        .insert_chunks(ChunkBatch::new(
            id,
            vec!["abcd".into(), "abcdef".into(), "abcdefgh".into()],
            vec![vec![1.0, 0.0]; 3],
        ))
        .await
        .unwrap();
    let empty = store.insert_document(NewDocument::new("no chunks")).await.unwrap();

    let stats = store.document_stats().await.unwrap();
    assert_eq!(stats.len(), 2);

    let with_chunks = stats.iter().find(|s| s.document_id == id).unwrap();
    assert_eq!(with_chunks.chunk_count, 3);
    assert!(approx(with_chunks.avg_chunk_length, 6.0));
    assert_eq!(with_chunks.source.as_deref(), Some("a.txt"));

    let without = stats.iter().find(|s| s.document_id == empty).unwrap();
    assert_eq!(without.chunk_count, 0);
    assert_eq!(without.avg_chunk_length, 0.0);
}

pub async fn empty_store_has_no_stats_or_results<S: RagStore>(store: &mut S) {
    assert!(store.document_stats().await.unwrap().is_empty());
    let results = store.search(&SearchQuery::new(vec![1.0, 0.0])).await.unwrap();
    assert!(results.is_empty());
}

pub async fn metadata_and_source_round_trip<S: RagStore>(store: &mut S) {
    let doc_meta = meta(json!({"title": "Guide", "version": 2, "tags": ["ops", "db"]}));
    let id = store
        .insert_document(
            NewDocument::new("full text").with_metadata(doc_meta.clone()).with_source("guide.md"),
        )
        .await
        .unwrap();

    let chunk_meta = meta(json!({"page": 3, "draft": false, "extra": null}));
    store
        .insert_chunks(
            ChunkBatch::new(
                id,
                vec!["with meta".into(), "without meta".into()],
                vec![vec![1.0, 0.0], vec![0.9, 0.1]],
            )
            .with_metadata(vec![Some(chunk_meta.clone())]),
        )
        .await
        .unwrap();

    let document = store.get_document(id).await.unwrap().unwrap();
    assert_eq!(document.content, "full text");
    assert_eq!(document.metadata, Some(doc_meta));
    assert_eq!(document.source.as_deref(), Some("guide.md"));

    let results = store
        .search(&SearchQuery::new(vec![1.0, 0.0]).similarity_threshold(0.0))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].metadata, Some(chunk_meta));
    assert_eq!(results[1].metadata, None);
    assert!(results.iter().all(|r| r.source.as_deref() == Some("guide.md")));
}

pub async fn search_can_be_scoped_to_one_document<S: RagStore>(store: &mut S) {
    let first = insert_two_chunk_corpus(store).await;
    let second = insert_two_chunk_corpus(store).await;

    let results = store
        .search(&SearchQuery::new(vec![1.0, 0.0]).similarity_threshold(0.0).in_document(second))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, second);
    assert_ne!(first, second);
}

pub async fn query_dimension_mismatch_is_query_error<S: RagStore>(store: &mut S) {
    insert_two_chunk_corpus(store).await;
    let err = store
        .search(&SearchQuery::new(vec![1.0, 0.0, 0.0]).similarity_threshold(0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, RagStoreError::Query(_)), "got {err:?}");
}

pub async fn invalid_query_is_rejected<S: RagStore>(store: &mut S) {
    let err = store.search(&SearchQuery::new(vec![1.0, 0.0]).top_k(0)).await.unwrap_err();
    assert!(matches!(err, RagStoreError::Validation(_)));
}

pub async fn zero_magnitude_vectors_never_match<S: RagStore>(store: &mut S) {
    let id = store.insert_document(NewDocument::new("doc")).await.unwrap();
    store
        .insert_chunks(ChunkBatch::new(
            id,
            vec!["silent".into(), "hello world".into()],
            vec![vec![0.0, 0.0], vec![1.0, 0.0]],
        ))
        .await
        .unwrap();

    // A stored zero vector has no direction, so it passes no threshold.
    let results = store
        .search(&SearchQuery::new(vec![1.0, 0.0]).top_k(10).similarity_threshold(0.0))
        .await
        .unwrap();
    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["hello world"]);
    assert!(results.iter().all(|r| r.similarity.is_finite()));

    // Nor does a zero query match anything.
    let results = store
        .search(&SearchQuery::new(vec![0.0, 0.0]).top_k(10).similarity_threshold(0.0))
        .await
        .unwrap();
    assert!(results.is_empty(), "got {results:?}");
}

pub async fn non_finite_components_are_rejected<S: RagStore>(store: &mut S) {
    let id = store.insert_document(NewDocument::new("doc")).await.unwrap();

    let err = store
        .insert_chunks(ChunkBatch::new(
            id,
            vec!["a".into(), "b".into()],
            vec![vec![f32::NAN, 1.0], vec![f32::INFINITY, 0.0]],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, RagStoreError::Validation(_)), "got {err:?}");
    assert!(store.list_chunks(id).await.unwrap().is_empty());

    let err = store
        .search(&SearchQuery::new(vec![f32::NAN, 0.0]).similarity_threshold(0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, RagStoreError::Validation(_)), "got {err:?}");
}
