//! # Persistence Integration Tests
//!
//! Round-trips through the redb-backed store: computed blocks rehydrate
//! identically (content, parents, timestamps, embedding), lineage logs
//! and documents survive process restarts.

mod common;

use common::{KeywordEmbedder, ScriptedModel};
use mnemon_core::{
    Block, ComputeContext, Document, RedbStore, StoreGateway,
};

#[test]
fn computed_block_roundtrips_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.redb");
    let mut store =
        RedbStore::open(&path, Box::new(KeywordEmbedder::new("sky"))).expect("open");
    let model = ScriptedModel;
    let embedder = KeywordEmbedder::new("sky");
    let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

    let mut z = Block::new("The sky is blue.").merge(Block::new("Water is wet."));
    z.compute(&mut ctx, "persisted merge").expect("compute");
    let expected = z.to_record();

    drop(ctx);
    drop(store);

    // Reopen and rehydrate.
    let store =
        RedbStore::open(&path, Box::new(KeywordEmbedder::new("sky"))).expect("reopen");
    let record = store
        .block_by_id(z.id())
        .expect("lookup")
        .expect("present after reopen");

    assert_eq!(record, expected);
    assert_eq!(record.content, expected.content);
    assert_eq!(record.parents, expected.parents);
    assert_eq!(record.created_at, expected.created_at);
    assert_eq!(record.computed_at, expected.computed_at);
    assert_eq!(record.embedding, expected.embedding);
}

#[test]
fn lineage_tip_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.redb");
    let mut store =
        RedbStore::open(&path, Box::new(KeywordEmbedder::new("sky"))).expect("open");
    let model = ScriptedModel;
    let embedder = KeywordEmbedder::new("sky");
    let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

    let mut v1 = Block::new("The sky is blue.");
    v1.compute(&mut ctx, "computed").expect("compute");
    let mut v2 = v1.edit(&mut ctx, "The sky is blue at noon.").expect("edit");
    v2.compute(&mut ctx, "computed").expect("compute");

    drop(ctx);
    drop(store);

    let store =
        RedbStore::open(&path, Box::new(KeywordEmbedder::new("sky"))).expect("reopen");
    let log = store.lineage_log(v1.lineage()).expect("log");
    assert_eq!(log.len(), 2);
    assert_eq!(
        store.lineage_tip(v1.lineage()).expect("tip"),
        Some(v2.id().clone())
    );
}

#[test]
fn document_roundtrips_with_operation_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.redb");
    let mut store =
        RedbStore::open(&path, Box::new(KeywordEmbedder::new("sky"))).expect("open");
    let model = ScriptedModel;
    let embedder = KeywordEmbedder::new("sky");
    let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

    let mut doc = Document::new(vec![Block::new("The sky is blue.")]);
    doc.insert(Block::new("Water is wet.")).expect("insert");
    doc.compute(&mut ctx).expect("compute");
    let expected = doc.to_record();

    drop(ctx);
    drop(store);

    let store =
        RedbStore::open(&path, Box::new(KeywordEmbedder::new("sky"))).expect("reopen");
    let record = store
        .document_by_id(doc.id())
        .expect("lookup")
        .expect("present after reopen");
    assert_eq!(record, expected);

    let hydrated = Document::from_record(record, &store).expect("hydrate");
    assert_eq!(hydrated.block_ids(), doc.block_ids());
    assert_eq!(hydrated.operations().len(), doc.operations().len());
}

#[test]
fn similarity_search_works_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.redb");
    let mut store =
        RedbStore::open(&path, Box::new(KeywordEmbedder::new("sky"))).expect("open");
    let model = ScriptedModel;
    let embedder = KeywordEmbedder::new("sky");
    let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

    let mut on_topic = Block::new("The sky is blue.");
    on_topic.compute(&mut ctx, "computed").expect("compute");
    let mut off_topic = Block::new("Trains run on steel rails.");
    off_topic.compute(&mut ctx, "computed").expect("compute");

    let hits = store
        .similarity_search("The sky looks clear.", None, 1.0, 10)
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(&hits[0].record.id, on_topic.id());
}
