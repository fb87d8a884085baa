use std::io::Cursor;
use std::path::Path;

use tempfile::{tempdir, TempDir};

use flatshard::{run_search_worker, SearchEngine};
use flatshard_core::{DocumentStore, DocumentWriter, ShardBuffer, ShardCatalog, ShardStore, Similarity};
use flatshard_encoder::{CachedEncoder, LiteralEncoder};

/// One shard of 2-d vectors, with `documents` of them written to the text store
fn fixture(vectors: &[[f32; 2]], documents: usize) -> (TempDir, SearchEngine<LiteralEncoder>) {
    let dir = tempdir().unwrap();
    let shard_path = dir.path().join("index_1.shard");

    let mut buffer = ShardBuffer::new(2, Similarity::Dot);
    for v in vectors {
        buffer.push(v).unwrap();
    }
    buffer.persist(&shard_path).unwrap();

    let mut catalog = ShardCatalog::empty(2, Similarity::Dot);
    catalog.push(ShardStore::open(&shard_path).unwrap()).unwrap();

    let (docs, refs) = paths(dir.path());
    let mut writer = DocumentWriter::create(&docs, &refs).unwrap();
    for i in 0..documents {
        writer.append(&format!("id-{}", i), &format!("document number {}", i)).unwrap();
    }
    writer.finish().unwrap();

    let documents = DocumentStore::open(&docs, &refs).unwrap();
    let engine = SearchEngine::new(catalog, documents, CachedEncoder::new(LiteralEncoder::new(2), 8)).unwrap();
    (dir, engine)
}

fn paths(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    (dir.join("docs.txt"), dir.join("refs.txt"))
}

fn run(engine: &mut SearchEngine<LiteralEncoder>, input: &str) -> (String, String, usize) {
    let mut out = Vec::new();
    let mut sync = Vec::new();
    let served = run_search_worker(engine, &mut Cursor::new(input.as_bytes()), &mut out, &mut sync).unwrap();
    (String::from_utf8(out).unwrap(), String::from_utf8(sync).unwrap(), served)
}

#[test]
fn answers_consecutive_requests() {
    let (_dir, mut engine) = fixture(&[[1.0, 0.0], [0.0, 1.0]], 2);
    let (out, sync, served) = run(&mut engine, "1\n1 0\n1\n1\n1\n0 1\n1\n1\n");

    assert_eq!(served, 2);
    assert_eq!(sync, "\n\n\n");
    assert_eq!(out, "1\nid-0\n1\n0\ndocument number 0\n1\nid-1\n1\n1\ndocument number 1\n");
}

#[test]
fn malformed_weight_reports_and_continues() {
    let (_dir, mut engine) = fixture(&[[1.0, 0.0], [0.0, 1.0]], 2);
    // two-query request with a bad first weight, then a valid request
    let (out, sync, served) = run(&mut engine, "2\n1 0\nheavy\n0 1\n1\n5\n1\n0 1\n1\n2\n");

    assert_eq!(served, 1);
    assert_eq!(sync.matches("Error:").count(), 1);
    let messages: Vec<&str> = sync.split('\n').collect();
    // ready, error trace, then the answered request
    assert_eq!(messages[0], "");
    assert!(messages[1].contains("heavy"));
    assert_eq!(messages[2], "");
    assert_eq!(messages.len(), 4);
    assert_eq!(
        out,
        "2\nid-1\n1\n1\ndocument number 1\nid-0\n0\n0\ndocument number 0\n"
    );
}

#[test]
fn bad_counts_and_bad_query_text_are_request_errors() {
    let (_dir, mut engine) = fixture(&[[1.0, 0.0]], 1);
    let (out, sync, served) = run(&mut engine, "lots\n1\nnot a vector\n1\n1\n1\n1 0\n1\n1\n");

    assert_eq!(served, 1);
    assert_eq!(sync.matches("Error:").count(), 2);
    assert_eq!(out, "1\nid-0\n1\n0\ndocument number 0\n");
}

#[test]
fn missing_document_fails_only_that_request() {
    // two vectors, one document: ordinal 1 cannot be hydrated
    let (_dir, mut engine) = fixture(&[[1.0, 0.0], [0.0, 1.0]], 1);
    let (out, sync, served) = run(&mut engine, "1\n0 1\n1\n1\n1\n1 0\n1\n1\n");

    assert_eq!(served, 1);
    assert!(sync.contains("Error:"));
    assert!(sync.contains("resolving document 1"));
    assert_eq!(out, "1\nid-0\n1\n0\ndocument number 0\n");
}

#[test]
fn eof_inside_request_is_clean_shutdown() {
    let (_dir, mut engine) = fixture(&[[1.0, 0.0]], 1);
    let (out, sync, served) = run(&mut engine, "2\n1 0\n1\n");

    assert_eq!(served, 0);
    assert!(out.is_empty());
    assert_eq!(sync, "\n");
}

#[test]
fn k_larger_than_index_returns_everything() {
    let (_dir, mut engine) = fixture(&[[1.0, 0.0], [0.5, 0.0], [0.25, 0.0]], 3);
    let (out, _, _) = run(&mut engine, "1\n1 0\n1\n100\n");

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "3");
    let ordinals: Vec<&str> = lines[1..].chunks(4).map(|hit| hit[2]).collect();
    assert_eq!(ordinals, vec!["0", "1", "2"]);
}

#[test]
fn non_finite_query_vector_is_rejected() {
    let (_dir, mut engine) = fixture(&[[1.0, 0.0], [0.0, 1.0]], 2);
    let (out, sync, served) = run(&mut engine, "1\nnan 0\n1\n2\n1\n1 0\n1\n1\n");

    assert_eq!(served, 1);
    assert_eq!(sync.matches("Error:").count(), 1);
    assert!(sync.contains("nan"));
    assert_eq!(out, "1\nid-0\n1\n0\ndocument number 0\n");
}
